use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query_binder::SqlxValues;
use sqlx::{FromRow, Pool, Postgres, error::ErrorKind};
use uuid::Uuid;

use crate::domain::{
    errors::DomainError,
    models::{ListFilter, User, UserLookup, UserUpdate},
    repositories::UserRepository,
};

pub type PgPool = Pool<Postgres>;

/// Wraps `sqlx::Error` so `?` maps it onto a [`DomainError`] kind.
#[derive(Debug)]
struct DbError(sqlx::Error);

impl From<DbError> for DomainError {
    fn from(DbError(err): DbError) -> Self {
        if let Some(db) = err.as_database_error() {
            let message = db.message().to_string();
            match db.kind() {
                ErrorKind::UniqueViolation => return DomainError::Conflict(message),
                ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => return DomainError::InvalidArgument(message),
                _ => {}
            }
        }

        match err {
            sqlx::Error::RowNotFound => DomainError::NotFound("no rows in result set".to_string()),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => DomainError::Unavailable(err.to_string()),
            other => DomainError::Internal(anyhow::Error::new(other)),
        }
    }
}

#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User) -> Result<User, DomainError> {
        let (sql, values) = queries::insert_user(&user)?;
        let record = sqlx::query_as_with::<_, UserRecord, _>(&sql, SqlxValues(values))
            .fetch_one(&self.pool)
            .await
            .map_err(DbError)?;
        Ok(record.into())
    }

    async fn get(&self, lookup: &UserLookup) -> Result<User, DomainError> {
        let (sql, values) = queries::select_user(lookup);
        sqlx::query_as_with::<_, UserRecord, _>(&sql, SqlxValues(values))
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .map(User::from)
            .ok_or_else(|| DomainError::not_found("User", lookup))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<User>, DomainError> {
        let (sql, values) = queries::list_users(filter);
        let rows = sqlx::query_as_with::<_, UserRecord, _>(&sql, SqlxValues(values))
            .fetch_all(&self.pool)
            .await
            .map_err(DbError)?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn update(&self, update: &UserUpdate) -> Result<User, DomainError> {
        let (sql, values) = queries::update_user(update);
        sqlx::query_as_with::<_, UserRecord, _>(&sql, SqlxValues(values))
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .map(User::from)
            .ok_or_else(|| DomainError::not_found("User", update.id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        let (sql, values) = queries::delete_user(id);
        let result = sqlx::query_with(&sql, SqlxValues(values))
            .execute(&self.pool)
            .await
            .map_err(DbError)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("User", id));
        }
        Ok(())
    }
}

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    bio: String,
    website: String,
    is_active: bool,
    refresh_token: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<UserRecord> for User {
    fn from(value: UserRecord) -> Self {
        Self {
            id: value.id,
            username: value.username,
            email: value.email,
            password: value.password,
            first_name: value.first_name,
            last_name: value.last_name,
            bio: value.bio,
            website: value.website,
            is_active: value.is_active,
            refresh_token: value.refresh_token,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Statement builders for the `users` table. Only typed inputs reach these functions, and the
/// same input always renders the same SQL text and bind values.
pub(crate) mod queries {
    use sea_query::{Expr, Iden, Order, PostgresQueryBuilder, Query, Values};
    use uuid::Uuid;

    use crate::domain::{
        errors::DomainError,
        models::{ListFilter, SortDirection, SortField, User, UserLookup, UserUpdate},
    };

    #[derive(Iden, Clone, Copy)]
    pub(crate) enum Users {
        Table,
        Id,
        Username,
        Email,
        Password,
        FirstName,
        LastName,
        Bio,
        Website,
        IsActive,
        RefreshToken,
        CreatedAt,
        UpdatedAt,
    }

    const COLUMNS: [Users; 12] = [
        Users::Id,
        Users::Username,
        Users::Email,
        Users::Password,
        Users::FirstName,
        Users::LastName,
        Users::Bio,
        Users::Website,
        Users::IsActive,
        Users::RefreshToken,
        Users::CreatedAt,
        Users::UpdatedAt,
    ];

    fn sort_column(field: SortField) -> Users {
        match field {
            SortField::Id => Users::Id,
            SortField::Username => Users::Username,
            SortField::Email => Users::Email,
            SortField::FirstName => Users::FirstName,
            SortField::LastName => Users::LastName,
            SortField::IsActive => Users::IsActive,
            SortField::CreatedAt => Users::CreatedAt,
            SortField::UpdatedAt => Users::UpdatedAt,
        }
    }

    pub(crate) fn insert_user(user: &User) -> Result<(String, Values), DomainError> {
        let mut query = Query::insert();
        query.into_table(Users::Table).columns(COLUMNS);
        query
            .values([
                user.id.into(),
                user.username.clone().into(),
                user.email.clone().into(),
                user.password.clone().into(),
                user.first_name.clone().into(),
                user.last_name.clone().into(),
                user.bio.clone().into(),
                user.website.clone().into(),
                user.is_active.into(),
                user.refresh_token.clone().into(),
                user.created_at.into(),
                user.updated_at.into(),
            ])
            .map_err(|err| anyhow::anyhow!("could not build users insert: {err}"))?;
        query.returning(Query::returning().columns(COLUMNS));
        Ok(query.build(PostgresQueryBuilder))
    }

    pub(crate) fn select_user(lookup: &UserLookup) -> (String, Values) {
        let mut query = Query::select();
        query.columns(COLUMNS).from(Users::Table);
        match lookup {
            UserLookup::ById(id) => query.and_where(Expr::col(Users::Id).eq(*id)),
            UserLookup::ByUsername(username) => {
                query.and_where(Expr::col(Users::Username).eq(username.as_str()))
            }
        };
        query.build(PostgresQueryBuilder)
    }

    pub(crate) fn list_users(filter: &ListFilter) -> (String, Values) {
        let mut query = Query::select();
        query.columns(COLUMNS).from(Users::Table);
        for key in filter.order_by() {
            let order = match key.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            query.order_by(sort_column(key.field), order);
        }
        if filter.limit() != 0 {
            query.limit(filter.limit()).offset(filter.offset());
        }
        query.build(PostgresQueryBuilder)
    }

    pub(crate) fn update_user(update: &UserUpdate) -> (String, Values) {
        Query::update()
            .table(Users::Table)
            .values([
                (Users::Username, update.username.clone().into()),
                (Users::FirstName, update.first_name.clone().into()),
                (Users::LastName, update.last_name.clone().into()),
                (Users::Bio, update.bio.clone().into()),
                (Users::Website, update.website.clone().into()),
                (Users::IsActive, update.is_active.into()),
                (Users::UpdatedAt, update.updated_at.into()),
            ])
            .and_where(Expr::col(Users::Id).eq(update.id))
            .returning(Query::returning().columns(COLUMNS))
            .build(PostgresQueryBuilder)
    }

    pub(crate) fn delete_user(id: Uuid) -> (String, Values) {
        Query::delete()
            .from_table(Users::Table)
            .and_where(Expr::col(Users::Id).eq(id))
            .build(PostgresQueryBuilder)
    }
}
