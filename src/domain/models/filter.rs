use std::cmp::Ordering;

use crate::domain::{errors::DomainError, models::User};

/// Columns a listing may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    Username,
    Email,
    FirstName,
    LastName,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Username => "username",
            SortField::Email => "email",
            SortField::FirstName => "first_name",
            SortField::LastName => "last_name",
            SortField::IsActive => "is_active",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "id" => Some(SortField::Id),
            "username" => Some(SortField::Username),
            "email" => Some(SortField::Email),
            "first_name" => Some(SortField::FirstName),
            "last_name" => Some(SortField::LastName),
            "is_active" => Some(SortField::IsActive),
            "created_at" => Some(SortField::CreatedAt),
            "updated_at" => Some(SortField::UpdatedAt),
            _ => None,
        }
    }

    /// Ascending comparison, with `NULL` (unset `updated_at`) sorting last like Postgres does.
    pub fn compare(&self, a: &User, b: &User) -> Ordering {
        match self {
            SortField::Id => a.id.cmp(&b.id),
            SortField::Username => a.username.cmp(&b.username),
            SortField::Email => a.email.cmp(&b.email),
            SortField::FirstName => a.first_name.cmp(&b.first_name),
            SortField::LastName => a.last_name.cmp(&b.last_name),
            SortField::IsActive => a.is_active.cmp(&b.is_active),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => match (a.updated_at, b.updated_at) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Widest window a SQL `LIMIT`/`OFFSET` (a signed bigint) can express.
const MAX_WINDOW: u64 = i64::MAX as u64;

/// Paging and ordering of a user listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    page: u64,
    limit: u64,
    order_by: Vec<SortKey>,
}

impl ListFilter {
    /// Builds a filter from caller input. `order_by` is a comma separated list of
    /// `column [asc|desc]` terms and may only name allow-listed columns.
    pub fn new(page: u64, limit: u64, order_by: &str) -> Result<Self, DomainError> {
        if page == 0 {
            return Err(DomainError::invalid("page is 1-based"));
        }

        Ok(Self {
            page,
            limit: limit.min(MAX_WINDOW),
            order_by: parse_order_by(order_by)?,
        })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    /// `0` means no limit. Larger values than any store could hold are clamped.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit).min(MAX_WINDOW)
    }

    pub fn order_by(&self) -> &[SortKey] {
        &self.order_by
    }
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 0,
            order_by: Vec::new(),
        }
    }
}

fn parse_order_by(value: &str) -> Result<Vec<SortKey>, DomainError> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }

    value
        .split(',')
        .map(|term| {
            let mut parts = term.split_whitespace();
            let column = parts
                .next()
                .ok_or_else(|| DomainError::invalid("empty order_by term"))?;
            let field = SortField::from_str(column)
                .ok_or_else(|| DomainError::invalid(format!("cannot order by {column}")))?;
            let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => SortDirection::Asc,
                Some("desc") => SortDirection::Desc,
                Some(other) => {
                    return Err(DomainError::invalid(format!("unknown sort direction {other}")));
                }
            };
            if parts.next().is_some() {
                return Err(DomainError::invalid(format!("malformed order_by term {term}")));
            }
            Ok(SortKey { field, direction })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_order_by_means_store_order() {
        let filter = ListFilter::new(1, 10, "  ").unwrap();
        assert!(filter.order_by().is_empty());
    }

    #[test]
    fn parses_multiple_terms_with_directions() {
        let filter = ListFilter::new(1, 0, "created_at DESC, username").unwrap();
        assert_eq!(
            filter.order_by(),
            &[
                SortKey {
                    field: SortField::CreatedAt,
                    direction: SortDirection::Desc,
                },
                SortKey {
                    field: SortField::Username,
                    direction: SortDirection::Asc,
                },
            ]
        );
    }

    #[test]
    fn rejects_columns_outside_the_allow_list() {
        for order_by in [
            "password",
            "id; DROP TABLE users",
            "username desc nulls",
            "username sideways",
            "username,",
        ] {
            let err = ListFilter::new(1, 10, order_by).unwrap_err();
            assert!(matches!(err, DomainError::InvalidArgument(_)), "{order_by}");
        }
    }

    #[test]
    fn offset_is_derived_from_page_and_limit() {
        assert_eq!(ListFilter::new(1, 10, "").unwrap().offset(), 0);
        assert_eq!(ListFilter::new(3, 10, "").unwrap().offset(), 20);
        assert_eq!(ListFilter::new(5, 0, "").unwrap().offset(), 0);
    }

    #[test]
    fn huge_paging_stays_within_sql_bounds() {
        let filter = ListFilter::new(3, 1 << 62, "").unwrap();
        assert_eq!(filter.limit(), 1 << 62);
        assert_eq!(filter.offset(), i64::MAX as u64);

        let filter = ListFilter::new(u64::MAX, u64::MAX, "").unwrap();
        assert_eq!(filter.limit(), i64::MAX as u64);
        assert_eq!(filter.offset(), i64::MAX as u64);
    }

    #[test]
    fn page_zero_is_rejected() {
        assert!(matches!(
            ListFilter::new(0, 10, ""),
            Err(DomainError::InvalidArgument(_))
        ));
    }
}
