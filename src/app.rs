use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, bail};
use poem::{EndpointExt, Route, Server, listener::TcpListener, middleware::Tracing};
use poem_openapi::OpenApiService;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::{error, info};

use crate::{
    application::{
        handlers::user_consumer::UserConsumerHandler, services::event_bus::BrokerConsumer,
        usecases::user::UserService,
    },
    config::Config,
    infrastructure::{
        messaging::jetstream::{self, JetstreamConsumer, JetstreamDeadLetterSink},
        repositories::postgres::{PgPool, PostgresUserRepository},
    },
    presentation::http::endpoints::{
        health::HealthEndpoints,
        root::ApiState,
        users::UsersEndpoints,
    },
};

pub const USER_CREATE_CONSUMER: &str = "user_create_consumer";

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

async fn connect_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(config.database.connect_options())
        .await
        .context("could not connect to postgres")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("could not run migrations")?;

    info!(
        host = %config.database.host,
        database = %config.database.database,
        "connected to postgres"
    );
    Ok(pool)
}

fn user_service(config: &Config, pool: PgPool) -> Arc<UserService> {
    Arc::new(UserService::new(
        PostgresUserRepository::new(pool),
        config.context_timeout,
    ))
}

/// Serves the user API until SIGINT or SIGTERM.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let pool = connect_database(config).await?;
    let state = Arc::new(ApiState {
        user_service: user_service(config, pool),
    });

    let address = config.rpc.address();
    let api_service = OpenApiService::new(
        (HealthEndpoints, UsersEndpoints::new(state)),
        "User Service API",
        env!("CARGO_PKG_VERSION"),
    )
    .server(format!("http://{address}/api"));
    let ui = api_service.swagger_ui();
    let app = Route::new()
        .nest("/api", api_service)
        .nest("/", ui)
        .with(Tracing);

    info!(app = %config.app, %address, "starting server");
    Server::new(TcpListener::bind(address))
        .run_with_graceful_shutdown(app, shutdown_signal(), Some(SHUTDOWN_GRACE))
        .await?;

    info!("server stopped");
    Ok(())
}

/// Runs the named consumer until a signal arrives or its receive loop halts.
pub async fn run_consumer(config: &Config, name: &str) -> anyhow::Result<()> {
    match name {
        USER_CREATE_CONSUMER => run_user_consumer(config).await,
        other => bail!("unknown consumer {other:?}, expected {USER_CREATE_CONSUMER:?}"),
    }
}

async fn run_user_consumer(config: &Config) -> anyhow::Result<()> {
    let pool = connect_database(config).await?;

    let client = jetstream::connect(&config.broker.addresses)
        .await
        .context("could not connect to the broker")?;
    let dead_letters =
        JetstreamDeadLetterSink::new(client, &config.broker.dead_letter_topic).await?;
    let broker = JetstreamConsumer::new(config.broker.jetstream.clone());

    let handler = UserConsumerHandler::new(
        config.user_consumer_config(),
        broker.clone(),
        dead_letters,
        user_service(config, pool),
    );
    let mut events = tokio::spawn(handler.handle_events());

    tokio::select! {
        joined = &mut events => return joined?,
        _ = shutdown_signal() => {}
    }

    info!("closing user consumer");
    broker.close().await;
    events.await?
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[tokio::test]
    async fn unknown_consumers_are_rejected_before_connecting() {
        let env = HashMap::<String, String>::new();
        let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();

        let err = run_consumer(&config, "user_delete_consumer")
            .await
            .unwrap_err();
        assert!(err.to_string().contains(USER_CREATE_CONSUMER));
    }
}
