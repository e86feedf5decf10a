use std::env::var;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

use crate::{
    application::handlers::user_consumer::{MalformedMessagePolicy, UserConsumerConfig},
    infrastructure::messaging::jetstream::JetstreamConfig,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
    #[error(
        "consumer retries may take {budget:?}, longer than BROKER_ACK_WAIT ({ack_wait:?}); \
         the broker would redeliver a message still being retried"
    )]
    RetryOutlastsAckWait { budget: Duration, ack_wait: Duration },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app: String,
    pub environment: String,
    /// `LOG_LEVEL`; when unset `RUST_LOG` is used instead.
    pub log_level: Option<String>,
    pub rpc: RpcConfig,
    /// Upper bound for every use-case operation.
    pub context_timeout: Duration,
    pub database: DatabaseConfig,
    pub broker: BrokerConfig,
    pub consumer: ConsumerSettings,
}

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
}

impl RpcConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub ssl_mode: PgSslMode,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(self.ssl_mode)
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub addresses: Vec<String>,
    pub user_topic: String,
    pub group_id: String,
    pub dead_letter_topic: String,
    pub jetstream: JetstreamConfig,
}

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub message_timeout: Duration,
    pub malformed_policy: MalformedMessagePolicy,
}

impl Config {
    /// Reads the process environment after loading `.env`, if there is one.
    pub fn from_env() -> Result<Config, ConfigError> {
        let _ = dotenv();
        Self::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str, default: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let parse = |key: &'static str, default: &str| Setting {
            key,
            value: get(key, default),
        };

        let user_topic = get("BROKER_TOPIC_USER_SERVICE", "user.service.create");
        let dead_letter_topic = get("BROKER_DEAD_LETTER_TOPIC", &format!("{user_topic}.dlq"));

        let addresses = get("BROKER_ADDRESS", "nats://localhost:4222")
            .split(',')
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if addresses.is_empty() {
            return Err(ConfigError::Invalid {
                key: "BROKER_ADDRESS",
                value: String::new(),
            });
        }

        let ssl_mode = parse("POSTGRES_SSLMODE", "disable");
        let policy = parse("CONSUMER_MALFORMED_POLICY", MalformedMessagePolicy::DeadLetter.as_str());

        let config = Config {
            app: get("APP", "user-service"),
            environment: get("ENVIRONMENT", "develop"),
            log_level: lookup("LOG_LEVEL")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            rpc: RpcConfig {
                host: get("RPC_HOST", "0.0.0.0"),
                port: parse("RPC_PORT", "9090").number()?,
            },
            context_timeout: parse("CONTEXT_TIMEOUT", "30s").duration()?,
            database: DatabaseConfig {
                host: get("POSTGRES_HOST", "localhost"),
                port: parse("POSTGRES_PORT", "5432").number()?,
                database: get("POSTGRES_DATABASE", "users"),
                user: get("POSTGRES_USER", "postgres"),
                password: get("POSTGRES_PASSWORD", "postgres"),
                ssl_mode: PgSslMode::from_str(&ssl_mode.value)
                    .map_err(|_| ssl_mode.invalid())?,
                max_connections: parse("POSTGRES_MAX_CONNECTIONS", "10").positive()?,
            },
            broker: BrokerConfig {
                addresses,
                user_topic,
                group_id: get("BROKER_GROUP_ID", "user-service"),
                dead_letter_topic,
                jetstream: JetstreamConfig {
                    ack_wait: parse("BROKER_ACK_WAIT", "30s").duration()?,
                    max_deliver: parse("BROKER_MAX_DELIVER", "-1").number()?,
                },
            },
            consumer: ConsumerSettings {
                max_attempts: parse("CONSUMER_MAX_ATTEMPTS", "3").positive()?,
                retry_backoff: parse("CONSUMER_RETRY_BACKOFF", "500ms").duration()?,
                message_timeout: parse("CONSUMER_MESSAGE_TIMEOUT", "7s").duration()?,
                malformed_policy: MalformedMessagePolicy::from_str(&policy.value)
                    .ok_or_else(|| policy.invalid())?,
            },
        };
        config.check_retry_budget()?;
        Ok(config)
    }

    /// Longest a single message can spend in the consumer's retry loop.
    pub fn retry_budget(&self) -> Option<Duration> {
        let attempts = self.consumer.max_attempts;
        let timeouts = self.consumer.message_timeout.checked_mul(attempts)?;
        let backoffs = self
            .consumer
            .retry_backoff
            .checked_mul(attempts.saturating_sub(1))?;
        timeouts.checked_add(backoffs)
    }

    fn check_retry_budget(&self) -> Result<(), ConfigError> {
        let ack_wait = self.broker.jetstream.ack_wait;
        match self.retry_budget() {
            Some(budget) if budget < ack_wait => Ok(()),
            budget => Err(ConfigError::RetryOutlastsAckWait {
                budget: budget.unwrap_or(Duration::MAX),
                ack_wait,
            }),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn user_consumer_config(&self) -> UserConsumerConfig {
        UserConsumerConfig {
            brokers: self.broker.addresses.clone(),
            topic: self.broker.user_topic.clone(),
            group_id: self.broker.group_id.clone(),
            max_attempts: self.consumer.max_attempts,
            retry_backoff: self.consumer.retry_backoff,
            message_timeout: self.consumer.message_timeout,
            malformed_policy: self.consumer.malformed_policy,
        }
    }
}

struct Setting {
    key: &'static str,
    value: String,
}

impl Setting {
    fn invalid(&self) -> ConfigError {
        ConfigError::Invalid {
            key: self.key,
            value: self.value.clone(),
        }
    }

    fn number<T: FromStr>(&self) -> Result<T, ConfigError> {
        self.value.parse().map_err(|_| self.invalid())
    }

    fn positive(&self) -> Result<u32, ConfigError> {
        match self.number::<u32>()? {
            0 => Err(self.invalid()),
            value => Ok(value),
        }
    }

    fn duration(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.value).ok_or_else(|| self.invalid())
    }
}

/// Parses `500ms`, `7s`, `5m` or `1h`. A unit is required.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value.find(|c: char| !c.is_ascii_digit())?;
    let (amount, unit) = value.split_at(split);
    let amount = amount.parse::<u64>().ok()?;

    match unit {
        "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => amount.checked_mul(60).map(Duration::from_secs),
        "h" => amount.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}
