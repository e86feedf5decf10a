use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::{
    application::{
        context::Context,
        services::event_bus::{
            BrokerConsumer, ConsumeError, ConsumerConfig, DeadLetter, DeadLetterSink,
            InboundMessage, MessageHandler,
        },
        usecases::user::UserService,
    },
    domain::{
        errors::DomainError,
        events::UserCreatedEvent,
        models::{NewUser, User},
    },
};

/// What happens to a message that does not decode into a [`UserCreatedEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedMessagePolicy {
    /// Forward it to the dead-letter sink and move on.
    DeadLetter,
    /// Log it and move on.
    Skip,
    /// Stop consuming.
    Abort,
}

impl MalformedMessagePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MalformedMessagePolicy::DeadLetter => "dead_letter",
            MalformedMessagePolicy::Skip => "skip",
            MalformedMessagePolicy::Abort => "abort",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "dead_letter" => Some(MalformedMessagePolicy::DeadLetter),
            "skip" => Some(MalformedMessagePolicy::Skip),
            "abort" => Some(MalformedMessagePolicy::Abort),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserConsumerConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub group_id: String,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub message_timeout: Duration,
    pub malformed_policy: MalformedMessagePolicy,
}

/// Feeds user-creation events into [`UserService::create`].
///
/// Each message is handled on its own: a bad payload or a failed create never stops the
/// subscription unless the malformed policy is [`MalformedMessagePolicy::Abort`]. Creates failing
/// with a transient error are retried, and whatever cannot be stored ends up in the dead-letter
/// sink. Only a failing dead-letter sink leaves the message for broker redelivery.
pub struct UserConsumerHandler {
    config: UserConsumerConfig,
    broker: Arc<dyn BrokerConsumer>,
    dead_letters: Arc<dyn DeadLetterSink>,
    users: Arc<UserService>,
}

impl UserConsumerHandler {
    pub fn new(
        config: UserConsumerConfig,
        broker: Arc<dyn BrokerConsumer>,
        dead_letters: Arc<dyn DeadLetterSink>,
        users: Arc<UserService>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            broker,
            dead_letters,
            users,
        })
    }

    /// Registers the subscription and blocks on the broker's receive loop.
    pub async fn handle_events(self: Arc<Self>) -> anyhow::Result<()> {
        let subscription = ConsumerConfig {
            brokers: self.config.brokers.clone(),
            topic: self.config.topic.clone(),
            group_id: self.config.group_id.clone(),
            handler: self.clone(),
        };

        self.broker.register_consumer(subscription).await;
        info!(
            topic = %self.config.topic,
            group_id = %self.config.group_id,
            policy = self.config.malformed_policy.as_str(),
            "user consumer registered"
        );

        self.broker.run().await
    }

    async fn create_with_retry(&self, request: NewUser) -> Result<User, (DomainError, u32)> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let ctx = Context::background().with_timeout(self.config.message_timeout);
            match self.users.create(&ctx, request.clone()).await {
                Ok(user) => return Ok(user),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %err, "create from event failed, retrying");
                    tokio::time::sleep(self.config.retry_backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err((err, attempt)),
            }
        }
    }

    async fn reject_malformed(
        &self,
        message: &InboundMessage,
        err: DomainError,
    ) -> Result<(), ConsumeError> {
        match self.config.malformed_policy {
            MalformedMessagePolicy::DeadLetter => {
                warn!(error = %err, "malformed user event, dead-lettering");
                self.dead_letter(message, err.to_string(), 0).await
            }
            MalformedMessagePolicy::Skip => {
                warn!(error = %err, "malformed user event, skipping");
                Ok(())
            }
            MalformedMessagePolicy::Abort => Err(ConsumeError::Fatal(err.into())),
        }
    }

    async fn dead_letter(
        &self,
        message: &InboundMessage,
        reason: String,
        attempts: u32,
    ) -> Result<(), ConsumeError> {
        self.dead_letters
            .publish(DeadLetter::new(message, reason, attempts))
            .await
            .map_err(ConsumeError::Redeliver)
    }
}

#[async_trait]
impl MessageHandler for UserConsumerHandler {
    #[instrument(skip_all, fields(topic = %message.topic))]
    async fn handle(&self, message: &InboundMessage) -> Result<(), ConsumeError> {
        let event = match UserCreatedEvent::decode(&message.payload) {
            Ok(event) => event,
            Err(err) => return self.reject_malformed(message, err).await,
        };

        match self.create_with_retry(event.into()).await {
            Ok(user) => {
                info!(user_id = %user.id, "user created from event");
                Ok(())
            }
            Err((err, attempts)) => {
                warn!(attempts, error = %err, "giving up on user event, dead-lettering");
                self.dead_letter(message, err.to_string(), attempts).await
            }
        }
    }
}
