use std::sync::Arc;
use std::time::Duration;

use async_nats::{
    ServerAddr,
    jetstream::{
        self, AckKind,
        consumer::{AckPolicy, PullConsumer, pull},
    },
};
use async_trait::async_trait;
use tokio::{sync::Mutex, task::JoinSet};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::services::event_bus::{
    BrokerConsumer, ConsumeError, ConsumerConfig, DeadLetter, DeadLetterSink, InboundMessage,
    MessageHandler,
};

#[derive(Clone, Debug)]
pub struct JetstreamConfig {
    pub ack_wait: Duration,
    /// `-1` lets the server redeliver without limit.
    pub max_deliver: i64,
}

impl Default for JetstreamConfig {
    fn default() -> Self {
        Self {
            ack_wait: Duration::from_secs(30),
            max_deliver: -1,
        }
    }
}

pub async fn connect(brokers: &[String]) -> anyhow::Result<async_nats::Client> {
    let servers = brokers
        .iter()
        .map(|address| address.parse::<ServerAddr>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(async_nats::connect(servers.as_slice()).await?)
}

/// JetStream stream names may not contain `.`, `*`, `>` or whitespace.
pub fn stream_name(subject: &str) -> String {
    subject
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Broker consumer backed by durable JetStream pull consumers, one per registration.
pub struct JetstreamConsumer {
    config: JetstreamConfig,
    subscriptions: Mutex<Vec<ConsumerConfig>>,
    shutdown: CancellationToken,
}

impl JetstreamConsumer {
    pub fn new(config: JetstreamConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            subscriptions: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl BrokerConsumer for JetstreamConsumer {
    async fn register_consumer(&self, config: ConsumerConfig) {
        self.subscriptions.lock().await.push(config);
    }

    async fn run(&self) -> anyhow::Result<()> {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock().await);
        if subscriptions.is_empty() {
            anyhow::bail!("no consumer registered");
        }

        let mut workers = JoinSet::new();
        for subscription in subscriptions {
            let worker = JetstreamWorker::connect(&subscription, &self.config).await?;
            workers.spawn(worker.run(subscription.handler, self.shutdown.clone()));
        }

        let mut outcome = Ok(());
        while let Some(joined) = workers.join_next().await {
            let result = joined.map_err(anyhow::Error::from).and_then(|result| result);
            if let Err(err) = result {
                error!(error = %err, "jetstream worker stopped");
                self.shutdown.cancel();
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }
        outcome
    }

    async fn close(&self) {
        self.shutdown.cancel();
    }
}

struct JetstreamWorker {
    consumer: PullConsumer,
    topic: String,
}

impl JetstreamWorker {
    async fn connect(
        subscription: &ConsumerConfig,
        config: &JetstreamConfig,
    ) -> anyhow::Result<Self> {
        let client = connect(&subscription.brokers).await?;
        let context = jetstream::new(client);

        let stream = context
            .get_or_create_stream(jetstream::stream::Config {
                name: stream_name(&subscription.topic),
                subjects: vec![subscription.topic.clone()],
                ..Default::default()
            })
            .await?;

        let consumer = stream
            .get_or_create_consumer(
                &subscription.group_id,
                pull::Config {
                    durable_name: Some(subscription.group_id.clone()),
                    filter_subject: subscription.topic.clone(),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: config.ack_wait,
                    max_deliver: config.max_deliver,
                    ..Default::default()
                },
            )
            .await?;

        Ok(Self {
            consumer,
            topic: subscription.topic.clone(),
        })
    }

    async fn run(
        self,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        let mut messages = self.consumer.messages().await?;
        info!(topic = %self.topic, "jetstream worker receiving");

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = messages.next() => next,
            };
            let Some(next) = next else {
                break;
            };

            let message = match next {
                Ok(message) => message,
                Err(err) => {
                    warn!(topic = %self.topic, error = %err, "jetstream delivery error");
                    continue;
                }
            };

            let inbound = InboundMessage {
                topic: message.subject.to_string(),
                payload: message.payload.to_vec(),
            };

            match handler.handle(&inbound).await {
                Ok(()) => {
                    if let Err(err) = message.ack().await {
                        warn!(error = %err, "failed to ack message");
                    }
                }
                Err(ConsumeError::Redeliver(err)) => {
                    warn!(error = %err, "message left for redelivery");
                    if let Err(err) = message.ack_with(AckKind::Nak(None)).await {
                        warn!(error = %err, "failed to nak message");
                    }
                }
                Err(ConsumeError::Fatal(err)) => {
                    if let Err(err) = message.ack_with(AckKind::Nak(None)).await {
                        warn!(error = %err, "failed to nak message");
                    }
                    return Err(err.context(format!("consumer on {} halted", self.topic)));
                }
            }
        }

        info!(topic = %self.topic, "jetstream worker stopped");
        Ok(())
    }
}

/// Publishes dead letters as JSON onto their own subject and stream.
pub struct JetstreamDeadLetterSink {
    context: jetstream::Context,
    subject: String,
}

impl JetstreamDeadLetterSink {
    pub async fn new(client: async_nats::Client, subject: &str) -> anyhow::Result<Arc<Self>> {
        let context = jetstream::new(client);
        context
            .get_or_create_stream(jetstream::stream::Config {
                name: stream_name(subject),
                subjects: vec![subject.to_string()],
                ..Default::default()
            })
            .await?;

        Ok(Arc::new(Self {
            context,
            subject: subject.to_string(),
        }))
    }
}

#[async_trait]
impl DeadLetterSink for JetstreamDeadLetterSink {
    async fn publish(&self, letter: DeadLetter) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&letter)?;
        self.context
            .publish(self.subject.clone(), payload.into())
            .await?
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_names_are_derived_from_subjects() {
        assert_eq!(stream_name("user.service.create"), "USER_SERVICE_CREATE");
        assert_eq!(
            stream_name("user.service.create.dlq"),
            "USER_SERVICE_CREATE_DLQ"
        );
        assert_eq!(stream_name("users-v2 >"), "USERS_V2__");
    }

    #[tokio::test]
    async fn run_without_registration_is_an_error() {
        let consumer = JetstreamConsumer::new(JetstreamConfig::default());
        assert!(consumer.run().await.is_err());
    }
}
