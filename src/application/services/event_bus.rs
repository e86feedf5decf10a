use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A message as delivered by the broker.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// What the broker should do with a message whose callback failed.
#[derive(Debug, Error)]
pub enum ConsumeError {
    /// Leave the message unacknowledged so the broker delivers it again.
    #[error("message left for redelivery: {0}")]
    Redeliver(#[source] anyhow::Error),
    /// Stop the receive loop.
    #[error("consumer halted: {0}")]
    Fatal(#[source] anyhow::Error),
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &InboundMessage) -> Result<(), ConsumeError>;
}

/// Subscription descriptor: where to read, as which group, and who processes each message.
#[derive(Clone)]
pub struct ConsumerConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub group_id: String,
    pub handler: Arc<dyn MessageHandler>,
}

#[async_trait]
pub trait BrokerConsumer: Send + Sync {
    async fn register_consumer(&self, config: ConsumerConfig);

    /// Receives messages for every registered subscription until [`BrokerConsumer::close`] is
    /// called or a callback returns [`ConsumeError::Fatal`].
    async fn run(&self) -> anyhow::Result<()>;

    /// Stops delivering new messages. A message already being handled is finished first.
    async fn close(&self);
}

/// How [`DeadLetter::payload`] holds the original bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    Utf8,
    Base64,
}

/// A message the consumer gave up on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub topic: String,
    pub reason: String,
    pub attempts: u32,
    pub encoding: PayloadEncoding,
    pub payload: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    /// Keeps the payload as text when it is valid UTF-8, base64 otherwise.
    pub fn new(message: &InboundMessage, reason: impl Into<String>, attempts: u32) -> Self {
        let (encoding, payload) = match std::str::from_utf8(&message.payload) {
            Ok(text) => (PayloadEncoding::Utf8, text.to_string()),
            Err(_) => (PayloadEncoding::Base64, STANDARD.encode(&message.payload)),
        };

        Self {
            topic: message.topic.clone(),
            reason: reason.into(),
            attempts,
            encoding,
            payload,
            failed_at: Utc::now(),
        }
    }

    /// The bytes as they were delivered.
    pub fn original_payload(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match self.encoding {
            PayloadEncoding::Utf8 => Ok(self.payload.clone().into_bytes()),
            PayloadEncoding::Base64 => STANDARD.decode(&self.payload),
        }
    }
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish(&self, letter: DeadLetter) -> anyhow::Result<()>;
}
