//! Delivery sink interface
//!
//! The update manager never talks to a transport directly. It hands finished
//! [`NotificationMessage`]s to a sink; failures are reported back but never
//! retried.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::types::{MessageKind, NotificationMessage};

/// Destination for structured notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Deliver one message
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError>;
}

/// Delivery error types
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Sink rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Delivery timed out")]
    Timeout,
}

impl DeliveryError {
    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            DeliveryError::Rejected { .. } => "REJECTED",
            DeliveryError::Network(_) => "NETWORK",
            DeliveryError::Timeout => "TIMEOUT",
        }
    }
}

/// Sink used when no transport is configured: messages are only logged
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        info!(
            kind = %message.kind,
            message_id = %message.id,
            title = %message.title,
            "No notification channel configured, message not sent"
        );
        Ok(())
    }
}

/// In-memory sink that keeps every delivered message, for dry runs and tests
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<NotificationMessage>>>,
    fail_deliveries: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records every attempt but reports each one as rejected
    pub fn failing() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            fail_deliveries: true,
        }
    }

    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.messages.lock().clone()
    }

    pub fn messages_of(&self, kind: MessageKind) -> Vec<NotificationMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|message| message.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        self.messages.lock().push(message.clone());
        if self.fail_deliveries {
            return Err(DeliveryError::Rejected {
                status: 500,
                body: "memory sink configured to fail".to_string(),
            });
        }
        Ok(())
    }
}
