//! Client for the external update-checking service
//!
//! The service that polls plugin repositories lives outside this provider.
//! It is reached through NATS request/reply on `updates.service.*` and pushes
//! status snapshots on `updates.service.status`, which are cached locally so
//! that [`UpdateService::status`] never blocks.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use update_notification_common::subjects::{self, ServiceOperation};
use update_notification_common::{
    CheckOneRequest, CheckSettings, ServiceReply, SourceRegistration, UpdateStatus,
};

use crate::error::{ServiceError, UpdateManagerError};

#[cfg(test)]
use mockall::automock;

/// Operations offered by the update-checking service
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UpdateService: Send + Sync {
    async fn register_source(&self, registration: SourceRegistration) -> Result<(), ServiceError>;
    async fn configure(&self, settings: CheckSettings) -> Result<(), ServiceError>;
    async fn check_all(&self) -> Result<(), ServiceError>;
    async fn check_one(&self, entity_id: &str) -> Result<(), ServiceError>;
    /// Last known status snapshot; never triggers a check
    fn status(&self) -> UpdateStatus;
    async fn stop(&self) -> Result<(), ServiceError>;
}

/// [`UpdateService`] over NATS request/reply
pub struct NatsUpdateService {
    client: async_nats::Client,
    request_timeout: Duration,
    status: Arc<RwLock<UpdateStatus>>,
}

impl NatsUpdateService {
    pub fn new(client: async_nats::Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
            status: Arc::new(RwLock::new(UpdateStatus::default())),
        }
    }

    /// Keep the cached snapshot current from `updates.service.status`
    pub async fn watch_status(&self) -> Result<JoinHandle<()>, UpdateManagerError> {
        let mut subscriber = self
            .client
            .subscribe(subjects::SERVICE_STATUS.to_string())
            .await
            .map_err(|e| UpdateManagerError::NatsSubscribe(e.to_string()))?;

        info!(subject = subjects::SERVICE_STATUS, "Watching update service status");

        let status = self.status.clone();
        Ok(tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                match serde_json::from_slice::<UpdateStatus>(&message.payload) {
                    Ok(snapshot) => {
                        debug!(
                            total = snapshot.total_entities,
                            updates_available = snapshot.updates_available,
                            "Update service status received"
                        );
                        *status.write() = snapshot;
                    }
                    Err(e) => warn!("Ignoring malformed status snapshot: {}", e),
                }
            }
            debug!("Update service status subscription closed");
        }))
    }

    async fn call<T: Serialize + ?Sized>(
        &self,
        operation: ServiceOperation,
        body: &T,
    ) -> Result<(), ServiceError> {
        let subject = subjects::service(operation);
        let payload = serde_json::to_vec(body)?;
        let timeout_ms = self.request_timeout.as_millis() as u64;

        let response = tokio::time::timeout(
            self.request_timeout,
            self.client.request(subject.clone(), payload.into()),
        )
        .await
        .map_err(|_| ServiceError::Timeout { timeout_ms })?
        .map_err(|e| match e.kind() {
            async_nats::RequestErrorKind::TimedOut => ServiceError::Timeout { timeout_ms },
            async_nats::RequestErrorKind::NoResponders => {
                ServiceError::Unavailable(format!("no responders on {}", subject))
            }
            _ => ServiceError::Unavailable(e.to_string()),
        })?;

        parse_reply(&response.payload)
    }
}

fn parse_reply(payload: &[u8]) -> Result<(), ServiceError> {
    let reply: ServiceReply = serde_json::from_slice(payload)?;
    if reply.ok {
        Ok(())
    } else {
        Err(ServiceError::Rejected(
            reply
                .error
                .unwrap_or_else(|| "request rejected".to_string()),
        ))
    }
}

#[async_trait]
impl UpdateService for NatsUpdateService {
    async fn register_source(&self, registration: SourceRegistration) -> Result<(), ServiceError> {
        info!(
            name = %registration.name,
            version = %registration.version,
            "Registering with update service"
        );
        self.call(ServiceOperation::Register, &registration).await
    }

    async fn configure(&self, settings: CheckSettings) -> Result<(), ServiceError> {
        self.call(ServiceOperation::Configure, &settings).await
    }

    async fn check_all(&self) -> Result<(), ServiceError> {
        self.call(ServiceOperation::CheckAll, &serde_json::json!({}))
            .await
    }

    async fn check_one(&self, entity_id: &str) -> Result<(), ServiceError> {
        let request = CheckOneRequest {
            entity_id: entity_id.to_string(),
        };
        self.call(ServiceOperation::CheckOne, &request).await
    }

    fn status(&self) -> UpdateStatus {
        self.status.read().clone()
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.call(ServiceOperation::Stop, &serde_json::json!({}))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_ok() {
        assert!(parse_reply(br#"{"ok":true}"#).is_ok());
    }

    #[test]
    fn test_parse_reply_rejected_keeps_message() {
        let err = parse_reply(br#"{"ok":false,"error":"GitHub rate limit"}"#).unwrap_err();
        assert_eq!(err.to_string(), "GitHub rate limit");

        let err = parse_reply(br#"{"ok":false}"#).unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(_)));
    }

    #[test]
    fn test_parse_reply_malformed() {
        let err = parse_reply(b"not json").unwrap_err();
        assert!(matches!(err, ServiceError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_mock_status_is_synchronous() {
        let mut service = MockUpdateService::new();
        service.expect_status().returning(|| UpdateStatus {
            total_entities: 2,
            ..UpdateStatus::default()
        });
        service.expect_check_all().never();

        assert_eq!(service.status().total_entities, 2);
    }
}
