//! Read/trigger surface used by chat commands and other in-process callers

use std::sync::Arc;
use tracing::info;
use update_notification_common::{UpdateEvent, UpdateStatus};

use crate::engine::UpdateEngine;
use crate::update_service::UpdateService;
use crate::Result;

#[derive(Clone)]
pub struct UpdateFacade {
    engine: UpdateEngine,
    service: Arc<dyn UpdateService>,
}

impl UpdateFacade {
    pub fn new(engine: UpdateEngine, service: Arc<dyn UpdateService>) -> Self {
        Self { engine, service }
    }

    /// Current status snapshot, without triggering a check
    pub fn get_status(&self) -> UpdateStatus {
        self.service.status()
    }

    pub async fn trigger_check_all(&self) -> Result<()> {
        info!("Manual update check requested");
        self.service.check_all().await?;
        Ok(())
    }

    /// Check a single plugin; the service decides whether the name is known
    pub async fn trigger_check_one(&self, entity_id: &str) -> Result<()> {
        info!(entity_id, "Manual plugin check requested");
        self.service.check_one(entity_id).await?;
        Ok(())
    }

    /// Every recorded update, oldest first
    pub async fn list_pending(&self) -> Result<Vec<UpdateEvent>> {
        self.engine.pending_updates().await
    }

    /// Post the current status snapshot to the notification channel
    pub async fn announce_status(&self) -> Result<()> {
        self.engine.announce_status(self.service.status()).await
    }

    /// Post the pending-updates list to the notification channel
    pub async fn announce_pending(&self) -> Result<usize> {
        self.engine.announce_pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;
    use crate::error::{ServiceError, UpdateManagerError};
    use crate::formatter::FormatContext;
    use crate::update_service::MockUpdateService;
    use update_notification_common::{EntityStatus, MemorySink, MessageKind};

    fn snapshot() -> UpdateStatus {
        UpdateStatus {
            total_entities: 1,
            updates_available: 0,
            last_check: None,
            entities: vec![EntityStatus {
                name: "AutoTK".to_string(),
                current_version: "v1.0.0".to_string(),
                latest_version: None,
                needs_update: false,
                error: None,
            }],
        }
    }

    fn facade(service: MockUpdateService) -> UpdateFacade {
        let (engine, _task) =
            UpdateEngine::spawn(EngineSettings::default(), Arc::new(MemorySink::new()));
        UpdateFacade::new(engine, Arc::new(service))
    }

    #[tokio::test]
    async fn test_get_status_does_not_check() {
        let mut service = MockUpdateService::new();
        service.expect_status().times(1).returning(snapshot);
        service.expect_check_all().never();
        service.expect_check_one().never();

        let status = facade(service).get_status();
        assert_eq!(status.total_entities, 1);
    }

    #[tokio::test]
    async fn test_check_one_unknown_plugin_error_comes_from_service() {
        let mut service = MockUpdateService::new();
        service.expect_status().never();
        service
            .expect_check_one()
            .withf(|entity_id| entity_id == "Missing")
            .times(1)
            .returning(|entity_id| Err(ServiceError::UnknownEntity(entity_id.to_string())));

        let err = facade(service).trigger_check_one("Missing").await.unwrap_err();
        assert!(matches!(
            err,
            UpdateManagerError::Service(ServiceError::UnknownEntity(_))
        ));
    }

    #[tokio::test]
    async fn test_check_one_reaches_service_for_plugin_missing_from_snapshot() {
        let mut service = MockUpdateService::new();
        service.expect_status().returning(snapshot);
        service
            .expect_check_one()
            .withf(|entity_id| entity_id == "SeedingMode")
            .times(1)
            .returning(|_| Ok(()));

        facade(service).trigger_check_one("SeedingMode").await.unwrap();
    }

    #[tokio::test]
    async fn test_announce_status_posts_report_without_mention() {
        let mut service = MockUpdateService::new();
        service.expect_status().times(1).returning(snapshot);

        let sink = Arc::new(MemorySink::new());
        let settings = EngineSettings {
            format: FormatContext {
                mention_prefix: Some("<@&42>".to_string()),
                ..Default::default()
            },
            ..EngineSettings::default()
        };
        let (engine, _task) = UpdateEngine::spawn(settings, sink.clone());

        UpdateFacade::new(engine, Arc::new(service))
            .announce_status()
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let reports = sink.messages_of(MessageKind::StatusReport);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].mention_prefix, None);
    }

    #[tokio::test]
    async fn test_check_one_forwards_known_plugin() {
        let mut service = MockUpdateService::new();
        service.expect_status().returning(snapshot);
        service
            .expect_check_one()
            .withf(|entity_id| entity_id == "AutoTK")
            .times(1)
            .returning(|_| Ok(()));

        facade(service).trigger_check_one("AutoTK").await.unwrap();
    }

    #[tokio::test]
    async fn test_check_all_error_propagates() {
        let mut service = MockUpdateService::new();
        service
            .expect_check_all()
            .returning(|| Err(ServiceError::Rejected("rate limited".to_string())));

        let err = facade(service).trigger_check_all().await.unwrap_err();
        assert_eq!(err.to_string(), "Update service error: rate limited");
    }
}
