use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use update_notification_common::{CheckSettings, LogSink, NotificationSink, SourceRegistration};
use wasmcloud_provider_sdk::Provider;

use crate::bot_commands::CommandHandler;
use crate::config::{UpdateManagerConfig, INITIAL_CHECK_DELAY_MS, STAGGER_DELAY_MS};
use crate::discord_client::DiscordWebhookClient;
use crate::engine::{EngineSettings, UpdateEngine};
use crate::error::UpdateManagerError;
use crate::facade::UpdateFacade;
use crate::nats_handler::{EventSubscription, NatsHandler};
use crate::update_service::{NatsUpdateService, UpdateService};
use crate::Result;

/// Update Manager Provider (wasmCloud capability provider)
#[derive(Clone)]
pub struct UpdateManagerProvider {
    config: UpdateManagerConfig,
    nats_client: async_nats::Client,
    engine: UpdateEngine,
    service: Arc<dyn UpdateService>,
    facade: UpdateFacade,
    engine_task: Arc<RwLock<Option<JoinHandle<()>>>>,
    status_task: Arc<RwLock<Option<JoinHandle<()>>>>,
    subscriptions: Arc<RwLock<Vec<EventSubscription>>>,
}

impl UpdateManagerProvider {
    /// Connect to NATS and build the provider from configuration
    pub async fn from_config(config: UpdateManagerConfig) -> Result<Self> {
        info!("Initializing Update Manager Provider");

        let nats_client = async_nats::connect(config.nats_url.as_str())
            .await
            .map_err(|e| UpdateManagerError::NatsConnection(e.to_string()))?;
        info!("Connected to NATS at {}", config.nats_url);

        let sink: Arc<dyn NotificationSink> = match &config.discord_webhook_url {
            Some(url) => Arc::new(DiscordWebhookClient::new(url.as_str())?),
            None => {
                warn!("No Discord webhook configured, notifications will only be logged");
                Arc::new(LogSink)
            }
        };

        let service = NatsUpdateService::new(nats_client.clone(), config.service_request_timeout());
        let status_task = service.watch_status().await?;

        let provider = Self::new(config, nats_client, Arc::new(service), sink);
        *provider.status_task.write().await = Some(status_task);
        Ok(provider)
    }

    /// Assemble the provider from already-built parts
    pub fn new(
        config: UpdateManagerConfig,
        nats_client: async_nats::Client,
        service: Arc<dyn UpdateService>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (engine, engine_task) = UpdateEngine::spawn(EngineSettings::from_config(&config), sink);
        let facade = UpdateFacade::new(engine.clone(), service.clone());

        Self {
            config,
            nats_client,
            engine,
            service,
            facade,
            engine_task: Arc::new(RwLock::new(Some(engine_task))),
            status_task: Arc::new(RwLock::new(None)),
            subscriptions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn facade(&self) -> &UpdateFacade {
        &self.facade
    }

    pub fn engine(&self) -> &UpdateEngine {
        &self.engine
    }

    /// Configure the update service, register this provider and subscribe to events
    pub async fn start(&self) -> Result<()> {
        self.configure_service().await;
        self.register_self().await;

        let commands = Arc::new(CommandHandler::new(
            self.facade.clone(),
            self.config.command_reply_max_len,
        ));
        let handler = NatsHandler::new(self.nats_client.clone(), self.engine.clone(), commands);
        let subscriptions = handler
            .subscribe_all()
            .await
            .map_err(|e| UpdateManagerError::NatsSubscribe(format!("{:#}", e)))?;

        info!(
            count = subscriptions.len(),
            "Update Manager Provider started"
        );
        *self.subscriptions.write().await = subscriptions;
        Ok(())
    }

    async fn configure_service(&self) {
        let settings = CheckSettings {
            enabled: self.config.enable_update_notifications,
            check_interval_ms: self.config.check_interval().as_millis() as u64,
            initial_delay_ms: INITIAL_CHECK_DELAY_MS,
            batch_delay_ms: self.config.batch_delay_ms,
            stagger_delay_ms: STAGGER_DELAY_MS,
        };

        match self.service.configure(settings).await {
            Ok(()) => info!(
                interval = %self.config.update_check_interval,
                "Update service configured"
            ),
            Err(e) => warn!("Failed to configure update service: {}", e),
        }
    }

    async fn register_self(&self) {
        if !self.config.validate_repository() {
            warn!("Self-update checks disabled until repository_owner and repository_name are set");
            return;
        }

        let (Some(owner), Some(name)) = (
            self.config.repository_owner.clone(),
            self.config.repository_name.clone(),
        ) else {
            return;
        };

        let registration = SourceRegistration {
            name: self.config.source_name.clone(),
            version: self.config.source_version.clone(),
            repository_owner: owner,
            repository_name: name,
        };

        if let Err(e) = self.service.register_source(registration).await {
            warn!("Failed to register with update service: {}", e);
        }
    }

    /// Release subscriptions, stop the update service and cancel every timer
    pub async fn stop(&self) {
        info!("Stopping Update Manager Provider");

        self.subscriptions.write().await.clear();

        if let Some(task) = self.status_task.write().await.take() {
            task.abort();
        }

        if let Err(e) = self.service.stop().await {
            warn!("Failed to stop update service: {}", e);
        }

        if let Err(e) = self.engine.shutdown().await {
            warn!("Engine shutdown: {}", e);
        }
        if let Some(task) = self.engine_task.write().await.take() {
            if let Err(e) = task.await {
                error!("Engine task failed: {}", e);
            }
        }
    }
}

// Provider trait implementation for wasmCloud SDK v0.16
impl Provider for UpdateManagerProvider {
    fn shutdown(&self) -> impl std::future::Future<Output = anyhow::Result<()>> + Send {
        async move {
            self.stop().await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_traits() {
        fn assert_provider<T: Provider + Clone>() {}
        assert_provider::<UpdateManagerProvider>();
    }
}
