//! Update notification engine
//!
//! A single background task owns the event store, the batch timer and the
//! reminder cycles. Callers talk to it through the cloneable [`UpdateEngine`]
//! handle; timers and finished deliveries post back through an internal
//! channel, so every state change happens on the engine task.
//!
//! Deliveries run on their own tasks. A slow or failing sink never stalls
//! event intake, and a failed delivery is only logged.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use update_notification_common::{
    EntityUpdatedEvent, NotificationMessage, NotificationSink, UpdateEvent, UpdateStatus,
};

use crate::batch_scheduler::BatchScheduler;
use crate::config::UpdateManagerConfig;
use crate::error::UpdateManagerError;
use crate::event_store::EventStore;
use crate::formatter::{self, FormatContext};
use crate::reminder_scheduler::{ReminderFiring, ReminderScheduler};
use crate::Result;

const COMMAND_BUFFER: usize = 256;

/// Reminder cycle parameters, present only when reminders are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub interval: Duration,
    pub max_reminders: u32,
}

/// Runtime settings of the engine, derived from [`UpdateManagerConfig`]
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub enable_update_notifications: bool,
    pub enable_restart_reminders: bool,
    pub batch_delay: Duration,
    pub reminders: Option<ReminderPolicy>,
    pub format: FormatContext,
}

impl EngineSettings {
    pub fn from_config(config: &UpdateManagerConfig) -> Self {
        let reminders = config.reminder_settings.enabled.then(|| ReminderPolicy {
            interval: config.reminder_interval(),
            max_reminders: config.reminder_settings.max_reminders,
        });

        Self {
            enable_update_notifications: config.enable_update_notifications,
            enable_restart_reminders: config.enable_restart_reminders,
            batch_delay: config.batch_delay(),
            reminders,
            format: FormatContext::from_config(config),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&UpdateManagerConfig::default())
    }
}

/// Result of a restart-required signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    Sent,
    /// The plugin's latest update was already announced
    Suppressed,
    Disabled,
}

/// Internal events posted to the engine task
#[derive(Debug)]
pub(crate) enum EngineEvent {
    BatchElapsed { generation: u64 },
    ReminderElapsed { entity_id: String, token: u64 },
    BatchDelivered { covered: Vec<UpdateEvent>, delivered: bool },
}

enum EngineCommand {
    RecordUpdate {
        update: EntityUpdatedEvent,
        reply: oneshot::Sender<Option<UpdateEvent>>,
    },
    RestartRequired {
        entity_id: String,
        reply: oneshot::Sender<RestartOutcome>,
    },
    SelfUpdateAvailable {
        latest_version: String,
        reply: oneshot::Sender<()>,
    },
    PendingUpdates {
        reply: oneshot::Sender<Vec<UpdateEvent>>,
    },
    UnnotifiedUpdates {
        reply: oneshot::Sender<Vec<UpdateEvent>>,
    },
    AnnouncePending {
        reply: oneshot::Sender<usize>,
    },
    AnnounceStatus {
        status: UpdateStatus,
        reply: oneshot::Sender<()>,
    },
    ReminderCount {
        entity_id: String,
        reply: oneshot::Sender<Option<u32>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the engine task
#[derive(Clone)]
pub struct UpdateEngine {
    commands: mpsc::Sender<EngineCommand>,
}

impl UpdateEngine {
    /// Start the engine task; it runs until [`UpdateEngine::shutdown`] or until
    /// every handle is dropped
    pub fn spawn(
        settings: EngineSettings,
        sink: Arc<dyn NotificationSink>,
    ) -> (Self, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        info!(
            sink = sink.name(),
            batch_delay_ms = settings.batch_delay.as_millis() as u64,
            reminders = settings.reminders.is_some(),
            "Starting update engine"
        );

        let runtime = EngineRuntime {
            store: EventStore::new(),
            batch: BatchScheduler::new(event_tx.clone()),
            reminders: ReminderScheduler::new(event_tx.clone()),
            events: event_tx,
            settings,
            sink,
        };
        let handle = tokio::spawn(runtime.run(command_rx, event_rx));

        (Self { commands: command_tx }, handle)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| UpdateManagerError::EngineStopped)?;
        response.await.map_err(|_| UpdateManagerError::EngineStopped)
    }

    /// Store an update and restart the batch window; `None` when notifications are disabled
    pub async fn record_update(&self, update: EntityUpdatedEvent) -> Result<Option<UpdateEvent>> {
        self.request(|reply| EngineCommand::RecordUpdate { update, reply })
            .await
    }

    pub async fn restart_required(&self, entity_id: &str) -> Result<RestartOutcome> {
        let entity_id = entity_id.to_string();
        self.request(|reply| EngineCommand::RestartRequired { entity_id, reply })
            .await
    }

    pub async fn self_update_available(&self, latest_version: &str) -> Result<()> {
        let latest_version = latest_version.to_string();
        self.request(|reply| EngineCommand::SelfUpdateAvailable {
            latest_version,
            reply,
        })
        .await
    }

    /// Every stored update, oldest first
    pub async fn pending_updates(&self) -> Result<Vec<UpdateEvent>> {
        self.request(|reply| EngineCommand::PendingUpdates { reply })
            .await
    }

    pub async fn unnotified_updates(&self) -> Result<Vec<UpdateEvent>> {
        self.request(|reply| EngineCommand::UnnotifiedUpdates { reply })
            .await
    }

    /// Send the pending-updates list; returns how many plugins it listed
    pub async fn announce_pending(&self) -> Result<usize> {
        self.request(|reply| EngineCommand::AnnouncePending { reply })
            .await
    }

    /// Send a status report built from the given snapshot
    pub async fn announce_status(&self, status: UpdateStatus) -> Result<()> {
        self.request(|reply| EngineCommand::AnnounceStatus { status, reply })
            .await
    }

    /// Reminders sent so far in the plugin's live cycle
    pub async fn reminder_count(&self, entity_id: &str) -> Result<Option<u32>> {
        let entity_id = entity_id.to_string();
        self.request(|reply| EngineCommand::ReminderCount { entity_id, reply })
            .await
    }

    /// Cancel all timers and stop the engine task
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Shutdown { reply }).await
    }
}

struct EngineRuntime {
    store: EventStore,
    batch: BatchScheduler,
    reminders: ReminderScheduler,
    events: mpsc::UnboundedSender<EngineEvent>,
    settings: EngineSettings,
    sink: Arc<dyn NotificationSink>,
}

impl EngineRuntime {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<EngineCommand>,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        self.teardown();
                        break;
                    }
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }

        info!("Update engine stopped");
    }

    /// Returns false once the engine should stop
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::RecordUpdate { update, reply } => {
                let _ = reply.send(self.record_update(update));
            }
            EngineCommand::RestartRequired { entity_id, reply } => {
                let _ = reply.send(self.restart_required(&entity_id));
            }
            EngineCommand::SelfUpdateAvailable {
                latest_version,
                reply,
            } => {
                self.self_update_available(&latest_version);
                let _ = reply.send(());
            }
            EngineCommand::PendingUpdates { reply } => {
                let _ = reply.send(self.sorted_pending());
            }
            EngineCommand::UnnotifiedUpdates { reply } => {
                let _ = reply.send(self.store.unnotified_updates());
            }
            EngineCommand::AnnouncePending { reply } => {
                let _ = reply.send(self.announce_pending());
            }
            EngineCommand::AnnounceStatus { status, reply } => {
                let message =
                    formatter::format_status_report(&self.settings.format, &status, Utc::now());
                self.deliver(message);
                let _ = reply.send(());
            }
            EngineCommand::ReminderCount { entity_id, reply } => {
                let _ = reply.send(self.reminders.fire_count(&entity_id));
            }
            EngineCommand::Shutdown { reply } => {
                self.teardown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::BatchElapsed { generation } => self.flush_batch(generation),
            EngineEvent::ReminderElapsed { entity_id, token } => {
                self.send_reminder(&entity_id, token)
            }
            EngineEvent::BatchDelivered { covered, delivered } => {
                let marked = self.store.mark_delivered(&covered);
                debug!(
                    covered = covered.len(),
                    marked, delivered, "Batch notification attempt finished"
                );
            }
        }
    }

    fn record_update(&mut self, update: EntityUpdatedEvent) -> Option<UpdateEvent> {
        if !self.settings.enable_update_notifications {
            debug!(entity_id = %update.entity_id, "Update notifications disabled, ignoring update");
            return None;
        }

        let event = self.store.record_update(
            &update.entity_id,
            &update.previous_version,
            &update.new_version,
            update.backup_path,
            Utc::now(),
        );

        self.batch.arm(self.settings.batch_delay);

        if let Some(policy) = self.settings.reminders {
            self.reminders
                .start(&event.entity_id, policy.interval, policy.max_reminders);
        }

        info!(
            entity_id = %event.entity_id,
            version = %event.version_change(),
            backup_created = event.backup_created,
            tracked = self.store.len(),
            active_reminders = self.reminders.active_count(),
            "Plugin update recorded"
        );
        Some(event)
    }

    fn flush_batch(&mut self, generation: u64) {
        if !self.batch.take_if_current(generation) {
            debug!(generation, "Ignoring stale batch timer");
            return;
        }

        let mut pending = self.store.unnotified_updates();
        if pending.is_empty() {
            return;
        }
        sort_by_occurrence(&mut pending);

        let now = Utc::now();
        let message = if pending.len() == 1 {
            formatter::format_single_update(&self.settings.format, &pending[0], now)
        } else {
            formatter::format_batch_update(&self.settings.format, &pending, now)
        };

        info!(count = pending.len(), kind = %message.kind, "Sending update notification");
        self.deliver_batch(message, pending);
    }

    fn restart_required(&mut self, entity_id: &str) -> RestartOutcome {
        if !self.settings.enable_restart_reminders {
            debug!(entity_id, "Restart reminders disabled, ignoring restart signal");
            return RestartOutcome::Disabled;
        }

        if self
            .store
            .get(entity_id)
            .map(|event| event.notified)
            .unwrap_or(false)
        {
            debug!(entity_id, "Update already announced, skipping restart notification");
            return RestartOutcome::Suppressed;
        }

        let message = formatter::format_restart_required(&self.settings.format, entity_id, Utc::now());
        self.deliver(message);
        RestartOutcome::Sent
    }

    fn send_reminder(&mut self, entity_id: &str, token: u64) {
        match self.reminders.on_elapsed(entity_id, token) {
            ReminderFiring::Send {
                fire_count,
                max_reminders,
                rearmed,
            } => {
                info!(
                    entity_id,
                    fire_count, max_reminders, rearmed, "Sending restart reminder"
                );
                let message = formatter::format_reminder(
                    &self.settings.format,
                    entity_id,
                    fire_count,
                    max_reminders,
                    Utc::now(),
                );
                self.deliver(message);
            }
            ReminderFiring::Exhausted => {}
            ReminderFiring::Stale => debug!(entity_id, token, "Ignoring stale reminder timer"),
        }
    }

    fn self_update_available(&mut self, latest_version: &str) {
        warn!(
            current_version = %self.settings.format.source_version,
            latest_version,
            "Update manager itself is outdated"
        );
        let message = formatter::format_self_update_available(
            &self.settings.format,
            latest_version,
            Utc::now(),
        );
        self.deliver(message);
    }

    fn sorted_pending(&self) -> Vec<UpdateEvent> {
        let mut pending = self.store.pending_updates();
        sort_by_occurrence(&mut pending);
        pending
    }

    fn announce_pending(&mut self) -> usize {
        if self.store.is_empty() {
            debug!("No pending updates to announce");
            return 0;
        }
        let pending = self.sorted_pending();

        let message = formatter::format_pending_updates(&self.settings.format, &pending, Utc::now());
        self.deliver(message);
        pending.len()
    }

    /// Fire-and-forget delivery; failures are logged only
    fn deliver(&self, message: NotificationMessage) {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.deliver(&message).await {
                error!(
                    kind = %message.kind,
                    error_code = e.error_code(),
                    "Failed to deliver notification: {}",
                    e
                );
            }
        });
    }

    /// Deliver a batch message, then report back which events it covered
    fn deliver_batch(&self, message: NotificationMessage, covered: Vec<UpdateEvent>) {
        let sink = self.sink.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let delivered = match sink.deliver(&message).await {
                Ok(()) => true,
                Err(e) => {
                    error!(
                        kind = %message.kind,
                        error_code = e.error_code(),
                        "Failed to deliver update notification: {}",
                        e
                    );
                    false
                }
            };
            let _ = events.send(EngineEvent::BatchDelivered { covered, delivered });
        });
    }

    fn teardown(&mut self) {
        let reminders = self.reminders.active_count();
        self.batch.cancel();
        self.reminders.stop_all();
        self.store.clear();
        debug!(reminders, "Engine timers cancelled");
    }
}

/// Oldest first; ties are broken by plugin name so the order is stable
fn sort_by_occurrence(events: &mut [UpdateEvent]) {
    events.sort_by(|a, b| {
        a.occurred_at
            .cmp(&b.occurred_at)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use update_notification_common::{MemorySink, MessageKind};

    fn update(entity_id: &str) -> EntityUpdatedEvent {
        EntityUpdatedEvent {
            entity_id: entity_id.to_string(),
            previous_version: "v1.0.0".to_string(),
            new_version: "v1.1.0".to_string(),
            backup_path: None,
        }
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = UpdateManagerConfig::default();
        assert_eq!(EngineSettings::from_config(&config).reminders, None);

        config.reminder_settings.enabled = true;
        config.reminder_settings.interval = "1h".to_string();
        let settings = EngineSettings::from_config(&config);
        assert_eq!(
            settings.reminders,
            Some(ReminderPolicy {
                interval: Duration::from_secs(3600),
                max_reminders: 3,
            })
        );
        assert_eq!(settings.batch_delay, Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_notifications_store_nothing() {
        let sink = Arc::new(MemorySink::new());
        let settings = EngineSettings {
            enable_update_notifications: false,
            ..EngineSettings::default()
        };
        let (engine, _task) = UpdateEngine::spawn(settings, sink.clone());

        assert_eq!(engine.record_update(update("AutoTK")).await.unwrap(), None);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(engine.pending_updates().await.unwrap().is_empty());
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_disabled() {
        let sink = Arc::new(MemorySink::new());
        let settings = EngineSettings {
            enable_restart_reminders: false,
            ..EngineSettings::default()
        };
        let (engine, _task) = UpdateEngine::spawn(settings, sink.clone());

        assert_eq!(
            engine.restart_required("AutoTK").await.unwrap(),
            RestartOutcome::Disabled
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(sink.messages_of(MessageKind::RestartRequired).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_fails_after_shutdown() {
        let (engine, task) =
            UpdateEngine::spawn(EngineSettings::default(), Arc::new(MemorySink::new()));

        engine.shutdown().await.unwrap();
        task.await.unwrap();

        assert!(matches!(
            engine.pending_updates().await,
            Err(UpdateManagerError::EngineStopped)
        ));
    }

    #[test]
    fn test_sort_by_occurrence_breaks_ties_by_name() {
        let start = Utc::now();
        let mut store = EventStore::new();
        store.record_update("TeamBalancer", "v1", "v2", None, start);
        store.record_update("SeedingMode", "v1", "v2", None, start + chrono::Duration::seconds(5));
        store.record_update("AutoTK", "v1", "v2", None, start);

        let mut events = store.pending_updates();
        sort_by_occurrence(&mut events);

        let ids: Vec<_> = events.iter().map(|event| event.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["AutoTK", "TeamBalancer", "SeedingMode"]);
    }
}
