//! Event bus intake
//!
//! Binds the engine to the `updates.*` subjects. Every subscription lives in
//! an [`EventSubscription`] guard: dropping the guard stops its task, which
//! drops the NATS subscriber and unsubscribes.

use anyhow::{Context, Result};
use async_nats::{Client, Message, Subscriber};
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use update_notification_common::subjects;
use update_notification_common::{
    CommandRequest, EntityUpdatedEvent, RestartRequiredEvent, SelfUpdateAvailableEvent,
};

use crate::bot_commands::CommandHandler;
use crate::engine::{RestartOutcome, UpdateEngine};

/// A live subscription; the task is aborted when the guard is dropped
pub struct EventSubscription {
    subject: String,
    task: JoinHandle<()>,
}

impl EventSubscription {
    pub fn new(subject: impl Into<String>, task: JoinHandle<()>) -> Self {
        Self {
            subject: subject.into(),
            task,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.task.abort();
        debug!(subject = %self.subject, "Subscription released");
    }
}

/// NATS handler feeding update events and chat commands into the engine
pub struct NatsHandler {
    nats_client: Client,
    engine: UpdateEngine,
    commands: Arc<CommandHandler>,
}

impl NatsHandler {
    pub fn new(nats_client: Client, engine: UpdateEngine, commands: Arc<CommandHandler>) -> Self {
        Self {
            nats_client,
            engine,
            commands,
        }
    }

    /// Subscribe to every inbound subject
    pub async fn subscribe_all(&self) -> Result<Vec<EventSubscription>> {
        let mut subscriptions = Vec::with_capacity(4);

        let engine = self.engine.clone();
        subscriptions.push(
            self.listen(subjects::ENTITY_UPDATED, move |message| {
                let engine = engine.clone();
                async move { handle_entity_updated(&engine, &message.payload).await }
            })
            .await?,
        );

        let engine = self.engine.clone();
        subscriptions.push(
            self.listen(subjects::RESTART_REQUIRED, move |message| {
                let engine = engine.clone();
                async move { handle_restart_required(&engine, &message.payload).await }
            })
            .await?,
        );

        let engine = self.engine.clone();
        subscriptions.push(
            self.listen(subjects::SELF_UPDATE_AVAILABLE, move |message| {
                let engine = engine.clone();
                async move { handle_self_update_available(&engine, &message.payload).await }
            })
            .await?,
        );

        let commands = self.commands.clone();
        let client = self.nats_client.clone();
        subscriptions.push(
            self.listen(subjects::COMMANDS, move |message| {
                let commands = commands.clone();
                let client = client.clone();
                async move { handle_command(&commands, &client, message).await }
            })
            .await?,
        );

        Ok(subscriptions)
    }

    async fn listen<F, Fut>(&self, subject: &'static str, handler: F) -> Result<EventSubscription>
    where
        F: Fn(Message) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let subscriber = self
            .nats_client
            .subscribe(subject)
            .await
            .with_context(|| format!("Failed to subscribe to {}", subject))?;

        info!("Subscribed to {}", subject);

        let task = tokio::spawn(process_messages(subject, subscriber, handler));
        Ok(EventSubscription::new(subject, task))
    }
}

async fn process_messages<F, Fut>(subject: &'static str, mut subscriber: Subscriber, handler: F)
where
    F: Fn(Message) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    while let Some(message) = subscriber.next().await {
        if let Err(e) = handler(message).await {
            error!(subject, "Error handling message: {:#}", e);
        }
    }
    debug!(subject, "Subscription stream ended");
}

pub async fn handle_entity_updated(engine: &UpdateEngine, payload: &[u8]) -> Result<()> {
    let event: EntityUpdatedEvent =
        serde_json::from_slice(payload).context("Failed to deserialize entity update")?;

    debug!(entity_id = %event.entity_id, "Received plugin update event");
    engine.record_update(event).await?;
    Ok(())
}

pub async fn handle_restart_required(engine: &UpdateEngine, payload: &[u8]) -> Result<()> {
    let event: RestartRequiredEvent =
        serde_json::from_slice(payload).context("Failed to deserialize restart signal")?;

    let outcome = engine.restart_required(&event.entity_id).await?;
    if outcome == RestartOutcome::Suppressed {
        debug!(entity_id = %event.entity_id, "Restart notification suppressed");
    }
    Ok(())
}

pub async fn handle_self_update_available(engine: &UpdateEngine, payload: &[u8]) -> Result<()> {
    let event: SelfUpdateAvailableEvent =
        serde_json::from_slice(payload).context("Failed to deserialize self-update event")?;

    engine.self_update_available(&event.latest_version).await?;
    Ok(())
}

async fn handle_command(commands: &CommandHandler, client: &Client, message: Message) -> Result<()> {
    let request: CommandRequest =
        serde_json::from_slice(&message.payload).context("Failed to deserialize command")?;

    let response = commands.handle(&request).await;

    let Some(reply_subject) = message.reply else {
        debug!(caller = %request.caller, "Command had no reply subject, dropping response");
        return Ok(());
    };

    let body = serde_json::to_vec(&response).context("Failed to serialize command response")?;
    client
        .publish(reply_subject, body.into())
        .await
        .context("Failed to send command response")?;
    Ok(())
}
