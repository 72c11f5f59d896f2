//! Update Manager Provider
//!
//! Turns plugin update events from the event bus into batched Discord
//! notifications, restart-required alerts and periodic restart reminders, and
//! answers admin chat commands backed by the external update service.

pub mod batch_scheduler;
pub mod bot_commands;
pub mod config;
pub mod discord_client;
pub mod engine;
pub mod error;
pub mod event_store;
pub mod facade;
pub mod formatter;
pub mod nats_handler;
pub mod provider;
pub mod reminder_scheduler;
pub mod update_service;

pub use bot_commands::{split_message, CommandHandler, UpdateCommand};
pub use config::{ReminderSettings, UpdateManagerConfig};
pub use discord_client::DiscordWebhookClient;
pub use engine::{EngineSettings, ReminderPolicy, RestartOutcome, UpdateEngine};
pub use error::{ServiceError, UpdateManagerError};
pub use event_store::EventStore;
pub use facade::UpdateFacade;
pub use formatter::FormatContext;
pub use nats_handler::{EventSubscription, NatsHandler};
pub use provider::UpdateManagerProvider;
pub use update_service::{NatsUpdateService, UpdateService};

// Re-export Result type for convenience
pub type Result<T> = std::result::Result<T, UpdateManagerError>;
