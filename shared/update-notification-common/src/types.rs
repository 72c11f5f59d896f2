//! Core types for the update notification system
//!
//! Inbound event payloads, the structured notification message handed to a
//! delivery sink, and the status snapshot published by the update service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The most recent update observed for one entity (plugin)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateEvent {
    pub entity_id: String,
    pub previous_version: String,
    pub new_version: String,
    pub backup_path: Option<String>,
    pub backup_created: bool,
    pub occurred_at: DateTime<Utc>,
    /// Set once a batch notification covering this event has been attempted
    pub notified: bool,
    /// Store-assigned upsert sequence, unique per recorded event
    pub sequence: u64,
}

impl UpdateEvent {
    /// Human readable version transition, e.g. `v1.0.0 → v1.1.0`
    pub fn version_change(&self) -> String {
        format!("{} → {}", self.previous_version, self.new_version)
    }
}

/// Payload published on `updates.entity.updated`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityUpdatedEvent {
    pub entity_id: String,
    pub previous_version: String,
    pub new_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
}

/// Payload published on `updates.entity.restart_required`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestartRequiredEvent {
    pub entity_id: String,
}

/// Payload published on `updates.self.available` when the manager itself is outdated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelfUpdateAvailableEvent {
    pub latest_version: String,
}

/// Chat command forwarded by the host after it resolved the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandRequest {
    pub caller: String,
    /// Whether the host recognised the caller as an administrator
    #[serde(default)]
    pub is_admin: bool,
    pub message: String,
}

/// Reply lines for a chat command, already split for the transport
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResponse {
    pub replies: Vec<String>,
}

/// Kind of notification, used for routing decisions and logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    SingleUpdate,
    BatchUpdate,
    RestartRequired,
    Reminder,
    SelfUpdateAvailable,
    StatusReport,
    PendingUpdates,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::SingleUpdate => "single_update",
            MessageKind::BatchUpdate => "batch_update",
            MessageKind::RestartRequired => "restart_required",
            MessageKind::Reminder => "reminder",
            MessageKind::SelfUpdateAvailable => "self_update_available",
            MessageKind::StatusReport => "status_report",
            MessageKind::PendingUpdates => "pending_updates",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority label shown on update notifications
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePriority {
    Medium,
    High,
}

impl UpdatePriority {
    pub fn label(&self) -> &'static str {
        match self {
            UpdatePriority::Medium => "Medium",
            UpdatePriority::High => "🔴 HIGH",
        }
    }
}

/// One name/value row of a structured message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl MessageField {
    pub fn inline(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: true,
        }
    }

    pub fn block(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: false,
        }
    }
}

/// Structured notification handed to a [`crate::NotificationSink`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationMessage {
    pub id: Uuid,
    pub kind: MessageKind,
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<MessageField>,
    pub footer_text: String,
    /// Generation time of the message
    pub timestamp: DateTime<Utc>,
    /// Role mention such as `<@&1234>`, only set when an admin role is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention_prefix: Option<String>,
    /// Short plain-text line sent next to the mention
    pub summary: String,
}

impl NotificationMessage {
    /// Plain-text content line: the mention followed by the summary, if a mention is set
    pub fn content(&self) -> Option<String> {
        self.mention_prefix
            .as_ref()
            .map(|mention| format!("{} {}", mention, self.summary))
    }

    /// Look up a field value by name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

/// Derived state of one tracked entity in a status report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    UpToDate,
    UpdateAvailable,
    Error,
}

/// Status of one entity as reported by the update service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityStatus {
    pub name: String,
    pub current_version: String,
    #[serde(default)]
    pub latest_version: Option<String>,
    #[serde(default)]
    pub needs_update: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl EntityStatus {
    /// An available update wins over a recorded error
    pub fn state(&self) -> EntityState {
        if self.needs_update {
            EntityState::UpdateAvailable
        } else if self.error.is_some() {
            EntityState::Error
        } else {
            EntityState::UpToDate
        }
    }
}

/// Aggregated status snapshot published by the update service
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateStatus {
    pub total_entities: usize,
    pub updates_available: usize,
    pub last_check: Option<DateTime<Utc>>,
    pub entities: Vec<EntityStatus>,
}

/// Registration of an update source with the update service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRegistration {
    pub name: String,
    pub version: String,
    pub repository_owner: String,
    pub repository_name: String,
}

/// Scheduling settings pushed to the update service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckSettings {
    pub enabled: bool,
    pub check_interval_ms: u64,
    pub initial_delay_ms: u64,
    pub batch_delay_ms: u64,
    pub stagger_delay_ms: u64,
}

/// Request body for a single-entity check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckOneRequest {
    pub entity_id: String,
}

/// Generic acknowledgement returned by the update service
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(needs_update: bool, error: Option<&str>) -> EntityStatus {
        EntityStatus {
            name: "AutoTK".to_string(),
            current_version: "v1.0.0".to_string(),
            latest_version: None,
            needs_update,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_entity_state_prefers_update_over_error() {
        assert_eq!(status(true, Some("boom")).state(), EntityState::UpdateAvailable);
        assert_eq!(status(false, Some("boom")).state(), EntityState::Error);
        assert_eq!(status(false, None).state(), EntityState::UpToDate);
    }

    #[test]
    fn test_entity_updated_event_backup_path_optional() {
        let event: EntityUpdatedEvent = serde_json::from_str(
            r#"{"entity_id":"AutoTK","previous_version":"v1.0.0","new_version":"v1.1.0"}"#,
        )
        .unwrap();
        assert_eq!(event.backup_path, None);
    }

    #[test]
    fn test_message_content_requires_mention() {
        let mut message = NotificationMessage {
            id: Uuid::new_v4(),
            kind: MessageKind::RestartRequired,
            title: "Restart Required".to_string(),
            description: String::new(),
            color: 0xffa500,
            fields: vec![MessageField::inline("Plugin", "AutoTK")],
            footer_text: "footer".to_string(),
            timestamp: Utc::now(),
            mention_prefix: None,
            summary: "restart required".to_string(),
        };
        assert_eq!(message.content(), None);
        assert_eq!(message.field("Plugin"), Some("AutoTK"));

        message.mention_prefix = Some("<@&42>".to_string());
        assert_eq!(message.content().as_deref(), Some("<@&42> restart required"));
    }
}
