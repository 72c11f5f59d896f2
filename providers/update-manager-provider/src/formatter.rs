//! Notification formatting
//!
//! Pure builders turning update state into [`NotificationMessage`]s. Nothing
//! here touches engine state; the generation time is always passed in.

use chrono::{DateTime, Utc};
use update_notification_common::{
    EntityState, EntityStatus, MessageField, MessageKind, NotificationMessage, UpdateEvent,
    UpdatePriority, UpdateStatus,
};
use uuid::Uuid;

use crate::config::UpdateManagerConfig;

/// Reminders always use the same orange, independent of the restart color
pub const REMINDER_COLOR: u32 = 0xffa500;

/// Self-update alerts stand out in red
pub const SELF_UPDATE_COLOR: u32 = 0xff6b6b;

const FOOTER: &str = "Plugin Update Manager";

/// Everything the formatter needs besides the event data
#[derive(Debug, Clone)]
pub struct FormatContext {
    pub update_color: u32,
    pub restart_color: u32,
    pub mention_prefix: Option<String>,
    pub host_name: String,
    pub source_name: String,
    pub source_version: String,
    pub repository_url: Option<String>,
    pub repository_name: Option<String>,
}

impl FormatContext {
    pub fn from_config(config: &UpdateManagerConfig) -> Self {
        Self {
            update_color: config.update_color,
            restart_color: config.restart_color,
            mention_prefix: config.mention_prefix(),
            host_name: config.host_name.clone(),
            source_name: config.source_name.clone(),
            source_version: config.source_version.clone(),
            repository_url: config.repository_url(),
            repository_name: config.repository_name.clone(),
        }
    }

    fn restart_action(&self) -> String {
        format!("⚠️ Restart {}", self.host_name)
    }
}

impl Default for FormatContext {
    fn default() -> Self {
        Self::from_config(&UpdateManagerConfig::default())
    }
}

/// Format a timestamp the way every message shows it
pub fn display_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// `2h 5m ago` or `12m ago`
pub fn time_since(occurred_at: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let minutes = (*now - *occurred_at).num_minutes().max(0);
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m ago", hours, minutes % 60)
    } else {
        format!("{}m ago", minutes)
    }
}

#[allow(clippy::too_many_arguments)]
fn build(
    ctx: &FormatContext,
    kind: MessageKind,
    title: String,
    description: String,
    color: u32,
    fields: Vec<MessageField>,
    footer_suffix: Option<&str>,
    summary: String,
    now: DateTime<Utc>,
) -> NotificationMessage {
    let footer_text = match footer_suffix {
        Some(suffix) => format!("{} - {}", FOOTER, suffix),
        None => FOOTER.to_string(),
    };

    NotificationMessage {
        id: Uuid::new_v4(),
        kind,
        title,
        description,
        color,
        fields,
        footer_text,
        timestamp: now,
        mention_prefix: ctx.mention_prefix.clone(),
        summary,
    }
}

/// One plugin was updated during the batch window
pub fn format_single_update(
    ctx: &FormatContext,
    event: &UpdateEvent,
    now: DateTime<Utc>,
) -> NotificationMessage {
    let backup = if event.backup_created {
        "✅ Created"
    } else {
        "❌ Failed"
    };

    build(
        ctx,
        MessageKind::SingleUpdate,
        "🔄 Plugin Update Completed".to_string(),
        format!(
            "{} has been successfully updated and requires a {} restart to apply changes.",
            event.entity_id, ctx.host_name
        ),
        ctx.update_color,
        vec![
            MessageField::inline("Plugin", &event.entity_id),
            MessageField::inline("Version", event.version_change()),
            MessageField::inline("Status", "Update Complete"),
            MessageField::inline("Backup", backup),
            MessageField::inline("Action Required", ctx.restart_action()),
            MessageField::inline("Priority", UpdatePriority::Medium.label()),
            MessageField::block("Timestamp", display_time(&event.occurred_at)),
        ],
        None,
        "🔄 Plugin update completed - restart required!".to_string(),
        now,
    )
}

/// Several plugins were updated during the same batch window
pub fn format_batch_update(
    ctx: &FormatContext,
    events: &[UpdateEvent],
    now: DateTime<Utc>,
) -> NotificationMessage {
    let mut fields: Vec<MessageField> = events
        .iter()
        .map(|event| MessageField::inline(&event.entity_id, event.version_change()))
        .collect();
    fields.extend([
        MessageField::inline("Total Updates", events.len().to_string()),
        MessageField::inline("Action Required", ctx.restart_action()),
        MessageField::inline("Priority", UpdatePriority::Medium.label()),
        MessageField::block("Timestamp", display_time(&now)),
    ]);

    build(
        ctx,
        MessageKind::BatchUpdate,
        "🔄 Batch Plugin Updates Completed".to_string(),
        format!(
            "{} plugins have been updated and require a {} restart to apply changes.",
            events.len(),
            ctx.host_name
        ),
        ctx.update_color,
        fields,
        Some("Batch Update"),
        format!(
            "🔄 {} plugin updates completed - restart required!",
            events.len()
        ),
        now,
    )
}

pub fn format_restart_required(
    ctx: &FormatContext,
    entity_id: &str,
    now: DateTime<Utc>,
) -> NotificationMessage {
    build(
        ctx,
        MessageKind::RestartRequired,
        "⚠️ Restart Required".to_string(),
        format!(
            "{} has been updated and requires a {} restart to apply changes.",
            entity_id, ctx.host_name
        ),
        ctx.restart_color,
        vec![
            MessageField::inline("Plugin", entity_id),
            MessageField::inline("Action Required", format!("Restart {}", ctx.host_name)),
            MessageField::inline("Priority", UpdatePriority::Medium.label()),
            MessageField::block("Timestamp", display_time(&now)),
        ],
        None,
        format!("⚠️ {} restart required for {}!", ctx.host_name, entity_id),
        now,
    )
}

pub fn format_reminder(
    ctx: &FormatContext,
    entity_id: &str,
    fire_count: u32,
    max_reminders: u32,
    now: DateTime<Utc>,
) -> NotificationMessage {
    build(
        ctx,
        MessageKind::Reminder,
        "⏰ Restart Reminder".to_string(),
        format!(
            "{} still requires a {} restart to apply updates.",
            entity_id, ctx.host_name
        ),
        REMINDER_COLOR,
        vec![
            MessageField::inline("Plugin", entity_id),
            MessageField::inline("Action Required", format!("Restart {}", ctx.host_name)),
            MessageField::inline("Reminder", format!("{}/{}", fire_count, max_reminders)),
            MessageField::inline("Priority", UpdatePriority::Medium.label()),
            MessageField::block("Timestamp", display_time(&now)),
        ],
        Some("Restart Reminder"),
        format!("⏰ Reminder: {} still needs restart!", entity_id),
        now,
    )
}

/// The update manager itself is outdated and cannot update itself
pub fn format_self_update_available(
    ctx: &FormatContext,
    latest_version: &str,
    now: DateTime<Utc>,
) -> NotificationMessage {
    let repository = match (&ctx.repository_name, &ctx.repository_url) {
        (Some(name), Some(url)) => format!("[{}]({})", name, url),
        _ => "not configured".to_string(),
    };

    build(
        ctx,
        MessageKind::SelfUpdateAvailable,
        format!("🔧 {} Update Available", ctx.source_name),
        format!(
            "**{} itself has an update available!** It manages all other plugin update notifications.",
            ctx.source_name
        ),
        SELF_UPDATE_COLOR,
        vec![
            MessageField::inline("Current Version", &ctx.source_version),
            MessageField::inline("Latest Version", latest_version),
            MessageField::inline("Status", "⚠️ Update Required"),
            MessageField::inline("Repository", repository),
            MessageField::inline("Action Required", "Manual Update + Restart"),
            MessageField::inline("Priority", UpdatePriority::High.label()),
            MessageField::block(
                "Note",
                format!(
                    "This provider cannot auto-update itself. Please update manually and restart {}.",
                    ctx.host_name
                ),
            ),
            MessageField::block("Timestamp", display_time(&now)),
        ],
        Some("Self-Update Alert"),
        format!("🔧 CRITICAL: {} needs updating!", ctx.source_name),
        now,
    )
}

/// Every recorded update, notified or not, with its age
pub fn format_pending_updates(
    ctx: &FormatContext,
    events: &[UpdateEvent],
    now: DateTime<Utc>,
) -> NotificationMessage {
    let fields = events
        .iter()
        .map(|event| {
            MessageField::inline(
                &event.entity_id,
                format!(
                    "{} ({})",
                    event.version_change(),
                    time_since(&event.occurred_at, &now)
                ),
            )
        })
        .collect();

    build(
        ctx,
        MessageKind::PendingUpdates,
        "📋 Plugins Requiring Updates".to_string(),
        format!(
            "The following plugins have been updated and require a {} restart:",
            ctx.host_name
        ),
        ctx.restart_color,
        fields,
        Some("Pending Updates"),
        "📋 Current plugins requiring updates:".to_string(),
        now,
    )
}

fn status_label(entity: &EntityStatus) -> String {
    match entity.state() {
        EntityState::UpdateAvailable => "🔄 Update Available".to_string(),
        EntityState::Error => format!(
            "❌ Error: {}",
            entity.error.as_deref().unwrap_or("unknown")
        ),
        EntityState::UpToDate => "✅ Up to Date".to_string(),
    }
}

fn last_check_label(status: &UpdateStatus) -> String {
    status
        .last_check
        .as_ref()
        .map(display_time)
        .unwrap_or_else(|| "Never".to_string())
}

/// Status table of every tracked plugin
pub fn format_status_report(
    ctx: &FormatContext,
    status: &UpdateStatus,
    now: DateTime<Utc>,
) -> NotificationMessage {
    let color = if status.updates_available > 0 {
        ctx.restart_color
    } else {
        ctx.update_color
    };

    let mut fields: Vec<MessageField> = status
        .entities
        .iter()
        .map(|entity| {
            MessageField::inline(
                &entity.name,
                format!("{} · {}", entity.current_version, status_label(entity)),
            )
        })
        .collect();
    fields.push(MessageField::block("Last Check", last_check_label(status)));

    let mut message = build(
        ctx,
        MessageKind::StatusReport,
        "📊 Plugin Update Status".to_string(),
        format!(
            "{} plugins tracked, {} updates available.",
            status.total_entities, status.updates_available
        ),
        color,
        fields,
        Some("Status"),
        format!("📊 {} plugin updates available", status.updates_available),
        now,
    );
    // requested reports never ping the admin role
    message.mention_prefix = None;
    message
}

/// Plain-text status for chat replies
pub fn format_status_text(status: &UpdateStatus) -> String {
    let mut lines = vec![
        "=== UPDATE MANAGER STATUS ===".to_string(),
        format!("Total Plugins: {}", status.total_entities),
        format!("Updates Available: {}", status.updates_available),
        format!("Last Check: {}", last_check_label(status)),
        String::new(),
        "=== PLUGIN STATUS ===".to_string(),
    ];

    lines.extend(status.entities.iter().map(|entity| {
        format!(
            "{}: {} {}",
            entity.name,
            entity.current_version,
            status_label(entity)
        )
    }));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn event(id: &str, backup: bool) -> UpdateEvent {
        UpdateEvent {
            entity_id: id.to_string(),
            previous_version: "v1.0.0".to_string(),
            new_version: "v1.1.0".to_string(),
            backup_path: backup.then(|| format!("/backups/{}", id)),
            backup_created: backup,
            occurred_at: now() - Duration::minutes(3),
            notified: false,
            sequence: 1,
        }
    }

    #[test]
    fn test_single_update_message() {
        let ctx = FormatContext::default();
        let message = format_single_update(&ctx, &event("AutoTK", true), now());

        assert_eq!(message.kind, MessageKind::SingleUpdate);
        assert_eq!(message.color, 0x00ff00);
        assert_eq!(message.field("Plugin"), Some("AutoTK"));
        assert_eq!(message.field("Version"), Some("v1.0.0 → v1.1.0"));
        assert_eq!(message.field("Backup"), Some("✅ Created"));
        assert_eq!(message.field("Timestamp"), Some("2024-01-01 11:57:00 UTC"));
        assert_eq!(message.timestamp, now());
        assert_eq!(message.footer_text, "Plugin Update Manager");
        assert_eq!(message.mention_prefix, None);
    }

    #[test]
    fn test_single_update_failed_backup() {
        let message = format_single_update(&FormatContext::default(), &event("AutoTK", false), now());
        assert_eq!(message.field("Backup"), Some("❌ Failed"));
    }

    #[test]
    fn test_batch_update_lists_every_plugin_once() {
        let events = vec![event("AutoTK", true), event("SeedingMode", false)];
        let message = format_batch_update(&FormatContext::default(), &events, now());

        assert_eq!(message.kind, MessageKind::BatchUpdate);
        assert_eq!(message.field("AutoTK"), Some("v1.0.0 → v1.1.0"));
        assert_eq!(message.field("SeedingMode"), Some("v1.0.0 → v1.1.0"));
        assert_eq!(message.field("Total Updates"), Some("2"));
        assert!(message.description.starts_with("2 plugins"));
        assert_eq!(message.footer_text, "Plugin Update Manager - Batch Update");
    }

    #[test]
    fn test_reminder_carries_count() {
        let message = format_reminder(&FormatContext::default(), "AutoTK", 2, 3, now());
        assert_eq!(message.field("Reminder"), Some("2/3"));
        assert_eq!(message.color, REMINDER_COLOR);
    }

    #[test]
    fn test_mention_prefix_is_copied() {
        let ctx = FormatContext {
            mention_prefix: Some("<@&42>".to_string()),
            ..FormatContext::default()
        };
        let message = format_restart_required(&ctx, "AutoTK", now());

        assert_eq!(message.color, 0xffa500);
        assert_eq!(
            message.content().as_deref(),
            Some("<@&42> ⚠️ server restart required for AutoTK!")
        );
    }

    #[test]
    fn test_status_report_never_mentions() {
        let ctx = FormatContext {
            mention_prefix: Some("<@&42>".to_string()),
            ..FormatContext::default()
        };
        let message = format_status_report(&ctx, &sample_status(), now());

        assert_eq!(message.kind, MessageKind::StatusReport);
        assert_eq!(message.mention_prefix, None);
        assert_eq!(message.content(), None);
    }

    #[test]
    fn test_self_update_is_high_priority() {
        let ctx = FormatContext {
            repository_name: Some("plugins".to_string()),
            repository_url: Some("https://github.com/ekko/plugins".to_string()),
            source_version: "1.0.0".to_string(),
            ..FormatContext::default()
        };
        let message = format_self_update_available(&ctx, "1.2.0", now());

        assert_eq!(message.kind, MessageKind::SelfUpdateAvailable);
        assert_eq!(message.color, SELF_UPDATE_COLOR);
        assert_eq!(message.field("Current Version"), Some("1.0.0"));
        assert_eq!(message.field("Latest Version"), Some("1.2.0"));
        assert_eq!(message.field("Priority"), Some("🔴 HIGH"));
        assert_eq!(
            message.field("Repository"),
            Some("[plugins](https://github.com/ekko/plugins)")
        );
    }

    #[test]
    fn test_time_since() {
        let base = now();
        assert_eq!(time_since(&(base - Duration::minutes(12)), &base), "12m ago");
        assert_eq!(time_since(&(base - Duration::minutes(125)), &base), "2h 5m ago");
        assert_eq!(time_since(&(base + Duration::minutes(5)), &base), "0m ago");
    }

    #[test]
    fn test_pending_updates_show_age() {
        let message =
            format_pending_updates(&FormatContext::default(), &[event("AutoTK", true)], now());
        assert_eq!(message.field("AutoTK"), Some("v1.0.0 → v1.1.0 (3m ago)"));
    }

    fn sample_status() -> UpdateStatus {
        UpdateStatus {
            total_entities: 3,
            updates_available: 1,
            last_check: None,
            entities: vec![
                EntityStatus {
                    name: "AutoTK".to_string(),
                    current_version: "v1.0.0".to_string(),
                    latest_version: Some("v1.1.0".to_string()),
                    needs_update: true,
                    error: None,
                },
                EntityStatus {
                    name: "SeedingMode".to_string(),
                    current_version: "v2.0.0".to_string(),
                    latest_version: None,
                    needs_update: false,
                    error: Some("rate limited".to_string()),
                },
                EntityStatus {
                    name: "TeamBalancer".to_string(),
                    current_version: "v0.9.0".to_string(),
                    latest_version: None,
                    needs_update: false,
                    error: None,
                },
            ],
        }
    }

    #[test]
    fn test_status_report_states() {
        let message = format_status_report(&FormatContext::default(), &sample_status(), now());

        assert_eq!(message.field("AutoTK"), Some("v1.0.0 · 🔄 Update Available"));
        assert_eq!(message.field("SeedingMode"), Some("v2.0.0 · ❌ Error: rate limited"));
        assert_eq!(message.field("TeamBalancer"), Some("v0.9.0 · ✅ Up to Date"));
        assert_eq!(message.field("Last Check"), Some("Never"));
        assert_eq!(message.color, 0xffa500);
    }

    #[test]
    fn test_status_text() {
        let text = format_status_text(&sample_status());
        assert!(text.contains("Total Plugins: 3"));
        assert!(text.contains("Last Check: Never"));
        assert!(text.contains("AutoTK: v1.0.0 🔄 Update Available"));
    }
}
