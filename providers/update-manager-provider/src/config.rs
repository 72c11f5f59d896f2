//! Configuration for the Update Manager Provider

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};
use update_notification_common::{parse_interval, CHECK_INTERVALS, REMINDER_INTERVALS};

/// Prefix for environment variables read by [`UpdateManagerConfig::from_env`]
pub const ENV_PREFIX: &str = "UPDATE_MANAGER_";

/// Delay before the update service runs its first check
pub const INITIAL_CHECK_DELAY_MS: u64 = 15_000;

/// Spacing between two plugin checks inside one check round
pub const STAGGER_DELAY_MS: u64 = 5 * 60 * 1000;

/// Restart reminder settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReminderSettings {
    #[serde(default)]
    pub enabled: bool,

    /// One of `1h`, `6h`, `12h`, `1d`
    #[serde(default = "default_reminder_interval")]
    pub interval: String,

    #[serde(default = "default_max_reminders")]
    pub max_reminders: u32,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_reminder_interval(),
            max_reminders: default_max_reminders(),
        }
    }
}

/// Configuration for the Update Manager Provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateManagerConfig {
    /// NATS connection URL (event bus + update service)
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Discord webhook receiving notifications; notifications are only logged without it
    #[serde(default)]
    pub discord_webhook_url: Option<String>,

    /// Discord role pinged on every notification
    #[serde(default)]
    pub admin_role_id: Option<String>,

    #[serde(default = "default_true")]
    pub enable_update_notifications: bool,

    #[serde(default = "default_true")]
    pub enable_restart_reminders: bool,

    #[serde(default = "default_update_color")]
    pub update_color: u32,

    #[serde(default = "default_restart_color")]
    pub restart_color: u32,

    /// Quiet period that closes a batch of update events
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// One of `5m`, `30m`, `1h`, `1d`
    #[serde(default = "default_update_check_interval")]
    pub update_check_interval: String,

    #[serde(default)]
    pub reminder_settings: ReminderSettings,

    /// Name of the host process that has to be restarted
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// Name under which the provider registers itself with the update service
    #[serde(default = "default_source_name")]
    pub source_name: String,

    #[serde(default = "default_source_version")]
    pub source_version: String,

    #[serde(default)]
    pub repository_owner: Option<String>,

    #[serde(default)]
    pub repository_name: Option<String>,

    /// Maximum length of one chat reply line
    #[serde(default = "default_command_reply_max_len")]
    pub command_reply_max_len: usize,

    #[serde(default = "default_service_request_timeout_ms")]
    pub service_request_timeout_ms: u64,
}

impl UpdateManagerConfig {
    /// Load configuration from `UPDATE_MANAGER_*` environment variables
    pub fn from_env() -> Self {
        let mut props: HashMap<String, String> = std::env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|stripped| (stripped.to_lowercase(), value))
            })
            .collect();

        if !props.contains_key("nats_url") {
            if let Ok(url) = std::env::var("NATS_URL") {
                props.insert("nats_url".to_string(), url);
            }
        }

        Self::from_properties(&props)
    }

    /// Load configuration from wasmCloud properties HashMap
    ///
    /// Unparsable values are logged and replaced by their defaults.
    pub fn from_properties(props: &HashMap<String, String>) -> Self {
        let defaults = Self::default();

        let get = |key: &str| {
            props
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        let discord_webhook_url = get("discord_webhook_url").and_then(|url| {
            if url.starts_with("http://") || url.starts_with("https://") {
                Some(url.to_string())
            } else {
                warn!(value = url, "discord_webhook_url is not an http(s) URL, ignoring");
                None
            }
        });

        let reminder_settings = ReminderSettings {
            enabled: parse_or(get("reminder_enabled"), "reminder_enabled", parse_bool)
                .unwrap_or(defaults.reminder_settings.enabled),
            interval: get("reminder_interval")
                .map(str::to_string)
                .unwrap_or(defaults.reminder_settings.interval),
            max_reminders: parse_or(get("max_reminders"), "max_reminders", |v| v.parse().ok())
                .unwrap_or(defaults.reminder_settings.max_reminders),
        };

        Self {
            nats_url: get("nats_url")
                .map(str::to_string)
                .unwrap_or(defaults.nats_url),
            discord_webhook_url,
            admin_role_id: get("admin_role_id").map(str::to_string),
            enable_update_notifications: parse_or(
                get("enable_update_notifications"),
                "enable_update_notifications",
                parse_bool,
            )
            .unwrap_or(defaults.enable_update_notifications),
            enable_restart_reminders: parse_or(
                get("enable_restart_reminders"),
                "enable_restart_reminders",
                parse_bool,
            )
            .unwrap_or(defaults.enable_restart_reminders),
            update_color: parse_or(get("update_color"), "update_color", parse_color)
                .unwrap_or(defaults.update_color),
            restart_color: parse_or(get("restart_color"), "restart_color", parse_color)
                .unwrap_or(defaults.restart_color),
            batch_delay_ms: parse_or(get("batch_delay_ms"), "batch_delay_ms", |v| v.parse().ok())
                .unwrap_or(defaults.batch_delay_ms),
            update_check_interval: get("update_check_interval")
                .map(str::to_string)
                .unwrap_or(defaults.update_check_interval),
            reminder_settings,
            host_name: get("host_name")
                .map(str::to_string)
                .unwrap_or(defaults.host_name),
            source_name: get("source_name")
                .map(str::to_string)
                .unwrap_or(defaults.source_name),
            source_version: get("source_version")
                .map(str::to_string)
                .unwrap_or(defaults.source_version),
            repository_owner: get("repository_owner").map(str::to_string),
            repository_name: get("repository_name").map(str::to_string),
            command_reply_max_len: parse_or(
                get("command_reply_max_len"),
                "command_reply_max_len",
                |v| v.parse().ok().filter(|len: &usize| *len > 0),
            )
            .unwrap_or(defaults.command_reply_max_len),
            service_request_timeout_ms: parse_or(
                get("service_request_timeout_ms"),
                "service_request_timeout_ms",
                |v| v.parse().ok(),
            )
            .unwrap_or(defaults.service_request_timeout_ms),
        }
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn check_interval(&self) -> Duration {
        parse_interval(&self.update_check_interval, &CHECK_INTERVALS, "30m")
    }

    pub fn reminder_interval(&self) -> Duration {
        parse_interval(&self.reminder_settings.interval, &REMINDER_INTERVALS, "6h")
    }

    pub fn service_request_timeout(&self) -> Duration {
        Duration::from_millis(self.service_request_timeout_ms)
    }

    /// Discord role mention, only when a real role id is configured
    pub fn mention_prefix(&self) -> Option<String> {
        self.admin_role_id
            .as_deref()
            .map(str::trim)
            .filter(|role| !role.is_empty() && *role != "default")
            .map(|role| format!("<@&{}>", role))
    }

    /// `https://github.com/{owner}/{name}` when both parts are configured
    pub fn repository_url(&self) -> Option<String> {
        match (&self.repository_owner, &self.repository_name) {
            (Some(owner), Some(name)) => Some(format!("https://github.com/{}/{}", owner, name)),
            _ => None,
        }
    }

    /// Check the repository coordinates used for self-update checks
    pub fn validate_repository(&self) -> bool {
        let (Some(owner), Some(name)) = (&self.repository_owner, &self.repository_name) else {
            warn!("Repository configuration missing - repository_owner or repository_name not set");
            return false;
        };

        if owner == "YOUR_GITHUB_USERNAME" || name == "YOUR_REPOSITORY_NAME" {
            warn!("Repository configuration not customized - using placeholder values");
            return false;
        }

        info!("Repository configuration valid: {}/{}", owner, name);
        true
    }
}

impl Default for UpdateManagerConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
            discord_webhook_url: None,
            admin_role_id: None,
            enable_update_notifications: true,
            enable_restart_reminders: true,
            update_color: default_update_color(),
            restart_color: default_restart_color(),
            batch_delay_ms: default_batch_delay_ms(),
            update_check_interval: default_update_check_interval(),
            reminder_settings: ReminderSettings::default(),
            host_name: default_host_name(),
            source_name: default_source_name(),
            source_version: default_source_version(),
            repository_owner: None,
            repository_name: None,
            command_reply_max_len: default_command_reply_max_len(),
            service_request_timeout_ms: default_service_request_timeout_ms(),
        }
    }
}

fn parse_or<T>(value: Option<&str>, key: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let value = value?;
    let parsed = parse(value);
    if parsed.is_none() {
        warn!(key = key, value = value, "Invalid configuration value, using default");
    }
    parsed
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Accepts `0xffa500`, `#ffa500`, bare hex `ffa500` or decimal `16753920`
fn parse_color(value: &str) -> Option<u32> {
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .or_else(|| value.strip_prefix('#'));

    let color = match hex {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None if value.len() == 6 && value.chars().any(|c| c.is_ascii_alphabetic()) => {
            u32::from_str_radix(value, 16).ok()?
        }
        None => value.parse().ok()?,
    };

    (color <= 0xff_ffff).then_some(color)
}

fn default_true() -> bool {
    true
}

fn default_nats_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_update_color() -> u32 {
    0x00ff00
}

fn default_restart_color() -> u32 {
    0xffa500
}

fn default_batch_delay_ms() -> u64 {
    5000
}

fn default_update_check_interval() -> String {
    "30m".to_string()
}

fn default_reminder_interval() -> String {
    "6h".to_string()
}

fn default_max_reminders() -> u32 {
    3
}

fn default_host_name() -> String {
    "server".to_string()
}

fn default_source_name() -> String {
    "update-manager-provider".to_string()
}

fn default_source_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_command_reply_max_len() -> usize {
    200
}

fn default_service_request_timeout_ms() -> u64 {
    10_000
}
