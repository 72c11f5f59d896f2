use tracing::{info, warn};
use update_notification_common::{CommandRequest, CommandResponse};

use crate::facade::UpdateFacade;
use crate::formatter::format_status_text;

const ADMIN_ONLY: &str = "You need admin permissions to use this command.";
const UPDATE_PLUGINS_USAGE: &str = "Usage: !updateplugins <plugin-name> or !updateplugins all";

/// Chat commands understood by the update manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCommand {
    Check,
    /// Reply-only status query
    Status,
    /// Post the status report to the notification channel
    Report,
    /// `None` when no argument was given
    UpdatePlugins(Option<String>),
    Pending,
}

impl UpdateCommand {
    /// Parse `!command args...`; unknown commands yield `None`
    pub fn parse(message: &str) -> Option<Self> {
        let mut parts = message.split_whitespace();
        let command = parts.next()?.to_ascii_lowercase();

        match command.as_str() {
            "!updatecheck" => Some(UpdateCommand::Check),
            "!updatestatus" => Some(UpdateCommand::Status),
            "!updatereport" => Some(UpdateCommand::Report),
            "!updateplugins" => Some(UpdateCommand::UpdatePlugins(
                parts.next().map(str::to_string),
            )),
            "!updatepending" => Some(UpdateCommand::Pending),
            _ => None,
        }
    }
}

/// Admin command handler
pub struct CommandHandler {
    facade: UpdateFacade,
    max_reply_len: usize,
}

impl CommandHandler {
    pub fn new(facade: UpdateFacade, max_reply_len: usize) -> Self {
        Self {
            facade,
            max_reply_len,
        }
    }

    /// Handle one command request; every outcome is a list of reply lines
    pub async fn handle(&self, request: &CommandRequest) -> CommandResponse {
        let Some(command) = UpdateCommand::parse(&request.message) else {
            return CommandResponse {
                replies: vec![format!("Unknown command: {}", request.message.trim())],
            };
        };

        if !request.is_admin {
            warn!(caller = %request.caller, ?command, "Rejected update command from non-admin");
            return CommandResponse {
                replies: vec![ADMIN_ONLY.to_string()],
            };
        }

        info!(caller = %request.caller, ?command, "Handling update command");

        let replies = match command {
            UpdateCommand::Check => self.handle_check().await,
            UpdateCommand::Status => self.handle_status(),
            UpdateCommand::Report => self.handle_report().await,
            UpdateCommand::UpdatePlugins(None) => vec![UPDATE_PLUGINS_USAGE.to_string()],
            UpdateCommand::UpdatePlugins(Some(target)) => self.handle_update_plugins(&target).await,
            UpdateCommand::Pending => self.handle_pending().await,
        };

        CommandResponse { replies }
    }

    async fn handle_check(&self) -> Vec<String> {
        let mut replies = vec!["🔄 Manually checking for updates...".to_string()];
        match self.facade.trigger_check_all().await {
            Ok(()) => replies.push("✅ Update check completed".to_string()),
            Err(e) => replies.push(format!("❌ Update check failed: {}", e)),
        }
        replies
    }

    fn handle_status(&self) -> Vec<String> {
        let status = self.facade.get_status();
        split_message(&format_status_text(&status), self.max_reply_len)
    }

    async fn handle_report(&self) -> Vec<String> {
        match self.facade.announce_status().await {
            Ok(()) => vec!["📊 Posted the update status to the notification channel".to_string()],
            Err(e) => vec![format!("❌ Failed to post status: {}", e)],
        }
    }

    async fn handle_update_plugins(&self, target: &str) -> Vec<String> {
        if target.eq_ignore_ascii_case("all") {
            let mut replies = vec!["🔄 Updating all plugins...".to_string()];
            match self.facade.trigger_check_all().await {
                Ok(()) => replies.push("✅ All plugins update check completed".to_string()),
                Err(e) => replies.push(format!("❌ Update failed: {}", e)),
            }
            return replies;
        }

        let mut replies = vec![format!("🔄 Checking updates for {}...", target)];
        match self.facade.trigger_check_one(target).await {
            Ok(()) => replies.push(format!("✅ {} update check completed", target)),
            Err(e) => replies.push(format!("❌ Update failed: {}", e)),
        }
        replies
    }

    async fn handle_pending(&self) -> Vec<String> {
        match self.facade.announce_pending().await {
            Ok(0) => vec!["✅ No plugins are waiting for a restart".to_string()],
            Ok(count) => vec![format!(
                "📋 Posted {} pending plugin update(s) to the notification channel",
                count
            )],
            Err(e) => vec![format!("❌ Failed to list pending updates: {}", e)],
        }
    }
}

/// Split `text` into chunks of at most `max_len` characters
///
/// Splits on line breaks first; a line that is too long on its own is split
/// on spaces. A single word longer than `max_len` is kept whole.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split('\n') {
        if char_len(&current) + char_len(line) <= max_len {
            current.push_str(line);
            current.push('\n');
            continue;
        }

        flush(&mut chunks, &mut current);

        if char_len(line) <= max_len {
            current.push_str(line);
            current.push('\n');
            continue;
        }

        for word in line.split(' ') {
            if char_len(&current) + char_len(word) > max_len {
                flush(&mut chunks, &mut current);
            }
            current.push_str(word);
            current.push(' ');
        }
        current.truncate(current.trim_end().len());
        current.push('\n');
    }

    flush(&mut chunks, &mut current);
    chunks
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let chunk = current.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(UpdateCommand::parse("!updatecheck"), Some(UpdateCommand::Check));
        assert_eq!(UpdateCommand::parse("!UpdateStatus"), Some(UpdateCommand::Status));
        assert_eq!(UpdateCommand::parse("!updatereport"), Some(UpdateCommand::Report));
        assert_eq!(
            UpdateCommand::parse("!updateplugins AutoTK extra"),
            Some(UpdateCommand::UpdatePlugins(Some("AutoTK".to_string())))
        );
        assert_eq!(
            UpdateCommand::parse("!updateplugins"),
            Some(UpdateCommand::UpdatePlugins(None))
        );
        assert_eq!(UpdateCommand::parse("!updatepending"), Some(UpdateCommand::Pending));
        assert_eq!(UpdateCommand::parse("!help"), None);
        assert_eq!(UpdateCommand::parse("   "), None);
    }

    #[test]
    fn test_short_message_is_untouched() {
        assert_eq!(split_message("hello\nworld", 200), vec!["hello\nworld"]);
    }

    #[test]
    fn test_split_by_line() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_message(text, 10), vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn test_split_long_line_by_word() {
        let chunks = split_message("one two three four five six", 10);

        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 10));
        assert_eq!(chunks.join(" "), "one two three four five six");
    }

    #[test]
    fn test_split_counts_characters_not_bytes() {
        let text = "✅✅✅✅✅\n✅✅✅✅✅";
        assert_eq!(split_message(text, 11), vec![text.to_string()]);
    }
}
