//! Symbolic interval parsing
//!
//! Configuration expresses check and reminder periods as short tokens such as
//! `30m` or `6h`. Only the tokens listed in a table are accepted; anything else
//! resolves to the fallback token so a typo never stops the provider.

use std::time::Duration;
use tracing::warn;

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;

/// A fixed mapping of interval tokens to milliseconds
#[derive(Debug, Clone, Copy)]
pub struct IntervalTable {
    pub name: &'static str,
    pub entries: &'static [(&'static str, u64)],
    /// Used when neither the token nor the caller's fallback is in the table
    pub default_token: &'static str,
}

impl IntervalTable {
    /// Milliseconds for a token, if the table knows it
    pub fn lookup(&self, token: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == token)
            .map(|(_, ms)| *ms)
    }

    fn default_ms(&self) -> u64 {
        self.lookup(self.default_token)
            .or_else(|| self.entries.first().map(|(_, ms)| *ms))
            .unwrap_or(30 * MINUTE_MS)
    }
}

/// How often the update service checks for new releases
pub const CHECK_INTERVALS: IntervalTable = IntervalTable {
    name: "check",
    entries: &[
        ("5m", 5 * MINUTE_MS),
        ("30m", 30 * MINUTE_MS),
        ("1h", HOUR_MS),
        ("1d", DAY_MS),
    ],
    default_token: "30m",
};

/// How often an unapplied restart is re-announced
pub const REMINDER_INTERVALS: IntervalTable = IntervalTable {
    name: "reminder",
    entries: &[
        ("1h", HOUR_MS),
        ("6h", 6 * HOUR_MS),
        ("12h", 12 * HOUR_MS),
        ("1d", DAY_MS),
    ],
    default_token: "6h",
};

/// Resolve `token` against `table`, falling back to `fallback_token`
pub fn parse_interval(token: &str, table: &IntervalTable, fallback_token: &str) -> Duration {
    if let Some(ms) = table.lookup(token) {
        return Duration::from_millis(ms);
    }

    let ms = match table.lookup(fallback_token) {
        Some(ms) => ms,
        None => {
            warn!(
                table = table.name,
                fallback = fallback_token,
                default = table.default_token,
                "Fallback interval is not in the table, using table default"
            );
            table.default_ms()
        }
    };

    if !token.is_empty() {
        warn!(
            table = table.name,
            token = token,
            fallback = fallback_token,
            "Unknown interval token, using fallback"
        );
    }

    Duration::from_millis(ms)
}
