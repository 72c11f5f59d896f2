//! Shared types and utilities for the plugin update manager
//!
//! This library provides the wire payloads exchanged over NATS, the structured
//! notification message model, the symbolic interval parser and the delivery
//! sink interface used by the update manager provider.

pub mod interval;
pub mod sink;
pub mod subjects;
pub mod types;

// Re-export commonly used types
pub use interval::{parse_interval, IntervalTable, CHECK_INTERVALS, REMINDER_INTERVALS};
pub use sink::{DeliveryError, LogSink, MemorySink, NotificationSink};
pub use types::*;
