//! In-memory store of the latest update event per plugin
//!
//! Single source of truth for "what changed and has it been announced". The
//! store is owned by the engine task and is never shared, so it needs no lock.
//! Events are kept for the lifetime of the process.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use update_notification_common::UpdateEvent;

#[derive(Debug, Default)]
pub struct EventStore {
    events: HashMap<String, UpdateEvent>,
    next_sequence: u64,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the event for `entity_id`; the new event is always un-notified
    pub fn record_update(
        &mut self,
        entity_id: &str,
        previous_version: &str,
        new_version: &str,
        backup_path: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> UpdateEvent {
        self.next_sequence += 1;

        let event = UpdateEvent {
            entity_id: entity_id.to_string(),
            previous_version: previous_version.to_string(),
            new_version: new_version.to_string(),
            backup_created: backup_path.is_some(),
            backup_path,
            occurred_at,
            notified: false,
            sequence: self.next_sequence,
        };

        self.events.insert(entity_id.to_string(), event.clone());
        event
    }

    pub fn get(&self, entity_id: &str) -> Option<&UpdateEvent> {
        self.events.get(entity_id)
    }

    /// Every stored event, notified or not, in no particular order
    pub fn pending_updates(&self) -> Vec<UpdateEvent> {
        self.events.values().cloned().collect()
    }

    /// Events whose batch notification has not been attempted yet
    pub fn unnotified_updates(&self) -> Vec<UpdateEvent> {
        self.events
            .values()
            .filter(|event| !event.notified)
            .cloned()
            .collect()
    }

    /// Flag the current event of each entity as notified; unknown ids are ignored
    pub fn mark_notified<'a>(&mut self, entity_ids: impl IntoIterator<Item = &'a str>) {
        for entity_id in entity_ids {
            if let Some(event) = self.events.get_mut(entity_id) {
                event.notified = true;
            }
        }
    }

    /// Flag exactly the given events as notified
    ///
    /// Only entities whose stored event is still the covered one are passed to
    /// [`EventStore::mark_notified`]; a replaced event stays un-notified.
    /// Returns how many events were marked.
    pub fn mark_delivered(&mut self, covered: &[UpdateEvent]) -> usize {
        let current: Vec<&str> = covered
            .iter()
            .filter(|covered_event| {
                self.events
                    .get(&covered_event.entity_id)
                    .is_some_and(|event| event.sequence == covered_event.sequence)
            })
            .map(|covered_event| covered_event.entity_id.as_str())
            .collect();

        let marked = current.len();
        self.mark_notified(current);
        marked
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
