//! Per-plugin restart reminders
//!
//! Each plugin with an update gets at most one live reminder cycle. A cycle
//! fires every `interval` until `max_reminders` reminders went out, after
//! which it removes itself. Recording a new update restarts the cycle.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::EngineEvent;

struct ReminderSchedule {
    fire_count: u32,
    max_reminders: u32,
    interval: Duration,
    token: u64,
    timer: Option<JoinHandle<()>>,
}

impl ReminderSchedule {
    fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// What the engine should do with a reminder firing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderFiring {
    /// Cancelled or replaced cycle, nothing to do
    Stale,
    /// The cap was already reached; the cycle is gone and nothing is sent
    Exhausted,
    /// Send reminder `fire_count` of `max_reminders`
    Send {
        fire_count: u32,
        max_reminders: u32,
        rearmed: bool,
    },
}

pub struct ReminderScheduler {
    schedules: HashMap<String, ReminderSchedule>,
    next_token: u64,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl ReminderScheduler {
    pub(crate) fn new(events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            schedules: HashMap::new(),
            next_token: 0,
            events,
        }
    }

    /// Start a fresh cycle for `entity_id`, dropping any cycle already running
    pub fn start(&mut self, entity_id: &str, interval: Duration, max_reminders: u32) {
        self.stop(entity_id);

        let mut schedule = ReminderSchedule {
            fire_count: 0,
            max_reminders,
            interval,
            token: 0,
            timer: None,
        };
        self.arm(entity_id, &mut schedule);
        self.schedules.insert(entity_id.to_string(), schedule);

        debug!(
            entity_id,
            interval_secs = interval.as_secs(),
            max_reminders,
            "Restart reminders scheduled"
        );
    }

    fn arm(&mut self, entity_id: &str, schedule: &mut ReminderSchedule) {
        self.next_token += 1;
        schedule.token = self.next_token;

        let token = schedule.token;
        let interval = schedule.interval;
        let entity_id = entity_id.to_string();
        let events = self.events.clone();
        schedule.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = events.send(EngineEvent::ReminderElapsed { entity_id, token });
        }));
    }

    /// Advance the cycle after its timer elapsed
    pub fn on_elapsed(&mut self, entity_id: &str, token: u64) -> ReminderFiring {
        let Some(mut schedule) = self.schedules.remove(entity_id) else {
            return ReminderFiring::Stale;
        };

        if schedule.token != token {
            self.schedules.insert(entity_id.to_string(), schedule);
            return ReminderFiring::Stale;
        }
        schedule.timer = None;

        if schedule.fire_count >= schedule.max_reminders {
            info!(
                entity_id,
                max_reminders = schedule.max_reminders,
                "Maximum restart reminders reached"
            );
            return ReminderFiring::Exhausted;
        }

        schedule.fire_count += 1;
        let fire_count = schedule.fire_count;
        let max_reminders = schedule.max_reminders;
        let rearmed = fire_count < max_reminders;

        if rearmed {
            self.arm(entity_id, &mut schedule);
            self.schedules.insert(entity_id.to_string(), schedule);
        } else {
            debug!(entity_id, "Restart reminder cycle finished");
        }

        ReminderFiring::Send {
            fire_count,
            max_reminders,
            rearmed,
        }
    }

    pub fn stop(&mut self, entity_id: &str) -> bool {
        match self.schedules.remove(entity_id) {
            Some(mut schedule) => {
                schedule.cancel();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        for (_, mut schedule) in self.schedules.drain() {
            schedule.cancel();
        }
    }

    pub fn fire_count(&self, entity_id: &str) -> Option<u32> {
        self.schedules
            .get(entity_id)
            .map(|schedule| schedule.fire_count)
    }

    pub fn active_count(&self) -> usize {
        self.schedules.len()
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}
