//! Debounce timer for batch notifications
//!
//! Every recorded update re-arms a single one-shot timer. When the timer
//! elapses the engine receives [`EngineEvent::BatchElapsed`] carrying the
//! generation it was armed with; firings from replaced timers are ignored.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::EngineEvent;

pub struct BatchScheduler {
    generation: u64,
    timer: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl BatchScheduler {
    pub(crate) fn new(events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            generation: 0,
            timer: None,
            events,
        }
    }

    /// Cancel any pending timer and start a new one; returns its generation
    pub fn arm(&mut self, delay: Duration) -> u64 {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let events = self.events.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(EngineEvent::BatchElapsed { generation });
        }));

        debug!(generation, delay_ms = delay.as_millis() as u64, "Batch timer armed");
        generation
    }

    /// Consume a firing; true only for the live timer's generation
    pub fn take_if_current(&mut self, generation: u64) -> bool {
        if self.timer.is_some() && generation == self.generation {
            self.timer = None;
            true
        } else {
            false
        }
    }

    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for BatchScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = BatchScheduler::new(tx);

        scheduler.arm(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(60)).await;
        let second = scheduler.arm(Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(60)).await;
        match rx.recv().await {
            Some(EngineEvent::BatchElapsed { generation }) => {
                assert_eq!(generation, second);
                assert!(scheduler.take_if_current(generation));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(!scheduler.take_if_current(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_invalidates_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = BatchScheduler::new(tx);

        let generation = scheduler.arm(Duration::from_millis(50));
        scheduler.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(rx.try_recv().is_err());
        assert!(!scheduler.take_if_current(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = BatchScheduler::new(tx);

        let first = scheduler.arm(Duration::from_millis(50));
        let second = scheduler.arm(Duration::from_millis(50));

        assert!(!scheduler.take_if_current(first));
        assert!(scheduler.take_if_current(second));
        assert!(!scheduler.take_if_current(second));
    }
}
