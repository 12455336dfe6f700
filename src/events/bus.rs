//! # Run and restart event bus.
//!
//! Every [`TaskHandle`](crate::TaskHandle) given a bus, and every
//! [`Supervisor`](crate::Supervisor), reports what happens to its runs here.
//!
//! ```text
//! TaskHandle worker ──(Starting/Started/StepFailed/TeardownFailed/Stopped)──┐
//! Supervisor monitor ──(RestartRequested/Declined/Failed)───────────────────┼──► Bus
//! SubscriberSet workers ──(SubscriberOverflow/Panicked)─────────────────────┘     │
//!                                                                                  ▼
//!                                                      builder listener, tests, callers
//! ```
//!
//! Publishing never waits: with no receiver the event is discarded, and a
//! receiver that falls more than the capacity behind gets `Lagged` and resumes
//! from the oldest retained event.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle to the broadcast channel; all clones publish to the same receivers.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends `ev` to every current receiver; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Opens a receiver; earlier events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_subscriber_sees_events_after_subscribe() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::TaskStarting));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::TaskStarted).with_run(1));

        let ev = rx.recv().await.expect("event delivered");
        assert_eq!(ev.kind, EventKind::TaskStarted);
        assert_eq!(ev.run, Some(1));
    }
}
