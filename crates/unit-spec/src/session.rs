//! Per-session event queue. Events may be sent from any thread; they are
//! applied one at a time by [`Session::pump`].

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::events::{Event, InvalidEvent};
use crate::progress::ProgressSnapshot;
use crate::tracker::{Applied, UnitProgressTracker};

/// Cloneable handle for asynchronous event sources such as UI callbacks and
/// timers.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: Sender<Event>,
}

impl EventSender {
    /// Queues an event. Returns `false` once the session is gone.
    pub fn send(&self, event: Event) -> bool {
        self.sender.send(event).is_ok()
    }
}

#[derive(Debug, Default)]
pub struct PumpReport {
    pub applied: Vec<Applied>,
    pub rejected: Vec<(Event, InvalidEvent)>,
}

pub struct Session {
    tracker: Mutex<UnitProgressTracker>,
    sender: Sender<Event>,
    receiver: Mutex<Receiver<Event>>,
}

impl Session {
    pub fn new(tracker: UnitProgressTracker) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            tracker: Mutex::new(tracker),
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Queues `event`; `false` when it could not be queued.
    pub fn submit(&self, event: Event) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Applies every queued event in arrival order.
    pub fn pump(&self) -> PumpReport {
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tracker = self.lock_tracker();
        let mut report = PumpReport::default();
        while let Ok(event) = receiver.try_recv() {
            match tracker.apply(event.clone()) {
                Ok(applied) => report.applied.push(applied),
                Err(err) => {
                    warn!(node = %event.target, error = %err, "dropping invalid event");
                    report.rejected.push((event, err));
                }
            }
        }
        report
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock_tracker().snapshot()
    }

    /// Runs `f` with exclusive access to the tracker.
    pub fn with_tracker<R>(&self, f: impl FnOnce(&mut UnitProgressTracker) -> R) -> R {
        f(&mut self.lock_tracker())
    }

    pub fn into_tracker(self) -> UnitProgressTracker {
        self.tracker
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tracker(&self) -> MutexGuard<'_, UnitProgressTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::config::EngineConfig;
    use crate::events::EventKind;
    use crate::progress::UnitStatus;
    use crate::tree::ContentTree;

    const SUMMARY: &str = r#"{
        "version": "1.0.0",
        "activity": { "id": "https://example.com/units/summary" },
        "containers": [{
            "id": "containers/summary",
            "name": { "en": "Summary" },
            "complete": true,
            "blocks": [{ "type": "html", "url": "data/summary/header.html", "doneCriteria": "experienced" }]
        }]
    }"#;

    fn session() -> Session {
        let tree = ContentTree::from_json(SUMMARY).expect("unit");
        Session::new(UnitProgressTracker::new(Arc::new(tree), EngineConfig::default()))
    }

    #[test]
    fn events_from_other_threads_are_applied_in_order() {
        let session = session();
        let sender = session.sender();
        thread::spawn(move || {
            sender.send(Event::new("containers/summary", 1, EventKind::Visible));
            sender.send(Event::new("containers/summary/blocks/0", 2, EventKind::Visible));
        })
        .join()
        .expect("sender thread");

        let report = session.pump();
        assert_eq!(report.applied.len(), 2);
        assert!(report.rejected.is_empty());
        assert_eq!(session.snapshot().status, UnitStatus::Completed);
    }

    #[test]
    fn invalid_events_are_reported_not_applied() {
        let session = session();
        assert!(session.submit(Event::new("containers/summary/blocks/0", 1, EventKind::PlayedToEnd)));
        assert!(session.submit(Event::new("containers/other", 2, EventKind::Visible)));
        let report = session.pump();
        assert!(report.applied.is_empty());
        assert_eq!(report.rejected.len(), 2);
        assert!(session.with_tracker(|tracker| tracker.log().is_empty()));
    }
}
