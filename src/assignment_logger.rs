use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use crate::AssignmentEvent;

/// A trait for delivering assignment events to the telemetry pipeline.
pub trait AssignmentLogger {
    /// Logs the assignment event.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use confidence::{AssignmentLogger, AssignmentEvent};
    /// struct MyAssignmentLogger;
    ///
    /// impl AssignmentLogger for MyAssignmentLogger {
    ///     fn log_assignment(&self, event: AssignmentEvent) {
    ///         // Queue the event for the next flush
    ///     }
    /// }
    /// ```
    ///
    /// # Notes
    ///
    /// This method is called before the resolved value is returned to the caller. It must not
    /// block and should not panic.
    fn log_assignment(&self, event: AssignmentEvent);
}

pub(crate) struct NoopAssignmentLogger;
impl AssignmentLogger for NoopAssignmentLogger {
    fn log_assignment(&self, _event: AssignmentEvent) {}
}

impl<T: Fn(AssignmentEvent)> AssignmentLogger for T {
    fn log_assignment(&self, event: AssignmentEvent) {
        self(event);
    }
}

/// An [`AssignmentLogger`] that accumulates events until a flush process drains them.
///
/// Clones share the same queue, so one clone can be handed to
/// [`ClientConfig::assignment_logger`](crate::ClientConfig::assignment_logger) and another kept
/// by the flusher.
#[derive(Debug, Clone, Default)]
pub struct AssignmentQueue {
    queue: Arc<Mutex<VecDeque<AssignmentEvent>>>,
}

impl AssignmentQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take up to `max_events` events, oldest first.
    pub fn next_batch(&self, max_events: usize) -> Vec<AssignmentEvent> {
        // A poisoned lock only means a pusher panicked mid-push; the queue itself is intact.
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let n = max_events.min(queue.len());
        queue.drain(..n).collect()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .map(|queue| queue.len())
            .unwrap_or_default()
    }

    /// Returns `true` if no events are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssignmentLogger for AssignmentQueue {
    fn log_assignment(&self, event: AssignmentEvent) {
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        queue.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::{AssignmentLogger, AssignmentQueue};
    use crate::{
        assignment::{AssignmentEvent, ClientIdentity},
        resolve::SdkId,
    };

    fn event(client_name: &str) -> AssignmentEvent {
        AssignmentEvent {
            client: ClientIdentity {
                client_name: client_name.to_owned(),
                client_credential_name: String::new(),
                sdk_id: SdkId::RustProvider,
                sdk_version: "0.1.0".to_owned(),
            },
            flags: vec![],
        }
    }

    #[test]
    fn drains_in_insertion_order() {
        let queue = AssignmentQueue::new();
        let logger = queue.clone();
        for name in ["a", "b", "c"] {
            logger.log_assignment(event(name));
        }
        assert_eq!(queue.len(), 3);

        let batch = queue.next_batch(2);
        let names: Vec<&str> = batch.iter().map(|e| e.client.client_name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);

        let rest = queue.next_batch(10);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].client.client_name, "c");
        assert!(queue.is_empty());
    }

    #[test]
    fn accepts_events_from_many_threads() {
        let queue = AssignmentQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        queue.log_assignment(event(&i.to_string()));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.next_batch(usize::MAX).len(), 100);
    }
}
