use crate::partition::RecordsRequest;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// SubscriberHub is the receiving end of produced records on one member. Records are routed by
/// subject to whoever subscribed to it last.
#[derive(Clone, Default)]
pub(crate) struct SubscriberHub {
    subjects: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<RecordsRequest>>>>,
}

impl SubscriberHub {
    pub(crate) fn new() -> Self {
        SubscriberHub::default()
    }

    /// Replaces any previous subscription to `subject`.
    pub(crate) fn subscribe(&self, subject: impl Into<String>) -> mpsc::UnboundedReceiver<RecordsRequest> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subjects
            .lock()
            .expect("SubscriberHub.subscribe() mutex guard poison")
            .insert(subject.into(), tx);

        rx
    }

    /// Returns false if nobody is listening on `subject`; the record is dropped.
    pub(crate) fn deliver(&self, subject: &str, request: RecordsRequest) -> bool {
        let mut subjects = self.subjects.lock().expect("SubscriberHub.deliver() mutex guard poison");
        let delivered = match subjects.get(subject) {
            Some(tx) => tx.send(request).is_ok(),
            None => return false,
        };
        if !delivered {
            subjects.remove(subject);
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitlog::Index;
    use crate::partition::Record;
    use bytes::Bytes;

    fn request(index: u64) -> RecordsRequest {
        RecordsRequest {
            record: Record {
                index: Index::new(index),
                timestamp: 0,
                value: Bytes::from_static(b"v"),
            },
            reset: false,
        }
    }

    #[tokio::test]
    async fn routes_by_subject() {
        let hub = SubscriberHub::new();
        let mut x = hub.subscribe("x");
        let mut y = hub.subscribe("y");

        assert!(hub.deliver("x", request(1)));
        assert!(hub.deliver("y", request(2)));
        assert!(!hub.deliver("z", request(3)));

        assert_eq!(x.recv().await, Some(request(1)));
        assert_eq!(y.recv().await, Some(request(2)));
    }

    #[tokio::test]
    async fn dropped_subscription_stops_delivery() {
        let hub = SubscriberHub::new();
        let x = hub.subscribe("x");
        drop(x);

        assert!(!hub.deliver("x", request(1)));

        // Re-subscribing works again.
        let mut x = hub.subscribe("x");
        assert!(hub.deliver("x", request(2)));
        assert_eq!(x.recv().await, Some(request(2)));
    }
}
