use crate::partition::RecordsRequest;
use crate::transport::SubscriberHub;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Subscriber is the receiving end of records a leader streams to this member.
#[derive(Clone)]
pub struct Subscriber {
    hub: SubscriberHub,
}

impl Subscriber {
    pub(crate) fn new(hub: SubscriberHub) -> Self {
        Subscriber { hub }
    }

    /// Subscribing again to the same subject replaces the previous stream, which then ends.
    pub fn subscribe(&self, subject: impl Into<String>) -> RecordStream {
        RecordStream {
            receiver: self.hub.subscribe(subject),
        }
    }
}

pub struct RecordStream {
    receiver: mpsc::UnboundedReceiver<RecordsRequest>,
}

impl RecordStream {
    /// Returns None once the subscription was replaced or the member shut down.
    pub async fn next(&mut self) -> Option<ReceivedRecord> {
        self.receiver.recv().await.map(ReceivedRecord::from)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReceivedRecord {
    pub index: u64,
    pub timestamp: i64,
    pub value: Bytes,
    /// True if this record doesn't necessarily follow the previously received one.
    pub reset: bool,
}

impl From<RecordsRequest> for ReceivedRecord {
    fn from(request: RecordsRequest) -> Self {
        ReceivedRecord {
            index: request.record.index.as_u64(),
            timestamp: request.record.timestamp,
            value: request.record.value,
            reset: request.reset,
        }
    }
}
