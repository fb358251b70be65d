use crate::actor::WeakActorClient;
use crate::commitlog::{Index, Log};
use crate::partition::log::{LogReader, PartitionLog, ReaderMode};
use crate::partition::{DrainConsumerTick, LogEntry, MemberId, Record, RecordsRequest, Term};
use crate::transport::Transport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Duration;

// A drain that failed to read the log tries again after this long.
const READ_FAILURE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// ConsumerKey identifies one subscriber's interest in one subject.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub(crate) struct ConsumerKey {
    pub(crate) member_id: MemberId,
    pub(crate) subject: String,
}

struct ConsumerSender {
    // Tells a scheduled drain continuation apart from one meant for a consumer that was replaced.
    id: u64,
    reader: LogReader,
    drain_scheduled: bool,
}

/// Consumers streams committed entries to remote subscribers. It's owned by the Leader role and
/// only ever touched from the partition actor.
///
/// A drain sends at most `max_records_per_drain` records, then yields back to the actor queue and
/// continues as a separate event. A consumer with nothing left to read sits idle until `notify_all`
/// or `reset` wakes it.
pub(crate) struct Consumers {
    logger: slog::Logger,
    term: Term,
    transport: Arc<dyn Transport>,
    actor_client: WeakActorClient,
    max_records_per_drain: usize,
    consumers: HashMap<ConsumerKey, ConsumerSender>,
    next_consumer_id: u64,
}

impl Consumers {
    pub(crate) fn new(
        logger: slog::Logger,
        term: Term,
        transport: Arc<dyn Transport>,
        actor_client: WeakActorClient,
        max_records_per_drain: usize,
    ) -> Self {
        Consumers {
            logger,
            term,
            transport,
            actor_client,
            max_records_per_drain,
            consumers: HashMap::new(),
            next_consumer_id: 1,
        }
    }

    /// Open a consumer for `key` at `index`, replacing any existing one, and start draining.
    pub(crate) fn open<L: Log<LogEntry>>(&mut self, key: ConsumerKey, index: Index, log: &PartitionLog<L>) {
        let reader = log.open_reader(index, ReaderMode::Commits);
        let id = self.next_consumer_id;
        self.next_consumer_id += 1;

        let previous = self.consumers.insert(
            key.clone(),
            ConsumerSender {
                id,
                reader,
                drain_scheduled: false,
            },
        );
        if let Some(mut previous) = previous {
            slog::debug!(self.logger, "Replacing consumer {:?}", key);
            previous.reader.close();
        }

        slog::info!(self.logger, "Opened consumer {:?} at {:?}", key, index);
        self.drain(&key, log);
    }

    /// Reposition an existing consumer. Returns false (and does nothing) if there's no consumer for
    /// `key`.
    pub(crate) fn reset<L: Log<LogEntry>>(&mut self, key: &ConsumerKey, index: Index, log: &PartitionLog<L>) -> bool {
        match self.consumers.get_mut(key) {
            Some(consumer) => consumer.reader.reset(index),
            None => {
                slog::debug!(self.logger, "Ignoring reset for unknown consumer {:?}", key);
                return false;
            }
        }

        self.drain(key, log);
        true
    }

    /// New entries were committed.
    pub(crate) fn notify_all<L: Log<LogEntry>>(&mut self, log: &PartitionLog<L>) {
        let keys: Vec<_> = self
            .consumers
            .iter()
            .filter(|(_, consumer)| !consumer.drain_scheduled)
            .map(|(key, _)| key.clone())
            .collect();

        for key in keys.iter() {
            self.drain(key, log);
        }
    }

    pub(crate) fn handle_drain_tick<L: Log<LogEntry>>(&mut self, tick: DrainConsumerTick, log: &PartitionLog<L>) {
        if tick.term != self.term {
            slog::debug!(self.logger, "Dropping drain tick from term {:?}", tick.term);
            return;
        }

        match self.consumers.get_mut(&tick.key) {
            Some(consumer) if consumer.id == tick.consumer_id => consumer.drain_scheduled = false,
            _ => {
                slog::debug!(self.logger, "Dropping drain tick for replaced consumer {:?}", tick.key);
                return;
            }
        }

        self.drain(&tick.key, log);
    }

    pub(crate) fn close_all(&mut self) {
        if !self.consumers.is_empty() {
            slog::info!(self.logger, "Closing {} consumers", self.consumers.len());
        }
        for (_, mut consumer) in self.consumers.drain() {
            consumer.reader.close();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.consumers.len()
    }

    fn drain<L: Log<LogEntry>>(&mut self, key: &ConsumerKey, log: &PartitionLog<L>) {
        let consumer = match self.consumers.get_mut(key) {
            Some(consumer) => consumer,
            None => return,
        };

        let mut sent = 0;
        while consumer.reader.has_next(log) {
            if sent == self.max_records_per_drain {
                Self::schedule_drain(&self.actor_client, self.term, key, consumer, None);
                return;
            }

            let indexed = match consumer.reader.next(log) {
                Ok(Some(indexed)) => indexed,
                Ok(None) => return,
                Err(e) => {
                    // The reader stays put, so the retry picks up the same entry.
                    slog::warn!(self.logger, "Consumer {:?} failed to read log, will retry: {:?}", key, e);
                    Self::schedule_drain(
                        &self.actor_client,
                        self.term,
                        key,
                        consumer,
                        Some(READ_FAILURE_RETRY_DELAY),
                    );
                    return;
                }
            };

            // The subscriber can't assume continuity when we start over from the oldest entry.
            let reset = indexed.index == consumer.reader.first_index(log);
            let request = RecordsRequest {
                record: Record {
                    index: indexed.index,
                    timestamp: indexed.entry.timestamp,
                    value: indexed.entry.value,
                },
                reset,
            };
            slog::trace!(self.logger, "Producing {:?} to {:?}", indexed.index, key);
            self.transport.produce(&key.member_id, &key.subject, request);
            sent += 1;
        }
    }

    fn schedule_drain(
        actor_client: &WeakActorClient,
        term: Term,
        key: &ConsumerKey,
        consumer: &mut ConsumerSender,
        delay: Option<Duration>,
    ) {
        if consumer.drain_scheduled {
            return;
        }
        consumer.drain_scheduled = true;

        let tick = DrainConsumerTick {
            term,
            key: key.clone(),
            consumer_id: consumer.id,
        };
        let actor_client = actor_client.clone();
        tokio::task::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let _ = actor_client.drain_consumer(tick).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorClient;
    use crate::commitlog::InMemoryLog;
    use crate::partition::test_utils::{self, FaultyLog, RecordingTransport, TestUtilActor};
    use bytes::Bytes;
    use std::sync::atomic::Ordering;

    fn committed_log(n: u64) -> PartitionLog<InMemoryLog<LogEntry>> {
        let logger = test_utils::logger();
        let mut log = PartitionLog::new(logger.clone(), InMemoryLog::create(logger).unwrap()).unwrap();
        for i in 1..=n {
            log.append(LogEntry {
                term: Term::new(1),
                timestamp: i as i64,
                value: Bytes::from(format!("value-{}", i)),
            })
            .unwrap();
        }
        log.commit_all();

        log
    }

    fn key(member: &str, subject: &str) -> ConsumerKey {
        ConsumerKey {
            member_id: MemberId::new(member),
            subject: subject.to_string(),
        }
    }

    fn new_consumers(client: &ActorClient, transport: Arc<RecordingTransport>, max_per_drain: usize) -> Consumers {
        Consumers::new(test_utils::logger(), Term::new(1), transport, client.weak(), max_per_drain)
    }

    #[tokio::test]
    async fn reset_repositions_consumer() {
        let (client, _rx) = ActorClient::new(10);
        let transport = RecordingTransport::new();
        let mut consumers = new_consumers(&client, transport.clone(), 64);
        let log = committed_log(5);

        consumers.open(key("a", "x"), Index::new(5), &log);
        assert_eq!(transport.produced_indexes(), vec![5]);

        assert!(consumers.reset(&key("a", "x"), Index::new(2), &log));
        assert_eq!(transport.produced_indexes(), vec![5, 2, 3, 4, 5]);

        let produced = transport.produced();
        assert!(produced.iter().all(|p| p.to == MemberId::new("a") && p.subject == "x"));
        assert!(produced.iter().all(|p| !p.request.reset));
        assert_eq!(produced[1].request.record.value, Bytes::from("value-2"));
        assert_eq!(produced[1].request.record.timestamp, 2);
    }

    #[tokio::test]
    async fn reset_for_unknown_consumer_is_ignored() {
        let (client, _rx) = ActorClient::new(10);
        let transport = RecordingTransport::new();
        let mut consumers = new_consumers(&client, transport.clone(), 64);
        let log = committed_log(3);

        assert!(!consumers.reset(&key("a", "x"), Index::new(1), &log));
        assert_eq!(consumers.len(), 0);
        assert!(transport.produced().is_empty());
    }

    #[tokio::test]
    async fn open_replaces_consumer_with_same_key() {
        let (client, _rx) = ActorClient::new(10);
        let transport = RecordingTransport::new();
        let mut consumers = new_consumers(&client, transport.clone(), 64);
        let mut log = committed_log(3);

        consumers.open(key("a", "x"), Index::new(3), &log);
        consumers.open(key("a", "x"), Index::new(2), &log);
        consumers.open(key("a", "y"), Index::new(3), &log);
        assert_eq!(consumers.len(), 2);
        assert_eq!(transport.produced_indexes(), vec![3, 2, 3, 3]);

        // Only one consumer per key sees new entries.
        log.append(LogEntry {
            term: Term::new(1),
            timestamp: 4,
            value: Bytes::from_static(b"value-4"),
        })
        .unwrap();
        log.commit_all();
        consumers.notify_all(&log);

        let subjects: Vec<_> = transport
            .produced()
            .into_iter()
            .skip(4)
            .map(|p| (p.subject, p.request.record.index.as_u64()))
            .collect();
        assert_eq!(subjects.len(), 2);
        assert!(subjects.contains(&("x".to_string(), 4)));
        assert!(subjects.contains(&("y".to_string(), 4)));
    }

    #[tokio::test]
    async fn only_committed_entries_are_sent() {
        let (client, _rx) = ActorClient::new(10);
        let transport = RecordingTransport::new();
        let mut consumers = new_consumers(&client, transport.clone(), 64);
        let mut log = committed_log(2);
        log.append(LogEntry {
            term: Term::new(1),
            timestamp: 3,
            value: Bytes::from_static(b"value-3"),
        })
        .unwrap();

        consumers.open(key("a", "x"), Index::new(1), &log);
        assert_eq!(transport.produced_indexes(), vec![1, 2]);

        log.commit_all();
        consumers.notify_all(&log);
        assert_eq!(transport.produced_indexes(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn drain_yields_after_budget_and_continues_on_tick() {
        let (client, rx) = ActorClient::new(10);
        let mut actor = TestUtilActor::new(rx);
        let transport = RecordingTransport::new();
        let mut consumers = new_consumers(&client, transport.clone(), 2);
        let log = committed_log(5);

        consumers.open(key("a", "x"), Index::new(1), &log);
        assert_eq!(transport.produced_indexes(), vec![1, 2]);

        // Scheduled continuation owns the consumer; a notify doesn't jump the queue.
        consumers.notify_all(&log);
        assert_eq!(transport.produced_indexes(), vec![1, 2]);

        let tick = actor.recv_drain_tick().await;
        consumers.handle_drain_tick(tick, &log);
        assert_eq!(transport.produced_indexes(), vec![1, 2, 3, 4]);

        let tick = actor.recv_drain_tick().await;
        consumers.handle_drain_tick(tick, &log);
        assert_eq!(transport.produced_indexes(), vec![1, 2, 3, 4, 5]);
        actor.assert_no_event().await;
    }

    #[tokio::test]
    async fn drain_tick_for_replaced_or_closed_consumer_is_dropped() {
        let (client, rx) = ActorClient::new(10);
        let mut actor = TestUtilActor::new(rx);
        let transport = RecordingTransport::new();
        let mut consumers = new_consumers(&client, transport.clone(), 1);
        let log = committed_log(3);

        consumers.open(key("a", "x"), Index::new(1), &log);
        let stale_tick = actor.recv_drain_tick().await;
        consumers.open(key("a", "x"), Index::new(3), &log);
        consumers.handle_drain_tick(stale_tick, &log);
        assert_eq!(transport.produced_indexes(), vec![1, 3]);

        consumers.open(key("b", "x"), Index::new(1), &log);
        let tick = actor.recv_drain_tick().await;
        consumers.close_all();
        consumers.handle_drain_tick(tick, &log);
        assert_eq!(transport.produced_indexes(), vec![1, 3, 1]);
    }

    #[tokio::test]
    async fn close_all_stops_delivery() {
        let (client, _rx) = ActorClient::new(10);
        let transport = RecordingTransport::new();
        let mut consumers = new_consumers(&client, transport.clone(), 64);
        let mut log = committed_log(1);

        consumers.open(key("a", "x"), Index::new(1), &log);
        consumers.open(key("b", "y"), Index::new(1), &log);
        consumers.close_all();

        log.append(LogEntry {
            term: Term::new(1),
            timestamp: 2,
            value: Bytes::from_static(b"value-2"),
        })
        .unwrap();
        log.commit_all();
        consumers.notify_all(&log);

        assert_eq!(transport.produced_indexes(), vec![1, 1]);
    }

    #[tokio::test]
    async fn reset_flag_marks_oldest_retained_entry() {
        let (client, _rx) = ActorClient::new(10);
        let transport = RecordingTransport::new();
        let mut consumers = new_consumers(&client, transport.clone(), 64);
        let mut log = committed_log(5);
        log.compact(Index::new(3));

        consumers.open(key("a", "x"), Index::new(4), &log);
        consumers.reset(&key("a", "x"), Index::new(1), &log);

        let flags: Vec<_> = transport
            .produced()
            .into_iter()
            .map(|p| (p.request.record.index.as_u64(), p.request.reset))
            .collect();
        assert_eq!(flags, vec![(4, false), (5, false), (3, true), (4, false), (5, false)]);
    }

    #[tokio::test]
    async fn read_failure_schedules_another_drain() {
        let (client, rx) = ActorClient::new(10);
        let mut actor = TestUtilActor::new(rx);
        let transport = RecordingTransport::new();
        let mut consumers = new_consumers(&client, transport.clone(), 64);
        let (faulty_log, _fail_appends) = FaultyLog::new();
        let fail_reads = faulty_log.fail_reads();
        let mut log = PartitionLog::new(test_utils::logger(), faulty_log).unwrap();
        for i in 1..=2 {
            log.append(LogEntry {
                term: Term::new(1),
                timestamp: i,
                value: Bytes::from_static(b"v"),
            })
            .unwrap();
        }
        log.commit_all();

        fail_reads.store(true, Ordering::SeqCst);
        consumers.open(key("a", "x"), Index::new(1), &log);
        assert!(transport.produced().is_empty());

        fail_reads.store(false, Ordering::SeqCst);
        let tick = actor.recv_drain_tick().await;
        consumers.handle_drain_tick(tick, &log);
        assert_eq!(transport.produced_indexes(), vec![1, 2]);
        actor.assert_no_event().await;
    }
}
