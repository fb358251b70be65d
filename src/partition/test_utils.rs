use crate::actor::Event;
use crate::commitlog::{InMemoryLog, Index, Log};
use crate::partition::{
    BackupInput, BackupOperation, BackupOutput, BackupReplyFromPeer, BackupReplyFromPeerError, BackupTimerTick,
    DrainConsumerTick, LogEntry, MemberId, RecordsRequest, ReplicationComplete, Term,
};
use crate::transport::Transport;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Debug;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub(crate) fn logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

pub(crate) fn operation(index: u64, term: u64) -> BackupOperation {
    BackupOperation {
        index: Index::new(index),
        term: Term::new(term),
        timestamp: index as i64,
        value: Bytes::from(format!("value-{}", index)),
    }
}

struct TestUtilReceiver<T> {
    rx: mpsc::Receiver<T>,
}

impl<T: Debug> TestUtilReceiver<T> {
    fn new(rx: mpsc::Receiver<T>) -> Self {
        TestUtilReceiver { rx }
    }

    async fn recv(&mut self) -> T {
        self.recv_with_sanity_timeout().await.expect("Expected value")
    }

    async fn recv_with_sanity_timeout(&mut self) -> Option<T> {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("Unexpected timeout")
    }

    async fn recv_assert_timeout(&mut self, timeout: Duration) {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .expect_err("Expected timeout");
    }
}

/// TestUtilActor stands in for the partition actor and lets a test look at what was sent to it.
pub(crate) struct TestUtilActor {
    receiver: TestUtilReceiver<Event>,
    timeout: Duration,
}

impl TestUtilActor {
    pub(crate) fn new(actor_queue_rx: mpsc::Receiver<Event>) -> Self {
        TestUtilActor {
            receiver: TestUtilReceiver::new(actor_queue_rx),
            timeout: Duration::from_millis(10),
        }
    }

    pub(crate) async fn assert_backup_timer_event(&mut self, expected_tick: BackupTimerTick) {
        if let Event::BackupTimer(tick) = self.receiver.recv().await {
            assert_eq!(tick, expected_tick);
        } else {
            panic!("Unexpected event");
        }
    }

    pub(crate) async fn assert_no_event(&mut self) {
        self.receiver.recv_assert_timeout(self.timeout).await;
    }

    /// Timer ticks that show up first are skipped.
    pub(crate) async fn recv_backup_reply(&mut self) -> BackupReplyFromPeer {
        loop {
            match self.receiver.recv().await {
                Event::BackupReplyFromPeer(reply) => return reply,
                Event::BackupTimer(_) => continue,
                other => panic!("Unexpected event: {:?}", other),
            }
        }
    }

    /// Backup traffic that shows up first is skipped.
    pub(crate) async fn recv_replication_complete(&mut self) -> ReplicationComplete {
        loop {
            match self.receiver.recv().await {
                Event::ReplicationComplete(complete) => return complete,
                Event::BackupTimer(_) | Event::BackupReplyFromPeer(_) => continue,
                other => panic!("Unexpected event: {:?}", other),
            }
        }
    }

    pub(crate) async fn recv_drain_tick(&mut self) -> DrainConsumerTick {
        match self.receiver.recv().await {
            Event::DrainConsumer(tick) => tick,
            other => panic!("Unexpected event: {:?}", other),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SentBackup {
    pub(crate) to: MemberId,
    pub(crate) commit_index: Option<Index>,
    pub(crate) prev_entry: Option<(Index, Term)>,
    pub(crate) indexes: Vec<Index>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ProducedRecord {
    pub(crate) to: MemberId,
    pub(crate) subject: String,
    pub(crate) request: RecordsRequest,
}

/// RecordingTransport remembers everything sent through it. Backups succeed unless told otherwise.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    backups: Mutex<Vec<SentBackup>>,
    backup_failures: Mutex<HashMap<MemberId, BackupReplyFromPeerError>>,
    produced: Mutex<Vec<ProducedRecord>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(RecordingTransport::default())
    }

    pub(crate) fn fail_backups_to(&self, member_id: MemberId, error: BackupReplyFromPeerError) {
        self.backup_failures.lock().unwrap().insert(member_id, error);
    }

    pub(crate) fn backup_requests(&self) -> Vec<SentBackup> {
        self.backups.lock().unwrap().clone()
    }

    pub(crate) fn backups_to(&self, member_id: &MemberId) -> Vec<Vec<Index>> {
        self.backup_requests()
            .into_iter()
            .filter(|sent| &sent.to == member_id)
            .map(|sent| sent.indexes)
            .collect()
    }

    pub(crate) fn produced(&self) -> Vec<ProducedRecord> {
        self.produced.lock().unwrap().clone()
    }

    pub(crate) fn produced_indexes(&self) -> Vec<u64> {
        self.produced()
            .into_iter()
            .map(|produced| produced.request.record.index.as_u64())
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn backup(&self, to: &MemberId, request: BackupInput) -> Result<BackupOutput, BackupReplyFromPeerError> {
        let indexes: Vec<_> = request.operations.iter().map(|operation| operation.index).collect();
        let last_index = indexes.last().copied();
        self.backups.lock().unwrap().push(SentBackup {
            to: to.clone(),
            commit_index: request.commit_index,
            prev_entry: request.prev_entry,
            indexes,
        });

        match self.backup_failures.lock().unwrap().get(to) {
            Some(error) => Err(error.clone()),
            None => Ok(BackupOutput { last_index }),
        }
    }

    fn produce(&self, to: &MemberId, subject: &str, request: RecordsRequest) {
        self.produced.lock().unwrap().push(ProducedRecord {
            to: to.clone(),
            subject: subject.to_string(),
            request,
        });
    }
}

/// FaultyLog is an in-memory log whose appends or reads can be made to fail.
pub(crate) struct FaultyLog {
    log: InMemoryLog<LogEntry>,
    fail_appends: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

impl FaultyLog {
    pub(crate) fn new() -> (Self, Arc<AtomicBool>) {
        let fail_appends = Arc::new(AtomicBool::new(false));
        let log = FaultyLog {
            log: InMemoryLog::create(logger()).unwrap(),
            fail_appends: fail_appends.clone(),
            fail_reads: Arc::new(AtomicBool::new(false)),
        };

        (log, fail_appends)
    }

    pub(crate) fn fail_reads(&self) -> Arc<AtomicBool> {
        self.fail_reads.clone()
    }
}

impl Log<LogEntry> for FaultyLog {
    fn append(&mut self, entry: LogEntry) -> Result<Index, io::Error> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        }
        self.log.append(entry)
    }

    fn read(&self, index: Index) -> Result<Option<LogEntry>, io::Error> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        }
        self.log.read(index)
    }

    fn truncate(&mut self, index: Index) {
        self.log.truncate(index)
    }

    fn compact(&mut self, index: Index) {
        self.log.compact(index)
    }

    fn first_index(&self) -> Index {
        self.log.first_index()
    }

    fn next_index(&self) -> Index {
        self.log.next_index()
    }
}
