use crate::commitlog::{Index, Log};
use crate::partition::{
    AppendError, AppendInput, AppendOutput, BackupError, BackupInput, BackupOutput, BackupReplyFromPeer,
    BackupTimerTick, ConsumeError, ConsumeInput, DrainConsumerTick, LogEntry, Partition, ReplicationComplete,
    ResetError, ResetInput, RoleTransition, SessionError, TransitionError,
};
use crate::session::{OpenSessionRequest, Session, SessionId};
use std::error::Error;
use std::fmt::Debug;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};

// Every event is handled to completion before the next one is looked at. Anything that has to
// wait (RPCs, replication futures, consumer drain continuations) runs on another task and comes
// back as a new event.
#[derive(Debug)]
pub(crate) enum Event {
    // Leader: Append locally, then hand to the replication strategy. Callback answered when the
    //         replication future settles.
    // Others: Not leader.
    Append(AppendInput, Callback<AppendOutput, AppendError>),

    // Leader: Register (or replace) the consumer and start draining.
    // Others: Not leader.
    Consume(ConsumeInput, Callback<(), ConsumeError>),

    // Leader: Reposition an existing consumer. Unknown consumer is a no-op.
    // Others: Not leader.
    Reset(ResetInput, Callback<(), ResetError>),

    // Leader only.
    OpenSession(OpenSessionRequest, Callback<Session, SessionError>),
    CloseSession(SessionId, Callback<bool, SessionError>),
    KeepAlive(SessionId, Callback<bool, SessionError>),

    // Follower/Backup: Apply operations to local log.
    // Leader/Candidate: Not a backup.
    Backup(BackupInput, Callback<BackupOutput, BackupError>),

    // Leader: Update per-backup queue, maybe settle replication futures.
    // Others: discard
    BackupReplyFromPeer(BackupReplyFromPeer),

    // Leader: Send next batch (or heartbeat) to the backup.
    // Others: discard
    BackupTimer(BackupTimerTick),

    // Leader: Advance commit index and wake consumers. Always answers the append callback.
    ReplicationComplete(ReplicationComplete),

    // Leader: Continue a consumer's drain loop.
    // Others: discard
    DrainConsumer(DrainConsumerTick),

    // Any role.
    Compact(Index, Callback<Index, ActorExited>),
    Transition(RoleTransition, Callback<(), TransitionError>),

    // Tears down the role and ends the event loop.
    Close(Callback<(), ActorExited>),
}

#[derive(Debug)]
pub(crate) struct Callback<O: Debug, E: Error>(oneshot::Sender<Result<O, E>>);

impl<O: Debug, E: Error> Callback<O, E> {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Result<O, E>>) {
        let (tx, rx) = oneshot::channel();
        (Callback(tx), rx)
    }

    pub(crate) fn send(self, message: Result<O, E>) {
        let _ = self.0.send(message);
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Partition actor has exited")]
pub(crate) struct ActorExited;

/// ActorClient is the strong handle to a partition actor. The actor runs as long as at least one
/// ActorClient exists (or until it's closed).
#[derive(Clone)]
pub(crate) struct ActorClient {
    sender: Arc<mpsc::Sender<Event>>,
}

/// WeakActorClient is held by everything the partition itself spawns (timers, RPC tasks, the RPC
/// server) so those never keep the partition alive.
#[derive(Clone)]
pub(crate) struct WeakActorClient {
    sender: Weak<mpsc::Sender<Event>>,
}

impl ActorClient {
    pub(crate) fn new(buffer_size: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        let client = ActorClient { sender: Arc::new(tx) };

        (client, rx)
    }

    pub(crate) fn weak(&self) -> WeakActorClient {
        WeakActorClient {
            sender: Arc::downgrade(&self.sender),
        }
    }

    pub(crate) async fn append(&self, input: AppendInput) -> Result<AppendOutput, AppendError> {
        request(&self.sender, |callback| Event::Append(input, callback)).await
    }

    pub(crate) async fn consume(&self, input: ConsumeInput) -> Result<(), ConsumeError> {
        request(&self.sender, |callback| Event::Consume(input, callback)).await
    }

    pub(crate) async fn reset(&self, input: ResetInput) -> Result<(), ResetError> {
        request(&self.sender, |callback| Event::Reset(input, callback)).await
    }

    pub(crate) async fn open_session(&self, input: OpenSessionRequest) -> Result<Session, SessionError> {
        request(&self.sender, |callback| Event::OpenSession(input, callback)).await
    }

    pub(crate) async fn close_session(&self, session_id: SessionId) -> Result<bool, SessionError> {
        request(&self.sender, |callback| Event::CloseSession(session_id, callback)).await
    }

    pub(crate) async fn keep_alive(&self, session_id: SessionId) -> Result<bool, SessionError> {
        request(&self.sender, |callback| Event::KeepAlive(session_id, callback)).await
    }

    pub(crate) async fn compact(&self, index: Index) -> Result<Index, ActorExited> {
        request(&self.sender, |callback| Event::Compact(index, callback)).await
    }

    pub(crate) async fn transition(&self, transition: RoleTransition) -> Result<(), TransitionError> {
        request(&self.sender, |callback| Event::Transition(transition, callback)).await
    }

    pub(crate) async fn close(&self) -> Result<(), ActorExited> {
        request(&self.sender, Event::Close).await
    }
}

impl WeakActorClient {
    pub(crate) async fn backup(&self, input: BackupInput) -> Result<BackupOutput, BackupError> {
        let sender = self.sender.upgrade().ok_or(ActorExited)?;
        request(&sender, |callback| Event::Backup(input, callback)).await
    }

    pub(crate) async fn backup_reply_from_peer(&self, reply: BackupReplyFromPeer) -> Result<(), ActorExited> {
        self.notify(Event::BackupReplyFromPeer(reply)).await
    }

    pub(crate) async fn backup_timer(&self, tick: BackupTimerTick) -> Result<(), ActorExited> {
        self.notify(Event::BackupTimer(tick)).await
    }

    // If the actor is gone, the callback inside is dropped and the appender sees ActorExited.
    pub(crate) async fn replication_complete(&self, complete: ReplicationComplete) -> Result<(), ActorExited> {
        self.notify(Event::ReplicationComplete(complete)).await
    }

    pub(crate) async fn drain_consumer(&self, tick: DrainConsumerTick) -> Result<(), ActorExited> {
        self.notify(Event::DrainConsumer(tick)).await
    }

    async fn notify(&self, event: Event) -> Result<(), ActorExited> {
        let sender = self.sender.upgrade().ok_or(ActorExited)?;
        sender.send(event).await.map_err(|_| ActorExited)
    }
}

async fn request<O, E, F>(sender: &mpsc::Sender<Event>, to_event: F) -> Result<O, E>
where
    O: Debug,
    E: Error + From<ActorExited>,
    F: FnOnce(Callback<O, E>) -> Event,
{
    let (callback, rx) = Callback::channel();
    sender.send(to_event(callback)).await.map_err(|_| E::from(ActorExited))?;

    match rx.await {
        Ok(result) => result,
        // Actor dropped the callback, which only happens when it exits mid-request.
        Err(_) => Err(E::from(ActorExited)),
    }
}

/// PartitionActor is partition logic in actor model.
pub(crate) struct PartitionActor<L: Log<LogEntry>> {
    logger: slog::Logger,
    receiver: mpsc::Receiver<Event>,
    partition: Partition<L>,
}

enum EventLoopControl {
    Continue,
    Exit,
}

impl<L: Log<LogEntry> + Send + 'static> PartitionActor<L> {
    pub(crate) fn new(logger: slog::Logger, receiver: mpsc::Receiver<Event>, partition: Partition<L>) -> Self {
        PartitionActor {
            logger,
            receiver,
            partition,
        }
    }

    pub(crate) async fn run_event_loop(mut self) {
        while let Some(event) = self.receiver.recv().await {
            if let EventLoopControl::Exit = self.handle_event(event) {
                break;
            }
        }

        slog::info!(self.logger, "Partition event loop has exited");
    }

    // This must NOT be async. Any long running work must be spawned on another task
    // and come back as another event to this actor.
    fn handle_event(&mut self, event: Event) -> EventLoopControl {
        match event {
            Event::Append(input, callback) => {
                self.partition.handle_append(input, callback);
            }
            Event::Consume(input, callback) => {
                let result = self.partition.handle_consume(input);
                callback.send(result);
            }
            Event::Reset(input, callback) => {
                let result = self.partition.handle_reset(input);
                callback.send(result);
            }
            Event::OpenSession(input, callback) => {
                let result = self.partition.handle_open_session(input);
                callback.send(result);
            }
            Event::CloseSession(session_id, callback) => {
                let result = self.partition.handle_close_session(session_id);
                callback.send(result);
            }
            Event::KeepAlive(session_id, callback) => {
                let result = self.partition.handle_keep_alive(session_id);
                callback.send(result);
            }
            Event::Backup(input, callback) => {
                let result = self.partition.handle_backup(input);
                callback.send(result);
            }
            Event::BackupReplyFromPeer(reply) => {
                self.partition.handle_backup_reply_from_peer(reply);
            }
            Event::BackupTimer(tick) => {
                self.partition.handle_backup_timer(tick);
            }
            Event::ReplicationComplete(complete) => {
                self.partition.handle_replication_complete(complete);
            }
            Event::DrainConsumer(tick) => {
                self.partition.handle_drain_consumer(tick);
            }
            Event::Compact(index, callback) => {
                let first_index = self.partition.handle_compact(index);
                callback.send(Ok(first_index));
            }
            Event::Transition(transition, callback) => {
                let result = self.partition.handle_transition(transition);
                callback.send(result);
            }
            Event::Close(callback) => {
                self.partition.handle_close();
                callback.send(Ok(()));
                return EventLoopControl::Exit;
            }
        }

        EventLoopControl::Continue
    }
}
