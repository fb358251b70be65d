use crate::partition::replication::ReplicationError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// ReplicationFuture settles once the replication strategy is done with an entry. Some settle
/// immediately; the leader checks for that with `take_ready()` before spawning a task to wait.
pub(crate) struct ReplicationFuture {
    inner: Inner,
}

enum Inner {
    Ready(Option<Result<(), ReplicationError>>),
    Waiting(oneshot::Receiver<Result<(), ReplicationError>>),
}

impl ReplicationFuture {
    pub(super) fn ready(result: Result<(), ReplicationError>) -> Self {
        ReplicationFuture {
            inner: Inner::Ready(Some(result)),
        }
    }

    pub(super) fn waiting() -> (ReplicationFutureSettler, Self) {
        let (tx, rx) = oneshot::channel();
        let future = ReplicationFuture {
            inner: Inner::Waiting(rx),
        };

        (ReplicationFutureSettler { tx }, future)
    }

    pub(crate) fn take_ready(&mut self) -> Option<Result<(), ReplicationError>> {
        match &mut self.inner {
            Inner::Ready(result) => result.take(),
            Inner::Waiting(_) => None,
        }
    }
}

impl Future for ReplicationFuture {
    type Output = Result<(), ReplicationError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            Inner::Ready(result) => Poll::Ready(result.take().unwrap_or(Err(ReplicationError::Closed))),
            Inner::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                // Replicator was dropped without settling us.
                Poll::Ready(Err(_)) => Poll::Ready(Err(ReplicationError::Closed)),
            },
        }
    }
}

/// The replicator's side of a waiting ReplicationFuture.
pub(super) struct ReplicationFutureSettler {
    tx: oneshot::Sender<Result<(), ReplicationError>>,
}

impl ReplicationFutureSettler {
    pub(super) fn settle(self, result: Result<(), ReplicationError>) {
        let _ = self.tx.send(result);
    }
}
