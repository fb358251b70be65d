use crate::actor::WeakActorClient;
use crate::partition::partition_api::BackupTimerTick;
use crate::partition::timers::sync::SharedOption;
use crate::partition::timers::time::{Clock, RealClock};
use crate::partition::{MemberId, Term};
use rand::Rng;
use std::sync::{Arc, Weak};
use tokio::time::{Duration, Instant};

/// BackupTimerHandle is held by a leader's per-backup queue. While it's alive, the timer task
/// nudges the actor to send a (possibly empty) batch to the backup whenever the backup hasn't been
/// contacted for a heartbeat interval.
pub(crate) struct BackupTimerHandle<C: Clock = RealClock> {
    shared: Arc<Shared<C>>,
}

struct Shared<C: Clock> {
    heartbeat_interval: Duration,
    next_tick_time: SharedOption<Instant>,
    clock: C,
}

struct BackupTimerTask<C: Clock> {
    weak_shared: Weak<Shared<C>>,
    next_tick_time: SharedOption<Instant>,
    actor_client: WeakActorClient,
    event: BackupTimerTick,
    clock: C,
}

impl BackupTimerHandle {
    pub(crate) fn spawn_timer_task(
        heartbeat_interval: Duration,
        actor_client: WeakActorClient,
        peer_id: MemberId,
        term: Term,
    ) -> Self {
        let (task, handle) = BackupTimerTask::new(heartbeat_interval, actor_client, peer_id, term, RealClock);
        tokio::task::spawn(task.run());

        handle
    }
}

impl<C: Clock + Send + Sync + 'static> BackupTimerHandle<C> {
    /// We just contacted the backup, so push the next tick a full interval out.
    pub(crate) fn reset_heartbeat_timer(&self) {
        self.shared.schedule_after(self.shared.heartbeat_interval);
    }

    /// The last request to the backup failed. Retry somewhere between one and two intervals from
    /// now, so several leaders' retries don't line up.
    pub(crate) fn delay_after_failure(&self) {
        let interval = self.shared.heartbeat_interval;
        let delay = rand::thread_rng().gen_range(interval..=interval * 2);
        self.shared.schedule_after(delay);
    }
}

impl<C: Clock> Shared<C> {
    fn schedule_after(&self, delay: Duration) {
        self.next_tick_time.replace(self.clock.now() + delay);
    }
}

impl<C: Clock> BackupTimerTask<C> {
    fn new(
        heartbeat_interval: Duration,
        actor_client: WeakActorClient,
        peer_id: MemberId,
        term: Term,
        clock: C,
    ) -> (Self, BackupTimerHandle<C>) {
        let shared_opt = SharedOption::new();
        let shared = Arc::new(Shared {
            heartbeat_interval,
            next_tick_time: shared_opt.clone(),
            clock: clock.clone(),
        });

        let task = BackupTimerTask {
            weak_shared: Arc::downgrade(&shared),
            next_tick_time: shared_opt,
            actor_client,
            event: BackupTimerTick { peer_id, term },
            clock,
        };
        let handle = BackupTimerHandle { shared };

        (task, handle)
    }

    async fn run(mut self) {
        // The first iteration has an empty SharedOption, so it ticks immediately. A new leader
        // wants to reach each backup ASAP to tell it who's in charge.
        loop {
            match self.next_tick_time.take() {
                Some(wake_time) => {
                    // Someone rescheduled us; sleep until then and look again.
                    self.clock.sleep_until(wake_time).await;
                }
                None => {
                    // Nothing was sent to this backup since we went to sleep. Tick, unless the
                    // handle is gone, which means the leader role that owned it was torn down.
                    match self.weak_shared.upgrade() {
                        Some(shared) => {
                            let _ = self.actor_client.backup_timer(self.event.clone()).await;
                            shared.schedule_after(shared.heartbeat_interval);
                        }
                        None => return,
                    }
                }
            }
        }
    }
}
