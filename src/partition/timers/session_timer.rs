use crate::partition::timers::sync::{stop_signal, StopCheck, Stopper};
use crate::partition::timers::time::{Clock, RealClock};
use crate::session::SessionRegistry;
use tokio::time::{Duration, Instant};

/// SessionExpiryTimerHandle is owned by the Leader role. The timer task sweeps idle sessions out of
/// the registry directly, without going through the partition actor.
pub(crate) struct SessionExpiryTimerHandle {
    _to_drop: Stopper,
}

struct SessionExpiryTimerTask<C: Clock> {
    logger: slog::Logger,
    registry: SessionRegistry,
    check_interval: Duration,
    next_check_time: Instant,
    clock: C,
    stop_check: StopCheck,
}

impl SessionExpiryTimerHandle {
    pub(crate) fn spawn_timer_task(logger: slog::Logger, registry: SessionRegistry, check_interval: Duration) -> Self {
        let (task, handle) = SessionExpiryTimerTask::new(logger, registry, check_interval, RealClock);
        tokio::task::spawn(task.run());

        handle
    }
}

impl<C: Clock + Send + Sync + 'static> SessionExpiryTimerTask<C> {
    fn new(
        logger: slog::Logger,
        registry: SessionRegistry,
        check_interval: Duration,
        clock: C,
    ) -> (Self, SessionExpiryTimerHandle) {
        let (stopper, stop_check) = stop_signal();

        // Deadline is fixed here, not when the task first runs, so the first sweep can't drift.
        let next_check_time = clock.now() + check_interval;
        let task = SessionExpiryTimerTask {
            logger,
            registry,
            check_interval,
            next_check_time,
            clock,
            stop_check,
        };

        (task, SessionExpiryTimerHandle { _to_drop: stopper })
    }

    async fn run(mut self) {
        loop {
            self.clock.sleep_until(self.next_check_time).await;
            if self.stop_check.should_stop() {
                return;
            }

            let expired = self.registry.expire(self.clock.now());
            if !expired.is_empty() {
                slog::info!(self.logger, "Expired idle sessions: {:?}", expired);
            }

            self.next_check_time += self.check_interval;
        }
    }
}
