#[cfg(test)]
use tokio::sync::watch;
#[cfg(test)]
use tokio::time::Duration;
use tokio::time::Instant;

#[async_trait::async_trait]
pub(crate) trait Clock: Clone {
    fn now(&self) -> Instant;
    async fn sleep_until(&mut self, deadline: Instant);
}

#[derive(Copy, Clone)]
pub(crate) struct RealClock;

#[async_trait::async_trait]
impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&mut self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}

/// A clock that only moves when the paired controller says so.
#[cfg(test)]
pub(crate) fn mocked_clock() -> (MockClock, MockClockController) {
    let now = Instant::now();
    let (tx, rx) = watch::channel(now);
    let clock = MockClock { current_time: rx };
    let controller = MockClockController {
        current_time: tx,
        time_of_instantiation: now,
    };

    (clock, controller)
}

#[cfg(test)]
#[derive(Clone)]
pub(crate) struct MockClock {
    current_time: watch::Receiver<Instant>,
}

#[cfg(test)]
#[async_trait::async_trait]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current_time.borrow()
    }

    async fn sleep_until(&mut self, deadline: Instant) {
        while *self.current_time.borrow() < deadline {
            if self.current_time.changed().await.is_err() {
                // Controller is gone, time will never move again.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
pub(crate) struct MockClockController {
    current_time: watch::Sender<Instant>,
    time_of_instantiation: Instant,
}

#[cfg(test)]
impl MockClockController {
    pub(crate) fn current_time(&self) -> Instant {
        *self.current_time.borrow()
    }

    pub(crate) fn elapsed_time(&self) -> Duration {
        self.current_time() - self.time_of_instantiation
    }

    /// Advance in steps smaller than what you want to observe. A sleeper only promises to wake at
    /// or after its deadline, so one big leap wakes it once, late.
    pub(crate) fn advance(&mut self, duration: Duration) {
        let new_now = self.current_time() + duration;
        let _ = self.current_time.send(new_now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn mock_clock_wakes_sleepers_only_when_advanced() {
        let tick = Duration::from_millis(500);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let (mut clock, mut controller) = mocked_clock();
        let start = controller.current_time();

        tokio::spawn(async move {
            let mut next_wake = start;
            loop {
                next_wake += tick;
                clock.sleep_until(next_wake).await;
                if tx.send(()).is_err() {
                    return;
                }
            }
        });

        // Half a tick in, nobody wakes.
        controller.advance(tick / 2);
        tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .expect_err("Expected timeout");

        // Crossing one deadline wakes the sleeper once.
        controller.advance(tick);
        rx.recv().await.unwrap();
        tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .expect_err("Expected timeout");

        // Crossing two deadlines at once is observed as two wakes, because the task's deadline is
        // computed from the previous deadline, not from `now`.
        controller.advance(tick * 2);
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        assert_eq!(controller.elapsed_time(), tick * 7 / 2);
    }
}
