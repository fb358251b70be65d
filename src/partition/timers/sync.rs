//! Tiny sync primitives shared between a timer handle (owned by a role) and its timer task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub(super) struct SharedOption<T> {
    data: Arc<Mutex<Option<T>>>,
}

impl<T> SharedOption<T> {
    pub(super) fn new() -> Self {
        SharedOption {
            data: Arc::new(Mutex::new(None)),
        }
    }

    pub(super) fn replace(&self, new_data: T) {
        self.data
            .lock()
            .expect("SharedOption.replace() mutex guard poison")
            .replace(new_data);
    }

    pub(super) fn take(&self) -> Option<T> {
        self.data.lock().expect("SharedOption.take() mutex guard poison").take()
    }
}

/// Stopper flips the stop flag when dropped. The handle owns it, the task polls the flag.
pub(super) struct Stopper {
    stopped: Arc<AtomicBool>,
}

pub(super) struct StopCheck {
    stopped: Arc<AtomicBool>,
}

impl Drop for Stopper {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
    }
}

impl StopCheck {
    pub(super) fn should_stop(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

pub(super) fn stop_signal() -> (Stopper, StopCheck) {
    let stopped = Arc::new(AtomicBool::new(false));

    (
        Stopper {
            stopped: stopped.clone(),
        },
        StopCheck { stopped },
    )
}
