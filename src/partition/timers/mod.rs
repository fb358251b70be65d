mod backup_timer;
mod session_timer;
mod sync;
mod time;

pub(crate) use backup_timer::BackupTimerHandle;
pub(crate) use session_timer::SessionExpiryTimerHandle;
#[cfg(test)]
pub(crate) use time::mocked_clock;
