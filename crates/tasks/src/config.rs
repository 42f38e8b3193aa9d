use std::time::Duration;

/// Default time a cancelled task gets to acknowledge cancellation.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(30);

/// Task manager policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskManagerConfig {
    /// How long a cancelled body may keep running before it is aborted.
    /// `None` waits indefinitely.
    pub cancel_grace: Option<Duration>,
}

impl TaskManagerConfig {
    /// Build from a grace period in seconds, where `0` disables the
    /// timeout.
    pub fn from_grace_secs(secs: u64) -> Self {
        Self {
            cancel_grace: (secs > 0).then(|| Duration::from_secs(secs)),
        }
    }
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            cancel_grace: Some(DEFAULT_CANCEL_GRACE),
        }
    }
}
