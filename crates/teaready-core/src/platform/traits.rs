use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::session::WakeReason;

/// Handle for a deferred wakeup. Schedulers hand out positive ids; zero or
/// negative means the request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WakeupId(pub i32);

impl WakeupId {
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

/// What the scheduler knows about a wakeup id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupStatus {
    /// Still waiting to fire.
    Pending { at: DateTime<Utc>, reason: WakeReason },
    /// Fired without being delivered to a running process. Reporting this
    /// consumes the event: it will not be delivered again.
    Fired { reason: WakeReason },
    /// Never scheduled, cancelled, or already delivered.
    Unknown,
}

/// One-shot deferred wakeups that survive process restarts.
///
/// Implementations deliver each successfully scheduled event exactly once,
/// either through the host's live callback or through [`WakeupStatus::Fired`]
/// when queried after a relaunch.
pub trait WakeupScheduler {
    /// Request a wakeup at `at`. Returns an invalid id on refusal.
    fn schedule(&mut self, at: DateTime<Utc>, reason: WakeReason) -> WakeupId;

    fn query(&mut self, id: WakeupId) -> Result<WakeupStatus, StorageError>;

    /// Cancel a pending wakeup. Unknown ids are ignored.
    fn cancel(&mut self, id: WakeupId);
}

/// Durable integer key-value storage. No atomicity across keys.
pub trait KeyValueStore {
    fn exists(&self, key: &str) -> Result<bool, StorageError>;

    fn read_int(&self, key: &str) -> Result<Option<i64>, StorageError>;

    fn write_int(&mut self, key: &str, value: i64) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn delete(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Fire-and-forget vibration motor.
pub trait Vibrator {
    fn pulse(&mut self);
}

/// Handle for an in-process app timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerHandle(pub u64);

/// In-process one-shot timers (they die with the process).
///
/// The host calls back into the session machine with the handle once
/// `after` has elapsed.
pub trait AppTimer {
    fn register(&mut self, after: Duration) -> TimerHandle;

    /// Cancelling a fired or unknown handle is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}

