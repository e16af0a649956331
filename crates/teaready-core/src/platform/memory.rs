//! In-memory platform adapters.
//!
//! Used by tests and by hosts that embed the core without durable storage.
//! The scheduler can simulate events firing while the process is down, which
//! is what the recovery path needs to be exercised against.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::traits::{
    AppTimer, KeyValueStore, TimerHandle, Vibrator, WakeupId, WakeupScheduler, WakeupStatus,
};
use crate::error::StorageError;
use crate::session::WakeReason;

/// Pebble-style per-app wakeup limit.
pub const DEFAULT_WAKEUP_CAPACITY: usize = 8;

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, i64>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.values.contains_key(key))
    }

    fn read_int(&self, key: &str) -> Result<Option<i64>, StorageError> {
        Ok(self.values.get(key).copied())
    }

    fn write_int(&mut self, key: &str, value: i64) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::QueryFailed(format!("write to '{key}' rejected")));
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.values.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    at: DateTime<Utc>,
    reason: WakeReason,
}

#[derive(Debug, Clone)]
pub struct MemoryScheduler {
    next_id: i32,
    capacity: usize,
    pending: BTreeMap<WakeupId, Entry>,
    /// Fired while "offline", waiting to be reported by `query`.
    fired: BTreeMap<WakeupId, Entry>,
}

impl Default for MemoryScheduler {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_WAKEUP_CAPACITY)
    }
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_id: 1,
            capacity,
            pending: BTreeMap::new(),
            fired: BTreeMap::new(),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> Vec<(WakeupId, DateTime<Utc>, WakeReason)> {
        self.pending
            .iter()
            .map(|(id, e)| (*id, e.at, e.reason))
            .collect()
    }

    /// Remove and return every pending event due at `now`, earliest first.
    /// This is live delivery: the caller must hand each one to the session
    /// machine.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<(WakeupId, WakeReason)> {
        let mut due: Vec<_> = self
            .pending
            .iter()
            .filter(|(_, e)| e.at <= now)
            .map(|(id, e)| (*id, *e))
            .collect();
        due.sort_by_key(|(_, e)| e.at);
        for (id, _) in &due {
            self.pending.remove(id);
        }
        due.into_iter().map(|(id, e)| (id, e.reason)).collect()
    }

    /// Fire every event due at `now` without delivering it, as if the
    /// process had not been running.
    pub fn fire_offline(&mut self, now: DateTime<Utc>) -> usize {
        let due: Vec<WakeupId> = self
            .pending
            .iter()
            .filter(|(_, e)| e.at <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &due {
            if let Some(entry) = self.pending.remove(id) {
                self.fired.insert(*id, entry);
            }
        }
        due.len()
    }

    /// Forget an event entirely, as an external reset would.
    pub fn invalidate(&mut self, id: WakeupId) {
        self.pending.remove(&id);
        self.fired.remove(&id);
    }
}

impl WakeupScheduler for MemoryScheduler {
    fn schedule(&mut self, at: DateTime<Utc>, reason: WakeReason) -> WakeupId {
        if self.pending.len() >= self.capacity {
            return WakeupId(-1);
        }
        let id = WakeupId(self.next_id);
        self.next_id += 1;
        self.pending.insert(id, Entry { at, reason });
        id
    }

    fn query(&mut self, id: WakeupId) -> Result<WakeupStatus, StorageError> {
        if let Some(e) = self.pending.get(&id) {
            return Ok(WakeupStatus::Pending {
                at: e.at,
                reason: e.reason,
            });
        }
        Ok(match self.fired.remove(&id) {
            Some(e) => WakeupStatus::Fired { reason: e.reason },
            None => WakeupStatus::Unknown,
        })
    }

    fn cancel(&mut self, id: WakeupId) {
        self.pending.remove(&id);
        self.fired.remove(&id);
    }
}

/// App timers driven by hand: nothing fires until the test or host pops it.
#[derive(Debug, Default, Clone)]
pub struct ManualTimers {
    next: u64,
    armed: BTreeMap<TimerHandle, Duration>,
    history: Vec<Duration>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest still-armed timer, disarmed and returned.
    pub fn pop(&mut self) -> Option<(TimerHandle, Duration)> {
        let handle = *self.armed.keys().next()?;
        self.armed.remove(&handle).map(|d| (handle, d))
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Every delay ever registered, in order.
    pub fn history(&self) -> &[Duration] {
        &self.history
    }
}

impl AppTimer for ManualTimers {
    fn register(&mut self, after: Duration) -> TimerHandle {
        self.next += 1;
        let handle = TimerHandle(self.next);
        self.armed.insert(handle, after);
        self.history.push(after);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.armed.remove(&handle);
    }
}

#[derive(Debug, Default, Clone)]
pub struct CountingVibrator {
    pulses: u32,
}

impl CountingVibrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulses(&self) -> u32 {
        self.pulses
    }
}

impl Vibrator for CountingVibrator {
    fn pulse(&mut self) {
        self.pulses += 1;
    }
}
