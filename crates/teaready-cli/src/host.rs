//! Terminal implementations of the platform contracts.
//!
//! Wakeups and session keys live in the SQLite file under the data
//! directory; app timers and the "vibration motor" only exist while the
//! process runs.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use teaready_core::storage::database_path;
use teaready_core::{
    AppTimer, Config, Database, Event, SessionMachine, TeaCatalog, TimerHandle, Vibrator,
    WakeupQueue,
};

pub type CliMachine =
    SessionMachine<WakeupQueue, Database, TeaCatalog, TimerQueue, TerminalBell>;

/// App timers polled by the watch loop.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next: u64,
    deadlines: BTreeMap<TimerHandle, Instant>,
}

impl TimerQueue {
    /// Disarm and return every timer whose deadline has passed, oldest
    /// deadline first.
    pub fn take_expired(&mut self, now: Instant) -> Vec<TimerHandle> {
        let mut expired: Vec<(TimerHandle, Instant)> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(h, at)| (*h, *at))
            .collect();
        expired.sort_by_key(|(_, at)| *at);
        for (handle, _) in &expired {
            self.deadlines.remove(handle);
        }
        expired.into_iter().map(|(h, _)| h).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

impl AppTimer for TimerQueue {
    fn register(&mut self, after: Duration) -> TimerHandle {
        self.next += 1;
        let handle = TimerHandle(self.next);
        self.deadlines.insert(handle, Instant::now() + after);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.deadlines.remove(&handle);
    }
}

/// Rings the terminal bell on stderr so stdout stays machine-readable.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl Vibrator for TerminalBell {
    fn pulse(&mut self) {
        let mut err = std::io::stderr();
        let _ = err.write_all(b"\x07");
        let _ = err.flush();
    }
}

/// Build the machine from config and storage, recovering any persisted
/// session.
pub fn open_machine() -> Result<(CliMachine, Vec<Event>), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let path = database_path()?;
    let (machine, events) = SessionMachine::restore(
        WakeupQueue::open(&path)?,
        Database::open(&path)?,
        config.catalog(),
        TimerQueue::default(),
        TerminalBell,
        config.session_settings(),
        Utc::now(),
    )?;
    Ok((machine, events))
}

/// Hand every wakeup due at `now` to the machine.
pub fn deliver_due(
    machine: &mut CliMachine,
    now: DateTime<Utc>,
) -> Result<Vec<Event>, Box<dyn std::error::Error>> {
    let mut events = Vec::new();
    for (id, reason) in machine.scheduler_mut().take_due(now)? {
        tracing::debug!(wakeup = id.0, ?reason, "delivering wakeup");
        events.extend(machine.on_deferred_event_fired(reason, now)?);
    }
    Ok(events)
}

pub fn print_event(event: &Event) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}
