use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::AlertMode;
use crate::session::{Phase, WakeReason};

/// Every state change in the session machine produces an Event.
/// Hosts print, log or render them; nothing inside the core consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionStarted {
        tea_index: usize,
        tea_name: String,
        duration_secs: u16,
        ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    SteepingFinished {
        tea_index: usize,
        at: DateTime<Utc>,
    },
    CoolingStarted {
        tea_index: usize,
        duration_secs: u16,
        ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    TeaReady {
        tea_index: usize,
        tea_name: String,
        at: DateTime<Utc>,
    },
    SessionCancelled {
        phase: Phase,
        at: DateTime<Utc>,
    },
    SessionDismissed {
        at: DateTime<Utc>,
    },
    /// Restored from storage with its wakeup still pending (or already Ready).
    SessionResumed {
        phase: Phase,
        tea_index: usize,
        at: DateTime<Utc>,
    },
    /// A wakeup fired while the process was not running and is being
    /// replayed now.
    MissedWakeupReplayed {
        reason: WakeReason,
        at: DateTime<Utc>,
    },
    /// Persisted state was unusable and has been discarded.
    SessionPurged {
        fault: SessionFault,
        at: DateTime<Utc>,
    },
    AlertStarted {
        mode: AlertMode,
        at: DateTime<Utc>,
    },
    AlertPulsed {
        count: u8,
        at: DateTime<Utc>,
    },
    AlertFinished {
        pulses: u8,
        at: DateTime<Utc>,
    },
    /// The final alert ran out; the host should exit.
    CloseRequested {
        at: DateTime<Utc>,
    },
}

/// Why persisted session state was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFault {
    /// The scheduler no longer knows the session's wakeup.
    StaleSession,
    /// Keys were missing, out of range, or contradicted each other.
    InconsistentPersistence,
}
