//! The persisted session and its key layout.
//!
//! The store has no multi-key transactions, so `session.phase` acts as the
//! commit marker: it is written last on save and deleted first on clear.
//! Any other combination of keys found on load is a torn write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::platform::{KeyValueStore, WakeupId};

pub const KEY_PHASE: &str = "session.phase";
pub const KEY_WAKEUP_ID: &str = "session.wakeup_id";
pub const KEY_SCHEDULED_AT: &str = "session.scheduled_at";
pub const KEY_DURATION: &str = "session.duration_secs";
pub const KEY_TEA: &str = "session.tea_index";

const DATA_KEYS: [&str; 4] = [KEY_WAKEUP_ID, KEY_SCHEDULED_AT, KEY_DURATION, KEY_TEA];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Steeping,
    Cooling,
    Ready,
}

impl Phase {
    fn code(self) -> i64 {
        match self {
            Phase::Steeping => 0,
            Phase::Cooling => 1,
            Phase::Ready => 2,
        }
    }

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Phase::Steeping),
            1 => Some(Phase::Cooling),
            2 => Some(Phase::Ready),
            _ => None,
        }
    }
}

/// The one live steeping session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub wakeup_id: Option<WakeupId>,
    /// When the current phase ends.
    pub scheduled_at: DateTime<Utc>,
    /// Length of the current phase, not of the whole session.
    pub duration_secs: u16,
    pub phase: Phase,
    pub tea_index: usize,
}

impl Session {
    /// Phase/wakeup invariant: waiting phases own exactly one wakeup,
    /// `Ready` owns none.
    pub fn is_consistent(&self) -> bool {
        match self.phase {
            Phase::Steeping | Phase::Cooling => {
                self.duration_secs > 0 && self.wakeup_id.is_some_and(WakeupId::is_valid)
            }
            Phase::Ready => self.wakeup_id.is_none(),
        }
    }
}

/// Result of reading the session keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded {
    Absent,
    Present(Session),
    /// Keys exist but do not form a valid session.
    Inconsistent,
}

pub fn save<K: KeyValueStore>(store: &mut K, session: &Session) -> Result<(), StorageError> {
    store.delete(KEY_PHASE)?;
    store.write_int(KEY_TEA, session.tea_index as i64)?;
    store.write_int(KEY_DURATION, i64::from(session.duration_secs))?;
    store.write_int(KEY_SCHEDULED_AT, session.scheduled_at.timestamp())?;
    match session.wakeup_id {
        Some(id) => store.write_int(KEY_WAKEUP_ID, i64::from(id.0))?,
        None => store.delete(KEY_WAKEUP_ID)?,
    }
    store.write_int(KEY_PHASE, session.phase.code())
}

pub fn clear<K: KeyValueStore>(store: &mut K) -> Result<(), StorageError> {
    store.delete(KEY_PHASE)?;
    for key in DATA_KEYS {
        store.delete(key)?;
    }
    Ok(())
}

/// Wakeup id left behind by a session that did not load, so it can be
/// released. Unreadable or invalid ids yield `None`.
pub fn stray_wakeup<K: KeyValueStore>(store: &K) -> Option<WakeupId> {
    let raw = store.read_int(KEY_WAKEUP_ID).ok()??;
    i32::try_from(raw)
        .ok()
        .map(WakeupId)
        .filter(|id| id.is_valid())
}

pub fn load<K: KeyValueStore>(store: &K) -> Result<Loaded, StorageError> {
    let phase = match read(store, KEY_PHASE)? {
        Read::Value(code) => Phase::from_code(code),
        Read::Missing => {
            for key in DATA_KEYS {
                if store.exists(key)? {
                    return Ok(Loaded::Inconsistent);
                }
            }
            return Ok(Loaded::Absent);
        }
        Read::Corrupt => None,
    };
    let Some(phase) = phase else {
        return Ok(Loaded::Inconsistent);
    };

    let (Read::Value(tea), Read::Value(duration), Read::Value(scheduled_at)) = (
        read(store, KEY_TEA)?,
        read(store, KEY_DURATION)?,
        read(store, KEY_SCHEDULED_AT)?,
    ) else {
        return Ok(Loaded::Inconsistent);
    };
    let wakeup_id = match read(store, KEY_WAKEUP_ID)? {
        Read::Value(raw) => match i32::try_from(raw) {
            Ok(id) => Some(WakeupId(id)),
            Err(_) => return Ok(Loaded::Inconsistent),
        },
        Read::Missing => None,
        Read::Corrupt => return Ok(Loaded::Inconsistent),
    };

    let (Ok(tea_index), Ok(duration_secs), Some(scheduled_at)) = (
        usize::try_from(tea),
        u16::try_from(duration),
        DateTime::<Utc>::from_timestamp(scheduled_at, 0),
    ) else {
        return Ok(Loaded::Inconsistent);
    };

    let session = Session {
        wakeup_id,
        scheduled_at,
        duration_secs,
        phase,
        tea_index,
    };
    Ok(if session.is_consistent() {
        Loaded::Present(session)
    } else {
        Loaded::Inconsistent
    })
}

enum Read {
    Value(i64),
    Missing,
    Corrupt,
}

fn read<K: KeyValueStore>(store: &K, key: &str) -> Result<Read, StorageError> {
    match store.read_int(key) {
        Ok(Some(v)) => Ok(Read::Value(v)),
        Ok(None) => Ok(Read::Missing),
        Err(StorageError::Corrupt { .. }) => Ok(Read::Corrupt),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryStore;

    fn steeping() -> Session {
        Session {
            wakeup_id: Some(WakeupId(3)),
            scheduled_at: DateTime::<Utc>::from_timestamp(1_700_000_240, 0).unwrap(),
            duration_secs: 240,
            phase: Phase::Steeping,
            tea_index: 0,
        }
    }

    #[test]
    fn save_then_load() {
        let mut store = MemoryStore::new();
        save(&mut store, &steeping()).unwrap();
        assert_eq!(load(&store).unwrap(), Loaded::Present(steeping()));
    }

    #[test]
    fn ready_drops_wakeup_key() {
        let mut store = MemoryStore::new();
        save(&mut store, &steeping()).unwrap();
        let ready = Session {
            wakeup_id: None,
            phase: Phase::Ready,
            ..steeping()
        };
        save(&mut store, &ready).unwrap();
        assert!(!store.exists(KEY_WAKEUP_ID).unwrap());
        assert_eq!(load(&store).unwrap(), Loaded::Present(ready));
    }

    #[test]
    fn clear_removes_everything() {
        let mut store = MemoryStore::new();
        save(&mut store, &steeping()).unwrap();
        clear(&mut store).unwrap();
        assert!(store.is_empty());
        assert_eq!(load(&store).unwrap(), Loaded::Absent);
    }

    #[test]
    fn missing_commit_marker_is_inconsistent() {
        let mut store = MemoryStore::new();
        store.write_int(KEY_TEA, 2).unwrap();
        store.write_int(KEY_DURATION, 120).unwrap();
        assert_eq!(load(&store).unwrap(), Loaded::Inconsistent);
    }

    #[test]
    fn waiting_phase_without_wakeup_is_inconsistent() {
        let mut store = MemoryStore::new();
        save(&mut store, &steeping()).unwrap();
        store.delete(KEY_WAKEUP_ID).unwrap();
        assert_eq!(load(&store).unwrap(), Loaded::Inconsistent);
    }

    #[test]
    fn unknown_phase_code_is_inconsistent() {
        let mut store = MemoryStore::new();
        save(&mut store, &steeping()).unwrap();
        store.write_int(KEY_PHASE, 9).unwrap();
        assert_eq!(load(&store).unwrap(), Loaded::Inconsistent);
    }

    #[test]
    fn out_of_range_duration_is_inconsistent() {
        let mut store = MemoryStore::new();
        save(&mut store, &steeping()).unwrap();
        store.write_int(KEY_DURATION, 70_000).unwrap();
        assert_eq!(load(&store).unwrap(), Loaded::Inconsistent);
    }

    #[test]
    fn stray_wakeup_survives_missing_phase() {
        let mut store = MemoryStore::new();
        assert_eq!(stray_wakeup(&store), None);
        store.write_int(KEY_WAKEUP_ID, 4).unwrap();
        assert_eq!(load(&store).unwrap(), Loaded::Inconsistent);
        assert_eq!(stray_wakeup(&store), Some(WakeupId(4)));
        store.write_int(KEY_WAKEUP_ID, -1).unwrap();
        assert_eq!(stray_wakeup(&store), None);
    }
}
