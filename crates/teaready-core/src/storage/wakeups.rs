//! Durable deferred wakeups in SQLite.
//!
//! Nothing runs in the background: an event "fires" once its time has
//! passed, and is delivered either by the host polling [`WakeupQueue::take_due`]
//! or by a relaunch querying it. Both paths delete the row, so each event is
//! delivered exactly once.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StorageError;
use crate::platform::{WakeupId, WakeupScheduler, WakeupStatus};
use crate::session::WakeReason;

/// Maximum number of pending wakeups, matching the per-app limit of
/// watch-class schedulers.
pub const MAX_PENDING: i64 = 8;

pub struct WakeupQueue {
    conn: Connection,
    clock: fn() -> DateTime<Utc>,
}

impl WakeupQueue {
    /// Open (or create) the wakeup table in the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory queue (for tests).
    pub fn open_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS wakeups (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                fire_at INTEGER NOT NULL,
                reason  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_wakeups_fire_at ON wakeups(fire_at);",
        )?;
        Ok(Self {
            conn,
            clock: Utc::now,
        })
    }

    /// Replace the wall clock used to decide whether an event has fired.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Remove and return every event due at `now`, earliest first.
    /// Rows with an undecodable reason are dropped.
    pub fn take_due(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(WakeupId, WakeReason)>, StorageError> {
        let tx = self.conn.transaction()?;
        let rows: Vec<(i64, i64)> = {
            let mut stmt = tx.prepare(
                "SELECT id, reason FROM wakeups WHERE fire_at <= ?1 ORDER BY fire_at, id",
            )?;
            let mapped = stmt.query_map(params![now.timestamp()], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?;
            let collected: Vec<(i64, i64)> = mapped.collect::<Result<_, _>>()?;
            collected
        };
        tx.execute("DELETE FROM wakeups WHERE fire_at <= ?1", params![now.timestamp()])?;
        tx.commit()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, code)| {
                let decoded = i32::try_from(code).ok().and_then(WakeReason::from_code);
                if decoded.is_none() {
                    tracing::warn!(id, code, "dropping wakeup with unknown reason");
                }
                Some((WakeupId(i32::try_from(id).ok()?), decoded?))
            })
            .collect())
    }

    /// Earliest pending fire time, if any.
    pub fn next_due(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let ts: Option<i64> = self
            .conn
            .query_row("SELECT MIN(fire_at) FROM wakeups", [], |row| row.get(0))?;
        Ok(ts.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)))
    }

    pub fn pending_count(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM wakeups", [], |row| row.get(0))?)
    }

    fn insert(&mut self, at: DateTime<Utc>, reason: WakeReason) -> Result<WakeupId, StorageError> {
        if self.pending_count()? >= MAX_PENDING {
            return Ok(WakeupId(-1));
        }
        self.conn.execute(
            "INSERT INTO wakeups (fire_at, reason) VALUES (?1, ?2)",
            params![at.timestamp(), reason.code()],
        )?;
        Ok(WakeupId(i32::try_from(self.conn.last_insert_rowid()).unwrap_or(-1)))
    }
}

impl WakeupScheduler for WakeupQueue {
    fn schedule(&mut self, at: DateTime<Utc>, reason: WakeReason) -> WakeupId {
        match self.insert(at, reason) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(%e, "failed to store wakeup");
                WakeupId(-1)
            }
        }
    }

    fn query(&mut self, id: WakeupId) -> Result<WakeupStatus, StorageError> {
        let row: Option<(i64, i64)> = self
            .conn
            .query_row(
                "SELECT fire_at, reason FROM wakeups WHERE id = ?1",
                params![id.0],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((fire_at, code)) = row else {
            return Ok(WakeupStatus::Unknown);
        };
        let (Some(at), Some(reason)) = (
            DateTime::<Utc>::from_timestamp(fire_at, 0),
            i32::try_from(code).ok().and_then(WakeReason::from_code),
        ) else {
            return Ok(WakeupStatus::Unknown);
        };

        if at > (self.clock)() {
            return Ok(WakeupStatus::Pending { at, reason });
        }
        self.conn
            .execute("DELETE FROM wakeups WHERE id = ?1", params![id.0])?;
        Ok(WakeupStatus::Fired { reason })
    }

    fn cancel(&mut self, id: WakeupId) {
        if let Err(e) = self
            .conn
            .execute("DELETE FROM wakeups WHERE id = ?1", params![id.0])
        {
            tracing::error!(%e, wakeup = id.0, "failed to cancel wakeup");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn queue() -> WakeupQueue {
        WakeupQueue::open_memory().unwrap().with_clock(fixed_now)
    }

    #[test]
    fn pending_until_due() {
        let mut q = queue();
        let at = fixed_now() + chrono::Duration::seconds(60);
        let id = q.schedule(at, WakeReason::SteepFinished { tea_index: 1 });
        assert!(id.is_valid());
        assert_eq!(
            q.query(id).unwrap(),
            WakeupStatus::Pending {
                at,
                reason: WakeReason::SteepFinished { tea_index: 1 }
            }
        );
        assert_eq!(q.next_due().unwrap(), Some(at));
    }

    #[test]
    fn past_due_query_consumes() {
        let mut q = queue();
        let id = q.schedule(
            fixed_now() - chrono::Duration::seconds(5),
            WakeReason::CoolingFinished,
        );
        assert_eq!(
            q.query(id).unwrap(),
            WakeupStatus::Fired {
                reason: WakeReason::CoolingFinished
            }
        );
        assert_eq!(q.query(id).unwrap(), WakeupStatus::Unknown);
        assert!(q.take_due(fixed_now()).unwrap().is_empty());
    }

    #[test]
    fn take_due_delivers_once() {
        let mut q = queue();
        let now = fixed_now();
        let a = q.schedule(now - chrono::Duration::seconds(1), WakeReason::CoolingFinished);
        let _later = q.schedule(now + chrono::Duration::seconds(100), WakeReason::CoolingFinished);
        assert_eq!(q.take_due(now).unwrap(), vec![(a, WakeReason::CoolingFinished)]);
        assert!(q.take_due(now).unwrap().is_empty());
        assert_eq!(q.pending_count().unwrap(), 1);
    }

    #[test]
    fn refuses_beyond_capacity() {
        let mut q = queue();
        let at = fixed_now() + chrono::Duration::seconds(60);
        for _ in 0..MAX_PENDING {
            assert!(q.schedule(at, WakeReason::CoolingFinished).is_valid());
        }
        assert!(!q.schedule(at, WakeReason::CoolingFinished).is_valid());
    }

    #[test]
    fn cancel_unknown_is_noop() {
        let mut q = queue();
        q.cancel(WakeupId(42));
        let id = q.schedule(
            fixed_now() + chrono::Duration::seconds(1),
            WakeReason::CoolingFinished,
        );
        q.cancel(id);
        q.cancel(id);
        assert_eq!(q.query(id).unwrap(), WakeupStatus::Unknown);
    }
}
