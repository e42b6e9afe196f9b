//! Persistent sliding-window behavior counter per subject. Pruning is lazy:
//! `count` deletes expired rows for the subject before counting what remains.

use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::error::Result;

pub trait BehaviorStore: Send + Sync {
    /// Delete `subject_id`'s events at or before `cutoff_ms`, then return the
    /// remaining count.
    fn count(&self, subject_id: &str, cutoff_ms: i64) -> Result<u32>;

    /// Record a high-risk event for `subject_id` at `now_ms`.
    fn record(&self, subject_id: &str, now_ms: i64) -> Result<()>;

    /// Clear all events for a subject (e.g. on API-key/session revocation).
    fn purge_subject(&self, subject_id: &str) -> Result<()>;
}

pub struct SqliteBehaviorStore {
    conn: Mutex<Connection>,
}

impl SqliteBehaviorStore {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS behavior_events (
                subject_id TEXT NOT NULL,
                ts_ms      INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_behavior_subject ON behavior_events(subject_id);
            CREATE INDEX IF NOT EXISTS idx_behavior_ts ON behavior_events(ts_ms);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE behavior_events (subject_id TEXT NOT NULL, ts_ms INTEGER NOT NULL);
             CREATE INDEX idx_behavior_subject ON behavior_events(subject_id);
             CREATE INDEX idx_behavior_ts ON behavior_events(ts_ms);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl BehaviorStore for SqliteBehaviorStore {
    fn count(&self, subject_id: &str, cutoff_ms: i64) -> Result<u32> {
        let conn = self.conn.lock().expect("behavior store mutex poisoned");
        conn.execute(
            "DELETE FROM behavior_events WHERE subject_id = ?1 AND ts_ms <= ?2",
            params![subject_id, cutoff_ms],
        )?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM behavior_events WHERE subject_id = ?1",
            params![subject_id],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    fn record(&self, subject_id: &str, now_ms: i64) -> Result<()> {
        let conn = self.conn.lock().expect("behavior store mutex poisoned");
        conn.execute(
            "INSERT INTO behavior_events (subject_id, ts_ms) VALUES (?1, ?2)",
            params![subject_id, now_ms],
        )?;
        Ok(())
    }

    fn purge_subject(&self, subject_id: &str) -> Result<()> {
        let conn = self.conn.lock().expect("behavior store mutex poisoned");
        conn.execute(
            "DELETE FROM behavior_events WHERE subject_id = ?1",
            params![subject_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prunes_expired_events_before_counting() {
        let store = SqliteBehaviorStore::open_in_memory().unwrap();
        store.record("agent-1", 1_000).unwrap();
        store.record("agent-1", 2_000).unwrap();
        store.record("agent-1", 10_000).unwrap();

        // cutoff at 5_000 prunes the first two events.
        assert_eq!(store.count("agent-1", 5_000).unwrap(), 1);
    }

    #[test]
    fn subjects_are_independent() {
        let store = SqliteBehaviorStore::open_in_memory().unwrap();
        store.record("agent-1", 1_000).unwrap();
        store.record("agent-2", 1_000).unwrap();
        assert_eq!(store.count("agent-1", 0).unwrap(), 1);
        store.purge_subject("agent-1").unwrap();
        assert_eq!(store.count("agent-1", 0).unwrap(), 0);
        assert_eq!(store.count("agent-2", 0).unwrap(), 1);
    }
}
