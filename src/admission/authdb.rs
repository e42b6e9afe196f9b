//! Sqlite-backed store for API keys and sessions, separate from the ledger
//! database.

use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalKind {
    ApiKey,
    Session,
}

/// What bearer-token admission resolves a request to.
#[derive(Debug, Clone)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub subject: String,
    pub scopes: Vec<String>,
    pub rate_limit_rpm: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub id: String,
    pub secret_hash: String,
    pub owner_id: String,
    pub label: String,
    pub scopes: Vec<String>,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub revoked: bool,
    pub rate_limit_rpm: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub subject_id: String,
    pub auth_method: String,
    pub scopes: Vec<String>,
    pub issued_at: String,
    pub expires_at: String,
    pub revoked: bool,
}

pub struct AuthStore {
    conn: Mutex<Connection>,
}

fn join_scopes(scopes: &[String]) -> String {
    scopes.join(",")
}

fn split_scopes(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        Vec::new()
    } else {
        joined.split(',').map(str::to_string).collect()
    }
}

impl AuthStore {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS api_keys (
                id             TEXT PRIMARY KEY,
                secret_hash    TEXT NOT NULL UNIQUE,
                owner_id       TEXT NOT NULL,
                label          TEXT NOT NULL,
                scopes         TEXT NOT NULL,
                created_at     TEXT NOT NULL,
                expires_at     TEXT,
                revoked        INTEGER NOT NULL DEFAULT 0,
                rate_limit_rpm INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_api_keys_secret_hash ON api_keys(secret_hash);
            CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY,
                subject_id  TEXT NOT NULL,
                auth_method TEXT NOT NULL,
                scopes      TEXT NOT NULL,
                issued_at   TEXT NOT NULL,
                expires_at  TEXT NOT NULL,
                revoked     INTEGER NOT NULL DEFAULT 0
            );",
        )?;
        Ok(())
    }

    pub fn insert_api_key(&self, key: &ApiKeyRecord) -> Result<()> {
        let conn = self.conn.lock().expect("auth store mutex poisoned");
        conn.execute(
            "INSERT INTO api_keys (id, secret_hash, owner_id, label, scopes, created_at, expires_at, revoked, rate_limit_rpm)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                key.id,
                key.secret_hash,
                key.owner_id,
                key.label,
                join_scopes(&key.scopes),
                key.created_at,
                key.expires_at,
                key.revoked as i64,
                key.rate_limit_rpm,
            ],
        )?;
        Ok(())
    }

    pub fn find_api_key_by_hash(&self, secret_hash: &str) -> Result<Option<ApiKeyRecord>> {
        let conn = self.conn.lock().expect("auth store mutex poisoned");
        conn.query_row(
            "SELECT id, secret_hash, owner_id, label, scopes, created_at, expires_at, revoked, rate_limit_rpm
             FROM api_keys WHERE secret_hash = ?1",
            params![secret_hash],
            |row| {
                let scopes: String = row.get(4)?;
                let revoked: i64 = row.get(7)?;
                Ok(ApiKeyRecord {
                    id: row.get(0)?,
                    secret_hash: row.get(1)?,
                    owner_id: row.get(2)?,
                    label: row.get(3)?,
                    scopes: split_scopes(&scopes),
                    created_at: row.get(5)?,
                    expires_at: row.get(6)?,
                    revoked: revoked != 0,
                    rate_limit_rpm: row.get(8)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn revoke_api_key(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().expect("auth store mutex poisoned");
        conn.execute(
            "UPDATE api_keys SET revoked = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    pub fn list_api_keys(&self) -> Result<Vec<ApiKeyRecord>> {
        let conn = self.conn.lock().expect("auth store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, secret_hash, owner_id, label, scopes, created_at, expires_at, revoked, rate_limit_rpm
             FROM api_keys ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let scopes: String = row.get(4)?;
            let revoked: i64 = row.get(7)?;
            Ok(ApiKeyRecord {
                id: row.get(0)?,
                secret_hash: row.get(1)?,
                owner_id: row.get(2)?,
                label: row.get(3)?,
                scopes: split_scopes(&scopes),
                created_at: row.get(5)?,
                expires_at: row.get(6)?,
                revoked: revoked != 0,
                rate_limit_rpm: row.get(8)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn insert_session(&self, session: &SessionRecord) -> Result<()> {
        let conn = self.conn.lock().expect("auth store mutex poisoned");
        conn.execute(
            "INSERT INTO sessions (id, subject_id, auth_method, scopes, issued_at, expires_at, revoked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id,
                session.subject_id,
                session.auth_method,
                join_scopes(&session.scopes),
                session.issued_at,
                session.expires_at,
                session.revoked as i64,
            ],
        )?;
        Ok(())
    }

    pub fn find_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.conn.lock().expect("auth store mutex poisoned");
        conn.query_row(
            "SELECT id, subject_id, auth_method, scopes, issued_at, expires_at, revoked
             FROM sessions WHERE id = ?1",
            params![id],
            |row| {
                let scopes: String = row.get(3)?;
                let revoked: i64 = row.get(6)?;
                Ok(SessionRecord {
                    id: row.get(0)?,
                    subject_id: row.get(1)?,
                    auth_method: row.get(2)?,
                    scopes: split_scopes(&scopes),
                    issued_at: row.get(4)?,
                    expires_at: row.get(5)?,
                    revoked: revoked != 0,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn revoke_session(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().expect("auth store mutex poisoned");
        conn.execute("UPDATE sessions SET revoked = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> ApiKeyRecord {
        ApiKeyRecord {
            id: "qk_abc123".to_string(),
            secret_hash: "deadbeef".to_string(),
            owner_id: "operator".to_string(),
            label: "ci".to_string(),
            scopes: vec!["relay".to_string()],
            created_at: "2026-01-01T00:00:00Z".to_string(),
            expires_at: None,
            revoked: false,
            rate_limit_rpm: Some(30),
        }
    }

    #[test]
    fn round_trips_api_key_by_hash() {
        let store = AuthStore::open_in_memory().unwrap();
        store.insert_api_key(&sample_key()).unwrap();
        let found = store.find_api_key_by_hash("deadbeef").unwrap().unwrap();
        assert_eq!(found.id, "qk_abc123");
        assert_eq!(found.scopes, vec!["relay".to_string()]);
    }

    #[test]
    fn revoked_key_is_flagged() {
        let store = AuthStore::open_in_memory().unwrap();
        store.insert_api_key(&sample_key()).unwrap();
        store.revoke_api_key("qk_abc123").unwrap();
        let found = store.find_api_key_by_hash("deadbeef").unwrap().unwrap();
        assert!(found.revoked);
    }

    #[test]
    fn session_round_trip() {
        let store = AuthStore::open_in_memory().unwrap();
        let session = SessionRecord {
            id: "sess-1".to_string(),
            subject_id: "agent-1".to_string(),
            auth_method: "session".to_string(),
            scopes: vec![],
            issued_at: "2026-01-01T00:00:00Z".to_string(),
            expires_at: "2026-01-02T00:00:00Z".to_string(),
            revoked: false,
        };
        store.insert_session(&session).unwrap();
        let found = store.find_session("sess-1").unwrap().unwrap();
        assert_eq!(found.subject_id, "agent-1");
        assert!(!found.revoked);
    }
}
