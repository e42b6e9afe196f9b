//! Rusqlite-backed append-only store. `insert_atomic` is the only write path:
//! it reads the current tip under an `IMMEDIATE` transaction, hands the tip's
//! signature to the caller's builder, and commits the resulting record in the
//! same transaction so concurrent appends cannot observe or produce a gap or
//! a duplicate `prev_hash`.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;

use super::{AuditRecord, Direction, Verdict};

const SCHEMA_VERSION: i64 = 1;

pub struct LedgerStore {
    conn: Mutex<Connection>,
}

/// Optional filters for `query`; `None` means "don't filter on this field".
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub server_name: Option<String>,
    pub tool_name: Option<String>,
    pub verdict: Option<Verdict>,
    pub since_timestamp: Option<String>,
    pub limit: Option<i64>,
}

impl LedgerStore {
    pub fn open(path: &Path) -> Result<Self> {
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
            "CREATE TABLE IF NOT EXISTS schema_meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS audit_records (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp        TEXT NOT NULL,
                server_name      TEXT NOT NULL,
                direction        TEXT NOT NULL,
                method           TEXT NOT NULL,
                message_id       TEXT,
                tool_name        TEXT,
                arguments_json   TEXT,
                response_json    TEXT,
                verdict          TEXT NOT NULL,
                risk_score       INTEGER,
                risk_level       TEXT,
                policy_hash      TEXT NOT NULL,
                prev_hash        TEXT NOT NULL,
                nonce            TEXT NOT NULL,
                signature        TEXT NOT NULL,
                public_key       TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_records(timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_server ON audit_records(server_name);
            CREATE INDEX IF NOT EXISTS idx_audit_tool ON audit_records(tool_name);
            CREATE INDEX IF NOT EXISTS idx_audit_verdict ON audit_records(verdict);",
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )?;
        Ok(())
    }

    /// Append one record. `build` receives the previous record's signature
    /// (`None` if the ledger is empty) and returns the fully signed record to
    /// insert; its `id` field is ignored and replaced with the assigned
    /// autoincrement id. Runs inside an `IMMEDIATE` transaction so the
    /// read-tip / build / insert sequence is atomic under concurrent writers.
    pub fn insert_atomic<F>(&self, build: F) -> Result<i64>
    where
        F: FnOnce(Option<String>) -> Result<AuditRecord>,
    {
        let mut conn = self.conn.lock().expect("ledger store mutex poisoned");
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let prev_signature: Option<String> = tx
            .query_row(
                "SELECT signature FROM audit_records ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let record = build(prev_signature)?;

        tx.execute(
            "INSERT INTO audit_records (
                timestamp, server_name, direction, method, message_id, tool_name,
                arguments_json, response_json, verdict, risk_score, risk_level,
                policy_hash, prev_hash, nonce, signature, public_key
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                record.timestamp,
                record.server_name,
                record.direction.as_str(),
                record.method,
                record.message_id,
                record.tool_name,
                record.arguments_json,
                record.response_json,
                record.verdict.as_str(),
                record.risk_score.map(i64::from),
                record.risk_level.map(super::risk_level_str),
                record.policy_hash,
                record.prev_hash,
                record.nonce,
                record.signature,
                record.public_key,
            ],
        )?;

        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<AuditRecord>> {
        let conn = self.conn.lock().expect("ledger store mutex poisoned");
        conn.query_row(
            "SELECT * FROM audit_records WHERE id = ?1",
            params![id],
            row_to_record,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn get_all(&self) -> Result<Vec<AuditRecord>> {
        let conn = self.conn.lock().expect("ledger store mutex poisoned");
        let mut stmt = conn.prepare("SELECT * FROM audit_records ORDER BY id ASC")?;
        let rows = stmt.query_map([], row_to_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn get_last(&self, n: i64) -> Result<Vec<AuditRecord>> {
        let conn = self.conn.lock().expect("ledger store mutex poisoned");
        let mut stmt =
            conn.prepare("SELECT * FROM audit_records ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![n], row_to_record)?;
        let mut records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        records.reverse();
        Ok(records)
    }

    pub fn get_after_id(&self, id: i64, batch: i64) -> Result<Vec<AuditRecord>> {
        let conn = self.conn.lock().expect("ledger store mutex poisoned");
        let mut stmt = conn
            .prepare("SELECT * FROM audit_records WHERE id > ?1 ORDER BY id ASC LIMIT ?2")?;
        let rows = stmt.query_map(params![id, batch], row_to_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock().expect("ledger store mutex poisoned");
        conn.query_row("SELECT COUNT(*) FROM audit_records", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn query(&self, filter: &LedgerFilter) -> Result<Vec<AuditRecord>> {
        let conn = self.conn.lock().expect("ledger store mutex poisoned");

        // Only the clauses actually present in `sql` get a `?`; `bound` is
        // built in lockstep so the statement never sees more or fewer
        // parameters than it declares.
        let verdict_str = filter.verdict.map(Verdict::as_str);
        let mut sql = String::from("SELECT * FROM audit_records WHERE 1 = 1");
        let mut bound: Vec<&dyn rusqlite::ToSql> = Vec::new();

        if let Some(server_name) = &filter.server_name {
            sql.push_str(" AND server_name = ?");
            bound.push(server_name);
        }
        if let Some(tool_name) = &filter.tool_name {
            sql.push_str(" AND tool_name = ?");
            bound.push(tool_name);
        }
        if let Some(verdict_str) = &verdict_str {
            sql.push_str(" AND verdict = ?");
            bound.push(verdict_str);
        }
        if let Some(since_timestamp) = &filter.since_timestamp {
            sql.push_str(" AND timestamp >= ?");
            bound.push(since_timestamp);
        }
        sql.push_str(" ORDER BY id ASC");
        if let Some(limit) = &filter.limit {
            sql.push_str(" LIMIT ?");
            bound.push(limit);
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(bound.as_slice(), row_to_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn close(self) {
        drop(self);
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<AuditRecord> {
    let direction: String = row.get("direction")?;
    let verdict: String = row.get("verdict")?;
    let risk_level: Option<String> = row.get("risk_level")?;
    let risk_score: Option<i64> = row.get("risk_score")?;

    Ok(AuditRecord {
        id: row.get("id")?,
        timestamp: row.get("timestamp")?,
        server_name: row.get("server_name")?,
        direction: Direction::parse(&direction).unwrap_or(Direction::Request),
        method: row.get("method")?,
        message_id: row.get("message_id")?,
        tool_name: row.get("tool_name")?,
        arguments_json: row.get("arguments_json")?,
        response_json: row.get("response_json")?,
        verdict: Verdict::parse(&verdict).unwrap_or(Verdict::Deny),
        risk_score: risk_score.map(|v| v as u8),
        risk_level: risk_level.and_then(|s| parse_risk_level(&s)),
        policy_hash: row.get("policy_hash")?,
        prev_hash: row.get("prev_hash")?,
        nonce: row.get("nonce")?,
        signature: row.get("signature")?,
        public_key: row.get("public_key")?,
    })
}

fn parse_risk_level(s: &str) -> Option<crate::risk::RiskLevel> {
    use crate::risk::RiskLevel;
    match s {
        "low" => Some(RiskLevel::Low),
        "medium" => Some(RiskLevel::Medium),
        "high" => Some(RiskLevel::High),
        "critical" => Some(RiskLevel::Critical),
        _ => None,
    }
}
