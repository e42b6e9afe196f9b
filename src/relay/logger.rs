//! `AuditLogger`: wires the relay's per-record fields into
//! `ledger::build_signed_record` + `LedgerStore::insert_atomic`, and
//! implements consecutive-write-failure escalation so the relay can fail
//! closed once the ledger stops accepting writes.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::crypto::ed25519::KeyPair;
use crate::error::{Result, WardenError};
use crate::ledger::{build_signed_record, AuditRecord, Direction, LedgerStore, NewRecordFields, Verdict};
use crate::risk::RiskLevel;

/// After this many consecutive `insert_atomic` failures the logger reports
/// itself degraded and the caller must fail closed (reject new requests)
/// until a write succeeds again.
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

pub struct AuditLogger {
    store: LedgerStore,
    keypair: KeyPair,
    policy_hash: String,
    consecutive_failures: AtomicU32,
}

pub struct RecordFields {
    pub server_name: String,
    pub direction: Direction,
    pub method: String,
    pub message_id: Option<String>,
    pub tool_name: Option<String>,
    pub arguments_json: Option<String>,
    pub response_json: Option<String>,
    pub verdict: Verdict,
    pub risk_score: Option<u8>,
    pub risk_level: Option<RiskLevel>,
}

impl AuditLogger {
    pub fn new(store: LedgerStore, keypair: KeyPair, policy_hash: String) -> Self {
        Self {
            store,
            keypair,
            policy_hash,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.consecutive_failures.load(Ordering::SeqCst) >= MAX_CONSECUTIVE_FAILURES
    }

    pub fn log(&self, fields: RecordFields) -> Result<AuditRecord> {
        let result = self.store.insert_atomic(|prev_sig| {
            build_signed_record(
                NewRecordFields {
                    server_name: fields.server_name,
                    direction: fields.direction,
                    method: fields.method,
                    message_id: fields.message_id,
                    tool_name: fields.tool_name,
                    arguments_json: fields.arguments_json,
                    response_json: fields.response_json,
                    verdict: fields.verdict,
                    risk_score: fields.risk_score,
                    risk_level: fields.risk_level,
                },
                prev_sig.as_deref(),
                &self.policy_hash,
                &self.keypair,
            )
        });

        match result {
            Ok(id) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                self.store.get_by_id(id)?.ok_or(WardenError::Other(
                    "inserted audit record vanished before it could be read back".to_string(),
                ))
            }
            Err(e) => {
                self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Wraps `log`, escalating to `LedgerDegraded` once the consecutive
    /// failure count crosses the threshold so the relay can fail closed.
    pub fn log_or_degrade(&self, fields: RecordFields) -> Result<AuditRecord> {
        match self.log(fields) {
            Ok(record) => Ok(record),
            Err(e) => {
                if self.is_degraded() {
                    Err(WardenError::LedgerDegraded(
                        self.consecutive_failures.load(Ordering::SeqCst),
                    ))
                } else {
                    Err(e)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> AuditLogger {
        AuditLogger::new(
            LedgerStore::open_in_memory().unwrap(),
            KeyPair::generate(),
            "policyhash".to_string(),
        )
    }

    #[test]
    fn logs_and_returns_the_persisted_record() {
        let logger = logger();
        let record = logger
            .log(RecordFields {
                server_name: "builder-mcp".to_string(),
                direction: Direction::Request,
                method: "tools/call".to_string(),
                message_id: Some("1".to_string()),
                tool_name: Some("ReadFile".to_string()),
                arguments_json: None,
                response_json: None,
                verdict: Verdict::Allow,
                risk_score: Some(10),
                risk_level: Some(RiskLevel::Low),
            })
            .unwrap();
        assert_eq!(record.verdict, Verdict::Allow);
        assert!(record.verify_signature().unwrap());
        assert!(!logger.is_degraded());
    }
}
