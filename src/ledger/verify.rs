//! Independent chain-walk verification, used by both the `ledger verify` CLI
//! command and tests: every record's signature must verify, and every
//! record's `prev_hash` must match the hash of the previous record's
//! signature.

use crate::crypto::hash::sha256_hex;
use crate::error::Result;

use super::AuditRecord;

#[derive(Debug, Clone)]
pub enum ChainViolation {
    /// The record's own signature does not verify against its stored public key.
    BadSignature { id: i64 },
    /// `prev_hash` does not match `sha256_hex(previous.signature)`.
    BrokenLink { id: i64, expected_prev_hash: String },
}

/// Walk `records` (expected in ascending `id` order) and report every
/// violation found. An empty ledger or a single untampered record produces no
/// violations.
pub fn verify_chain(records: &[AuditRecord]) -> Result<Vec<ChainViolation>> {
    let mut violations = Vec::new();

    for (i, record) in records.iter().enumerate() {
        if !record.verify_signature()? {
            violations.push(ChainViolation::BadSignature { id: record.id });
        }

        let expected_prev_hash = match i {
            0 => String::new(),
            _ => sha256_hex(records[i - 1].signature.as_bytes()),
        };
        if record.prev_hash != expected_prev_hash {
            violations.push(ChainViolation::BrokenLink {
                id: record.id,
                expected_prev_hash,
            });
        }
    }

    Ok(violations)
}
