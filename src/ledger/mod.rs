//! The append-only, signed, hash-chained audit ledger.

pub mod store;
pub mod verify;

pub use store::LedgerStore;
pub use verify::{verify_chain, ChainViolation};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::canonical::to_canonical_string;
use crate::crypto::ed25519::{verify_hex, KeyPair};
use crate::error::Result;
use crate::risk::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Request => "request",
            Direction::Response => "response",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "request" => Some(Direction::Request),
            "response" => Some(Direction::Response),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Deny,
    Passthrough,
    RateLimited,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::Deny => "deny",
            Verdict::Passthrough => "passthrough",
            Verdict::RateLimited => "rate_limited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Verdict::Allow),
            "deny" => Some(Verdict::Deny),
            "passthrough" => Some(Verdict::Passthrough),
            "rate_limited" => Some(Verdict::RateLimited),
            _ => None,
        }
    }
}

/// A single append-only ledger entry, signed over every field except `id`
/// and `signature`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: String,
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
    pub policy_hash: String,
    pub prev_hash: String,
    pub nonce: String,
    pub signature: String,
    pub public_key: String,
}

impl AuditRecord {
    /// Every field in this record except `id` and `signature`, as the
    /// canonical JSON object that is actually signed.
    pub fn signable_view(&self) -> Value {
        json!({
            "timestamp": self.timestamp,
            "server_name": self.server_name,
            "direction": self.direction.as_str(),
            "method": self.method,
            "message_id": self.message_id,
            "tool_name": self.tool_name,
            "arguments_json": self.arguments_json,
            "response_json": self.response_json,
            "verdict": self.verdict.as_str(),
            "risk_score": self.risk_score.map(i64::from),
            "risk_level": self.risk_level.map(|l| risk_level_str(l)),
            "policy_hash": self.policy_hash,
            "prev_hash": self.prev_hash,
            "nonce": self.nonce,
            "public_key": self.public_key,
        })
    }

    pub fn canonical_signable(&self) -> Result<String> {
        to_canonical_string(&self.signable_view())
    }

    /// Invariant 1 / 8: the signature must verify over the current field
    /// values; mutating any signed field (including risk_score/risk_level)
    /// invalidates it.
    pub fn verify_signature(&self) -> Result<bool> {
        let canonical = self.canonical_signable()?;
        verify_hex(&self.public_key, &canonical, &self.signature)
    }
}

pub(crate) fn risk_level_str(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
        RiskLevel::Critical => "critical",
    }
}

/// Fields the caller supplies to build one record; `timestamp`, `nonce`,
/// `prev_hash`, and `signature` are filled in by the logger at append time.
#[derive(Debug, Clone)]
pub struct NewRecordFields {
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

/// Given per-record fields and the previous record's signature, produce a
/// fully signed record ready to append.
pub fn build_signed_record(
    fields: NewRecordFields,
    prev_signature: Option<&str>,
    policy_hash: &str,
    keypair: &KeyPair,
) -> Result<AuditRecord> {
    let prev_hash = match prev_signature {
        Some(sig) => crate::crypto::hash::sha256_hex(sig.as_bytes()),
        None => String::new(),
    };

    let mut record = AuditRecord {
        id: 0,
        timestamp: chrono::Utc::now().to_rfc3339(),
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
        policy_hash: policy_hash.to_string(),
        prev_hash,
        nonce: uuid::Uuid::new_v4().to_string(),
        signature: String::new(),
        public_key: keypair.public_key_pem()?,
    };

    let canonical = record.canonical_signable()?;
    record.signature = keypair.sign_hex(&canonical);
    Ok(record)
}
