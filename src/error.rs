//! Crate-wide error type.
//!
//! Internal modules return `Result<_, WardenError>`; the CLI layer wraps
//! these in `anyhow::Result` via `.context(..)`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("value is not representable in canonical form: {0}")]
    NonCanonicalValue(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("malformed keystore envelope: {0}")]
    MalformedEnvelope(String),

    #[error("wrong passphrase")]
    WrongPassphrase,

    #[error("keystore passphrase required but not supplied")]
    PassphraseRequired,

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("ledger is degraded after {0} consecutive write failures")]
    LedgerDegraded(u32),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, WardenError>;
