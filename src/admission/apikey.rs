//! API-key generation: `"qk_" || 64 hex CSPRNG chars`, stored only as a
//! SHA-256 hash. The raw secret is returned once and never persisted.

use rand_core::{OsRng, RngCore};

use crate::crypto::hash::sha256_hex;

pub struct GeneratedApiKey {
    /// Shown to the operator once; never stored.
    pub raw_secret: String,
    pub secret_hash: String,
}

pub fn generate() -> GeneratedApiKey {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let raw_secret = format!("qk_{}", hex::encode(bytes));
    let secret_hash = sha256_hex(raw_secret.as_bytes());
    GeneratedApiKey {
        raw_secret,
        secret_hash,
    }
}

/// A short, non-secret public handle for referring to a stored key.
pub fn short_id() -> String {
    let mut bytes = [0u8; 6];
    OsRng.fill_bytes(&mut bytes);
    format!("qk_{}", hex::encode(bytes))
}
