//! Canonical-JSON-over-Ed25519 signing, SHA-256 hashing, and the private-key
//! keystore (plaintext or passphrase-encrypted at rest).

pub mod ed25519;
pub mod hash;
pub mod keystore;

pub use ed25519::KeyPair;
pub use keystore::KeystoreLoad;
