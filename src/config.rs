//! Data directory layout, environment variables, and policy loading.
//!
//! `WARDEN_DATA_DIR` names the data directory (falls back to the platform
//! config directory under `warden/`); `WARDEN_KEYSTORE_PASSPHRASE` optionally
//! supplies the keystore passphrase so the relay can start non-interactively.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;

const DATA_DIR_ENV: &str = "WARDEN_DATA_DIR";
const PASSPHRASE_ENV: &str = "WARDEN_KEYSTORE_PASSPHRASE";

const KEY_NAME: &str = "operator";
const AUDIT_DB_FILE: &str = "audit.db";
const BEHAVIOR_DB_FILE: &str = "behavior.db";
const AUTH_DB_FILE: &str = "auth.db";
const POLICY_FILE: &str = "policy.json";

pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let dirs = ProjectDirs::from("dev", "warden", "warden")
        .context("failed to determine a default data directory; set WARDEN_DATA_DIR")?;
    Ok(dirs.data_dir().to_path_buf())
}

pub fn ensure_data_dir() -> Result<PathBuf> {
    let dir = data_dir()?;
    fs::create_dir_all(dir.join("keys"))
        .with_context(|| format!("failed to create data directory {}", dir.display()))?;
    Ok(dir)
}

pub fn private_key_path(dir: &std::path::Path) -> PathBuf {
    dir.join("keys").join(format!("{KEY_NAME}.key"))
}

pub fn public_key_path(dir: &std::path::Path) -> PathBuf {
    dir.join("keys").join(format!("{KEY_NAME}.pub"))
}

pub fn audit_db_path(dir: &std::path::Path) -> PathBuf {
    dir.join(AUDIT_DB_FILE)
}

pub fn behavior_db_path(dir: &std::path::Path) -> PathBuf {
    dir.join(BEHAVIOR_DB_FILE)
}

pub fn auth_db_path(dir: &std::path::Path) -> PathBuf {
    dir.join(AUTH_DB_FILE)
}

pub fn policy_path(dir: &std::path::Path) -> PathBuf {
    dir.join(POLICY_FILE)
}

pub fn keystore_passphrase() -> Option<String> {
    std::env::var(PASSPHRASE_ENV).ok()
}

/// Load and validate the policy file; fails loudly rather than starting the
/// relay against an invalid or missing policy.
pub fn load_policy(dir: &std::path::Path) -> Result<crate::policy::Policy> {
    let path = policy_path(dir);
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read policy file {}", path.display()))?;
    let policy: crate::policy::Policy = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse policy file {}", path.display()))?;

    let errors = crate::policy::validate(&policy);
    if !errors.is_empty() {
        anyhow::bail!("policy {} is invalid: {}", path.display(), errors.join("; "));
    }
    Ok(policy)
}

pub fn policy_hash(policy: &crate::policy::Policy) -> Result<String> {
    let value = serde_json::to_value(policy).context("failed to serialize policy for hashing")?;
    let canonical = crate::canonical::to_canonical_string(&value)
        .context("policy contains a value outside the canonical JSON subset")?;
    Ok(crate::crypto::hash::sha256_hex(canonical.as_bytes()))
}
