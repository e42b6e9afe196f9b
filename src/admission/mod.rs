//! Bearer-token admission: resolve a token to a subject id, trying it as a
//! session id first, then as an API-key secret.

pub mod apikey;
pub mod authdb;
pub mod ratelimit;

pub use authdb::{ApiKeyRecord, AuthStore, Principal, PrincipalKind, SessionRecord};
pub use ratelimit::{RateLimitConfig, RateLimitDecision, RateLimiter};

use crate::crypto::hash::sha256_hex;
use crate::error::Result;

/// `now_rfc3339` is compared lexicographically against stored RFC-3339
/// expiries, which is valid because RFC-3339 timestamps in a fixed offset
/// sort the same lexicographically as chronologically.
pub fn resolve_bearer(
    store: &AuthStore,
    token: &str,
    now_rfc3339: &str,
) -> Result<Option<Principal>> {
    if let Some(session) = store.find_session(token)? {
        if !session.revoked && session.expires_at.as_str() > now_rfc3339 {
            return Ok(Some(Principal {
                kind: PrincipalKind::Session,
                subject: session.subject_id,
                scopes: session.scopes,
                rate_limit_rpm: None,
            }));
        }
        return Ok(None);
    }

    let secret_hash = sha256_hex(token.as_bytes());
    if let Some(key) = store.find_api_key_by_hash(&secret_hash)? {
        let expired = key
            .expires_at
            .as_deref()
            .is_some_and(|exp| exp <= now_rfc3339);
        if !key.revoked && !expired {
            return Ok(Some(Principal {
                kind: PrincipalKind::ApiKey,
                subject: key.id,
                scopes: key.scopes,
                rate_limit_rpm: key.rate_limit_rpm,
            }));
        }
        return Ok(None);
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::authdb::SessionRecord;

    fn store_with_key(rpm_override: Option<u32>) -> (AuthStore, String) {
        let store = AuthStore::open_in_memory().unwrap();
        let generated = apikey::generate();
        store
            .insert_api_key(&ApiKeyRecord {
                id: "qk_handle".to_string(),
                secret_hash: generated.secret_hash,
                owner_id: "operator".to_string(),
                label: "ci".to_string(),
                scopes: vec!["relay".to_string()],
                created_at: "2026-01-01T00:00:00Z".to_string(),
                expires_at: None,
                revoked: false,
                rate_limit_rpm: rpm_override,
            })
            .unwrap();
        (store, generated.raw_secret)
    }

    /// Invariant 10: a freshly minted key authenticates.
    #[test]
    fn fresh_api_key_authenticates() {
        let (store, raw_secret) = store_with_key(Some(30));
        let principal = resolve_bearer(&store, &raw_secret, "2026-01-02T00:00:00Z")
            .unwrap()
            .unwrap();
        assert_eq!(principal.kind, PrincipalKind::ApiKey);
        assert_eq!(principal.subject, "qk_handle");
        assert_eq!(principal.rate_limit_rpm, Some(30));
    }

    /// Invariant 10: a revoked key must not authenticate.
    #[test]
    fn revoked_api_key_is_rejected() {
        let (store, raw_secret) = store_with_key(None);
        store.revoke_api_key("qk_handle").unwrap();
        assert!(resolve_bearer(&store, &raw_secret, "2026-01-02T00:00:00Z")
            .unwrap()
            .is_none());
    }

    #[test]
    fn unknown_token_is_rejected() {
        let store = AuthStore::open_in_memory().unwrap();
        assert!(resolve_bearer(&store, "not-a-real-token", "2026-01-01T00:00:00Z")
            .unwrap()
            .is_none());
    }

    #[test]
    fn session_is_tried_before_api_key_and_honors_expiry() {
        let store = AuthStore::open_in_memory().unwrap();
        store
            .insert_session(&SessionRecord {
                id: "sess-1".to_string(),
                subject_id: "agent-1".to_string(),
                auth_method: "session".to_string(),
                scopes: vec![],
                issued_at: "2026-01-01T00:00:00Z".to_string(),
                expires_at: "2026-01-02T00:00:00Z".to_string(),
                revoked: false,
            })
            .unwrap();

        let ok = resolve_bearer(&store, "sess-1", "2026-01-01T12:00:00Z")
            .unwrap()
            .unwrap();
        assert_eq!(ok.kind, PrincipalKind::Session);
        assert_eq!(ok.subject, "agent-1");

        assert!(resolve_bearer(&store, "sess-1", "2026-01-03T00:00:00Z")
            .unwrap()
            .is_none());
    }
}
