//! SHA-256 helpers: policy hashing, previous-record hashing, key fingerprints,
//! and API-key secret hashing.

use sha2::{Digest, Sha256};

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// First 16 hex characters of SHA-256 over the base64 body of a PEM block
/// (headers and newlines stripped), used as a short, stable key fingerprint.
pub fn public_key_fingerprint(public_key_pem: &str) -> String {
    let body: String = public_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let digest = sha256_hex(body.as_bytes());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable() {
        let pem = "-----BEGIN PUBLIC KEY-----\nAAAA\nBBBB\n-----END PUBLIC KEY-----\n";
        let a = public_key_fingerprint(pem);
        let b = public_key_fingerprint(pem);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
