//! Ed25519 key generation, signing, and verification over canonical JSON.

use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use pkcs8::LineEnding;
use rand_core::OsRng;
use zeroize::Zeroizing;

use crate::error::{Result, WardenError};

/// An Ed25519 keypair held in memory, PEM round-trippable.
#[derive(Debug)]
pub struct KeyPair {
    pub signing_key: SigningKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn public_key_pem(&self) -> Result<String> {
        self.signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| WardenError::Other(format!("failed to encode public key: {e}")))
    }

    pub fn private_key_pem(&self) -> Result<Zeroizing<String>> {
        let pem = self
            .signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| WardenError::Other(format!("failed to encode private key: {e}")))?;
        Ok(Zeroizing::new(pem.to_string()))
    }

    pub fn from_private_pem(pem: &str) -> Result<Self> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| WardenError::Other(format!("invalid Ed25519 private key PEM: {e}")))?;
        Ok(Self { signing_key })
    }

    /// Sign the UTF-8 bytes of a canonical string, returning hex.
    pub fn sign_hex(&self, canonical: &str) -> String {
        let sig: Signature = self.signing_key.sign(canonical.as_bytes());
        hex::encode(sig.to_bytes())
    }
}

/// Verify a hex-encoded Ed25519 signature over `canonical` using a PEM public key.
pub fn verify_hex(public_key_pem: &str, canonical: &str, signature_hex: &str) -> Result<bool> {
    let verifying_key = VerifyingKey::from_public_key_pem(public_key_pem)
        .map_err(|e| WardenError::Other(format!("invalid Ed25519 public key PEM: {e}")))?;

    let sig_bytes = hex::decode(signature_hex)
        .map_err(|e| WardenError::Other(format!("signature is not valid hex: {e}")))?;
    let sig_bytes: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| WardenError::Other("signature must be 64 bytes".to_string()))?;
    let signature = Signature::from_bytes(&sig_bytes);

    Ok(verifying_key
        .verify(canonical.as_bytes(), &signature)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let kp = KeyPair::generate();
        let pub_pem = kp.public_key_pem().unwrap();
        let sig = kp.sign_hex("hello world");
        assert!(verify_hex(&pub_pem, "hello world", &sig).unwrap());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let kp = KeyPair::generate();
        let pub_pem = kp.public_key_pem().unwrap();
        let sig = kp.sign_hex("hello world");
        assert!(!verify_hex(&pub_pem, "hello WORLD", &sig).unwrap());
    }

    #[test]
    fn pem_round_trip_preserves_key() {
        let kp = KeyPair::generate();
        let private_pem = kp.private_key_pem().unwrap();
        let restored = KeyPair::from_private_pem(&private_pem).unwrap();
        assert_eq!(
            kp.signing_key.verifying_key(),
            restored.signing_key.verifying_key()
        );
    }
}
