/// Detached Ed25519 signatures over the canonical record form.
///
/// Private signing keys use the 64-byte libsodium layout (seed followed by
/// the public key) on the wire; the 32-byte bare seed is also accepted on
/// input for interoperability.
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::crypto::codec;
use crate::error::{ClientError, Result};

pub const SIGNATURE_LEN: usize = 64;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const SECRET_KEYPAIR_LEN: usize = 64;

/// Generate a fresh Ed25519 keypair.
pub fn generate_keypair() -> (VerifyingKey, SigningKey) {
    let signing_key = SigningKey::generate(&mut OsRng);
    (signing_key.verifying_key(), signing_key)
}

/// Produce a detached signature over a message.
pub fn sign_detached(message: &[u8], key: &SigningKey) -> [u8; SIGNATURE_LEN] {
    key.sign(message).to_bytes()
}

/// Verify a detached signature. Returns false for malformed signatures as
/// well as for valid-but-mismatched ones; it never errors.
pub fn verify_detached(signature: &[u8], message: &[u8], key: &VerifyingKey) -> bool {
    match Signature::from_slice(signature) {
        Ok(sig) => key.verify(message, &sig).is_ok(),
        Err(_) => false,
    }
}

/// Parse a URL-safe-base64 Ed25519 private key. Accepts the 64-byte
/// libsodium keypair layout or a bare 32-byte seed.
pub fn signing_key_from_b64u(encoded: &str) -> Result<SigningKey> {
    let bytes = codec::decode(encoded)
        .map_err(|e| ClientError::InvalidKey(format!("signing key is not valid base64: {e}")))?;
    match bytes.len() {
        SECRET_KEYPAIR_LEN => {
            let bytes: [u8; SECRET_KEYPAIR_LEN] = bytes
                .try_into()
                .map_err(|_| ClientError::InvalidKey("signing key length".to_string()))?;
            SigningKey::from_keypair_bytes(&bytes).map_err(|_| {
                ClientError::InvalidKey("signing keypair halves do not match".to_string())
            })
        }
        32 => {
            let seed: [u8; 32] = bytes
                .try_into()
                .map_err(|_| ClientError::InvalidKey("signing key length".to_string()))?;
            Ok(SigningKey::from_bytes(&seed))
        }
        n => Err(ClientError::InvalidKey(format!(
            "signing key must be 32 or 64 bytes, got {n}"
        ))),
    }
}

/// Encode a private signing key in the 64-byte libsodium layout.
pub fn signing_key_to_b64u(key: &SigningKey) -> String {
    codec::encode(&key.to_keypair_bytes())
}

/// Parse a URL-safe-base64 Ed25519 public key.
pub fn verifying_key_from_b64u(encoded: &str) -> Result<VerifyingKey> {
    let bytes = codec::decode(encoded)
        .map_err(|e| ClientError::InvalidKey(format!("verifying key is not valid base64: {e}")))?;
    let bytes: [u8; PUBLIC_KEY_LEN] = bytes
        .try_into()
        .map_err(|_| ClientError::InvalidKey("verifying key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|_| ClientError::InvalidKey("not a valid Ed25519 point".to_string()))
}

pub fn verifying_key_to_b64u(key: &VerifyingKey) -> String {
    codec::encode(key.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let (vk, sk) = generate_keypair();
        let message = b"canonical record bytes";

        let sig = sign_detached(message, &sk);
        assert!(verify_detached(&sig, message, &vk));
    }

    #[test]
    fn test_wrong_message_fails() {
        let (vk, sk) = generate_keypair();
        let sig = sign_detached(b"original", &sk);
        assert!(!verify_detached(&sig, b"tampered", &vk));
    }

    #[test]
    fn test_flipped_signature_bit_fails() {
        let (vk, sk) = generate_keypair();
        let message = b"original";
        let mut sig = sign_detached(message, &sk);
        sig[0] ^= 0x01;
        assert!(!verify_detached(&sig, message, &vk));
    }

    #[test]
    fn test_garbage_signature_is_false_not_error() {
        let (vk, _) = generate_keypair();
        assert!(!verify_detached(b"too short", b"message", &vk));
    }

    #[test]
    fn test_keypair_codec_roundtrip() {
        let (vk, sk) = generate_keypair();

        let sk2 = signing_key_from_b64u(&signing_key_to_b64u(&sk)).unwrap();
        let vk2 = verifying_key_from_b64u(&verifying_key_to_b64u(&vk)).unwrap();

        assert_eq!(sk.to_bytes(), sk2.to_bytes());
        assert_eq!(vk.as_bytes(), vk2.as_bytes());
    }

    #[test]
    fn test_accepts_bare_seed() {
        let (_, sk) = generate_keypair();
        let seed_b64 = codec::encode(&sk.to_bytes());

        let parsed = signing_key_from_b64u(&seed_b64).unwrap();
        assert_eq!(parsed.to_bytes(), sk.to_bytes());
    }

    #[test]
    fn test_rejects_mismatched_keypair_halves() {
        let (_, sk1) = generate_keypair();
        let (vk2, _) = generate_keypair();

        let mut bytes = [0u8; SECRET_KEYPAIR_LEN];
        bytes[..32].copy_from_slice(&sk1.to_bytes());
        bytes[32..].copy_from_slice(vk2.as_bytes());

        assert!(signing_key_from_b64u(&codec::encode(&bytes)).is_err());
    }
}
