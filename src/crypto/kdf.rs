/// PBKDF2-HMAC-SHA512 key derivation for password-based credentials.
///
/// The iteration count is a wire-compatibility constant: every client
/// implementation must derive the same keys from the same password and salt.
use ed25519_dalek::{SigningKey, VerifyingKey};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha512;

use crate::crypto::sensitive::SecretKeyBytes;
use crypto_box::{PublicKey, SecretKey};

/// Fixed PBKDF2 round count shared by all client implementations.
pub const PBKDF2_ROUNDS: u32 = 1000;
pub const SALT_LEN: usize = 16;

/// Generate a random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive `out.len()` bytes from a password and salt.
pub fn derive_bytes(password: &[u8], salt: &[u8], out: &mut [u8]) {
    pbkdf2_hmac::<Sha512>(password, salt, PBKDF2_ROUNDS, out);
}

/// Derive a 32-byte symmetric key.
pub fn derive_symmetric_key(password: &[u8], salt: &[u8]) -> SecretKeyBytes {
    let mut seed = [0u8; 32];
    derive_bytes(password, salt, &mut seed);
    SecretKeyBytes::new(seed)
}

/// Derive an Ed25519 signing keypair from a password-derived seed.
pub fn derive_signing_keypair(password: &[u8], salt: &[u8]) -> (VerifyingKey, SigningKey) {
    let mut seed = [0u8; 32];
    derive_bytes(password, salt, &mut seed);
    let signing_key = SigningKey::from_bytes(&seed);
    (signing_key.verifying_key(), signing_key)
}

/// Derive an X25519 encryption keypair from a password-derived seed.
pub fn derive_encryption_keypair(password: &[u8], salt: &[u8]) -> (PublicKey, SecretKey) {
    let mut seed = [0u8; 32];
    derive_bytes(password, salt, &mut seed);
    let secret = SecretKey::from(seed);
    (secret.public_key(), secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let salt = [0x42u8; SALT_LEN];
        let k1 = derive_symmetric_key(b"correct horse battery staple", &salt);
        let k2 = derive_symmetric_key(b"correct horse battery staple", &salt);
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_different_password_different_key() {
        let salt = [0x42u8; SALT_LEN];
        let k1 = derive_symmetric_key(b"password1", &salt);
        let k2 = derive_symmetric_key(b"password2", &salt);
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_different_salt_different_key() {
        let k1 = derive_symmetric_key(b"password", &[0x01; SALT_LEN]);
        let k2 = derive_symmetric_key(b"password", &[0x02; SALT_LEN]);
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_derived_keypairs_are_stable() {
        let salt = [0x07u8; SALT_LEN];

        let (vk1, sk1) = derive_signing_keypair(b"password", &salt);
        let (vk2, sk2) = derive_signing_keypair(b"password", &salt);
        assert_eq!(vk1.as_bytes(), vk2.as_bytes());
        assert_eq!(sk1.to_bytes(), sk2.to_bytes());

        let (pk1, _) = derive_encryption_keypair(b"password", &salt);
        let (pk2, _) = derive_encryption_keypair(b"password", &salt);
        assert_eq!(pk1.as_bytes(), pk2.as_bytes());
    }

    #[test]
    fn test_signing_and_encryption_seeds_coincide() {
        // Both keypairs come from the same 32-byte PBKDF2 stream; the
        // asymmetry lives in the curve operations, not the seed.
        let salt = [0x09u8; SALT_LEN];
        let mut seed = [0u8; 32];
        derive_bytes(b"password", &salt, &mut seed);

        let (_, sk) = derive_signing_keypair(b"password", &salt);
        assert_eq!(sk.to_bytes(), seed);
    }

    #[test]
    fn test_generate_salt_unique() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
