/// XSalsa20-Poly1305 secret-box encryption for record fields and data keys.
///
/// Every field value is sealed under a fresh random data key, and the data
/// key is sealed under the access key for the record's type. Both layers use
/// the 24-byte random nonces of NaCl secretbox; collisions are not a
/// practical concern at that size.
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Key, Nonce, XSalsa20Poly1305};
use rand::RngCore;

use crate::crypto::sensitive::SecretKeyBytes;
use crate::error::{ClientError, Result};

pub const NONCE_LEN: usize = 24;
pub const KEY_LEN: usize = 32;

/// Generate a random 256-bit secretbox key.
pub fn generate_key() -> SecretKeyBytes {
    SecretKeyBytes::generate()
}

/// Generate a random 24-byte nonce.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// `n` fresh bytes from the OS CSPRNG.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}

/// Seal plaintext with XSalsa20-Poly1305 under the given key and nonce.
pub fn encrypt(key: &SecretKeyBytes, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XSalsa20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| ClientError::Encryption(e.to_string()))
}

/// Open an XSalsa20-Poly1305 box. Fails if the authentication tag does not
/// match (wrong key, wrong nonce, or tampered ciphertext).
pub fn decrypt(key: &SecretKeyBytes, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XSalsa20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| ClientError::Decryption("secretbox authentication failed".to_string()))
}
