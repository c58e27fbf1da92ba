/// X25519 + XSalsa20-Poly1305 public-key authenticated encryption (NaCl box).
///
/// Access keys travel between clients sealed from the authorizer's private
/// key to the reader's public key. The reader can both decrypt and
/// authenticate the sender; the storage service can do neither.
use crypto_box::aead::Aead;
use crypto_box::{Nonce, PublicKey, SalsaBox, SecretKey};
use rand::rngs::OsRng;

use crate::crypto::codec;
use crate::error::{ClientError, Result};

pub const NONCE_LEN: usize = 24;
pub const KEY_LEN: usize = 32;

/// Generate a fresh X25519 keypair.
pub fn generate_keypair() -> (PublicKey, SecretKey) {
    let secret = SecretKey::generate(&mut OsRng);
    (secret.public_key(), secret)
}

/// Seal a message from the sender to the recipient.
pub fn encrypt(
    plaintext: &[u8],
    nonce: &[u8; NONCE_LEN],
    recipient_public: &PublicKey,
    sender_secret: &SecretKey,
) -> Result<Vec<u8>> {
    let sealer = SalsaBox::new(recipient_public, sender_secret);
    sealer
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| ClientError::Encryption(e.to_string()))
}

/// Open a box sealed by the sender for the recipient. Fails if the
/// authentication tag does not match.
pub fn decrypt(
    ciphertext: &[u8],
    nonce: &[u8; NONCE_LEN],
    sender_public: &PublicKey,
    recipient_secret: &SecretKey,
) -> Result<Vec<u8>> {
    let opener = SalsaBox::new(sender_public, recipient_secret);
    opener
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| ClientError::Decryption("box authentication failed".to_string()))
}

/// Parse a URL-safe-base64 X25519 public key.
pub fn public_key_from_b64u(encoded: &str) -> Result<PublicKey> {
    let bytes = codec::decode(encoded)
        .map_err(|e| ClientError::InvalidKey(format!("public key is not valid base64: {e}")))?;
    let bytes: [u8; KEY_LEN] = bytes
        .try_into()
        .map_err(|_| ClientError::InvalidKey("public key must be 32 bytes".to_string()))?;
    Ok(PublicKey::from(bytes))
}

/// Parse a URL-safe-base64 X25519 secret key.
pub fn secret_key_from_b64u(encoded: &str) -> Result<SecretKey> {
    let bytes = codec::decode(encoded)
        .map_err(|e| ClientError::InvalidKey(format!("private key is not valid base64: {e}")))?;
    let bytes: [u8; KEY_LEN] = bytes
        .try_into()
        .map_err(|_| ClientError::InvalidKey("private key must be 32 bytes".to_string()))?;
    Ok(SecretKey::from(bytes))
}

pub fn public_key_to_b64u(key: &PublicKey) -> String {
    codec::encode(key.as_bytes())
}

pub fn secret_key_to_b64u(key: &SecretKey) -> String {
    codec::encode(&key.to_bytes())
}
