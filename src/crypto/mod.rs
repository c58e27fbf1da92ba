/// Cryptographic primitives for the client.
///
/// Everything the wire format needs and nothing more: NaCl box
/// (X25519 + XSalsa20-Poly1305) for access-key wrapping, NaCl secretbox
/// (XSalsa20-Poly1305) for field and data-key encryption, detached Ed25519
/// signatures over the canonical record form, and PBKDF2-HMAC-SHA512 for
/// password-derived credentials.
pub mod aead;
pub mod boxes;
pub mod codec;
pub mod kdf;
pub mod sensitive;
pub mod sign;
