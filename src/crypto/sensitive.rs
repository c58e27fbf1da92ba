/// Wrapper for 32-byte secret key material that is zeroized on drop.
///
/// Access keys, per-field data keys, and PBKDF2-derived seeds all live in
/// this type so they never linger in memory after use.
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A 32-byte symmetric key or seed, zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKeyBytes([u8; 32]);

impl SecretKeyBytes {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }
}

impl AsRef<[u8]> for SecretKeyBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKeyBytes(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_length_check() {
        assert!(SecretKeyBytes::from_slice(&[0u8; 32]).is_some());
        assert!(SecretKeyBytes::from_slice(&[0u8; 16]).is_none());
        assert!(SecretKeyBytes::from_slice(&[0u8; 33]).is_none());
    }

    #[test]
    fn test_generate_is_random() {
        let a = SecretKeyBytes::generate();
        let b = SecretKeyBytes::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_debug_does_not_leak() {
        let key = SecretKeyBytes::new([0xAA; 32]);
        assert_eq!(format!("{key:?}"), "SecretKeyBytes(..)");
    }
}
