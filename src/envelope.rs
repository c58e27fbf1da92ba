/// Dotted wire encodings for encrypted access keys and record fields.
///
/// EAK format: `b64u(ciphertext).b64u(nonce)`
/// Field format: `b64u(edk).b64u(edk_nonce).b64u(ef).b64u(ef_nonce)`
///
/// where `edk` is the per-field data key sealed under the access key and
/// `ef` is the field value sealed under the data key. All base64 is
/// URL-safe and unpadded; both nonces are 24 bytes.
use crate::crypto::aead::NONCE_LEN;
use crate::crypto::codec;
use crate::error::{ClientError, Result};

/// A wrapped access key as stored by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eak {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
}

impl Eak {
    pub fn to_wire(&self) -> String {
        format!(
            "{}.{}",
            codec::encode(&self.ciphertext),
            codec::encode(&self.nonce)
        )
    }

    pub fn from_wire(wire: &str) -> Result<Self> {
        let parts: Vec<&str> = wire.split('.').collect();
        if parts.len() != 2 {
            return Err(ClientError::MalformedEnvelope(format!(
                "EAK must have 2 dotted parts, got {}",
                parts.len()
            )));
        }

        let ciphertext = decode_part(parts[0], "EAK ciphertext")?;
        let nonce = decode_nonce(parts[1], "EAK nonce")?;

        Ok(Self { ciphertext, nonce })
    }
}

/// One encrypted record field as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    /// Data key sealed under the access key.
    pub edk: Vec<u8>,
    pub edk_nonce: [u8; NONCE_LEN],
    /// Field value sealed under the data key.
    pub ef: Vec<u8>,
    pub ef_nonce: [u8; NONCE_LEN],
}

impl EncryptedField {
    pub fn to_wire(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            codec::encode(&self.edk),
            codec::encode(&self.edk_nonce),
            codec::encode(&self.ef),
            codec::encode(&self.ef_nonce)
        )
    }

    pub fn from_wire(wire: &str) -> Result<Self> {
        let parts: Vec<&str> = wire.split('.').collect();
        if parts.len() != 4 {
            return Err(ClientError::MalformedEnvelope(format!(
                "field must have 4 dotted parts, got {}",
                parts.len()
            )));
        }

        Ok(Self {
            edk: decode_part(parts[0], "encrypted data key")?,
            edk_nonce: decode_nonce(parts[1], "data key nonce")?,
            ef: decode_part(parts[2], "encrypted field")?,
            ef_nonce: decode_nonce(parts[3], "field nonce")?,
        })
    }
}

fn decode_part(part: &str, what: &str) -> Result<Vec<u8>> {
    codec::decode(part)
        .map_err(|e| ClientError::MalformedEnvelope(format!("{what} is not valid base64: {e}")))
}

fn decode_nonce(part: &str, what: &str) -> Result<[u8; NONCE_LEN]> {
    let bytes = decode_part(part, what)?;
    bytes.try_into().map_err(|_| {
        ClientError::MalformedEnvelope(format!("{what} must be {NONCE_LEN} bytes"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eak_roundtrip() {
        let eak = Eak {
            ciphertext: vec![0xAA; 48],
            nonce: [0xBB; NONCE_LEN],
        };

        let wire = eak.to_wire();
        assert_eq!(wire.matches('.').count(), 1);
        assert_eq!(Eak::from_wire(&wire).unwrap(), eak);
    }

    #[test]
    fn test_field_roundtrip() {
        let field = EncryptedField {
            edk: vec![0x01; 48],
            edk_nonce: [0x02; NONCE_LEN],
            ef: vec![0x03; 21],
            ef_nonce: [0x04; NONCE_LEN],
        };

        let wire = field.to_wire();
        assert_eq!(wire.matches('.').count(), 3);
        assert_eq!(EncryptedField::from_wire(&wire).unwrap(), field);
    }

    #[test]
    fn test_eak_wrong_arity_rejected() {
        assert!(Eak::from_wire("onlyonepart").is_err());
        assert!(Eak::from_wire("a.b.c").is_err());
    }

    #[test]
    fn test_field_wrong_arity_rejected() {
        assert!(EncryptedField::from_wire("a.b.c").is_err());
        assert!(EncryptedField::from_wire("a.b.c.d.e").is_err());
    }

    #[test]
    fn test_bad_base64_rejected() {
        assert!(Eak::from_wire("###.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").is_err());
        assert!(EncryptedField::from_wire("AA.AA.AA.!!").is_err());
    }

    #[test]
    fn test_wrong_nonce_length_rejected() {
        // 12-byte nonce instead of 24
        let short_nonce = crate::crypto::codec::encode(&[0u8; 12]);
        let ct = crate::crypto::codec::encode(&[0u8; 48]);
        assert!(Eak::from_wire(&format!("{ct}.{short_nonce}")).is_err());
    }
}
