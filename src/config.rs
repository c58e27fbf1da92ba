/// Client configuration: identity, API credentials, and key material.
///
/// A version 1 configuration carries only the Curve25519 encryption
/// keypair; version 2 adds the Ed25519 signing keypair and is required for
/// signed records. The JSON form uses the same field names as the
/// credential-backup record, so a backed-up config round-trips.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{boxes, sign};
use crate::error::{ClientError, Result};

pub const DEFAULT_API_URL: &str = "https://api.e3db.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    pub client_id: Uuid,
    pub api_key_id: String,
    pub api_secret: String,
    /// Legacy field carried for older credential backups; unused by v2.
    #[serde(default)]
    pub client_email: String,
    /// URL-safe-base64 Curve25519 public key.
    pub public_key: String,
    /// URL-safe-base64 Curve25519 private key.
    pub private_key: String,
    /// URL-safe-base64 Ed25519 public key (version 2 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_sign_key: Option<String>,
    /// URL-safe-base64 Ed25519 private key (version 2 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_sign_key: Option<String>,
    pub api_url: String,
}

impl Config {
    /// A version 1 configuration (encryption keys only).
    pub fn new(
        client_id: Uuid,
        api_key_id: &str,
        api_secret: &str,
        public_key: &str,
        private_key: &str,
        api_url: &str,
    ) -> Self {
        Self {
            version: 1,
            client_id,
            api_key_id: api_key_id.to_string(),
            api_secret: api_secret.to_string(),
            client_email: String::new(),
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
            public_sign_key: None,
            private_sign_key: None,
            api_url: api_url.to_string(),
        }
    }

    /// A version 2 configuration (encryption and signing keys).
    #[allow(clippy::too_many_arguments)]
    pub fn with_signing(
        client_id: Uuid,
        api_key_id: &str,
        api_secret: &str,
        public_key: &str,
        private_key: &str,
        public_sign_key: &str,
        private_sign_key: &str,
        api_url: &str,
    ) -> Self {
        Self {
            version: 2,
            client_id,
            api_key_id: api_key_id.to_string(),
            api_secret: api_secret.to_string(),
            client_email: String::new(),
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
            public_sign_key: Some(public_sign_key.to_string()),
            private_sign_key: Some(private_sign_key.to_string()),
            api_url: api_url.to_string(),
        }
    }

    /// Check the invariants the declared version imposes.
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 && self.version != 2 {
            return Err(ClientError::ConfigInvalid(format!(
                "unsupported configuration version {}",
                self.version
            )));
        }
        for (name, value) in [
            ("api_key_id", &self.api_key_id),
            ("api_secret", &self.api_secret),
            ("public_key", &self.public_key),
            ("private_key", &self.private_key),
            ("api_url", &self.api_url),
        ] {
            if value.is_empty() {
                return Err(ClientError::ConfigInvalid(format!("{name} is empty")));
            }
        }
        if self.version == 2 {
            let signing_present = self
                .public_sign_key
                .as_deref()
                .is_some_and(|k| !k.is_empty())
                && self
                    .private_sign_key
                    .as_deref()
                    .is_some_and(|k| !k.is_empty());
            if !signing_present {
                return Err(ClientError::ConfigInvalid(
                    "version 2 requires both signing keys".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| ClientError::ConfigInvalid(format!("bad config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ClientError::ConfigInvalid(e.to_string()))
    }

    /// The client's Curve25519 private key, parsed.
    pub(crate) fn encryption_secret(&self) -> Result<crypto_box::SecretKey> {
        boxes::secret_key_from_b64u(&self.private_key)
    }

    /// The client's Curve25519 public key, parsed.
    pub(crate) fn encryption_public(&self) -> Result<crypto_box::PublicKey> {
        boxes::public_key_from_b64u(&self.public_key)
    }

    /// The client's Ed25519 signing key, or SignatureUnavailable for v1.
    pub(crate) fn signing_secret(&self) -> Result<ed25519_dalek::SigningKey> {
        match self.private_sign_key.as_deref() {
            Some(key) if !key.is_empty() => sign::signing_key_from_b64u(key),
            _ => Err(ClientError::SignatureUnavailable),
        }
    }

    /// The client's Ed25519 verifying key, or SignatureUnavailable for v1.
    pub(crate) fn signing_public(&self) -> Result<ed25519_dalek::VerifyingKey> {
        match self.public_sign_key.as_deref() {
            Some(key) if !key.is_empty() => sign::verifying_key_from_b64u(key),
            _ => Err(ClientError::SignatureUnavailable),
        }
    }
}
