/// Access-key lifecycle against the storage service.
///
/// One 32-byte access key exists per `(writer, user, type)` triple, shared
/// by every record of that triple. The service stores it only in wrapped
/// form, sealed per authorized reader from the authorizer's private key to
/// the reader's public key. This manager fetches and unseals wrapped keys,
/// wraps keys for new readers, and keeps a per-client plaintext cache that
/// is only ever written after a successful unseal, so a cancelled request
/// cannot leave partial state.
use std::collections::HashMap;
use std::sync::Mutex;

use reqwest::StatusCode;
use tracing::debug;
use uuid::Uuid;

use crate::api::{unexpected_status, ApiClient};
use crate::config::Config;
use crate::crypto::sensitive::SecretKeyBytes;
use crate::crypto::{aead, boxes};
use crate::envelope::Eak;
use crate::error::{ClientError, Result};
use crate::types::{ClientInfo, EakInfo};

type CacheKey = (Uuid, Uuid, String);

pub(crate) struct AkManager {
    cache: Mutex<HashMap<CacheKey, SecretKeyBytes>>,
}

impl AkManager {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn ak_path(writer: Uuid, user: Uuid, reader: Uuid, record_type: &str) -> String {
        format!("/v1/storage/access_keys/{writer}/{user}/{reader}/{record_type}")
    }

    /// Cache lookup only; no network.
    pub fn cached(&self, writer: Uuid, user: Uuid, record_type: &str) -> Option<SecretKeyBytes> {
        self.cache
            .lock()
            .expect("access key cache lock poisoned")
            .get(&(writer, user, record_type.to_string()))
            .cloned()
    }

    fn store(&self, writer: Uuid, user: Uuid, record_type: &str, ak: &SecretKeyBytes) {
        self.cache
            .lock()
            .expect("access key cache lock poisoned")
            .insert((writer, user, record_type.to_string()), ak.clone());
    }

    fn evict(&self, writer: Uuid, user: Uuid, record_type: &str) {
        self.cache
            .lock()
            .expect("access key cache lock poisoned")
            .remove(&(writer, user, record_type.to_string()));
    }

    /// Drop every cached key.
    pub fn clear(&self) {
        self.cache
            .lock()
            .expect("access key cache lock poisoned")
            .clear();
    }

    /// Fetch the wrapped key for `(writer, user, reader, type)`.
    /// 404 means no such grant exists.
    pub async fn fetch_eak(
        &self,
        api: &ApiClient,
        writer: Uuid,
        user: Uuid,
        reader: Uuid,
        record_type: &str,
    ) -> Result<Option<EakInfo>> {
        let resp = api
            .get(&Self::ak_path(writer, user, reader, record_type))
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(resp.json().await?)),
            _ => Err(unexpected_status("access key fetch", resp).await),
        }
    }

    /// The access key for `(writer, user, type)`, from cache or by fetching
    /// and unsealing the reader's wrapped copy. `Ok(None)` means the grant
    /// is absent server-side.
    pub async fn get(
        &self,
        api: &ApiClient,
        config: &Config,
        writer: Uuid,
        user: Uuid,
        reader: Uuid,
        record_type: &str,
    ) -> Result<Option<SecretKeyBytes>> {
        if let Some(ak) = self.cached(writer, user, record_type) {
            return Ok(Some(ak));
        }

        match self
            .fetch_eak(api, writer, user, reader, record_type)
            .await?
        {
            None => Ok(None),
            Some(eak_info) => self
                .unseal_and_cache(config, writer, user, record_type, &eak_info)
                .map(Some),
        }
    }

    /// Unseal a wrapped key and populate the cache. Also the decrypt path
    /// for the per-result EAKs carried in search responses.
    pub fn unseal_and_cache(
        &self,
        config: &Config,
        writer: Uuid,
        user: Uuid,
        record_type: &str,
        eak_info: &EakInfo,
    ) -> Result<SecretKeyBytes> {
        let ak = unseal(config, eak_info)?;
        self.store(writer, user, record_type, &ak);
        Ok(ak)
    }

    /// Wrap the access key for a reader and store it server-side. The
    /// plaintext key is identical for every reader of the triple, so the
    /// cache entry is keyed by `(writer, user, type)` alone.
    #[allow(clippy::too_many_arguments)]
    pub async fn put(
        &self,
        api: &ApiClient,
        config: &Config,
        writer: Uuid,
        user: Uuid,
        reader: Uuid,
        record_type: &str,
        ak: &SecretKeyBytes,
    ) -> Result<()> {
        let reader_key = self.reader_public_key(api, config, reader).await?;
        let nonce = aead::generate_nonce();
        let ciphertext = boxes::encrypt(
            ak.as_bytes(),
            &nonce,
            &reader_key,
            &config.encryption_secret()?,
        )?;
        let eak = Eak { ciphertext, nonce };

        let body = serde_json::json!({ "eak": eak.to_wire() });
        let resp = api
            .put_json(&Self::ak_path(writer, user, reader, record_type), &body)
            .await?;
        if !resp.status().is_success() {
            return Err(unexpected_status("access key put", resp).await);
        }

        debug!(%writer, %reader, record_type, "stored wrapped access key");
        self.store(writer, user, record_type, ak);
        Ok(())
    }

    /// Delete the reader's wrapped key and evict the local cache entry.
    pub async fn delete(
        &self,
        api: &ApiClient,
        writer: Uuid,
        user: Uuid,
        reader: Uuid,
        record_type: &str,
    ) -> Result<()> {
        let resp = api
            .delete(&Self::ak_path(writer, user, reader, record_type))
            .await?;
        let status = resp.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(unexpected_status("access key delete", resp).await);
        }

        self.evict(writer, user, record_type);
        Ok(())
    }

    async fn reader_public_key(
        &self,
        api: &ApiClient,
        config: &Config,
        reader: Uuid,
    ) -> Result<crypto_box::PublicKey> {
        if reader == config.client_id {
            return config.encryption_public();
        }

        let resp = api.get(&format!("/v1/storage/clients/{reader}")).await?;
        if !resp.status().is_success() {
            return Err(unexpected_status("client lookup", resp).await);
        }
        let info: ClientInfo = resp.json().await?;
        boxes::public_key_from_b64u(&info.public_key.curve25519)
    }
}

/// Open a wrapped key with our private key and the authorizer's public key.
fn unseal(config: &Config, eak_info: &EakInfo) -> Result<SecretKeyBytes> {
    let eak = Eak::from_wire(&eak_info.eak)?;
    let authorizer = boxes::public_key_from_b64u(&eak_info.authorizer_public_key.curve25519)?;
    let raw = boxes::decrypt(
        &eak.ciphertext,
        &eak.nonce,
        &authorizer,
        &config.encryption_secret()?,
    )?;
    SecretKeyBytes::from_slice(&raw)
        .ok_or_else(|| ClientError::Decryption("access key must be 32 bytes".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_API_URL;
    use crate::crypto::sign;
    use crate::types::PublicKeyInfo;

    fn test_config() -> Config {
        let (pk, sk) = boxes::generate_keypair();
        let (vk, sgk) = sign::generate_keypair();
        Config::with_signing(
            Uuid::new_v4(),
            "key-id",
            "key-secret",
            &boxes::public_key_to_b64u(&pk),
            &boxes::secret_key_to_b64u(&sk),
            &sign::verifying_key_to_b64u(&vk),
            &sign::signing_key_to_b64u(&sgk),
            DEFAULT_API_URL,
        )
    }

    /// Wrap an access key from an authorizer to the given config's keypair,
    /// the way the service would hand it back.
    fn wrap_for(config: &Config, ak: &SecretKeyBytes) -> EakInfo {
        let (authorizer_pk, authorizer_sk) = boxes::generate_keypair();
        let reader_pk = config.encryption_public().unwrap();
        let nonce = aead::generate_nonce();
        let ciphertext = boxes::encrypt(ak.as_bytes(), &nonce, &reader_pk, &authorizer_sk).unwrap();

        EakInfo {
            eak: Eak { ciphertext, nonce }.to_wire(),
            authorizer_public_key: PublicKeyInfo {
                curve25519: boxes::public_key_to_b64u(&authorizer_pk),
            },
            signer_signing_key: None,
            authorizer_id: Uuid::new_v4(),
            signer_id: None,
        }
    }

    #[test]
    fn test_unseal_and_cache_roundtrip() {
        let config = test_config();
        let manager = AkManager::new();
        let writer = Uuid::new_v4();
        let ak = aead::generate_key();

        let eak_info = wrap_for(&config, &ak);
        let unsealed = manager
            .unseal_and_cache(&config, writer, writer, "test_record", &eak_info)
            .unwrap();

        assert_eq!(unsealed.as_bytes(), ak.as_bytes());
        let cached = manager.cached(writer, writer, "test_record").unwrap();
        assert_eq!(cached.as_bytes(), ak.as_bytes());
    }

    #[test]
    fn test_unseal_with_wrong_private_key_fails() {
        let config = test_config();
        let other = test_config();
        let manager = AkManager::new();
        let ak = aead::generate_key();

        let eak_info = wrap_for(&config, &ak);
        let writer = Uuid::new_v4();
        let result = manager.unseal_and_cache(&other, writer, writer, "test_record", &eak_info);

        assert!(matches!(result, Err(ClientError::Decryption(_))));
        // A failed unseal must not leave a cache entry behind.
        assert!(manager.cached(writer, writer, "test_record").is_none());
    }

    #[test]
    fn test_malformed_eak_rejected() {
        let config = test_config();
        let manager = AkManager::new();
        let writer = Uuid::new_v4();

        let mut eak_info = wrap_for(&config, &aead::generate_key());
        eak_info.eak = "no-dot-here".to_string();

        let result = manager.unseal_and_cache(&config, writer, writer, "t", &eak_info);
        assert!(matches!(result, Err(ClientError::MalformedEnvelope(_))));
    }

    #[test]
    fn test_cache_eviction_and_clear() {
        let manager = AkManager::new();
        let writer = Uuid::new_v4();
        let ak = aead::generate_key();

        manager.store(writer, writer, "type_a", &ak);
        manager.store(writer, writer, "type_b", &ak);

        manager.evict(writer, writer, "type_a");
        assert!(manager.cached(writer, writer, "type_a").is_none());
        assert!(manager.cached(writer, writer, "type_b").is_some());

        manager.clear();
        assert!(manager.cached(writer, writer, "type_b").is_none());
    }

    #[test]
    fn test_cache_is_keyed_by_full_triple() {
        let manager = AkManager::new();
        let writer = Uuid::new_v4();
        let user = Uuid::new_v4();
        let ak = aead::generate_key();

        manager.store(writer, user, "t", &ak);
        assert!(manager.cached(writer, writer, "t").is_none());
        assert!(manager.cached(writer, user, "other").is_none());
        assert!(manager.cached(writer, user, "t").is_some());
    }
}
