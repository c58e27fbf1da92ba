/// The client facade: one long-lived object binding a configuration to the
/// storage and account services.
///
/// Owns the only mutable state in the SDK (the bearer token and the
/// decrypted access-key cache), both per instance, never process-wide.
/// Dropping (or `close`-ing) the client discards both.
use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use crate::access_keys::AkManager;
use crate::api::{unexpected_status, ApiClient};
use crate::config::Config;
use crate::crypto::sensitive::SecretKeyBytes;
use crate::crypto::{aead, boxes, sign};
use crate::error::{ClientError, Result};
use crate::types::{ClientDetails, ClientInfo, EakInfo, KeyPair, RecordData};

/// Record type used for credential backups.
pub const KEY_BACKUP_TYPE: &str = "tozny.key_backup";

pub struct Client {
    config: Config,
    api: ApiClient,
    ak: AkManager,
}

impl Client {
    /// Bind a validated configuration to a fresh HTTP client, token slot,
    /// and access-key cache.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let api = ApiClient::new(&config.api_url, &config.api_key_id, &config.api_secret)?;
        Ok(Self {
            config,
            api,
            ak: AkManager::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn api(&self) -> &ApiClient {
        &self.api
    }

    pub(crate) fn ak(&self) -> &AkManager {
        &self.ak
    }

    /// Discard the cached bearer token and every decrypted access key.
    pub fn close(self) {
        self.ak.clear();
        // The token slot and HTTP connections drop with self.
    }

    /// Fetch another client's public directory entry. Email-based lookup
    /// was removed from the service and fails locally.
    pub async fn client_info(&self, client_id: &str) -> Result<ClientInfo> {
        if client_id.contains('@') {
            return Err(ClientError::EmailLookupUnsupported);
        }

        let resp = self
            .api
            .get(&format!("/v1/storage/clients/{client_id}"))
            .await?;
        if !resp.status().is_success() {
            return Err(unexpected_status("client info", resp).await);
        }
        Ok(resp.json().await?)
    }

    /// The access key for this client's own records of a type, created and
    /// self-wrapped on first use.
    pub(crate) async fn ensure_writer_ak(&self, record_type: &str) -> Result<SecretKeyBytes> {
        let id = self.config.client_id;
        if let Some(ak) = self
            .ak
            .get(&self.api, &self.config, id, id, id, record_type)
            .await?
        {
            return Ok(ak);
        }

        let ak = aead::generate_key();
        self.ak
            .put(&self.api, &self.config, id, id, id, record_type, &ak)
            .await?;
        Ok(ak)
    }

    /// This client's own wrapped access key for a type, for use with the
    /// offline [`Client::encrypt_record`] path. Created on first use.
    pub async fn writer_key(&self, record_type: &str) -> Result<EakInfo> {
        self.ensure_writer_ak(record_type).await?;
        let id = self.config.client_id;
        self.ak
            .fetch_eak(&self.api, id, id, id, record_type)
            .await?
            .ok_or(ClientError::NoAccess)
    }

    /// The wrapped access key another writer has granted this client, for
    /// use with the offline [`Client::decrypt_record`] path.
    pub async fn reader_key(
        &self,
        writer_id: Uuid,
        user_id: Uuid,
        record_type: &str,
    ) -> Result<EakInfo> {
        self.ak
            .fetch_eak(
                &self.api,
                writer_id,
                user_id,
                self.config.client_id,
                record_type,
            )
            .await?
            .ok_or(ClientError::NoAccess)
    }

    /// Generate a fresh Curve25519 keypair in wire encoding.
    pub fn generate_keypair() -> KeyPair {
        let (public, secret) = boxes::generate_keypair();
        KeyPair {
            public_key: boxes::public_key_to_b64u(&public),
            private_key: boxes::secret_key_to_b64u(&secret),
        }
    }

    /// Generate a fresh Ed25519 keypair in wire encoding.
    pub fn generate_signing_keypair() -> KeyPair {
        let (verifying, signing) = sign::generate_keypair();
        KeyPair {
            public_key: sign::verifying_key_to_b64u(&verifying),
            private_key: sign::signing_key_to_b64u(&signing),
        }
    }

    /// Register a new client against a registration token. When `backup`
    /// is set and the account has a backup client configured (signalled by
    /// the `X-Backup-Client` response header), the new client's credentials
    /// are backed up before returning.
    pub async fn register(
        registration_token: &str,
        client_name: &str,
        encryption_keys: &KeyPair,
        signing_keys: Option<&KeyPair>,
        backup: bool,
        api_url: &str,
    ) -> Result<ClientDetails> {
        let api = ApiClient::new(api_url, "", "")?;

        let mut client_body = serde_json::json!({
            "name": client_name,
            "public_key": { "curve25519": encryption_keys.public_key },
        });
        if let Some(signing) = signing_keys {
            client_body["signing_key"] = serde_json::json!({ "ed25519": signing.public_key });
        }
        let body = serde_json::json!({
            "token": registration_token,
            "client": client_body,
        });

        let resp = api
            .post_json_anonymous("/v1/account/e3db/clients/register", &body)
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::RegistrationFailed(format!(
                "status {status}: {text}"
            )));
        }

        let backup_client = resp
            .headers()
            .get("X-Backup-Client")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok());
        let details: ClientDetails = resp.json().await?;
        info!(client_id = %details.client_id, "registered client");

        if backup && !encryption_keys.private_key.is_empty() {
            if let Some(backup_id) = backup_client {
                let config = match signing_keys {
                    Some(signing) => Config::with_signing(
                        details.client_id,
                        &details.api_key_id,
                        &details.api_secret,
                        &encryption_keys.public_key,
                        &encryption_keys.private_key,
                        &signing.public_key,
                        &signing.private_key,
                        api_url,
                    ),
                    None => Config::new(
                        details.client_id,
                        &details.api_key_id,
                        &details.api_secret,
                        &encryption_keys.public_key,
                        &encryption_keys.private_key,
                        api_url,
                    ),
                };
                let transient = Client::new(config)?;
                transient.backup(backup_id, registration_token).await?;
            }
        }

        Ok(details)
    }

    /// Back up this client's credentials: write them as an encrypted
    /// `tozny.key_backup` record, share that type with the backup client,
    /// and notify the account service.
    pub async fn backup(&self, backup_client_id: Uuid, registration_token: &str) -> Result<()> {
        let credentials = backup_credentials(&self.config);
        let mut plain = HashMap::new();
        plain.insert("client".to_string(), self.config.client_id.to_string());

        self.write(KEY_BACKUP_TYPE, credentials, plain).await?;
        self.share(KEY_BACKUP_TYPE, &backup_client_id.to_string())
            .await?;

        let path = format!(
            "/v1/account/backup/{registration_token}/{}",
            self.config.client_id
        );
        let resp = self.api.post_empty_anonymous(&path).await?;
        if !resp.status().is_success() {
            return Err(unexpected_status("backup notification", resp).await);
        }

        info!(%backup_client_id, "backed up client credentials");
        Ok(())
    }
}

/// The credential record's field map: every config field in its JSON
/// string form, so the restoring side can parse values uniformly.
fn backup_credentials(config: &Config) -> RecordData {
    fn quoted(value: &str) -> String {
        serde_json::Value::String(value.to_string()).to_string()
    }

    let mut fields = RecordData::new();
    fields.insert("client_id".to_string(), quoted(&config.client_id.to_string()));
    fields.insert("api_key_id".to_string(), quoted(&config.api_key_id));
    fields.insert("api_secret".to_string(), quoted(&config.api_secret));
    fields.insert("client_email".to_string(), quoted(&config.client_email));
    fields.insert("public_key".to_string(), quoted(&config.public_key));
    fields.insert("private_key".to_string(), quoted(&config.private_key));
    if let Some(key) = config.public_sign_key.as_deref() {
        fields.insert("public_sign_key".to_string(), quoted(key));
    }
    if let Some(key) = config.private_sign_key.as_deref() {
        fields.insert("private_sign_key".to_string(), quoted(key));
    }
    fields.insert("api_url".to_string(), quoted(&config.api_url));
    fields.insert("version".to_string(), config.version.to_string());
    fields
}
