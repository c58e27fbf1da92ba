/// Record engine: build, sign, encrypt, decrypt, and verify records.
///
/// The write path mirrors the read path in reverse:
/// 1. Build meta with this client as writer and subject
/// 2. Sign the canonical (meta, data) pair (version 2 configurations)
/// 3. Seal each field under a fresh data key, and each data key under the
///    type's access key
/// 4. Submit, then decrypt the server's echo so the caller gets back
///    plaintext plus server-assigned meta
///
/// Field plaintext never leaves the client; a data key is used for exactly
/// one field of one write.
use std::collections::HashMap;

use reqwest::StatusCode;
use tracing::info;
use uuid::Uuid;

use crate::api::unexpected_status;
use crate::canonical::{RecordInfo, Signable};
use crate::client::Client;
use crate::crypto::sensitive::SecretKeyBytes;
use crate::crypto::{aead, codec, sign};
use crate::envelope::EncryptedField;
use crate::error::{ClientError, Result};
use crate::types::{EakInfo, Meta, Record, RecordData};

/// Sign a document's canonical form, returning the detached signature in
/// URL-safe base64.
pub fn sign_document(document: &impl Signable, key: &ed25519_dalek::SigningKey) -> String {
    codec::encode(&sign::sign_detached(document.to_signable().as_bytes(), key))
}

/// Verify a detached signature over a document's canonical form.
pub fn verify_document(
    document: &impl Signable,
    signature_b64u: &str,
    key: &ed25519_dalek::VerifyingKey,
) -> bool {
    match codec::decode(signature_b64u) {
        Ok(signature) => {
            sign::verify_detached(&signature, document.to_signable().as_bytes(), key)
        }
        Err(_) => false,
    }
}

/// Seal every field of a record under fresh data keys.
pub(crate) fn encrypt_data(ak: &SecretKeyBytes, data: &RecordData) -> Result<RecordData> {
    let mut out = RecordData::with_capacity(data.len());
    for (name, value) in data {
        let dk = aead::generate_key();
        let ef_nonce = aead::generate_nonce();
        let ef = aead::encrypt(&dk, &ef_nonce, value.as_bytes())?;

        let edk_nonce = aead::generate_nonce();
        let edk = aead::encrypt(ak, &edk_nonce, dk.as_bytes())?;

        let field = EncryptedField {
            edk,
            edk_nonce,
            ef,
            ef_nonce,
        };
        out.insert(name.clone(), field.to_wire());
    }
    Ok(out)
}

/// Open every field present in the map. Partial maps (field selection on
/// read) decrypt fine; only the entries present are touched.
pub(crate) fn decrypt_data(ak: &SecretKeyBytes, data: &RecordData) -> Result<RecordData> {
    let mut out = RecordData::with_capacity(data.len());
    for (name, wire) in data {
        let field = EncryptedField::from_wire(wire)?;

        let dk_raw = aead::decrypt(ak, &field.edk_nonce, &field.edk)?;
        let dk = SecretKeyBytes::from_slice(&dk_raw)
            .ok_or_else(|| ClientError::Decryption("data key must be 32 bytes".to_string()))?;

        let value = aead::decrypt(&dk, &field.ef_nonce, &field.ef)?;
        let value = String::from_utf8(value)
            .map_err(|_| ClientError::Decryption("field value is not UTF-8".to_string()))?;
        out.insert(name.clone(), value);
    }
    Ok(out)
}

/// Replace a record's cipher-encoded data with plaintext in place.
pub(crate) fn decrypt_record_data(ak: &SecretKeyBytes, record: Record) -> Result<Record> {
    let data = decrypt_data(ak, &record.data)?;
    Ok(Record { data, ..record })
}

impl Client {
    /// Write a new record. Returns the stored record with server-assigned
    /// meta and plaintext data.
    pub async fn write(
        &self,
        record_type: &str,
        data: RecordData,
        plain: HashMap<String, String>,
    ) -> Result<Record> {
        let id = self.config().client_id;
        let meta = Meta::new(id, id, record_type).with_plain(plain);
        let mut record = Record {
            meta,
            data,
            signature: None,
        };
        if self.config().version == 2 {
            record.signature = Some(self.sign_record(&record)?);
        }

        let ak = self.ensure_writer_ak(record_type).await?;
        let envelope = Record {
            meta: record.meta.clone(),
            data: encrypt_data(&ak, &record.data)?,
            signature: record.signature.clone(),
        };

        let resp = self.api().post_json("/v1/storage/records", &envelope).await?;
        if !resp.status().is_success() {
            return Err(unexpected_status("record write", resp).await);
        }
        let stored: Record = resp.json().await?;

        info!(record_type, record_id = ?stored.meta.record_id, "wrote record");
        decrypt_record_data(&ak, stored)
    }

    /// Read a record by id, decrypting every field.
    pub async fn read(&self, record_id: Uuid) -> Result<Record> {
        self.read_fields(record_id, &[]).await
    }

    /// Read a record by id, asking the server for only the named fields.
    /// An empty list means all fields.
    pub async fn read_fields(&self, record_id: Uuid, fields: &[&str]) -> Result<Record> {
        let path = format!("/v1/storage/records/{record_id}");
        let resp = if fields.is_empty() {
            self.api().get(&path).await?
        } else {
            let query: Vec<(&str, &str)> = fields.iter().map(|f| ("field", *f)).collect();
            self.api().get_with_query(&path, &query).await?
        };
        if !resp.status().is_success() {
            return Err(unexpected_status("record read", resp).await);
        }
        let stored: Record = resp.json().await?;

        let ak = self
            .ak()
            .get(
                self.api(),
                self.config(),
                stored.meta.writer_id,
                stored.meta.user_id,
                self.config().client_id,
                &stored.meta.record_type,
            )
            .await?
            .ok_or(ClientError::NoAccess)?;
        decrypt_record_data(&ak, stored)
    }

    /// Update an existing record under optimistic concurrency. The record
    /// must carry the id and version from a previous write or read; a
    /// version mismatch surfaces as `Conflict`. The type's access key is
    /// reused, never rotated.
    pub async fn update(&self, record: &Record) -> Result<Record> {
        let record_id = record.meta.record_id.ok_or_else(|| {
            ClientError::InvalidInput("record has no id; write it first".to_string())
        })?;
        let version = record
            .meta
            .version
            .as_deref()
            .ok_or_else(|| ClientError::InvalidInput("record has no version".to_string()))?;

        let mut updated = record.clone();
        updated.signature = if self.config().version == 2 {
            // Mutated data invalidates the old signature.
            Some(self.sign_record(&updated)?)
        } else {
            None
        };

        let ak = self
            .ak()
            .get(
                self.api(),
                self.config(),
                updated.meta.writer_id,
                updated.meta.user_id,
                self.config().client_id,
                &updated.meta.record_type,
            )
            .await?
            .ok_or(ClientError::NoAccess)?;

        let envelope = Record {
            meta: updated.meta.clone(),
            data: encrypt_data(&ak, &updated.data)?,
            signature: updated.signature.clone(),
        };

        let path = format!("/v1/storage/records/safe/{record_id}/{version}");
        let resp = self.api().put_json(&path, &envelope).await?;
        match resp.status() {
            StatusCode::CONFLICT => Err(ClientError::Conflict),
            status if status.is_success() => {
                let stored: Record = resp.json().await?;
                decrypt_record_data(&ak, stored)
            }
            _ => Err(unexpected_status("record update", resp).await),
        }
    }

    /// Delete a record, safely (with a version) or unsafely (without).
    /// 403 counts as success so deleting an already-gone record is
    /// idempotent; 409 on the safe path surfaces as `Conflict`.
    pub async fn delete(&self, record_id: Uuid, version: Option<&str>) -> Result<()> {
        let path = match version {
            Some(version) => format!("/v1/storage/records/safe/{record_id}/{version}"),
            None => format!("/v1/storage/records/{record_id}"),
        };
        let resp = self.api().delete(&path).await?;
        match resp.status() {
            StatusCode::NO_CONTENT | StatusCode::FORBIDDEN => Ok(()),
            StatusCode::CONFLICT => Err(ClientError::Conflict),
            status if status.is_success() => Ok(()),
            _ => Err(unexpected_status("record delete", resp).await),
        }
    }

    /// Encrypt a record with a caller-supplied wrapped access key, without
    /// touching the record endpoints. Pairs with [`Client::writer_key`].
    pub fn encrypt_record(
        &self,
        record_type: &str,
        data: RecordData,
        plain: HashMap<String, String>,
        eak_info: &EakInfo,
    ) -> Result<Record> {
        let id = self.config().client_id;
        let ak = self.cached_or_unseal(id, id, record_type, eak_info)?;

        let meta = Meta::new(id, id, record_type).with_plain(plain);
        let mut record = Record {
            meta,
            data,
            signature: None,
        };
        if self.config().version == 2 {
            record.signature = Some(self.sign_record(&record)?);
        }

        Ok(Record {
            meta: record.meta.clone(),
            data: encrypt_data(&ak, &record.data)?,
            signature: record.signature,
        })
    }

    /// Decrypt a record with a caller-supplied wrapped access key. For
    /// version 2 configurations the record's signature is verified against
    /// the signer key embedded in the EAK; a missing signer key, missing
    /// signature, or failed verification is `SignatureInvalid`.
    pub fn decrypt_record(&self, record: Record, eak_info: &EakInfo) -> Result<Record> {
        let ak = self.cached_or_unseal(
            record.meta.writer_id,
            record.meta.user_id,
            &record.meta.record_type,
            eak_info,
        )?;
        let decrypted = decrypt_record_data(&ak, record)?;

        if self.config().version == 2 {
            let signer = eak_info
                .signer_signing_key
                .as_ref()
                .ok_or(ClientError::SignatureInvalid)?;
            let verifying_key = sign::verifying_key_from_b64u(&signer.ed25519)?;
            let signature = decrypted
                .signature
                .as_deref()
                .ok_or(ClientError::SignatureInvalid)?;

            let info = RecordInfo::new(&decrypted.meta, &decrypted.data);
            if !verify_document(&info, signature, &verifying_key) {
                return Err(ClientError::SignatureInvalid);
            }
        }

        Ok(decrypted)
    }

    /// Detached signature over the record's canonical (meta, data) form.
    pub(crate) fn sign_record(&self, record: &Record) -> Result<String> {
        let key = self.config().signing_secret()?;
        let info = RecordInfo::new(&record.meta, &record.data);
        Ok(sign_document(&info, &key))
    }

    fn cached_or_unseal(
        &self,
        writer: Uuid,
        user: Uuid,
        record_type: &str,
        eak_info: &EakInfo,
    ) -> Result<SecretKeyBytes> {
        match self.ak().cached(writer, user, record_type) {
            Some(ak) => Ok(ak),
            None => self
                .ak()
                .unseal_and_cache(self.config(), writer, user, record_type, eak_info),
        }
    }
}
