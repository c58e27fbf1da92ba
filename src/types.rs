/// Wire types shared across the client.
///
/// These structs map directly to the JSON bodies of the storage and account
/// services. Server-assigned meta fields are optional and omitted from
/// request bodies when unset.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A record's field map. Plaintext on the client side, dotted four-part
/// envelopes on the wire.
pub type RecordData = HashMap<String, String>;

/// Server-visible record header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
    pub writer_id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub plain: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Opaque optimistic-concurrency token, reassigned by the server on
    /// every write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Meta {
    /// A fresh header for a record that has never been written.
    pub fn new(writer_id: Uuid, user_id: Uuid, record_type: &str) -> Self {
        Self {
            record_id: None,
            writer_id,
            user_id,
            record_type: record_type.to_string(),
            plain: HashMap::new(),
            created: None,
            last_modified: None,
            version: None,
        }
    }

    pub fn with_plain(mut self, plain: HashMap<String, String>) -> Self {
        self.plain = plain;
        self
    }
}

/// The unit of storage: header, field map, and (for version 2 clients) a
/// detached signature over the canonical record form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub meta: Meta,
    #[serde(default)]
    pub data: RecordData,
    #[serde(rename = "rec_sig", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// An X25519 public key as published by the directory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    pub curve25519: String,
}

/// An Ed25519 public key as published by the directory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningKeyInfo {
    pub ed25519: String,
}

/// Public directory entry for a client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    pub client_id: Uuid,
    pub public_key: PublicKeyInfo,
    #[serde(default)]
    pub validated: bool,
}

/// A wrapped access key plus everything the reader needs to unseal it and
/// later verify record signatures from its writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EakInfo {
    /// `b64u(ciphertext).b64u(nonce)`.
    pub eak: String,
    /// Older service generations emitted this field in camelCase; accept
    /// both, always emit snake_case.
    #[serde(alias = "authorizerPublicKey")]
    pub authorizer_public_key: PublicKeyInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_signing_key: Option<SigningKeyInfo>,
    pub authorizer_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_id: Option<Uuid>,
}

/// Credentials returned by the registration endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientDetails {
    pub client_id: Uuid,
    pub api_key_id: String,
    pub api_secret: String,
    pub public_key: PublicKeyInfo,
    #[serde(default)]
    pub signing_key: Option<SigningKeyInfo>,
    #[serde(default)]
    pub name: String,
}

/// One row of the outgoing-sharing listing: a reader this client has
/// granted access to, per record type.
#[derive(Debug, Clone, Deserialize)]
pub struct OutgoingSharingPolicy {
    pub reader_id: Uuid,
    pub record_type: String,
    #[serde(default)]
    pub reader_name: String,
}

/// One row of the incoming-sharing listing: a writer that has granted this
/// client access, per record type.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingSharingPolicy {
    pub writer_id: Uuid,
    pub record_type: String,
    #[serde(default)]
    pub writer_name: String,
}

/// A generated keypair in wire encoding.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,
}
