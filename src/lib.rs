//! Client SDK for the E3DB end-to-end encrypted record service.
//!
//! Records are small maps of string fields. Every field value is encrypted
//! on the client before transit: the value is sealed under a fresh data
//! key, the data key under the record type's shared access key, and the
//! access key travels between clients only in public-key-sealed form. The
//! service stores and indexes ciphertext; it never sees plaintext field
//! values, data keys, or private keys.
//!
//! ```no_run
//! use e3db_client::{Client, Config};
//! use std::collections::HashMap;
//!
//! # async fn example() -> e3db_client::Result<()> {
//! let config = Config::from_json(&std::fs::read_to_string("e3db.json").unwrap())?;
//! let client = Client::new(config)?;
//!
//! let mut data = HashMap::new();
//! data.insert("now".to_string(), "2017-01-02T03:04:05Z".to_string());
//! let record = client.write("test_record", data, HashMap::new()).await?;
//!
//! let back = client.read(record.meta.record_id.unwrap()).await?;
//! assert_eq!(back.data["now"], "2017-01-02T03:04:05Z");
//! # Ok(())
//! # }
//! ```

mod access_keys;
mod api;
mod sharing;

pub mod canonical;
pub mod client;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod query;
pub mod records;
pub mod types;

pub use client::{Client, KEY_BACKUP_TYPE};
pub use config::{Config, DEFAULT_API_URL};
pub use error::{ClientError, Result};
pub use query::{Query, QueryCursor};
pub use records::{sign_document, verify_document};
pub use types::{
    ClientDetails, ClientInfo, EakInfo, IncomingSharingPolicy, KeyPair, Meta,
    OutgoingSharingPolicy, PublicKeyInfo, Record, RecordData, SigningKeyInfo,
};
