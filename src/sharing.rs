/// Sharing and revocation of per-type read access.
///
/// Granting a reader takes two server-side writes, and the order matters
/// both ways. On share, the wrapped access key is stored before the policy
/// opens, so a reader never sees records it cannot decrypt. On revoke, the
/// policy closes before the wrapped key is deleted, so a racing reader
/// cannot pick up new records while its key still exists.
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::unexpected_status;
use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::types::{IncomingSharingPolicy, OutgoingSharingPolicy};

fn policy_path(writer: Uuid, user: Uuid, reader: Uuid, record_type: &str) -> String {
    format!("/v1/storage/policy/{writer}/{user}/{reader}/{record_type}")
}

impl Client {
    /// Grant a reader access to every record this client writes with the
    /// given type. The reader may be a client id or (in older deployments)
    /// an email address; sharing with yourself is a no-op.
    pub async fn share(&self, record_type: &str, reader: &str) -> Result<()> {
        let reader_id = self.resolve_reader(reader).await?;
        let id = self.config().client_id;
        if reader_id == id {
            return Ok(());
        }

        // Creating the key here permits sharing a type before its first
        // write.
        let ak = self.ensure_writer_ak(record_type).await?;
        self.ak()
            .put(self.api(), self.config(), id, id, reader_id, record_type, &ak)
            .await?;

        let body = json!({ "allow": [{ "read": {} }] });
        let resp = self
            .api()
            .put_json(&policy_path(id, id, reader_id, record_type), &body)
            .await?;
        if !resp.status().is_success() {
            return Err(unexpected_status("share policy", resp).await);
        }

        info!(record_type, %reader_id, "shared record type");
        Ok(())
    }

    /// Withdraw a reader's access to the given type: close the policy,
    /// then delete their wrapped access key.
    pub async fn revoke(&self, record_type: &str, reader: &str) -> Result<()> {
        let reader_id = self.resolve_reader(reader).await?;
        let id = self.config().client_id;
        if reader_id == id {
            return Ok(());
        }

        let body = json!({ "deny": [{ "read": {} }] });
        let resp = self
            .api()
            .put_json(&policy_path(id, id, reader_id, record_type), &body)
            .await?;
        if !resp.status().is_success() {
            return Err(unexpected_status("revoke policy", resp).await);
        }

        self.ak()
            .delete(self.api(), id, id, reader_id, record_type)
            .await?;

        info!(record_type, %reader_id, "revoked record type");
        Ok(())
    }

    /// Everyone this client has granted access to, per record type.
    pub async fn outgoing_sharing(&self) -> Result<Vec<OutgoingSharingPolicy>> {
        let resp = self.api().get("/v1/storage/policy/outgoing").await?;
        if !resp.status().is_success() {
            return Err(unexpected_status("outgoing sharing", resp).await);
        }
        Ok(resp.json().await?)
    }

    /// Every writer that has granted this client access, per record type.
    pub async fn incoming_sharing(&self) -> Result<Vec<IncomingSharingPolicy>> {
        let resp = self.api().get("/v1/storage/policy/incoming").await?;
        if !resp.status().is_success() {
            return Err(unexpected_status("incoming sharing", resp).await);
        }
        Ok(resp.json().await?)
    }

    async fn resolve_reader(&self, reader: &str) -> Result<Uuid> {
        if let Ok(id) = Uuid::parse_str(reader) {
            return Ok(id);
        }
        if reader.contains('@') {
            // Email discovery is gone from the v2 service; client_info
            // reports that consistently.
            return Ok(self.client_info(reader).await?.client_id);
        }
        Err(ClientError::InvalidInput(format!(
            "reader must be a client id or email, got {reader:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DEFAULT_API_URL};
    use crate::crypto::{boxes, sign};

    fn test_client() -> Client {
        let (pk, sk) = boxes::generate_keypair();
        let (vk, sgk) = sign::generate_keypair();
        let config = Config::with_signing(
            Uuid::new_v4(),
            "key-id",
            "key-secret",
            &boxes::public_key_to_b64u(&pk),
            &boxes::secret_key_to_b64u(&sk),
            &sign::verifying_key_to_b64u(&vk),
            &sign::signing_key_to_b64u(&sgk),
            DEFAULT_API_URL,
        );
        Client::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_share_with_self_is_a_noop() {
        let client = test_client();
        let self_id = client.config().client_id.to_string();

        // Short-circuits before any network traffic.
        assert!(client.share("test_record", &self_id).await.is_ok());
        assert!(client.revoke("test_record", &self_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_share_with_email_reader_is_unsupported() {
        let client = test_client();
        let result = client.share("test_record", "reader@example.com").await;
        assert!(matches!(result, Err(ClientError::EmailLookupUnsupported)));
    }

    #[tokio::test]
    async fn test_share_with_garbage_reader_rejected() {
        let client = test_client();
        let result = client.share("test_record", "not-an-id").await;
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }

    #[test]
    fn test_policy_path_shape() {
        let id = Uuid::nil();
        assert_eq!(
            policy_path(id, id, id, "notes"),
            format!("/v1/storage/policy/{id}/{id}/{id}/notes")
        );
    }
}
