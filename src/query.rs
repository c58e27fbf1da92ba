/// Paginated search over the record store.
///
/// The cursor walks the server's result stream forward only: each page
/// advances `after_index` to the response's `last_index`, and an empty
/// result list marks the end. Stopping early is always safe; iteration
/// holds no server-side state.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::unexpected_status;
use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::records::decrypt_data;
use crate::types::{EakInfo, Meta, Record, RecordData};

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A search request body. Empty filters match everything visible to the
/// client.
#[derive(Debug, Clone, Serialize)]
pub struct Query {
    pub count: usize,
    pub include_data: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub writer_ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub record_ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub content_types: Vec<String>,
    /// Server-side match expression over the plain meta.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plain: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_ids: Vec<Uuid>,
    pub after_index: u64,
    pub include_all_writers: bool,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            count: DEFAULT_PAGE_SIZE,
            include_data: false,
            writer_ids: Vec::new(),
            record_ids: Vec::new(),
            content_types: Vec::new(),
            plain: None,
            user_ids: Vec::new(),
            after_index: 0,
            include_all_writers: false,
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_type(mut self, record_type: &str) -> Self {
        self.content_types.push(record_type.to_string());
        self
    }

    pub fn writer(mut self, writer_id: Uuid) -> Self {
        self.writer_ids.push(writer_id);
        self
    }

    pub fn record(mut self, record_id: Uuid) -> Self {
        self.record_ids.push(record_id);
        self
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_ids.push(user_id);
        self
    }

    pub fn plain(mut self, match_expression: serde_json::Value) -> Self {
        self.plain = Some(match_expression);
        self
    }

    pub fn include_data(mut self, include: bool) -> Self {
        self.include_data = include;
        self
    }

    pub fn include_all_writers(mut self, include: bool) -> Self {
        self.include_all_writers = include;
        self
    }

    pub fn page_size(mut self, count: usize) -> Self {
        self.count = count;
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
    #[serde(default)]
    last_index: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    meta: Meta,
    #[serde(default)]
    record_data: Option<RecordData>,
    /// Wrapped access key for this result's `(writer, user, type)` triple,
    /// present when the query asked for data.
    #[serde(default)]
    access_key: Option<EakInfo>,
    #[serde(default)]
    rec_sig: Option<String>,
}

/// Forward-only cursor over search results.
pub struct QueryCursor<'a> {
    client: &'a Client,
    query: Query,
    /// When set, encrypted data is returned as-is.
    raw: bool,
    after_index: u64,
    done: bool,
}

impl<'a> QueryCursor<'a> {
    pub(crate) fn new(client: &'a Client, query: Query, raw: bool) -> Self {
        let after_index = query.after_index;
        Self {
            client,
            query,
            raw,
            after_index,
            done: false,
        }
    }

    /// Whether the server has reported the end of the result stream.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetch and decode the next page. Yields an empty batch at (and
    /// after) the end of the stream; consecutive calls never re-emit a
    /// record.
    pub async fn next_page(&mut self) -> Result<Vec<Record>> {
        if self.done {
            return Ok(Vec::new());
        }

        let mut body = self.query.clone();
        body.after_index = self.after_index;

        let resp = self.client.api().post_json("/v1/storage/search", &body).await?;
        if !resp.status().is_success() {
            return Err(unexpected_status("search", resp).await);
        }
        let page: SearchResponse = resp.json().await?;

        if page.results.is_empty() {
            self.done = true;
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(page.results.len());
        for result in page.results {
            let mut record = Record {
                meta: result.meta,
                data: result.record_data.unwrap_or_default(),
                signature: result.rec_sig,
            };

            if self.query.include_data && !self.raw {
                let ak = self.access_key_for(&record, result.access_key).await?;
                record.data = decrypt_data(&ak, &record.data)?;
            }
            records.push(record);
        }

        self.after_index = page.last_index;
        Ok(records)
    }

    /// Drain the cursor, collecting every remaining record.
    pub async fn all(mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        loop {
            let page = self.next_page().await?;
            if page.is_empty() {
                return Ok(records);
            }
            records.extend(page);
        }
    }

    /// Resolve the access key for one result, preferring the client's
    /// cache over the EAK carried in the response.
    async fn access_key_for(
        &self,
        record: &Record,
        carried: Option<EakInfo>,
    ) -> Result<crate::crypto::sensitive::SecretKeyBytes> {
        let meta = &record.meta;
        if let Some(ak) = self
            .client
            .ak()
            .cached(meta.writer_id, meta.user_id, &meta.record_type)
        {
            return Ok(ak);
        }
        match carried {
            Some(eak_info) => self.client.ak().unseal_and_cache(
                self.client.config(),
                meta.writer_id,
                meta.user_id,
                &meta.record_type,
                &eak_info,
            ),
            None => self
                .client
                .ak()
                .get(
                    self.client.api(),
                    self.client.config(),
                    meta.writer_id,
                    meta.user_id,
                    self.client.config().client_id,
                    &meta.record_type,
                )
                .await?
                .ok_or(ClientError::NoAccess),
        }
    }
}

impl Client {
    /// Search for records, decrypting data when the query asks for it.
    pub fn query(&self, query: Query) -> QueryCursor<'_> {
        QueryCursor::new(self, query, false)
    }

    /// Search for records, leaving any returned data encrypted.
    pub fn query_raw(&self, query: Query) -> QueryCursor<'_> {
        QueryCursor::new(self, query, true)
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

    #[test]
    fn test_query_body_omits_empty_filters() {
        let query = Query::new().record_type("test_record").include_data(true);
        let body = serde_json::to_value(&query).unwrap();

        assert_eq!(body["count"], 100);
        assert_eq!(body["include_data"], true);
        assert_eq!(body["content_types"][0], "test_record");
        assert_eq!(body["after_index"], 0);
        assert_eq!(body["include_all_writers"], false);
        assert!(body.get("writer_ids").is_none());
        assert!(body.get("record_ids").is_none());
        assert!(body.get("user_ids").is_none());
        assert!(body.get("plain").is_none());
    }

    #[test]
    fn test_query_builders_accumulate() {
        let writer = Uuid::new_v4();
        let query = Query::new()
            .writer(writer)
            .plain(serde_json::json!({"eq": {"name": "bucket", "value": "a"}}))
            .page_size(10);

        let body = serde_json::to_value(&query).unwrap();
        assert_eq!(body["writer_ids"][0], writer.to_string());
        assert_eq!(body["count"], 10);
        assert!(body.get("plain").is_some());
    }

    #[test]
    fn test_search_response_tolerates_missing_fields() {
        let page: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.last_index, 0);
    }

    #[tokio::test]
    async fn test_finished_cursor_yields_empty_without_network() {
        let client = test_client();
        let mut cursor = client.query(Query::new().record_type("test_record"));
        cursor.done = true;

        assert!(cursor.next_page().await.unwrap().is_empty());
        assert!(cursor.next_page().await.unwrap().is_empty());
        assert!(cursor.is_done());
    }

    #[test]
    fn test_cursor_starts_at_query_offset() {
        let client = test_client();
        let mut query = Query::new();
        query.after_index = 42;

        let cursor = client.query(query);
        assert_eq!(cursor.after_index, 42);
        assert!(!cursor.is_done());
    }
}
