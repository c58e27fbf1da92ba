/// HTTP plumbing shared by every service call.
///
/// Owns the OAuth2 client-credentials token: acquired with HTTP Basic auth
/// against `/v1/auth/token`, cached until its server-assigned expiry, and
/// attached as a bearer token to every authenticated request. The token
/// slot is a mutex so concurrent callers trigger at most one refresh.
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Refresh this many seconds before the server-reported expiry to absorb
/// clock skew and request latency.
const TOKEN_SKEW_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_at: DateTime<Utc>,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

pub(crate) struct ApiClient {
    http: reqwest::Client,
    api_url: String,
    api_key_id: String,
    api_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl ApiClient {
    pub fn new(api_url: &str, api_key_id: &str, api_secret: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key_id: api_key_id.to_string(),
            api_secret: api_secret.to_string(),
            token: Mutex::new(None),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// A valid bearer token, refreshed through the token endpoint when the
    /// cached one is absent or near expiry. 401/403 from the token endpoint
    /// is a credential problem, not a transport problem.
    async fn bearer_token(&self) -> Result<String> {
        let mut slot = self.token.lock().await;

        if let Some(token) = slot.as_ref() {
            if Utc::now() + ChronoDuration::seconds(TOKEN_SKEW_SECS) < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }
        *slot = None;

        debug!("fetching fresh auth token");
        let resp = self
            .http
            .post(self.url("/v1/auth/token"))
            .basic_auth(&self.api_key_id, Some(&self.api_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClientError::AuthFailure(format!(
                "token endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(unexpected_status("auth token", resp).await);
        }

        let body: TokenResponse = resp.json().await?;
        let access_token = body.access_token.clone();
        *slot = Some(CachedToken {
            access_token: body.access_token,
            expires_at: body.expires_at,
        });
        Ok(access_token)
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        let token = self.bearer_token().await?;
        Ok(self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await?)
    }

    pub async fn get_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<Response> {
        let token = self.bearer_token().await?;
        Ok(self
            .http
            .get(self.url(path))
            .query(query)
            .bearer_auth(token)
            .send()
            .await?)
    }

    pub async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        let token = self.bearer_token().await?;
        Ok(self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }

    pub async fn put_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        let token = self.bearer_token().await?;
        Ok(self
            .http
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }

    pub async fn delete(&self, path: &str) -> Result<Response> {
        let token = self.bearer_token().await?;
        Ok(self
            .http
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await?)
    }

    /// POST without a bearer token, for the token-gated account endpoints.
    pub async fn post_json_anonymous<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response> {
        Ok(self.http.post(self.url(path)).json(body).send().await?)
    }

    /// Empty-bodied anonymous POST (backup notification).
    pub async fn post_empty_anonymous(&self, path: &str) -> Result<Response> {
        Ok(self.http.post(self.url(path)).send().await?)
    }
}

/// Turn a non-2xx response into a transport error carrying status and body.
pub(crate) async fn unexpected_status(context: &str, resp: Response) -> ClientError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    ClientError::Transport(format!("{context}: unexpected status {status}: {body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_and_trims_trailing_slash() {
        let api = ApiClient::new("https://api.example.com/", "id", "secret").unwrap();
        assert_eq!(
            api.url("/v1/storage/records"),
            "https://api.example.com/v1/storage/records"
        );
    }

    #[test]
    fn test_token_response_parses_rfc3339_expiry() {
        let body = r#"{"access_token":"tok","expires_at":"2026-08-02T10:00:00Z"}"#;
        let parsed: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.access_token, "tok");
        assert_eq!(parsed.expires_at.timestamp(), 1785664800);
    }
}
