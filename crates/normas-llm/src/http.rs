//! Shared JSON-over-HTTP plumbing for the OpenAI-compatible endpoints.

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use normas_core::config::ModelsConfig;
use normas_core::ClientError;

const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    api_base: String,
    api_key: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl ApiClient {
    pub fn new(config: &ModelsConfig, api_key: &str) -> Result<Self, ClientError> {
        if api_key.trim().is_empty() {
            return Err(ClientError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let api_base = config.api_base.trim_end_matches('/').to_string();
        debug!("API client configured: base={}, timeout={}s", api_base, config.request_timeout_secs);
        Ok(Self {
            client,
            api_base,
            api_key: api_key.to_string(),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// POST `body` to `{api_base}/{path}` and decode the JSON reply.
    ///
    /// Timeouts, connection failures, 429 and 5xx are retried up to
    /// `max_retries` times; delays double from `retry_backoff`.
    pub async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        let mut attempt = 0u32;
        loop {
            match self.send_once(&url, body).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = backoff_delay(self.retry_backoff, attempt);
                    warn!("Request to {} failed: {} (retry {}/{} in {:?})", url, e, attempt + 1, self.max_retries, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<Req, Resp>(&self, url: &str, body: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }
        response.json::<Resp>().await.map_err(map_reqwest_error)
    }
}

/// `base * 2^attempt`, saturating.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16))
}

fn map_reqwest_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout(e.to_string())
    } else if e.is_decode() {
        ClientError::Decode(e.to_string())
    } else {
        ClientError::Transport(e.to_string())
    }
}
