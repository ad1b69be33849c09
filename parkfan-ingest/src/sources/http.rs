//! JSON-over-HTTP plumbing shared by the adapters
//!
//! Maps transport failures and HTTP status codes onto `SourceError`:
//! - connect/timeout/5xx → `UpstreamUnavailable` (retryable)
//! - 429 → `QuotaExceeded`
//! - other 4xx → `UpstreamRejected`
//! - undecodable body → `Parse`

use crate::error::SourceError;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("parkfan-ingest/", env!("CARGO_PKG_VERSION"));

pub struct HttpClient {
    source_id: &'static str,
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(
        source_id: &'static str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::unavailable(source_id, format!("client init: {}", e)))?;

        Ok(Self {
            source_id,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}{path}` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        headers: &[(&'static str, &str)],
    ) -> Result<T, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(source = self.source_id, url = %url, "GET");

        let mut request = self.client.get(&url).header(header::ACCEPT, "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(self.source_id, &e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(self.source_id, status, retry_after, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| classify_transport(self.source_id, &e))
    }
}

/// Map a non-success HTTP status onto the error taxonomy
pub fn classify_status(
    source_id: &str,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> SourceError {
    let reason = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, truncate(body, 200))
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        SourceError::QuotaExceeded {
            source_id: source_id.to_string(),
            retry_after: retry_after.unwrap_or(Duration::ZERO),
        }
    } else if status.is_client_error() {
        SourceError::UpstreamRejected {
            source_id: source_id.to_string(),
            status: status.as_u16(),
            reason,
        }
    } else {
        SourceError::unavailable(source_id, reason)
    }
}

fn classify_transport(source_id: &str, err: &reqwest::Error) -> SourceError {
    if err.is_decode() {
        SourceError::parse(source_id, err.to_string())
    } else {
        // Timeouts, connection resets, and DNS failures are all transient
        SourceError::unavailable(source_id, err.to_string())
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
