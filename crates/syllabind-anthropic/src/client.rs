// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! Provides [`AnthropicClient`] which handles request construction,
//! authentication, streaming SSE responses, and transient error retry.
//! Throttling (HTTP 429) is never retried here; it is returned as
//! [`SyllabindError::RateLimited`] so the caller can run a visible countdown.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use syllabind_core::SyllabindError;
use tracing::{debug, warn};

use crate::sse::{self, EventStream};
use crate::types::{ApiErrorResponse, MessageRequest};

/// Base URL for the Anthropic Messages API.
const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Rate-limit reset headers, each an RFC 3339 timestamp.
const RESET_HEADERS: &[&str] = &[
    "anthropic-ratelimit-requests-reset",
    "anthropic-ratelimit-tokens-reset",
    "anthropic-ratelimit-input-tokens-reset",
    "anthropic-ratelimit-output-tokens-reset",
];

/// HTTP client for Anthropic API communication.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    max_retries: u32,
    base_url: String,
}

impl AnthropicClient {
    /// Creates a new Anthropic API client.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key for authentication
    /// * `api_version` - API version string (e.g., "2023-06-01")
    pub fn new(api_key: String, api_version: String) -> Result<Self, SyllabindError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key).map_err(|e| {
                SyllabindError::Config(format!("invalid API key header value: {e}"))
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(&api_version).map_err(|e| {
                SyllabindError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| SyllabindError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            max_retries: 1,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Sends a streaming request and returns a stream of SSE events.
    ///
    /// Server errors (500, 503, 529) are retried once after a 1-second delay.
    pub async fn stream_message(
        &self,
        request: &MessageRequest,
    ) -> Result<EventStream, SyllabindError> {
        let mut req = request.clone();
        req.stream = true;

        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(&self.base_url)
                .json(&req)
                .send()
                .await
                .map_err(|e| SyllabindError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, model = %req.model, "streaming response received");

            if status.is_success() {
                return Ok(sse::parse_sse_stream(response));
            }

            if status.as_u16() == 429 {
                let retry_after_secs = retry_after_secs(response.headers(), Utc::now());
                let body = response.text().await.unwrap_or_default();
                warn!(?retry_after_secs, "Anthropic API rate limit hit");
                return Err(SyllabindError::RateLimited {
                    retry_after_secs,
                    message: describe_error(status, &body),
                });
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                attempt += 1;
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }

            return Err(SyllabindError::Provider {
                message: describe_error(status, &body),
                source: None,
            });
        }
    }
}

/// Returns true for server-side status codes worth one retry.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 500 | 503 | 529)
}

fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => format!(
            "Anthropic API error ({}): {}",
            api_err.error.type_, api_err.error.message
        ),
        Err(_) => format!("API returned {status}: {body}"),
    }
}

/// Seconds to wait before retrying a throttled request.
///
/// Prefers `retry-after`; otherwise the latest of the reset timestamps, so
/// every exhausted limit has replenished by the time the wait ends.
fn retry_after_secs(headers: &HeaderMap, now: DateTime<Utc>) -> Option<u64> {
    let retry_after = headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0);
    if let Some(secs) = retry_after {
        return Some(secs.ceil() as u64);
    }

    RESET_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name)?.to_str().ok())
        .filter_map(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|reset| {
            let millis = (reset.with_timezone(&Utc) - now).num_milliseconds().max(0);
            (millis as u64).div_ceil(1000)
        })
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> AnthropicClient {
        AnthropicClient::new("test-api-key".into(), "2023-06-01".into())
            .unwrap()
            .with_base_url(base_url.to_string())
    }

    fn test_request() -> MessageRequest {
        MessageRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![crate::types::ApiMessage {
                role: "user".into(),
                content: crate::types::ApiContent::Text("Plan a course".into()),
            }],
            system: None,
            max_tokens: 1024,
            stream: true,
            tools: None,
            tool_choice: None,
        }
    }

    fn sse_ok() -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string("event: message_stop\ndata: {}\n\n")
    }

    #[tokio::test]
    async fn sends_auth_headers_and_streams() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(sse_ok())
            .expect(1)
            .mount(&server)
            .await;

        let result = test_client(&server.uri()).stream_message(&test_request()).await;
        assert!(result.is_ok(), "headers should match: {:?}", result.err());
    }

    #[tokio::test]
    async fn rate_limit_is_tagged_with_retry_after() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "type": "error",
            "error": {"type": "rate_limit_error", "message": "Number of request tokens has exceeded your per-minute rate limit"}
        });
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "17")
                    .set_body_json(&body),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .stream_message(&test_request())
            .await
            .err()
            .expect("429 must fail");
        match err {
            SyllabindError::RateLimited {
                retry_after_secs,
                message,
            } => {
                assert_eq!(retry_after_secs, Some(17));
                assert!(message.contains("rate_limit_error"), "got: {message}");
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retries_once_on_overload_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(serde_json::json!({
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(sse_ok())
            .mount(&server)
            .await;

        let result = test_client(&server.uri()).stream_message(&test_request()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn exhausted_retries_surface_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"type": "overloaded_error", "message": "Service overloaded"}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .stream_message(&test_request())
            .await
            .err()
            .expect("should fail");
        assert!(!err.is_rate_limit());
        assert!(err.to_string().contains("overloaded_error"), "got: {err}");
    }

    #[tokio::test]
    async fn bad_request_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("nope"))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .stream_message(&test_request())
            .await
            .err()
            .expect("should fail");
        assert!(err.to_string().contains("400"), "got: {err}");
    }

    #[test]
    fn retry_after_prefers_header_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("2.5"));
        headers.insert(
            "anthropic-ratelimit-requests-reset",
            HeaderValue::from_static("2030-01-01T00:00:00Z"),
        );
        assert_eq!(retry_after_secs(&headers, Utc::now()), Some(3));
    }

    #[test]
    fn retry_after_falls_back_to_latest_reset() {
        let now = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut headers = HeaderMap::new();
        headers.insert(
            "anthropic-ratelimit-requests-reset",
            HeaderValue::from_static("2026-03-01T12:00:05Z"),
        );
        headers.insert(
            "anthropic-ratelimit-input-tokens-reset",
            HeaderValue::from_static("2026-03-01T12:00:41Z"),
        );
        assert_eq!(retry_after_secs(&headers, now), Some(41));
    }

    #[test]
    fn retry_after_absent_without_hints() {
        assert_eq!(retry_after_secs(&HeaderMap::new(), Utc::now()), None);
    }
}
