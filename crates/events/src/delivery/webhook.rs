//! Webhook delivery with exponential-backoff retry.
//!
//! [`WebhookDelivery`] POSTs a pre-serialized, optionally signed JSON body to
//! one subscription's URL. Failed attempts are retried according to a
//! [`RetryPolicy`] (by default five attempts with 0 s, 1 s, 2 s, 4 s, 8 s
//! waits). Every attempt and every wait races a [`CancellationToken`].

use std::time::Duration;

use bytes::Bytes;
use hookcast_core::webhooks::{
    retry_delay_before, signature_header_value, BASE_RETRY_DELAY, MAX_DELIVERY_ATTEMPTS,
    SIGNATURE_HEADER,
};
use hookcast_db::models::subscription::Subscription;
use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;

/// Default HTTP timeout for a single delivery attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How many times to try one delivery and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Wait before 1-indexed `attempt`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        retry_delay_before(attempt, self.base_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_DELIVERY_ATTEMPTS,
            base_delay: BASE_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub request_timeout: Duration,
    /// Accept invalid TLS certificates on subscriber endpoints.
    pub insecure_skip_verify: bool,
    pub retry: RetryPolicy,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            insecure_skip_verify: false,
            retry: RetryPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a single attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

/// Terminal failure of one delivery.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Webhook delivery failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: AttemptError,
    },

    #[error("Webhook delivery cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// Canonical request bytes plus their signature header, computed once.
///
/// Cloning is cheap: the bytes are reference counted.
#[derive(Debug, Clone)]
pub struct SignedBody {
    bytes: Bytes,
    signature: Option<String>,
}

impl SignedBody {
    /// Sign `bytes` with `secret`; a missing or empty secret leaves the body
    /// unsigned.
    pub fn new(bytes: Bytes, secret: Option<&str>) -> Self {
        let signature = secret
            .filter(|s| !s.is_empty())
            .map(|s| signature_header_value(s, &bytes));
        Self { bytes, signature }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Value for the `X-Hub-Signature-256` header, if signed.
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }
}

/// Serialize a payload to its canonical wire form.
///
/// `serde_json::Map` keeps keys sorted, so equal payloads always produce
/// equal bytes.
pub fn canonical_bytes(payload: &serde_json::Value) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(payload).map(Bytes::from)
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Outcome of a successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Attempts made, the successful one included.
    pub attempts: u32,
    /// Total time spent waiting between attempts.
    pub elapsed_backoff: Duration,
    pub status: u16,
}

/// Delivers signed payloads to subscriber endpoints.
pub struct WebhookDelivery {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl WebhookDelivery {
    pub fn new(config: &DeliveryConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;
        Ok(Self {
            client,
            retry: config.retry,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Deliver `body` to `subscription` with retry.
    ///
    /// Returns on the first 2xx response, after the last failed attempt, or
    /// as soon as `cancel` fires.
    pub async fn deliver(
        &self,
        subscription: &Subscription,
        body: &SignedBody,
        cancel: &CancellationToken,
    ) -> Result<DeliveryReport, DeliveryError> {
        self.deliver_with(&self.retry, subscription, body, cancel).await
    }

    /// Single attempt, no retry. Used for connectivity checks.
    pub async fn deliver_once(
        &self,
        subscription: &Subscription,
        body: &SignedBody,
        cancel: &CancellationToken,
    ) -> Result<DeliveryReport, DeliveryError> {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..self.retry
        };
        self.deliver_with(&policy, subscription, body, cancel).await
    }

    async fn deliver_with(
        &self,
        policy: &RetryPolicy,
        subscription: &Subscription,
        body: &SignedBody,
        cancel: &CancellationToken,
    ) -> Result<DeliveryReport, DeliveryError> {
        let url = subscription.url.trim();
        let max_attempts = policy.max_attempts.max(1);
        let mut elapsed_backoff = Duration::ZERO;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let delay = policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(DeliveryError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                elapsed_backoff += delay;
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DeliveryError::Cancelled),
                outcome = self.try_send(url, body) => outcome,
            };

            match outcome {
                Ok(status) => {
                    tracing::debug!(
                        subscription_id = %subscription.id,
                        attempt,
                        status,
                        "Webhook delivered",
                    );
                    return Ok(DeliveryReport {
                        attempts: attempt,
                        elapsed_backoff,
                        status,
                    });
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(
                        subscription_id = %subscription.id,
                        url,
                        attempts = attempt,
                        error = %e,
                        "Webhook delivery failed after all retries",
                    );
                    return Err(DeliveryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        subscription_id = %subscription.id,
                        attempt,
                        url,
                        error = %e,
                        "Webhook delivery attempt failed, retrying",
                    );
                }
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, url: &str, body: &SignedBody) -> Result<u16, AttemptError> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.bytes().clone());
        if let Some(signature) = body.signature() {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::HttpStatus(status.as_u16()));
        }
        Ok(status.as_u16())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use hookcast_core::webhooks::compute_webhook_hmac;

    use super::*;

    fn subscription(url: &str) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: "sub-1".into(),
            url: url.into(),
            secret: None,
            events: vec!["message".into()],
            enabled: true,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn new_does_not_fail_with_defaults() {
        let delivery = WebhookDelivery::new(&DeliveryConfig::default()).unwrap();
        assert_eq!(delivery.retry_policy().max_attempts, 5);
    }

    #[test]
    fn default_policy_backoff() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=5)
            .map(|n| policy.delay_before(n).as_secs())
            .collect();
        assert_eq!(delays, vec![0, 1, 2, 4, 8]);
    }

    #[test]
    fn signed_body_header_matches_hmac() {
        let bytes = Bytes::from_static(br#"{"a":1}"#);
        let body = SignedBody::new(bytes.clone(), Some("key"));
        let expected = format!("sha256={}", compute_webhook_hmac("key", &bytes));
        assert_eq!(body.signature(), Some(expected.as_str()));
        assert_eq!(body.bytes(), &bytes);
    }

    #[test]
    fn empty_secret_means_unsigned() {
        let bytes = Bytes::from_static(b"{}");
        assert_eq!(SignedBody::new(bytes.clone(), Some("")).signature(), None);
        assert_eq!(SignedBody::new(bytes, None).signature(), None);
    }

    #[test]
    fn canonical_bytes_sorts_keys() {
        let value = serde_json::json!({"b": 1, "a": {"d": 2, "c": 3}});
        let bytes = canonical_bytes(&value).unwrap();
        assert_eq!(&bytes[..], br#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn attempt_error_display_http_status() {
        let err = AttemptError::HttpStatus(502);
        assert_eq!(err.to_string(), "Webhook returned HTTP 502");
    }

    #[test]
    fn attempt_error_display_request() {
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = AttemptError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_attempt() {
        let delivery = WebhookDelivery::new(&DeliveryConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let body = SignedBody::new(Bytes::from_static(b"{}"), None);
        let result = delivery
            .deliver(&subscription("http://127.0.0.1:1/hook"), &body, &cancel)
            .await;
        assert_matches!(result, Err(DeliveryError::Cancelled));
    }

    #[tokio::test]
    async fn unreachable_endpoint_exhausts_attempts() {
        let delivery = WebhookDelivery::new(&DeliveryConfig {
            request_timeout: Duration::from_secs(2),
            insecure_skip_verify: false,
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(5),
            },
        })
        .unwrap();
        let body = SignedBody::new(Bytes::from_static(b"{}"), None);
        let result = delivery
            .deliver(
                &subscription("http://127.0.0.1:1/hook"),
                &body,
                &CancellationToken::new(),
            )
            .await;
        assert_matches!(
            result,
            Err(DeliveryError::Exhausted {
                attempts: 2,
                last: AttemptError::Request(_)
            })
        );
    }
}
