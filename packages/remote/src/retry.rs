//! HTTP send helper with a bounded, fixed-interval retry.
//!
//! All API clients in this crate go through [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly. Transient failures
//! (connection errors, timeouts, HTTP 429, HTTP 5xx) are retried up to
//! [`RetryPolicy::max_retries`] times, waiting [`RetryPolicy::delay`]
//! between attempts. There is no exponential backoff: the delay is the same
//! pacing floor the rate limiter uses.
//!
//! ```ignore
//! let body = retry::send_json(|| client.post(&url).json(&payload), policy).await?;
//! ```

use std::time::Duration;

use crate::RemoteError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// How many times, and how far apart, transient failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Extra attempts after the first. `0` disables retrying.
    pub max_retries: u32,
    /// Wait between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// A policy that makes a single attempt.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`], since builders are consumed by
/// `.send()`.
///
/// # Errors
///
/// Returns [`RemoteError::RetriesExhausted`] if a transient failure outlasts
/// every retry, [`RemoteError::Status`] for a permanent HTTP error, or
/// [`RemoteError::Json`] if the body is not valid JSON.
pub async fn send_json<F>(
    build_request: F,
    policy: RetryPolicy,
) -> Result<serde_json::Value, RemoteError>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let response = send_inner(&build_request, policy).await?;

    let url = response.url().to_string();
    let status = response.status();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        log::error!(
            "JSON parse failed.\n  \
             url: {url}\n  \
             status: {status}\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {}",
            text.len(),
            preview(&text),
        );
        RemoteError::Json(e)
    })
}

/// Sends the request built by `build_request`, retrying transient errors
/// according to `policy`. Returns the successful response (2xx or 3xx).
async fn send_inner<F>(
    build_request: &F,
    policy: RetryPolicy,
) -> Result<reqwest::Response, RemoteError>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let max_retries = policy.max_retries;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            log::warn!("  retry {attempt}/{max_retries} in {:?}...", policy.delay);
            tokio::time::sleep(policy.delay).await;
        }

        let failure = match build_request().send().await {
            Err(e) => {
                if !is_transient(&e) {
                    return Err(RemoteError::Http(e));
                }
                log::warn!("  transient error: {e}");
                if max_retries == 0 {
                    return Err(RemoteError::Http(e));
                }
                e.to_string()
            }
            Ok(response) => {
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    log::warn!("  HTTP {status} from {}", response.url());
                    if max_retries == 0 {
                        return Err(RemoteError::Status { status });
                    }
                    format!("HTTP {status}")
                } else if status.is_client_error() {
                    // 4xx other than 429 is permanent.
                    return Err(RemoteError::Status { status });
                } else {
                    return Ok(response);
                }
            }
        };

        if attempt == max_retries {
            return Err(RemoteError::RetriesExhausted {
                attempts: attempt + 1,
                message: failure,
            });
        }
    }

    unreachable!("send_inner retry loop exited without returning")
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

fn preview(text: &str) -> &str {
    if text.len() <= BODY_PREVIEW_LEN {
        return text;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
