//! HTTP retry for tower lookups.
//!
//! Only failures that are likely to succeed on a second try are retried:
//! timeouts, connection failures (including DNS resolution) and connection
//! resets. Any HTTP response that is not a success, 4xx or 5xx, is handed
//! back to the caller on the first attempt as
//! [`TowerError::UpstreamRejected`] so auth and rate-limit errors surface
//! unchanged.
//!
//! ```ignore
//! let body = retry::send_text(|| client.get(&url).query(&params), &policy, "tile 3").await?;
//! ```

use std::time::Duration;

use crate::TowerError;

/// Maximum number of characters of an upstream error body kept in
/// [`TowerError::UpstreamRejected`].
pub const BODY_SNIPPET_LEN: usize = 300;

/// Attempt budget and backoff for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff unit; the wait after attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(400),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Outcome of a single attempt.
enum AttemptError {
    Request(reqwest::Error),
    Rejected { status: u16, body: String },
}

async fn attempt_once<F>(build_request: &F) -> Result<String, AttemptError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = build_request()
        .send()
        .await
        .map_err(AttemptError::Request)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AttemptError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    response.text().await.map_err(AttemptError::Request)
}

/// Sends the request built by `build_request` and returns the body text.
///
/// The closure is called once per attempt since a
/// [`reqwest::RequestBuilder`] is consumed by `send()`. `label` identifies
/// the request in logs and must not contain credentials.
///
/// # Errors
///
/// * [`TowerError::UpstreamRejected`] for any non-success status (no retry).
/// * [`TowerError::Timeout`] if the last attempt timed out.
/// * [`TowerError::Transport`] for any other request failure.
pub async fn send_text<F>(
    build_request: F,
    policy: &RetryPolicy,
    label: &str,
) -> Result<String, TowerError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match attempt_once(&build_request).await {
            Ok(body) => return Ok(body),
            Err(AttemptError::Rejected { status, body }) => {
                log::warn!("{label}: upstream responded with HTTP {status}, not retrying");
                return Err(TowerError::UpstreamRejected {
                    status,
                    body_snippet: snippet(&body),
                });
            }
            Err(AttemptError::Request(e)) => {
                let e = e.without_url();
                if is_transient(&e) && attempt < max_attempts {
                    let delay = policy.delay_after(attempt);
                    log::warn!(
                        "{label}: attempt {attempt}/{max_attempts} failed ({e}), retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                log::warn!("{label}: giving up after attempt {attempt}/{max_attempts}: {e}");
                return Err(if e.is_timeout() {
                    TowerError::Timeout { attempts: attempt }
                } else {
                    TowerError::Transport {
                        attempts: attempt,
                        source: e,
                    }
                });
            }
        }
    }
}

/// Returns `true` for timeouts, connection/DNS failures and connection
/// resets.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || is_connection_reset(e)
}

fn is_connection_reset(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>()
            && matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            )
        {
            return true;
        }
        source = err.source();
    }
    false
}

/// First [`BODY_SNIPPET_LEN`] characters of `body`.
#[must_use]
pub fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_LEN).collect()
}
