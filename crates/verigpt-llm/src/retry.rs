use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::LlmError;

const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Backoff for HTTP 429 responses. Other statuses are returned to the caller untouched.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub(crate) fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// `Retry-After` seconds when the server sent them, exponential otherwise. Capped at 60s.
    fn delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after
            .unwrap_or_else(|| {
                BASE_DELAY
                    .checked_mul(1_u32.checked_shl(attempt).unwrap_or(u32::MAX))
                    .unwrap_or(MAX_DELAY)
            })
            .min(MAX_DELAY)
    }

    /// Call `send` until it yields a non-429 response or retries run out.
    ///
    /// `send` must build a fresh request on every call.
    ///
    /// # Errors
    ///
    /// [`LlmError::RateLimited`] once every attempt was rate limited, or
    /// [`LlmError::Http`] on a transport failure.
    pub(crate) async fn send<F, Fut>(
        self,
        provider: &str,
        mut send: F,
    ) -> Result<reqwest::Response, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 0;
        loop {
            let response = send().await?;
            if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }
            if attempt >= self.max_retries {
                return Err(LlmError::RateLimited);
            }

            let delay = Self::delay(attempt, retry_after(response.headers()));
            attempt += 1;
            tracing::warn!(
                provider,
                attempt,
                max_retries = self.max_retries,
                delay_secs = delay.as_secs(),
                "rate limited, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
