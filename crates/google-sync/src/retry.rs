use std::time::Duration;

use reqwest::{header, RequestBuilder, Response, StatusCode};
use studentsync_core::config::RetryConfig;
use studentsync_core::error::Result;
use tracing::{debug, warn};

/// Send a request, retrying rate limits, server errors, and transport failures.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed by `send`.
pub(crate) async fn send_with_retry<F>(retry: &RetryConfig, op: &str, build: F) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!(op, attempt, "sending directory request");

        match build().send().await {
            Ok(resp) => {
                let status = resp.status();
                if !(retry.should_retry(status.as_u16()) && attempt <= retry.max_retries) {
                    return Ok(resp);
                }

                let wait = if status == StatusCode::TOO_MANY_REQUESTS {
                    resp.headers()
                        .get(header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_retry_after)
                        .unwrap_or_else(|| retry.calculate_backoff(attempt))
                } else {
                    retry.calculate_backoff(attempt)
                };
                warn!(
                    op,
                    status = %status,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "transient directory error, retrying"
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => {
                if attempt > retry.max_retries {
                    warn!(op, attempt, error = %e, "directory request failed, giving up");
                    return Err(e.into());
                }
                let wait = retry.calculate_backoff(attempt);
                warn!(
                    op,
                    error = %e,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "directory request failed, retrying"
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// `Retry-After` in delta-seconds form. HTTP dates fall back to computed backoff.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_seconds() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
    }

    #[test]
    fn retry_after_http_date_is_ignored() {
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
