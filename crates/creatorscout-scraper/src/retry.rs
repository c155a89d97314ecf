//! Retry classification and back-off shared by the HTTP clients and the
//! worker pool.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Errors that end the whole run rather than a single item.
///
/// - [`ScraperError::Credential`]: bootstrap exhausted its attempts.
/// - [`ScraperError::BrowserUnavailable`]: no page can be opened any more.
#[must_use]
pub fn is_fatal(err: &ScraperError) -> bool {
    matches!(
        err,
        ScraperError::Credential { .. } | ScraperError::BrowserUnavailable { .. }
    )
}

/// Returns `true` for errors worth another attempt after a delay.
///
/// The platform answers scrapers with challenge pages, truncated bodies and
/// transient 5xx, so extraction and decode failures are retried too.
/// A 404 or a "not found" status code from a detail page is final.
#[must_use]
pub fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::Http(e) => e
            .status()
            .is_none_or(|s| s.is_server_error() || s.as_u16() == 429),
        ScraperError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
        ScraperError::Permission { .. }
        | ScraperError::Interstitial { .. }
        | ScraperError::Extraction { .. }
        | ScraperError::Timeout { .. }
        | ScraperError::PageLost { .. }
        | ScraperError::Deserialize { .. }
        | ScraperError::Api { .. } => true,
        ScraperError::Credential { .. }
        | ScraperError::BrowserUnavailable { .. }
        | ScraperError::NotFound { .. }
        | ScraperError::Sink(_) => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// retriable errors, doubling `backoff_base_ms` each time with ±25% jitter.
///
/// Delay is capped at 60 s. Non-retriable errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    what: &str,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    what,
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
