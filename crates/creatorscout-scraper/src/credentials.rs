//! Signed-header acquisition and the shared credential slot.
//!
//! The creative-center API only answers requests carrying the `timestamp`,
//! `user-sign` and `anonymous-user-id` headers its own web page computes.
//! [`BrowserBootstrapper`] loads that page in a real browser and copies the
//! headers off the page's first listing request. [`CredentialStore`] shares
//! the result between tasks and makes sure a rejected set triggers exactly
//! one new bootstrap.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use creatorscout_core::Credentials;
use tokio::sync::{Mutex, RwLock};

use crate::error::ScraperError;
use crate::session::{BrowserDriver, HeadlessSession};

pub(crate) const CREATOR_PAGE_PATH: &str =
    "/business/creativecenter/inspiration/popular/creator/pc/en";
pub(crate) const CREATOR_LIST_PATH: &str = "/creative_radar_api/v1/popular_trend/creator/list";

pub(crate) const TIMESTAMP_HEADER: &str = "timestamp";
pub(crate) const SIGN_HEADER: &str = "user-sign";
pub(crate) const ANONYMOUS_ID_HEADER: &str = "anonymous-user-id";

/// Anything that can mint a fresh set of credentials.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ScraperError::Credential`] when no credentials could be obtained.
    async fn bootstrap(&self) -> Result<Credentials, ScraperError>;
}

/// Called once bootstrap attempts are exhausted. It may recover (for
/// instance by returning credentials from elsewhere) or pass the error on.
pub type ExhaustedHandler =
    Box<dyn Fn(ScraperError) -> Result<Credentials, ScraperError> + Send + Sync>;

pub struct BrowserBootstrapper<D: BrowserDriver> {
    driver: Arc<D>,
    page_url: String,
    wait_timeout: Duration,
    max_attempts: u32,
    on_exhausted: ExhaustedHandler,
}

impl<D: BrowserDriver> BrowserBootstrapper<D> {
    /// `ads_base_url` is the creative-center origin; `max_attempts` counts
    /// every navigation, the first included.
    pub fn new(driver: Arc<D>, ads_base_url: &str, wait_timeout: Duration, max_attempts: u32) -> Self {
        Self {
            driver,
            page_url: format!("{}{CREATOR_PAGE_PATH}", ads_base_url.trim_end_matches('/')),
            wait_timeout,
            max_attempts: max_attempts.max(1),
            on_exhausted: Box::new(propagate),
        }
    }

    #[must_use]
    pub fn on_exhausted(mut self, handler: ExhaustedHandler) -> Self {
        self.on_exhausted = handler;
        self
    }

    async fn attempt(&self) -> Result<Credentials, ScraperError> {
        let session = self.driver.open_session().await?;
        let result = self.capture_headers(&session).await;
        if let Err(e) = session.close().await {
            tracing::debug!(error = %e, "closing bootstrap page failed");
        }
        result
    }

    async fn capture_headers(&self, session: &D::Session) -> Result<Credentials, ScraperError> {
        let is_listing_request = |url: &str| url.contains(CREATOR_LIST_PATH);
        let (navigation, request) = tokio::join!(
            session.navigate(&self.page_url),
            session.await_request_matching(&is_listing_request, self.wait_timeout),
        );
        let request = match (request, navigation) {
            (Ok(request), _) => request,
            (Err(ScraperError::Timeout { .. }), Err(nav)) => return Err(nav),
            (Err(e), _) => return Err(e),
        };

        match (
            request.header(TIMESTAMP_HEADER),
            request.header(SIGN_HEADER),
            request.header(ANONYMOUS_ID_HEADER),
        ) {
            (Some(timestamp), Some(signature), Some(anonymous)) => Ok(Credentials {
                timestamp: timestamp.to_owned(),
                signature: signature.to_owned(),
                anonymous_session_id: anonymous.to_owned(),
            }),
            _ => Err(ScraperError::Credential {
                reason: "missing-headers".to_owned(),
            }),
        }
    }
}

fn propagate(err: ScraperError) -> Result<Credentials, ScraperError> {
    Err(err)
}

#[async_trait]
impl<D: BrowserDriver> CredentialSource for BrowserBootstrapper<D> {
    async fn bootstrap(&self) -> Result<Credentials, ScraperError> {
        let mut last_reason = String::new();
        for attempt in 1..=self.max_attempts {
            match self.attempt().await {
                Ok(credentials) => {
                    tracing::info!(attempt, "credentials bootstrapped");
                    return Ok(credentials);
                }
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "credential bootstrap attempt failed"
                    );
                    last_reason = err.to_string();
                    if attempt < self.max_attempts {
                        self.driver.relaunch().await?;
                    }
                }
            }
        }
        (self.on_exhausted)(ScraperError::Credential {
            reason: format!(
                "gave up after {} attempts: {last_reason}",
                self.max_attempts
            ),
        })
    }
}

/// Shared, lazily bootstrapped credentials.
pub struct CredentialStore {
    source: Arc<dyn CredentialSource>,
    current: RwLock<Option<Credentials>>,
    bootstrap_lock: Mutex<()>,
    bootstraps: AtomicU32,
}

impl CredentialStore {
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self {
            source,
            current: RwLock::new(None),
            bootstrap_lock: Mutex::new(()),
            bootstraps: AtomicU32::new(0),
        }
    }

    /// Current credentials, bootstrapping when the slot is empty. Concurrent
    /// callers share a single bootstrap.
    ///
    /// # Errors
    ///
    /// Returns the bootstrap error, normally [`ScraperError::Credential`].
    pub async fn get(&self) -> Result<Credentials, ScraperError> {
        if let Some(credentials) = self.current.read().await.clone() {
            return Ok(credentials);
        }
        let _bootstrapping = self.bootstrap_lock.lock().await;
        if let Some(credentials) = self.current.read().await.clone() {
            return Ok(credentials);
        }
        self.bootstraps.fetch_add(1, Ordering::SeqCst);
        let fresh = self.source.bootstrap().await?;
        *self.current.write().await = Some(fresh.clone());
        Ok(fresh)
    }

    /// Clear the slot if it still holds `stale`. Returns whether it did, so
    /// only the first of several rejected callers causes a reset.
    pub async fn invalidate(&self, stale: &Credentials) -> bool {
        let mut current = self.current.write().await;
        if current.as_ref() == Some(stale) {
            *current = None;
            tracing::info!("credentials rejected, cleared for re-bootstrap");
            true
        } else {
            false
        }
    }

    /// Number of bootstraps started so far.
    pub fn bootstrap_count(&self) -> u32 {
        self.bootstraps.load(Ordering::SeqCst)
    }
}
