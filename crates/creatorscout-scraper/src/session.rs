//! Browser automation capabilities the tasks rely on.
//!
//! Tasks only see these traits. [`crate::chromium`] implements them over the
//! Chrome DevTools protocol and the integration tests script them.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScraperError;

/// A network response observed by a page, with its body.
#[derive(Debug, Clone)]
pub struct NetworkResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// An outgoing request observed by a page. Header names are lower-cased.
#[derive(Debug, Clone)]
pub struct NetworkRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl NetworkRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Selects responses by URL and HTTP status.
pub type ResponseFilter<'a> = &'a (dyn Fn(&str, u16) -> bool + Send + Sync);

/// Selects outgoing requests by URL.
pub type RequestFilter<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

/// One browser page.
///
/// Network traffic is recorded from the moment the session opens, so a wait
/// started after [`HeadlessSession::navigate`] still sees responses that
/// arrived during navigation. Each wait consumes observed events in arrival
/// order and discards the ones its filter rejects.
#[async_trait]
pub trait HeadlessSession: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ScraperError::PageLost`] if the page cannot navigate.
    async fn navigate(&self, url: &str) -> Result<(), ScraperError>;

    /// Next response accepted by `filter`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Timeout`] if nothing matches in time.
    /// - [`ScraperError::PageLost`] if the page goes away.
    async fn await_response_matching(
        &self,
        filter: ResponseFilter<'_>,
        timeout: Duration,
    ) -> Result<NetworkResponse, ScraperError>;

    /// Next outgoing request accepted by `filter`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Timeout`] if nothing matches in time.
    /// - [`ScraperError::PageLost`] if the page goes away.
    async fn await_request_matching(
        &self,
        filter: RequestFilter<'_>,
        timeout: Duration,
    ) -> Result<NetworkRequest, ScraperError>;

    /// # Errors
    ///
    /// Returns [`ScraperError::PageLost`] if the script cannot run.
    async fn scroll_to_bottom(&self) -> Result<(), ScraperError>;

    /// # Errors
    ///
    /// Returns [`ScraperError::PageLost`] if the page was already gone.
    async fn close(&self) -> Result<(), ScraperError>;
}

/// Owner of the browser process that hands out sessions.
#[async_trait]
pub trait BrowserDriver: Send + Sync + 'static {
    type Session: HeadlessSession + 'static;

    /// Open a fresh page, launching the browser if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::BrowserUnavailable`] if no page can be opened.
    async fn open_session(&self) -> Result<Self::Session, ScraperError>;

    /// Tear the browser down and start a new one.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::BrowserUnavailable`] if the relaunch fails.
    async fn relaunch(&self) -> Result<(), ScraperError>;

    /// Close the browser. Later [`BrowserDriver::open_session`] calls launch
    /// a new one.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::BrowserUnavailable`] if the process could not
    /// be closed cleanly.
    async fn shutdown(&self) -> Result<(), ScraperError>;
}
