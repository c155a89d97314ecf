//! Chrome DevTools backend for [`BrowserDriver`] and [`HeadlessSession`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, EventResponseReceived, GetResponseBodyParams, RequestId,
    SetUserAgentOverrideParams,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::ScraperError;
use crate::session::{
    BrowserDriver, HeadlessSession, NetworkRequest, NetworkResponse, RequestFilter,
    ResponseFilter,
};

/// Bodies are only retrievable once loading finished; poll a few times.
const BODY_FETCH_ATTEMPTS: u32 = 5;
const BODY_FETCH_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub headless: bool,
    pub user_agent: String,
    pub request_timeout: Duration,
}

struct RunningBrowser {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

/// Lazily launched Chromium process shared by every session.
pub struct ChromiumDriver {
    options: ChromiumOptions,
    running: Mutex<Option<RunningBrowser>>,
}

impl ChromiumDriver {
    #[must_use]
    pub fn new(options: ChromiumOptions) -> Self {
        Self {
            options,
            running: Mutex::new(None),
        }
    }

    async fn launch(&self) -> Result<RunningBrowser, ScraperError> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-features=site-per-process")
            .request_timeout(self.options.request_timeout);
        if !self.options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|reason| ScraperError::BrowserUnavailable { reason })?;

        let (browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| ScraperError::BrowserUnavailable {
                    reason: format!("launch failed: {e}"),
                })?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "chromium handler event error");
                }
            }
        });
        tracing::info!(headless = self.options.headless, "chromium launched");

        Ok(RunningBrowser {
            browser: Arc::new(browser),
            handler,
        })
    }

    async fn browser(&self) -> Result<Arc<Browser>, ScraperError> {
        let mut guard = self.running.lock().await;
        if let Some(running) = guard.as_ref() {
            return Ok(Arc::clone(&running.browser));
        }
        let running = self.launch().await?;
        let browser = Arc::clone(&running.browser);
        *guard = Some(running);
        Ok(browser)
    }

    async fn stop(running: RunningBrowser) {
        let RunningBrowser { browser, handler } = running;
        match Arc::try_unwrap(browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    tracing::warn!(error = %e, "chromium close error");
                }
                if let Err(e) = browser.wait().await {
                    tracing::debug!(error = %e, "chromium process wait error");
                }
            }
            Err(_) => tracing::warn!("chromium still referenced at shutdown; dropping handle"),
        }
        handler.abort();
    }

    async fn new_session(&self, browser: &Browser) -> Result<ChromiumSession, ScraperError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::PageLost {
                reason: format!("new page: {e}"),
            })?;
        page.execute(EnableParams::default())
            .await
            .map_err(page_lost("enable network"))?;
        let responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(page_lost("subscribe to responses"))?;
        let requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(page_lost("subscribe to requests"))?;
        page.set_user_agent(SetUserAgentOverrideParams::new(
            self.options.user_agent.clone(),
        ))
            .await
            .map_err(page_lost("set user agent"))?;

        Ok(ChromiumSession {
            page,
            responses: Mutex::new(responses),
            requests: Mutex::new(requests),
        })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    type Session = ChromiumSession;

    async fn open_session(&self) -> Result<ChromiumSession, ScraperError> {
        let browser = self.browser().await?;
        match self.new_session(&browser).await {
            Ok(session) => Ok(session),
            Err(first) => {
                drop(browser);
                tracing::warn!(error = %first, "opening page failed, relaunching chromium");
                self.relaunch().await?;
                let browser = self.browser().await?;
                self.new_session(&browser)
                    .await
                    .map_err(|e| ScraperError::BrowserUnavailable {
                        reason: e.to_string(),
                    })
            }
        }
    }

    async fn relaunch(&self) -> Result<(), ScraperError> {
        let mut guard = self.running.lock().await;
        if let Some(old) = guard.take() {
            Self::stop(old).await;
        }
        *guard = Some(self.launch().await?);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ScraperError> {
        let mut guard = self.running.lock().await;
        if let Some(old) = guard.take() {
            Self::stop(old).await;
            tracing::info!("chromium closed");
        }
        Ok(())
    }
}

fn page_lost(what: &'static str) -> impl Fn(chromiumoxide::error::CdpError) -> ScraperError {
    move |e| ScraperError::PageLost {
        reason: format!("{what}: {e}"),
    }
}

/// One Chromium tab with its network listeners attached from creation.
pub struct ChromiumSession {
    page: Page,
    responses: Mutex<EventStream<EventResponseReceived>>,
    requests: Mutex<EventStream<EventRequestWillBeSent>>,
}

impl ChromiumSession {
    async fn response_body(&self, request_id: RequestId, url: &str) -> Result<String, ScraperError> {
        let mut last_error = String::new();
        for attempt in 1..=BODY_FETCH_ATTEMPTS {
            match self
                .page
                .execute(GetResponseBodyParams::new(request_id.clone()))
                .await
            {
                Ok(response) => {
                    if response.result.base64_encoded {
                        return Err(ScraperError::Extraction {
                            context: url.to_owned(),
                            reason: "binary response body".to_owned(),
                        });
                    }
                    return Ok(response.result.body.clone());
                }
                Err(e) => {
                    last_error = e.to_string();
                    tracing::debug!(attempt, url, error = %e, "response body not ready");
                    tokio::time::sleep(BODY_FETCH_DELAY).await;
                }
            }
        }
        Err(ScraperError::Extraction {
            context: url.to_owned(),
            reason: format!("response body unavailable: {last_error}"),
        })
    }
}

#[async_trait]
impl HeadlessSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<(), ScraperError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| ScraperError::PageLost {
                reason: format!("navigate to {url}: {e}"),
            })?;
        Ok(())
    }

    async fn await_response_matching(
        &self,
        filter: ResponseFilter<'_>,
        timeout: Duration,
    ) -> Result<NetworkResponse, ScraperError> {
        let mut events = self.responses.lock().await;
        let matched = tokio::time::timeout(timeout, async {
            while let Some(event) = events.next().await {
                let status = u16::try_from(event.response.status).unwrap_or(0);
                if filter(&event.response.url, status) {
                    return Some((event.request_id.clone(), event.response.url.clone(), status));
                }
            }
            None
        })
        .await
        .map_err(|_| ScraperError::Timeout {
            what: "matching network response".to_owned(),
            after_ms: duration_ms(timeout),
        })?;

        let (request_id, url, status) = matched.ok_or_else(|| ScraperError::PageLost {
            reason: "response stream closed".to_owned(),
        })?;
        let body = self.response_body(request_id, &url).await?;
        Ok(NetworkResponse { url, status, body })
    }

    async fn await_request_matching(
        &self,
        filter: RequestFilter<'_>,
        timeout: Duration,
    ) -> Result<NetworkRequest, ScraperError> {
        let mut events = self.requests.lock().await;
        let matched = tokio::time::timeout(timeout, async {
            while let Some(event) = events.next().await {
                if filter(&event.request.url) {
                    return Some(event);
                }
            }
            None
        })
        .await
        .map_err(|_| ScraperError::Timeout {
            what: "matching network request".to_owned(),
            after_ms: duration_ms(timeout),
        })?
        .ok_or_else(|| ScraperError::PageLost {
            reason: "request stream closed".to_owned(),
        })?;

        let headers: HashMap<String, String> = matched
            .request
            .headers
            .inner()
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.to_ascii_lowercase(), v.to_owned())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(NetworkRequest {
            url: matched.request.url.clone(),
            headers,
        })
    }

    async fn scroll_to_bottom(&self) -> Result<(), ScraperError> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .map_err(page_lost("scroll"))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ScraperError> {
        self.page.clone().close().await.map_err(page_lost("close"))
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
