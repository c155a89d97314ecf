//! Popular-hashtag discovery against the creative-center API.
//!
//! Requests are plain HTTP carrying the credentials from a
//! [`CredentialStore`]. A "no permission" answer clears the credentials,
//! forces a new bootstrap and retries the same page.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use creatorscout_core::{Country, Credentials, Hashtag, Industry, PopularHashtagFilter};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::credentials::CredentialStore;
use crate::error::ScraperError;
use crate::records::hashtag_from_popular;
use crate::retry::{is_fatal, is_retriable};
use crate::types::{ApiEnvelope, FiltersData, HashtagListData};

const DEFAULT_BASE_URL: &str = "https://ads.tiktok.com/";
const HASHTAG_LIST_PATH: &str = "creative_radar_api/v1/popular_trend/hashtag/list";
const HASHTAG_FILTERS_PATH: &str = "creative_radar_api/v1/popular_trend/hashtag/filters";
const NO_PERMISSION: &str = "no permission";

/// Hard stop against a listing that never reports `has_more = false`.
const MAX_PAGES: u32 = 200;

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Retries after the first attempt for one page.
    pub max_retry: u32,
    pub retry_delay: Duration,
    pub page_delay: Duration,
    /// Stop once this many distinct hashtags were gathered.
    pub max_data: Option<usize>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_retry: 3,
            retry_delay: Duration::from_secs(1),
            page_delay: Duration::from_secs(1),
            max_data: None,
        }
    }
}

/// Country and industry reference sets offered by the listing filters.
#[derive(Debug, Clone, Default)]
pub struct PlatformFilters {
    pub countries: Vec<Country>,
    pub industries: Vec<Industry>,
}

pub struct HashtagDiscovery {
    client: Client,
    base_url: Url,
    credentials: Arc<CredentialStore>,
    options: DiscoveryOptions,
}

impl HashtagDiscovery {
    /// Client pointed at the production creative center.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        credentials: Arc<CredentialStore>,
        options: DiscoveryOptions,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ScraperError> {
        Self::with_base_url(DEFAULT_BASE_URL, credentials, options, timeout_secs, user_agent)
    }

    /// Client with a custom origin (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    /// - [`ScraperError::Extraction`] if `base_url` is not a valid URL.
    pub fn with_base_url(
        base_url: &str,
        credentials: Arc<CredentialStore>,
        options: DiscoveryOptions,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ScraperError::Extraction {
            context: "discovery base URL".to_owned(),
            reason: format!("invalid base URL '{base_url}': {e}"),
        })?;

        Ok(Self {
            client,
            base_url,
            credentials,
            options,
        })
    }

    /// Walk the popular-hashtag listing for one filter.
    ///
    /// Hashtags are deduplicated by name. When a page keeps failing the
    /// filter is abandoned and whatever was gathered so far is returned.
    ///
    /// # Errors
    ///
    /// Only run-ending errors escape: [`ScraperError::Credential`] when no
    /// credentials can be bootstrapped, or a lost browser.
    pub async fn discover(&self, filter: &PopularHashtagFilter) -> Result<Vec<Hashtag>, ScraperError> {
        let mut filter = filter.clone();
        let mut seen: HashSet<String> = HashSet::new();
        let mut hashtags = Vec::new();

        loop {
            let Some(data) = self.fetch_page_with_retry(&filter).await? else {
                tracing::warn!(
                    industry = %filter.industry_id,
                    country = %filter.country_code,
                    page = filter.page,
                    collected = hashtags.len(),
                    "abandoning hashtag filter"
                );
                break;
            };

            let page_len = data.list.len();
            for tag in &data.list {
                if seen.insert(tag.hashtag_name.clone()) {
                    hashtags.push(hashtag_from_popular(tag));
                }
            }
            if let Some(max) = self.options.max_data {
                if hashtags.len() >= max {
                    hashtags.truncate(max);
                    break;
                }
            }

            tracing::debug!(
                industry = %filter.industry_id,
                page = filter.page,
                page_len,
                total = hashtags.len(),
                "hashtag page fetched"
            );

            if !data.pagination.has_more || page_len == 0 {
                break;
            }
            if filter.page >= MAX_PAGES {
                tracing::warn!(max_pages = MAX_PAGES, "hashtag listing page limit reached");
                break;
            }
            filter.page += 1;
            tokio::time::sleep(self.options.page_delay).await;
        }

        tracing::info!(
            industry = %filter.industry_id,
            country = %filter.country_code,
            hashtags = hashtags.len(),
            "hashtag discovery finished"
        );
        Ok(hashtags)
    }

    /// Fetch the country and industry reference sets.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted.
    pub async fn fetch_filters(&self) -> Result<PlatformFilters, ScraperError> {
        let data: FiltersData = self
            .with_credentials("fetching hashtag filters", |credentials| async move {
                self.get_data(HASHTAG_FILTERS_PATH, &[], &credentials).await
            })
            .await?;

        Ok(PlatformFilters {
            countries: data
                .country
                .into_iter()
                .map(|c| Country {
                    id: c.id,
                    value: c.value,
                    label: c.label,
                })
                .collect(),
            industries: data
                .industry
                .into_iter()
                .map(|i| Industry {
                    id: i.id,
                    value: i.value,
                    label: i.label,
                })
                .collect(),
        })
    }

    /// One page, retried. `Ok(None)` means the page is given up on.
    async fn fetch_page_with_retry(
        &self,
        filter: &PopularHashtagFilter,
    ) -> Result<Option<HashtagListData>, ScraperError> {
        let page = filter.page.to_string();
        let limit = filter.limit.as_u32().to_string();
        let period = filter.period.days().to_string();
        let query = [
            ("page", page.as_str()),
            ("limit", limit.as_str()),
            ("period", period.as_str()),
            ("country_code", filter.country_code.as_str()),
            ("industry_id", filter.industry_id.as_str()),
            ("sort_by", filter.sort_by()),
        ];

        match self
            .with_credentials("listing popular hashtags", |credentials| {
                let query = &query;
                async move { self.get_data(HASHTAG_LIST_PATH, query, &credentials).await }
            })
            .await
        {
            Ok(data) => Ok(Some(data)),
            Err(e) if is_fatal(&e) => Err(e),
            Err(e) => {
                tracing::warn!(page = filter.page, error = %e, "hashtag page failed");
                Ok(None)
            }
        }
    }

    /// Run `op` with the current credentials, retrying up to `max_retry`
    /// times. A permission rejection clears the credentials before the
    /// retry, other retriable errors wait `retry_delay`.
    async fn with_credentials<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ScraperError>
    where
        F: FnMut(Credentials) -> Fut,
        Fut: std::future::Future<Output = Result<T, ScraperError>>,
    {
        let mut attempt = 0u32;
        loop {
            let credentials = self.credentials.get().await?;
            let err = match op(credentials.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !is_retriable(&err) || attempt >= self.options.max_retry {
                return Err(err);
            }
            attempt += 1;
            if matches!(err, ScraperError::Permission { .. }) {
                self.credentials.invalidate(&credentials).await;
                tracing::warn!(
                    what,
                    attempt,
                    max_retry = self.options.max_retry,
                    "credentials rejected, re-bootstrapping"
                );
            } else {
                tracing::warn!(
                    what,
                    attempt,
                    max_retry = self.options.max_retry,
                    error = %err,
                    "creative center request failed, retrying"
                );
                tokio::time::sleep(self.options.retry_delay).await;
            }
        }
    }

    fn build_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ScraperError> {
        let mut url = self.base_url.join(path).map_err(|e| ScraperError::Extraction {
            context: path.to_owned(),
            reason: e.to_string(),
        })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// GET `path`, unwrap the `{code, msg, data}` envelope and decode `data`.
    async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        credentials: &Credentials,
    ) -> Result<T, ScraperError> {
        let url = self.build_url(path, query)?;
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json, text/plain, */*")
            .header("Timestamp", &credentials.timestamp)
            .header("User-Sign", &credentials.signature)
            .header("Anonymous-User-Id", &credentials.anonymous_session_id)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let envelope: ApiEnvelope<serde_json::Value> =
            serde_json::from_str(&body).map_err(|e| ScraperError::Deserialize {
                context: url.path().to_owned(),
                source: e,
            })?;
        check_envelope(&envelope, url.path())?;

        let data = envelope.data.ok_or_else(|| ScraperError::Extraction {
            context: url.path().to_owned(),
            reason: "envelope without data".to_owned(),
        })?;
        serde_json::from_value(data).map_err(|e| ScraperError::Deserialize {
            context: url.path().to_owned(),
            source: e,
        })
    }
}

fn check_envelope<T>(envelope: &ApiEnvelope<T>, context: &str) -> Result<(), ScraperError> {
    if envelope.msg == NO_PERMISSION {
        return Err(ScraperError::Permission {
            context: context.to_owned(),
        });
    }
    if envelope.code != 0 {
        return Err(ScraperError::Api {
            code: envelope.code,
            msg: envelope.msg.clone(),
        });
    }
    Ok(())
}
