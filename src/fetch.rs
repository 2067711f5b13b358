use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::warn;

use crate::error::FetchError;
use crate::settings::{FetcherKind, Settings};

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

/// Returns the rendered HTML of a listing page.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>>;
}

/// Fetcher chosen by configuration.
pub enum Fetcher {
    Spider(SpiderFetcher),
    Http(HttpFetcher),
}

impl Fetcher {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        match settings.fetcher {
            FetcherKind::Spider => {
                let api_key = settings.spider_api_key().ok_or_else(|| {
                    anyhow!("SPIDER_API_KEY (or EGG_SPIDER_API_KEY) must be set for the spider fetcher")
                })?;
                Ok(Fetcher::Spider(SpiderFetcher::new(api_key)?))
            }
            FetcherKind::Http => Ok(Fetcher::Http(HttpFetcher::new(&settings.user_agent)?)),
        }
    }
}

impl PageFetcher for Fetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        match self {
            Fetcher::Spider(f) => f.fetch(url).await,
            Fetcher::Http(f) => f.fetch(url).await,
        }
    }
}

// ── spider.cloud (renders JavaScript) ──

pub struct SpiderFetcher {
    spider: Spider,
}

impl SpiderFetcher {
    pub fn new(api_key: String) -> Result<Self> {
        let spider = Spider::new(Some(api_key))
            .map_err(|e| anyhow!("Failed to create Spider client: {}", e))?;
        Ok(Self { spider })
    }

    async fn scrape_once(&self, url: &str) -> Result<String, FetchError> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            ..Default::default()
        };

        let response = self
            .spider
            .scrape_url(url, Some(params), "application/json")
            .await
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let parsed: serde_json::Value = match response.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
            None => response,
        };
        let first = parsed.as_array().and_then(|arr| arr.first());

        if let Some(status) = first.and_then(|obj| obj.get("status")).and_then(|s| s.as_i64()) {
            if status >= 400 {
                return Err(FetchError::Request {
                    url: url.to_string(),
                    reason: format!("HTTP {}", status),
                });
            }
        }

        first
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| FetchError::EmptyBody {
                url: url.to_string(),
            })
    }
}

impl PageFetcher for SpiderFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            match self.scrape_once(url).await {
                Err(FetchError::Request { reason, .. })
                    if is_retryable(&reason) && attempt < MAX_RETRIES =>
                {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "Rate limited on {} (attempt {}/{}), backing off {:.1}s",
                        url,
                        attempt + 1,
                        MAX_RETRIES,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

fn is_retryable(reason: &str) -> bool {
    ["429", "rate", "500", "502", "503"]
        .iter()
        .any(|needle| reason.contains(needle))
}

// ── plain HTTP (server-rendered layouts) ──

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let request_error = |e: reqwest::Error| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(request_error)?
            .text()
            .await
            .map_err(request_error)?;

        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }
        Ok(body)
    }
}
