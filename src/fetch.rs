use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, warn};

use crate::error::CatalogError;

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where subject catalog pages come from.
pub trait CatalogSource {
    /// Markup of one subject's catalog page.
    async fn fetch(&self, subject: &str) -> Result<String, CatalogError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

/// Subject pages live at `{base}{subject lowercase}/`.
pub fn subject_url(base: &str, subject: &str) -> String {
    let base = base.trim_end_matches('/');
    format!("{}/{}/", base, subject.to_lowercase())
}

pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpCatalog {
    pub fn new(base_url: &str, retry: RetryPolicy, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("course_directory/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            retry,
        })
    }

    async fn fetch_once(&self, url: &str) -> reqwest::Result<String> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

/// Transport failures and server errors may clear up; client errors will not.
fn is_retryable(e: &reqwest::Error) -> bool {
    e.status().map_or(true, |status| status.is_server_error())
}

impl CatalogSource for HttpCatalog {
    async fn fetch(&self, subject: &str) -> Result<String, CatalogError> {
        let url = subject_url(&self.base_url, subject);
        let attempts = self.retry.attempts.max(1);
        let mut last_error = String::new();
        let mut made = 0;

        for attempt in 1..=attempts {
            made = attempt;
            let start = Instant::now();
            match self.fetch_once(&url).await {
                Ok(body) => {
                    debug!(
                        "Fetched {} ({} bytes) in {}ms",
                        url,
                        body.len(),
                        start.elapsed().as_millis()
                    );
                    return Ok(body);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if !is_retryable(&e) {
                        break;
                    }
                    if attempt < attempts {
                        warn!(
                            "Fetch failed for {} (attempt {}/{}): {}; retrying in {:.1}s",
                            subject,
                            attempt,
                            attempts,
                            e,
                            self.retry.backoff.as_secs_f64()
                        );
                        tokio::time::sleep(self.retry.backoff).await;
                    }
                }
            }
        }

        Err(CatalogError::FetchFailure {
            subject: subject.to_string(),
            url,
            attempts: made,
            reason: last_error,
        })
    }
}
