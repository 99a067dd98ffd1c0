use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::ScraperConfig;
use crate::utils::error::AppError;

/// Downloads the raw HTML of a product page.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, AppError>;
}

/// Plain HTTP fetcher. Pages are expected to be server-rendered.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, AppError> {
        let start_time = std::time::Instant::now();

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_error(url, timeout, e))?;

        tracing::debug!(
            "Fetched {} ({} bytes) in {}ms",
            url,
            body.len(),
            start_time.elapsed().as_millis()
        );
        Ok(body)
    }
}

fn classify_error(url: &str, timeout: Duration, error: reqwest::Error) -> AppError {
    if error.is_timeout() {
        AppError::FetchTimeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        AppError::Fetch {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
