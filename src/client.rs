// src/client.rs

use crate::{config::AppConfig, error::*, utils};
use log::{debug, trace, warn};
use reqwest::{IntoUrl, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{DefaultRetryableStrategy, RetryTransientMiddleware, policies::ExponentialBackoff};
use std::sync::Arc;

/// HTTP client for caption files. Signed media URLs and caption-track
/// references are fetched directly, outside the browser.
#[derive(Clone)]
pub struct RobustClient {
    client: ClientWithMiddleware,
}

impl RobustClient {
    pub fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(
            reqwest::Client::builder()
                .user_agent(config.user_agent.clone())
                .connect_timeout(config.connect_timeout)
                .timeout(config.timeout)
                .build()?,
        )
        .with(RetryTransientMiddleware::new_with_policy_and_strategy(
            retry_policy,
            DefaultRetryableStrategy,
        ))
        .build();
        debug!("RobustClient created with max_retries={}", config.max_retries);
        Ok(Self { client })
    }

    pub async fn get<T: IntoUrl>(&self, url: T) -> AppResult<Response> {
        let url_str = url.as_str().to_owned();
        debug!("HTTP GET: {}", utils::redact_url(&url_str));
        let res = self.client.get(url_str).send().await?;
        let status = res.status();
        if !status.is_success() {
            warn!("HTTP request to {} resulted in status code: {}", utils::redact_url(res.url().as_str()), status);
        }
        Ok(res.error_for_status()?)
    }

    pub async fn fetch_text<T: IntoUrl>(&self, url: T) -> AppResult<String> {
        let res = self.get(url).await?;
        let text = res.text().await?;
        trace!("Fetched {} bytes", text.len());
        Ok(text)
    }
}
