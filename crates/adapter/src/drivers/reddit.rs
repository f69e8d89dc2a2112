use async_trait::async_trait;
use domain::{protocol, ThreadData};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::common::retry::RetryPolicy;
use crate::error::FetchError;
use crate::traits::ThreadSource;

#[derive(Clone, Debug)]
pub struct RedditConfig {
    pub user_agent: String,
    /// Routed for both http and https when set.
    pub proxy: Option<String>,
    pub max_retries: u32,
    pub max_retry_delay_secs: u64,
    pub timeout_secs: u64,
}

/// Fetches threads through reddit's public `.json` listing endpoint.
pub struct RedditClient {
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl RedditClient {
    pub fn new(config: RedditConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs));
        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
            info!("Reddit requests routed through proxy {}", proxy);
        }

        Ok(Self {
            http: builder.build()?,
            retry: RetryPolicy {
                attempts: config.max_retries,
                max_delay_secs: config.max_retry_delay_secs,
            },
        })
    }

    async fn fetch_listing(&self, listing_url: &str) -> Result<Value, FetchError> {
        let http_err = |source| FetchError::Http {
            url: listing_url.to_string(),
            source,
        };

        let response = self.http.get(listing_url).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: listing_url.to_string(),
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(http_err)
    }
}

#[async_trait]
impl ThreadSource for RedditClient {
    async fn fetch_thread(&self, url: &str) -> Result<ThreadData, FetchError> {
        let listing_url = protocol::listing_url(url);
        debug!("Fetching thread listing {}", listing_url);

        let json = self
            .retry
            .run(&listing_url, || self.fetch_listing(&listing_url))
            .await?;
        let data = protocol::parse_listing(&json)?;

        info!(
            "Fetched \"{}\" with {} top-level comments",
            data.title,
            data.comments.len()
        );
        Ok(data)
    }
}
