//! reqwest-backed [`HttpFetcher`].
//!
//! Requests share one client and one token-bucket rate limiter. Bodies of
//! requests made with `enable_cache` are kept in memory for the lifetime of
//! the fetcher, so a library run fetches each document at most once.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use governor::{Quota, RateLimiter};
use mf_core::config::HttpConfig;
use mf_core::Error;
use mf_metadata::{HttpFetcher, HttpRequest};
use tracing::debug;

pub struct ReqwestFetcher {
    client: reqwest::Client,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
    cache: DashMap<String, Bytes>,
}

impl ReqwestFetcher {
    pub fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build HTTP client")?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            rate_limiter,
            cache: DashMap::new(),
        })
    }

    async fn fetch(&self, url: &str) -> mf_core::Result<Bytes> {
        self.rate_limiter.until_ready().await;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::transport(url, e))?
            .error_for_status()
            .map_err(|e| Error::transport(url, e))?;

        resp.bytes().await.map_err(|e| Error::transport(url, e))
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, request: HttpRequest<'_>) -> mf_core::Result<Bytes> {
        if request.enable_cache {
            if let Some(hit) = self.cache.get(request.url) {
                debug!(url = request.url, "HTTP cache hit");
                return Ok(hit.value().clone());
            }
        }

        debug!(url = request.url, pool = ?request.pool, "HTTP GET");
        let body = tokio::select! {
            biased;
            _ = request.cancellation.cancelled() => return Err(Error::Cancelled),
            result = self.fetch(request.url) => result?,
        };

        if request.enable_cache {
            self.cache.insert(request.url.to_string(), body.clone());
        }
        Ok(body)
    }
}
