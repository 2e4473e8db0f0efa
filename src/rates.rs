use crate::cache::{redis_get_json, redis_set_json};
use crate::config::PricingConfig;
use crate::http::build_client;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const REDIS_KEY: &str = "hermes:rate:pln_usd";

#[derive(Debug, Error)]
pub enum RateError {
    #[error("no exchange-rate endpoint configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
    #[error("rate out of range: {0}")]
    OutOfRange(f64),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RatePayload {
    rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateSource {
    Live,
    Cached,
    Fallback,
}

/// PLN→USD lookup against the local rate service. Successful lookups are
/// cached in process (and in redis when configured) for the configured TTL;
/// any failure degrades to the configured fallback rate.
#[derive(Clone)]
pub struct ExchangeRates {
    url: Option<String>,
    fallback: f64,
    ttl: Duration,
    http: Client,
    redis: Option<redis::Client>,
    cached: Arc<Mutex<Option<(f64, Instant)>>>,
}

impl ExchangeRates {
    pub fn new(config: &PricingConfig, redis: Option<redis::Client>) -> Self {
        Self {
            url: config.exchange_rate_url.clone(),
            fallback: config.fallback_rate,
            ttl: Duration::from_secs(config.cache_ttl_secs),
            http: build_client(),
            redis,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn rate(&self) -> (f64, RateSource) {
        {
            let guard = self.cached.lock().await;
            if let Some((rate, at)) = *guard
                && at.elapsed() < self.ttl
            {
                return (rate, RateSource::Cached);
            }
        }
        if let Some(client) = &self.redis
            && let Some(payload) = redis_get_json::<RatePayload>(client, REDIS_KEY).await
            && valid_rate(payload.rate)
        {
            self.remember(payload.rate).await;
            return (payload.rate, RateSource::Cached);
        }
        match self.fetch().await {
            Ok(rate) => {
                debug!(target = "hermes.rates", rate, "exchange_rate_fetched");
                self.remember(rate).await;
                if let Some(client) = &self.redis {
                    redis_set_json(client, REDIS_KEY, &RatePayload { rate }, self.ttl.as_secs())
                        .await;
                }
                (rate, RateSource::Live)
            }
            Err(err) => {
                warn!(target = "hermes.rates", error = %err, fallback = self.fallback, "exchange_rate_fallback");
                (self.fallback, RateSource::Fallback)
            }
        }
    }

    async fn remember(&self, rate: f64) {
        let mut guard = self.cached.lock().await;
        *guard = Some((rate, Instant::now()));
    }

    async fn fetch(&self) -> Result<f64, RateError> {
        let url = self.url.as_deref().ok_or(RateError::NotConfigured)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| RateError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(RateError::Request(format!("HTTP {}", response.status())));
        }
        let payload: RatePayload = response
            .json()
            .await
            .map_err(|err| RateError::Deserialize(err.to_string()))?;
        if !valid_rate(payload.rate) {
            return Err(RateError::OutOfRange(payload.rate));
        }
        Ok(payload.rate)
    }
}

fn valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::get};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}/rate")
    }

    fn config(url: Option<String>) -> PricingConfig {
        PricingConfig {
            exchange_rate_url: url,
            ..PricingConfig::default()
        }
    }

    #[tokio::test]
    async fn live_rate_is_cached_in_process() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/rate",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({"rate": 0.27}))
                }
            }),
        );
        let rates = ExchangeRates::new(&config(Some(serve(router).await)), None);
        assert_eq!(rates.rate().await, (0.27, RateSource::Live));
        assert_eq!(rates.rate().await, (0.27, RateSource::Cached));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_fall_back_to_configured_rate() {
        let router = Router::new().route("/rate", get(|| async { Json(serde_json::json!({"rate": -1.0})) }));
        let rates = ExchangeRates::new(&config(Some(serve(router).await)), None);
        assert_eq!(rates.rate().await, (0.25, RateSource::Fallback));

        let unconfigured = ExchangeRates::new(&config(None), None);
        assert_eq!(unconfigured.rate().await, (0.25, RateSource::Fallback));
    }
}
