//! Exchange rates from the Frankfurter API (ECB daily reference rates).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;

use crate::cache::Cache;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::market::CurrencyConverter;

/// Response from the `latest` endpoint.
#[derive(Debug, Deserialize)]
struct LatestRates {
    rates: HashMap<String, f64>,
}

pub struct FrankfurterConverter {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    cache: Option<Arc<dyn Cache<Decimal>>>,
}

impl FrankfurterConverter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("invalid URL {:?}: {}", base_url, e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
            cache: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.fx_base_url, config.http_timeout)
    }

    /// Memoise rates in `cache` under `fx:{from}:{to}`.
    pub fn with_cache(mut self, cache: Arc<dyn Cache<Decimal>>) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn fetch_rate(&self, from: &str, to: &str) -> Result<Decimal> {
        let fail = |reason: String| {
            tracing::error!("Rate {} -> {} unavailable: {}", from, to, reason);
            AppError::ConversionUnavailable {
                from: from.to_string(),
                to: to.to_string(),
                reason,
            }
        };

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push("latest");
        url.query_pairs_mut()
            .append_pair("from", from)
            .append_pair("to", to);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(e.to_string()))?
            .json::<LatestRates>()
            .await
            .map_err(|e| fail(e.to_string()))?;

        response
            .rates
            .get(to)
            .copied()
            .and_then(Decimal::from_f64)
            .ok_or_else(|| fail(format!("{} missing from response", to)))
    }
}

#[async_trait]
impl CurrencyConverter for FrankfurterConverter {
    async fn rate(&self, from: &str, to: &str) -> Result<Decimal> {
        let from = from.to_uppercase();
        let to = to.to_uppercase();
        if from == to {
            return Ok(Decimal::ONE);
        }

        let key = format!("fx:{}:{}", from, to);
        if let Some(cache) = &self.cache {
            if let Some(rate) = cache.get(&key).await {
                return Ok(rate);
            }
        }

        let rate = self.fetch_rate(&from, &to).await?;
        if let Some(cache) = &self.cache {
            cache.insert(key, rate).await;
        }
        Ok(rate)
    }
}
