//! Yahoo Finance quote provider.
//!
//! Quotes come from one batched `v7/finance/quote` call; sectors need a
//! separate `quoteSummary` lookup per symbol, issued concurrently. Yahoo
//! rejects unauthenticated requests, so a cookie/crumb pair is fetched on
//! first use and kept for the lifetime of the provider.

mod models;

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use url::Url;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::market::QuoteProvider;
use crate::models::{Quote, SearchResult, StockType};

use models::{QuoteEnvelope, ScreenerEnvelope, SearchEnvelope, SummaryEnvelope, YahooQuote};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// Make the client static and reusable
lazy_static::lazy_static! {
    static ref CLIENT: reqwest::Client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default();
}

#[derive(Debug, Clone)]
struct Crumb {
    cookie: String,
    crumb: String,
}

pub struct YahooClient {
    client: reqwest::Client,
    base_url: Url,
    cookie_url: Url,
    timeout: Duration,
    crumb: RwLock<Option<Crumb>>,
}

impl YahooClient {
    pub fn new(base_url: &str, cookie_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: CLIENT.clone(),
            base_url: parse_url(base_url)?,
            cookie_url: parse_url(cookie_url)?,
            timeout,
            crumb: RwLock::new(None),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.yahoo_base_url,
            &config.yahoo_cookie_url,
            config.http_timeout,
        )
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn crumb(&self) -> Result<Crumb> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let mut slot = self.crumb.write().await;
        // Another task may have authenticated while we waited for the lock
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }
        let crumb = self.fetch_crumb().await?;
        *slot = Some(crumb.clone());
        Ok(crumb)
    }

    async fn fetch_crumb(&self) -> Result<Crumb> {
        // The cookie endpoint answers 404 but still sets the session cookie
        let response = self
            .client
            .get(self.cookie_url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| unavailable("cookie request failed", e))?;

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.split_once(';').map_or(s, |(v, _)| v).to_string())
            .ok_or_else(|| AppError::QuotesUnavailable("no session cookie returned".to_string()))?;

        let crumb = self
            .client
            .get(self.endpoint(&["v1", "test", "getcrumb"])?)
            .header(COOKIE, &cookie)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| unavailable("crumb request failed", e))?
            .text()
            .await
            .map_err(|e| unavailable("crumb body unreadable", e))?;

        if crumb.trim().is_empty() {
            return Err(AppError::QuotesUnavailable("empty crumb".to_string()));
        }
        tracing::debug!("Obtained Yahoo crumb");

        Ok(Crumb {
            cookie,
            crumb: crumb.trim().to_string(),
        })
    }

    /// GET a Yahoo endpoint with the session crumb attached. A rejected crumb
    /// is refreshed once before giving up.
    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T> {
        for attempt in 0..2 {
            let crumb = self.crumb().await?;
            let mut url = self.endpoint(segments)?;
            url.query_pairs_mut()
                .extend_pairs(query)
                .append_pair("crumb", &crumb.crumb);

            let response = self
                .client
                .get(url)
                .header(COOKIE, &crumb.cookie)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| unavailable("request failed", e))?;

            let status = response.status();
            if attempt == 0 && (status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN)
            {
                tracing::warn!("Yahoo rejected the crumb ({}), re-authenticating", status);
                *self.crumb.write().await = None;
                continue;
            }
            if !status.is_success() {
                tracing::error!("Yahoo request to {:?} failed: HTTP {}", segments, status);
                return Err(AppError::QuotesUnavailable(format!("HTTP {}", status)));
            }

            return response
                .json::<T>()
                .await
                .map_err(|e| unavailable("unexpected response body", e));
        }

        Err(AppError::QuotesUnavailable(
            "authentication rejected twice".to_string(),
        ))
    }

    /// Sector from the asset profile, empty when Yahoo has none.
    async fn fetch_sector(&self, symbol: &str) -> String {
        let summary: Result<SummaryEnvelope> = self
            .get_json(
                &["v10", "finance", "quoteSummary", symbol],
                &[("modules", "assetProfile")],
            )
            .await;

        match summary {
            Ok(envelope) => envelope
                .quote_summary
                .result
                .unwrap_or_default()
                .into_iter()
                .find_map(|r| r.asset_profile.and_then(|p| p.sector))
                .unwrap_or_default(),
            Err(e) => {
                tracing::debug!("No sector for {}: {}", symbol, e);
                String::new()
            }
        }
    }

    /// Keeps equities with a usable price and attaches their sectors.
    async fn with_sectors(&self, raw: Vec<YahooQuote>) -> Vec<Quote> {
        let equities = raw.into_iter().filter(YahooQuote::is_equity);
        join_all(equities.map(|quote| async move {
            let sector = self.fetch_sector(&quote.symbol).await;
            to_quote(quote, sector)
        }))
        .await
        .into_iter()
        .flatten()
        .collect()
    }
}

#[async_trait]
impl QuoteProvider for YahooClient {
    async fn get_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let joined = symbols.join(",");
        let envelope: QuoteEnvelope = self
            .get_json(&["v7", "finance", "quote"], &[("symbols", joined.as_str())])
            .await?;

        let quotes = self.with_sectors(envelope.quote_response.result).await;
        tracing::debug!(
            "Resolved {} of {} requested symbols",
            quotes.len(),
            symbols.len()
        );
        Ok(quotes)
    }

    async fn list_stocks(&self, kind: StockType, region: &str, count: u32) -> Result<Vec<Quote>> {
        let count = count.to_string();
        let envelope: ScreenerEnvelope = self
            .get_json(
                &["v1", "finance", "screener", "predefined", "saved"],
                &[
                    ("scrIds", kind.as_str()),
                    ("count", count.as_str()),
                    ("lang", "en-US"),
                    ("region", region),
                ],
            )
            .await?;

        let raw = envelope
            .finance
            .result
            .unwrap_or_default()
            .into_iter()
            .flat_map(|r| r.quotes)
            .collect();
        Ok(self.with_sectors(raw).await)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let envelope: SearchEnvelope = self
            .get_json(
                &["v1", "finance", "search"],
                &[("q", query), ("newsCount", "0")],
            )
            .await?;

        Ok(envelope
            .quotes
            .into_iter()
            .filter(|hit| hit.quote_type.as_deref() == Some("EQUITY"))
            .filter_map(|hit| {
                let symbol = hit.symbol?;
                Some(SearchResult {
                    name: hit.longname.or(hit.shortname).unwrap_or_default(),
                    symbol,
                    sector: hit.sector,
                })
            })
            .collect())
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

/// Yahoo quotes some exchanges in minor units (pence, cents, agorot).
/// Returns the ISO code of the major unit and how many minor units make one.
fn major_currency(code: &str) -> (String, Decimal) {
    match code {
        "GBp" | "GBX" => ("GBP".to_string(), Decimal::ONE_HUNDRED),
        "ZAc" | "ZAC" => ("ZAR".to_string(), Decimal::ONE_HUNDRED),
        "ILA" => ("ILS".to_string(), Decimal::ONE_HUNDRED),
        other => (other.to_uppercase(), Decimal::ONE),
    }
}

fn to_quote(raw: YahooQuote, sector: String) -> Option<Quote> {
    let Some(price) = raw.regular_market_price.and_then(Decimal::from_f64) else {
        tracing::warn!("Dropping {}: no market price", raw.symbol);
        return None;
    };
    let (currency, minor_units) = major_currency(raw.currency.as_deref().unwrap_or("USD"));
    Some(Quote {
        name: raw
            .long_name
            .or(raw.short_name)
            .unwrap_or_else(|| raw.symbol.clone()),
        symbol: raw.symbol,
        current_market_price: price / minor_units,
        pe_ratio: raw.trailing_pe,
        latest_earnings: raw.earnings_timestamp.or(raw.earnings_timestamp_start),
        sector,
        currency,
    })
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| AppError::Config(format!("invalid URL {:?}: {}", raw, e)))
}

fn unavailable(context: &str, err: reqwest::Error) -> AppError {
    tracing::error!("Yahoo {}: {}", context, err);
    AppError::QuotesUnavailable(format!("{}: {}", context, err))
}
