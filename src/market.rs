use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use rust_decimal::Decimal;

use crate::error::{AppError, Result};
use crate::models::{Quote, SearchResult, StockType};

/// Source of live quotes, screeners and symbol search.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Quotes for `symbols` in one batch. Unknown or delisted symbols are
    /// simply absent from the result.
    async fn get_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>>;

    async fn list_stocks(&self, kind: StockType, region: &str, count: u32) -> Result<Vec<Quote>>;

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;

    /// Short provider name for log lines.
    fn name(&self) -> &str;
}

/// Source of exchange rates.
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// Units of `to` bought by one unit of `from`.
    async fn rate(&self, from: &str, to: &str) -> Result<Decimal>;

    async fn convert(&self, amount: Decimal, from: &str, to: &str) -> Result<Decimal> {
        if from.eq_ignore_ascii_case(to) {
            return Ok(amount);
        }
        let rate = self.rate(from, to).await?;
        amount
            .checked_mul(rate)
            .ok_or_else(|| AppError::OutOfRange(format!("{} {} in {}", amount, from, to)))
    }
}

/// Exchange rates into one target currency, resolved up front so that
/// conversion afterwards is synchronous and cannot touch the network.
#[derive(Debug, Clone)]
pub struct RateTable {
    target: String,
    rates: HashMap<String, Decimal>,
}

impl RateTable {
    /// Fetches every distinct `currency -> target` rate concurrently. Any
    /// single failure fails the whole table.
    pub async fn resolve<'a, I>(
        converter: &dyn CurrencyConverter,
        currencies: I,
        target: &str,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let target = target.to_uppercase();
        let mut pending: Vec<String> = Vec::new();
        for currency in currencies {
            let currency = currency.to_uppercase();
            if currency != target && !pending.contains(&currency) {
                pending.push(currency);
            }
        }

        let fetched = try_join_all(pending.iter().map(|from| {
            let target = target.as_str();
            async move {
                let rate = converter.rate(from, target).await?;
                tracing::debug!("Rate {} -> {} = {}", from, target, rate);
                Ok::<_, AppError>((from.clone(), rate))
            }
        }))
        .await?;

        Ok(RateTable {
            target,
            rates: fetched.into_iter().collect(),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Converts `amount` from `from` into `to`, which must be the table's
    /// target currency.
    pub fn convert(&self, amount: Decimal, from: &str, to: &str) -> Result<Decimal> {
        let from = from.to_uppercase();
        if !to.eq_ignore_ascii_case(&self.target) {
            return Err(self.unavailable(&from, to));
        }
        if from == self.target {
            return Ok(amount);
        }
        let rate = self
            .rates
            .get(&from)
            .ok_or_else(|| self.unavailable(&from, to))?;
        amount
            .checked_mul(*rate)
            .ok_or_else(|| AppError::OutOfRange(format!("{} {} in {}", amount, from, to)))
    }

    fn unavailable(&self, from: &str, to: &str) -> AppError {
        AppError::ConversionUnavailable {
            from: from.to_string(),
            to: to.to_uppercase(),
            reason: "rate was not resolved".to_string(),
        }
    }
}
