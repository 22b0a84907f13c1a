#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use portfolio_tracker::handlers::users;
use portfolio_tracker::market::{CurrencyConverter, QuoteProvider};
use portfolio_tracker::{
    AppError, AppState, Config, DatabasePool, NewHolding, NewUser, Quote, SearchResult, StockType,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Serves a fixed set of quotes and counts batch calls. Like Yahoo, symbols
/// match in any case and come back in canonical upper case.
pub struct StaticQuotes {
    quotes: HashMap<String, Quote>,
    pub batches: AtomicUsize,
    pub down: AtomicBool,
}

impl StaticQuotes {
    fn new(quotes: Vec<Quote>) -> Self {
        Self {
            quotes: quotes
                .into_iter()
                .map(|q| (q.symbol.to_uppercase(), q))
                .collect(),
            batches: AtomicUsize::new(0),
            down: AtomicBool::new(false),
        }
    }

    fn check_up(&self) -> portfolio_tracker::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::QuotesUnavailable("offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl QuoteProvider for StaticQuotes {
    async fn get_quotes(&self, symbols: &[String]) -> portfolio_tracker::Result<Vec<Quote>> {
        self.check_up()?;
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(symbols
            .iter()
            .filter_map(|s| self.quotes.get(&s.to_uppercase()).cloned())
            .collect())
    }

    async fn list_stocks(
        &self,
        _kind: StockType,
        _region: &str,
        count: u32,
    ) -> portfolio_tracker::Result<Vec<Quote>> {
        self.check_up()?;
        let mut all: Vec<Quote> = self.quotes.values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all.truncate(count as usize);
        Ok(all)
    }

    async fn search(&self, query: &str) -> portfolio_tracker::Result<Vec<SearchResult>> {
        self.check_up()?;
        let query = query.to_lowercase();
        Ok(self
            .quotes
            .values()
            .filter(|q| q.name.to_lowercase().contains(&query))
            .map(|q| SearchResult {
                name: q.name.clone(),
                symbol: q.symbol.clone(),
                sector: Some(q.sector.clone()),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

pub struct StaticRates;

#[async_trait]
impl CurrencyConverter for StaticRates {
    async fn rate(&self, from: &str, to: &str) -> portfolio_tracker::Result<Decimal> {
        match (from, to) {
            ("USD", "INR") => Ok(dec!(83)),
            ("EUR", "INR") => Ok(dec!(90)),
            ("INR", "USD") => Ok(dec!(0.012)),
            ("EUR", "USD") => Ok(dec!(1.1)),
            _ => Err(AppError::ConversionUnavailable {
                from: from.to_string(),
                to: to.to_string(),
                reason: "unsupported".to_string(),
            }),
        }
    }
}

pub fn quote(symbol: &str, name: &str, price: Decimal, currency: &str, sector: &str) -> Quote {
    Quote {
        name: name.to_string(),
        symbol: symbol.to_string(),
        current_market_price: price,
        pe_ratio: None,
        latest_earnings: None,
        sector: sector.to_string(),
        currency: currency.to_string(),
    }
}

pub fn setup() -> Result<(AppState, Arc<StaticQuotes>)> {
    let quotes = Arc::new(StaticQuotes::new(vec![
        quote("AAPL", "Apple Inc.", dec!(180), "USD", "Technology"),
        quote("SAP", "SAP SE", dec!(190), "EUR", "Technology"),
        quote("JPM", "JPMorgan Chase", dec!(200), "USD", "Financial Services"),
        quote("TOYOTA", "Toyota Motor", dec!(2600), "JPY", "Consumer Cyclical"),
    ]));
    let state = AppState::new(
        Config::default(),
        DatabasePool::in_memory()?,
        quotes.clone(),
        Arc::new(StaticRates),
    );
    Ok((state, quotes))
}

pub fn purchase(code: &str, quantity: i64, price: Decimal) -> NewHolding {
    NewHolding {
        stock_code: code.to_string(),
        quantity,
        purchase_price: price,
        purchase_date: NaiveDate::from_ymd_opt(2024, 2, 1),
    }
}

pub async fn user(state: &AppState, name: &str, currency: &str) -> Result<i64> {
    let created = users::create_user(
        state,
        NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            local_currency: Some(currency.to_string()),
        },
    )
    .await?;
    Ok(created.id)
}
