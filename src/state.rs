use std::sync::Arc;

use rust_decimal::Decimal;

use crate::cache::{Cache, MemoryCache};
use crate::config::Config;
use crate::db::DatabasePool;
use crate::error::Result;
use crate::fx::FrankfurterConverter;
use crate::market::{CurrencyConverter, QuoteProvider};
use crate::models::Quote;
use crate::valuation::PortfolioReport;
use crate::yahoo::YahooClient;

/// Everything an operation needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabasePool,
    pub quotes: Arc<dyn QuoteProvider>,
    pub fx: Arc<dyn CurrencyConverter>,
    pub reports: Arc<dyn Cache<PortfolioReport>>,
    pub listings: Arc<dyn Cache<Vec<Quote>>>,
}

impl AppState {
    /// Wires the Yahoo and Frankfurter providers and in-memory caches.
    pub fn from_config(config: Config) -> Result<Self> {
        let db = DatabasePool::open(&config.database_path)?;
        let rates: Arc<dyn Cache<Decimal>> = Arc::new(MemoryCache::new(config.cache_ttl));
        let quotes = Arc::new(YahooClient::from_config(&config)?);
        let fx = Arc::new(FrankfurterConverter::from_config(&config)?.with_cache(rates));
        Ok(Self::new(config, db, quotes, fx))
    }

    /// Builds state around the given collaborators with fresh caches.
    pub fn new(
        config: Config,
        db: DatabasePool,
        quotes: Arc<dyn QuoteProvider>,
        fx: Arc<dyn CurrencyConverter>,
    ) -> Self {
        let ttl = config.cache_ttl;
        AppState {
            config: Arc::new(config),
            db,
            quotes,
            fx,
            reports: Arc::new(MemoryCache::new(ttl)),
            listings: Arc::new(MemoryCache::new(ttl)),
        }
    }
}
