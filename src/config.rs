use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub frontend_url: String,
    pub database_path: String,
    pub yahoo_base_url: String,
    pub yahoo_cookie_url: String,
    pub fx_base_url: String,
    pub default_currency: String,
    pub cache_ttl: Duration,
    pub screener_region: String,
    pub screener_count: u32,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0:3000".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            database_path: "db.sqlite".to_string(),
            yahoo_base_url: "https://query1.finance.yahoo.com".to_string(),
            yahoo_cookie_url: "https://fc.yahoo.com".to_string(),
            fx_base_url: "https://api.frankfurter.app".to_string(),
            default_currency: "USD".to_string(),
            cache_ttl: Duration::from_secs(60),
            screener_region: "US".to_string(),
            screener_count: 20,
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Initialize dotenv so we can read .env file
        dotenv::dotenv().ok();

        let defaults = Config::default();
        Ok(Config {
            bind_addr: var_or("BIND_ADDR", defaults.bind_addr),
            frontend_url: var_or("FRONTEND_URL", defaults.frontend_url),
            database_path: var_or("DATABASE_PATH", defaults.database_path),
            yahoo_base_url: var_or("YAHOO_BASE_URL", defaults.yahoo_base_url),
            yahoo_cookie_url: var_or("YAHOO_COOKIE_URL", defaults.yahoo_cookie_url),
            fx_base_url: var_or("FX_BASE_URL", defaults.fx_base_url),
            default_currency: var_or("DEFAULT_CURRENCY", defaults.default_currency)
                .to_uppercase(),
            cache_ttl: Duration::from_secs(parse_var("CACHE_TTL_SECS", 60)?),
            screener_region: var_or("SCREENER_REGION", defaults.screener_region),
            screener_count: parse_var("SCREENER_COUNT", defaults.screener_count)?,
            http_timeout: Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", 10)?),
        })
    }
}

fn var_or(key: &str, default: String) -> String {
    dotenv::var(key).unwrap_or(default)
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T> {
    match dotenv::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a number, got {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_numeric_keys_fall_back() {
        let value: u32 = parse_var("PORTFOLIO_TRACKER_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn malformed_numeric_keys_are_rejected() {
        std::env::set_var("PORTFOLIO_TRACKER_TEST_BAD_KEY", "sixty");
        let result: Result<u64> = parse_var("PORTFOLIO_TRACKER_TEST_BAD_KEY", 60);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
