use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User represents a portfolio owner.
/// `deleted` is derived from the row's deletion timestamp when it is read.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub local_currency: String,
    pub deleted: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct NewUser {
    #[validate(
        length(min = 3, max = 20, message = "Username must be between 3 and 20 characters"),
        regex(
            path = "crate::validation::USERNAME_RE",
            message = "Username can only contain letters, numbers, and underscores"
        )
    )]
    pub username: String,
    #[validate(
        email(message = "Please provide a valid email address"),
        length(max = 100, message = "Email must not exceed 100 characters")
    )]
    pub email: String,
    #[validate(regex(
        path = "crate::validation::CURRENCY_RE",
        message = "Local currency must be a three letter currency code"
    ))]
    pub local_currency: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct ProfileUpdate {
    #[validate(
        length(min = 3, max = 20, message = "Username must be between 3 and 20 characters"),
        regex(
            path = "crate::validation::USERNAME_RE",
            message = "Username can only contain letters, numbers, and underscores"
        )
    )]
    pub username: Option<String>,
    #[validate(
        email(message = "Please provide a valid email address"),
        length(max = 100, message = "Email must not exceed 100 characters")
    )]
    pub email: Option<String>,
    #[validate(regex(
        path = "crate::validation::CURRENCY_RE",
        message = "Local currency must be a three letter currency code"
    ))]
    pub local_currency: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.local_currency.is_none()
    }
}

/// Holding is one purchased position owned by a user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Holding {
    #[serde(rename = "user_stock_id")]
    pub id: i64,
    pub user_id: i64,
    pub stock_code: String,
    pub quantity: i64,
    pub purchase_price: Decimal,
    pub purchase_date: NaiveDate,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct NewHolding {
    #[validate(length(
        min = 1,
        max = 30,
        message = "Stock code must be between 1 and 30 characters"
    ))]
    pub stock_code: String,
    #[validate(range(
        min = 1,
        max = 1000000000,
        message = "Quantity must be between 1 and 1000000000"
    ))]
    pub quantity: i64,
    #[validate(custom = "crate::validation::purchase_price")]
    pub purchase_price: Decimal,
    pub purchase_date: Option<NaiveDate>,
}

/// Live market data for one symbol. Never persisted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub name: String,
    pub symbol: String,
    pub current_market_price: Decimal,
    pub pe_ratio: Option<f64>,
    pub latest_earnings: Option<i64>,
    pub sector: String,
    pub currency: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub name: String,
    pub symbol: String,
    pub sector: Option<String>,
}

/// Predefined market screeners shown on the dashboard.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StockType {
    #[default]
    MostActives,
    DayGainers,
    DayLosers,
}

impl StockType {
    pub const ALL: [StockType; 3] = [
        StockType::MostActives,
        StockType::DayGainers,
        StockType::DayLosers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StockType::MostActives => "most_actives",
            StockType::DayGainers => "day_gainers",
            StockType::DayLosers => "day_losers",
        }
    }
}

impl fmt::Display for StockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StockType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or(())
    }
}
