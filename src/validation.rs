//! Input checks applied before an operation touches storage or a provider.
//!
//! Request bodies derive [`Validate`]; every failing field is collected so a
//! caller sees all problems at once.

use std::borrow::Cow;

use regex::Regex;
use rust_decimal::Decimal;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{AppError, FieldError, Result};
use crate::models::StockType;

/// Largest accepted purchase price, in the quote's currency.
pub const MAX_PURCHASE_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

lazy_static::lazy_static! {
    pub static ref USERNAME_RE: Regex =
        Regex::new(r"^[A-Za-z0-9_]+$").expect("valid username pattern");
    pub static ref CURRENCY_RE: Regex =
        Regex::new(r"^[A-Za-z]{3}$").expect("valid currency pattern");
}

/// Runs the derived checks on `input`.
pub fn check<T: Validate>(input: &T) -> Result<()> {
    input.validate().map_err(into_app_error)
}

fn into_app_error(errors: ValidationErrors) -> AppError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(field, _)| *field);

    let errors = fields
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| FieldError {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string()),
            })
        })
        .collect();
    AppError::Validation(errors)
}

fn rejected(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Price bounds plus the two-decimal-place rule; trailing zeros are ignored.
pub fn purchase_price(price: &Decimal) -> std::result::Result<(), ValidationError> {
    if *price < Decimal::new(1, 2) || *price > MAX_PURCHASE_PRICE {
        return Err(rejected(
            "range",
            "Purchase price must be between 0.01 and 1000000000",
        ));
    }
    if price.normalize().scale() > 2 {
        return Err(rejected(
            "precision",
            "Purchase price can have maximum 2 decimal places",
        ));
    }
    Ok(())
}

#[derive(Validate)]
struct StockIdParam {
    #[validate(range(min = 1, message = "Stock ID must be at least 1"))]
    stock_id: i64,
}

#[derive(Validate)]
struct StockCodeParam {
    #[validate(length(min = 1, max = 50, message = "Stock code must be between 1 and 50 characters"))]
    stock_code: String,
}

#[derive(Validate)]
struct SearchParam {
    #[validate(length(min = 1, max = 50, message = "Query must be between 1 and 50 characters"))]
    query: String,
}

pub fn stock_id(stock_id: i64) -> Result<()> {
    check(&StockIdParam { stock_id })
}

/// Trims and upper-cases a ticker used for lookups.
pub fn stock_code(code: &str) -> Result<String> {
    let param = StockCodeParam {
        stock_code: code.trim().to_uppercase(),
    };
    check(&param)?;
    Ok(param.stock_code)
}

/// Trims and checks a free-text search query.
pub fn search_query(query: &str) -> Result<String> {
    let param = SearchParam {
        query: query.trim().to_string(),
    };
    check(&param)?;
    Ok(param.query)
}

/// Resolves the screener id, defaulting to the most active stocks.
pub fn stock_type(raw: Option<&str>) -> Result<StockType> {
    match raw {
        None => Ok(StockType::default()),
        Some(value) => value.parse().map_err(|_| {
            AppError::Validation(vec![FieldError {
                field: "type".to_string(),
                message: "Stock type must be one of: most_actives, day_gainers, day_losers"
                    .to_string(),
            }])
        }),
    }
}
