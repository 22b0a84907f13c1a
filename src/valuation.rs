//! Portfolio valuation.
//!
//! [`build_portfolio_report`] turns a user's holdings plus live quotes into a
//! report grouped by sector. It performs no I/O: exchange rates arrive
//! through the `convert` callback, typically backed by a resolved
//! [`RateTable`](crate::market::RateTable).
//!
//! All arithmetic runs at full precision. Each emitted field is rounded to
//! two decimal places exactly once, as it is written into the report.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Holding, Quote};

/// A holding merged with its quote and derived values.
///
/// `investment`, `present_value` and `gain_loss` are in the quote's trading
/// currency; `local_*` fields are in the report's local currency.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedHolding {
    #[serde(flatten)]
    pub holding: Holding,
    #[serde(flatten)]
    pub quote: Quote,
    pub investment: Decimal,
    pub present_value: Decimal,
    pub local_investment: Decimal,
    pub local_present_value: Decimal,
    pub gain_loss: Decimal,
    pub gain_loss_percentage: Decimal,
    pub portfolio_percentage: Decimal,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectorSummary {
    pub sector: String,
    pub total_investment: Decimal,
    pub total_present_value: Decimal,
    pub total_gain_loss: Decimal,
    pub total_gain_loss_percentage: Decimal,
    pub currency: String,
    pub stock_count: i64,
    pub portfolio_percentage: Decimal,
    pub stocks: Vec<EnrichedHolding>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioReport {
    pub stocks: Vec<SectorSummary>,
    pub total_portfolio_investment: Decimal,
    pub total_current_value: Decimal,
    pub total_gain_loss: Decimal,
    pub total_stocks: i64,
    pub local_currency: String,
}

/// Round half away from zero to two decimal places.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `part / whole * 100`, or zero when `whole` is not positive.
fn percentage(part: Decimal, whole: Decimal) -> Result<Decimal> {
    if whole > Decimal::ZERO {
        part.checked_div(whole)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(|| out_of_range("percentage"))
    } else {
        Ok(Decimal::ZERO)
    }
}

fn out_of_range(what: &str) -> AppError {
    AppError::OutOfRange(what.to_string())
}

fn mul(a: Decimal, b: Decimal, what: &str) -> Result<Decimal> {
    a.checked_mul(b).ok_or_else(|| out_of_range(what))
}

fn add(a: Decimal, b: Decimal, what: &str) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(|| out_of_range(what))
}

fn sub(a: Decimal, b: Decimal, what: &str) -> Result<Decimal> {
    a.checked_sub(b).ok_or_else(|| out_of_range(what))
}

fn add_quantity(a: i64, b: i64) -> Result<i64> {
    a.checked_add(b).ok_or_else(|| out_of_range("share count"))
}

/// Distinct upper-cased tickers across `holdings`, in first-seen order.
pub fn distinct_symbols(holdings: &[Holding]) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for holding in holdings {
        let symbol = holding.stock_code.to_uppercase();
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

/// A holding that resolved to a quote, with its local-currency amounts.
struct Position<'a> {
    holding: &'a Holding,
    quote: &'a Quote,
    local_investment: Decimal,
    local_present_value: Decimal,
}

/// Running totals for one sector, kept unrounded.
struct SectorTotals {
    sector: String,
    investment: Decimal,
    present_value: Decimal,
    quantity: i64,
    /// Sum of the members' already-rounded percentages.
    percentage: Decimal,
    stocks: Vec<EnrichedHolding>,
}

/// Builds the sector-grouped valuation report for one user.
///
/// Holdings whose ticker has no quote are left out entirely. A conversion
/// failure for any holding fails the whole report.
pub fn build_portfolio_report<F>(
    holdings: &[Holding],
    quotes: &[Quote],
    convert: F,
    local_currency: &str,
) -> Result<PortfolioReport>
where
    F: Fn(Decimal, &str, &str) -> Result<Decimal>,
{
    // Tickers match case-insensitively; the provider reports canonical upper case
    let by_symbol: HashMap<String, &Quote> = quotes
        .iter()
        .map(|q| (q.symbol.to_uppercase(), q))
        .collect();

    // Every holding's share of the portfolio depends on the grand total, so
    // local amounts are settled before anything is enriched.
    let mut positions = Vec::with_capacity(holdings.len());
    for holding in holdings {
        let Some(quote) = by_symbol.get(&holding.stock_code.to_uppercase()).copied() else {
            tracing::debug!("No quote for {}, leaving it out", holding.stock_code);
            continue;
        };
        let quantity = Decimal::from(holding.quantity);
        let local_investment = mul(
            convert(holding.purchase_price, &quote.currency, local_currency)?,
            quantity,
            "investment",
        )?;
        let local_present_value = mul(
            convert(quote.current_market_price, &quote.currency, local_currency)?,
            quantity,
            "present value",
        )?;
        positions.push(Position {
            holding,
            quote,
            local_investment,
            local_present_value,
        });
    }

    let total_investment = positions
        .iter()
        .try_fold(Decimal::ZERO, |sum, p| add(sum, p.local_investment, "investment"))?;

    let mut sectors: Vec<SectorTotals> = Vec::new();
    let mut total_current_value = Decimal::ZERO;
    let mut total_stocks = 0i64;

    for position in positions {
        let Position {
            holding,
            quote,
            local_investment,
            local_present_value,
        } = position;
        let quantity = Decimal::from(holding.quantity);

        let investment = mul(holding.purchase_price, quantity, "investment")?;
        let present_value = mul(quote.current_market_price, quantity, "present value")?;
        let gain_loss = sub(present_value, investment, "gain/loss")?;

        let enriched = EnrichedHolding {
            holding: holding.clone(),
            quote: quote.clone(),
            investment: round2(investment),
            present_value: round2(present_value),
            local_investment: round2(local_investment),
            local_present_value: round2(local_present_value),
            gain_loss: round2(gain_loss),
            gain_loss_percentage: round2(percentage(gain_loss, investment)?),
            portfolio_percentage: round2(percentage(local_investment, total_investment)?),
        };

        total_current_value = add(total_current_value, local_present_value, "present value")?;
        total_stocks = add_quantity(total_stocks, holding.quantity)?;

        let index = match sectors.iter().position(|s| s.sector == quote.sector) {
            Some(index) => index,
            None => {
                sectors.push(SectorTotals {
                    sector: quote.sector.clone(),
                    investment: Decimal::ZERO,
                    present_value: Decimal::ZERO,
                    quantity: 0,
                    percentage: Decimal::ZERO,
                    stocks: Vec::new(),
                });
                sectors.len() - 1
            }
        };
        let totals = &mut sectors[index];
        totals.investment = add(totals.investment, local_investment, "investment")?;
        totals.present_value = add(totals.present_value, local_present_value, "present value")?;
        totals.quantity = add_quantity(totals.quantity, holding.quantity)?;
        totals.percentage = add(totals.percentage, enriched.portfolio_percentage, "percentage")?;
        totals.stocks.push(enriched);
    }

    let stocks = sectors
        .into_iter()
        .map(|totals| {
            let gain_loss = sub(totals.present_value, totals.investment, "gain/loss")?;
            Ok(SectorSummary {
                sector: totals.sector,
                total_investment: round2(totals.investment),
                total_present_value: round2(totals.present_value),
                total_gain_loss: round2(gain_loss),
                total_gain_loss_percentage: round2(percentage(gain_loss, totals.investment)?),
                currency: local_currency.to_string(),
                stock_count: totals.quantity,
                portfolio_percentage: round2(totals.percentage),
                stocks: totals.stocks,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PortfolioReport {
        stocks,
        total_portfolio_investment: round2(total_investment),
        total_current_value: round2(total_current_value),
        total_gain_loss: round2(sub(total_current_value, total_investment, "gain/loss")?),
        total_stocks,
        local_currency: local_currency.to_string(),
    })
}
