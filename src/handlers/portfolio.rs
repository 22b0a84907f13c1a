use crate::cache::{user_key, MY_STOCKS_KEY};
use crate::error::{AppError, Result};
use crate::market::RateTable;
use crate::models::{Holding, NewHolding};
use crate::state::AppState;
use crate::validation;
use crate::valuation::{build_portfolio_report, distinct_symbols, PortfolioReport};

/// Values the user's holdings in their local currency, grouped by sector.
pub async fn get_my_stocks(state: &AppState, user_id: i64) -> Result<PortfolioReport> {
    let cache_key = user_key(MY_STOCKS_KEY, user_id);
    if let Some(report) = state.reports.get(&cache_key).await {
        tracing::debug!("Serving cached portfolio for user {}", user_id);
        return Ok(report);
    }

    let user = state
        .db
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    let holdings = state.db.list_holdings(user_id).await?;

    // One batched quote call for every distinct ticker
    let symbols = distinct_symbols(&holdings);
    let quotes = state.quotes.get_quotes(&symbols).await?;
    tracing::debug!(
        "{} priced {} of {} tickers",
        state.quotes.name(),
        quotes.len(),
        symbols.len()
    );

    // Resolve every rate we need up front, concurrently
    let rates = RateTable::resolve(
        state.fx.as_ref(),
        quotes.iter().map(|q| q.currency.as_str()),
        &user.local_currency,
    )
    .await?;

    let report = build_portfolio_report(
        &holdings,
        &quotes,
        |amount, from, to| rates.convert(amount, from, to),
        &user.local_currency,
    )?;

    tracing::info!(
        "Valued {} holdings ({} priced) for user {} in {}",
        holdings.len(),
        report.stocks.iter().map(|s| s.stocks.len()).sum::<usize>(),
        user_id,
        user.local_currency
    );

    state.reports.insert(cache_key, report.clone()).await;
    Ok(report)
}

/// Records a purchase after checking the ticker resolves to a quote.
pub async fn create_my_stock(
    state: &AppState,
    user_id: i64,
    mut purchase: NewHolding,
) -> Result<Holding> {
    purchase.stock_code = purchase.stock_code.trim().to_uppercase();
    validation::check(&purchase)?;

    if state.db.find_user(user_id).await?.is_none() {
        return Err(AppError::not_found("User"));
    }

    let quotes = state
        .quotes
        .get_quotes(&[purchase.stock_code.clone()])
        .await?;
    let Some(quote) = quotes.into_iter().next() else {
        return Err(AppError::not_found("Stock"));
    };
    // Store the provider's spelling so later reports match it exactly
    purchase.stock_code = quote.symbol;

    let holding = state.db.create_holding(user_id, &purchase).await?;
    tracing::info!(
        "User {} bought {} x {} at {}",
        user_id,
        holding.quantity,
        holding.stock_code,
        holding.purchase_price
    );

    state
        .reports
        .remove(&user_key(MY_STOCKS_KEY, user_id))
        .await;
    Ok(holding)
}

/// Removes one of the user's holdings.
pub async fn delete_my_stock(state: &AppState, user_id: i64, stock_id: i64) -> Result<()> {
    validation::stock_id(stock_id)?;

    if !state.db.delete_holding(stock_id, user_id).await? {
        return Err(AppError::not_found("Stock"));
    }
    tracing::info!("User {} removed holding {}", user_id, stock_id);

    state
        .reports
        .remove(&user_key(MY_STOCKS_KEY, user_id))
        .await;
    Ok(())
}
