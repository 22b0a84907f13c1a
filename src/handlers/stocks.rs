use crate::error::Result;
use crate::models::Quote;
use crate::state::AppState;
use crate::validation;

/// Market movers for the dashboard, `most_actives` when no type is given.
pub async fn get_dashboard_stocks(state: &AppState, kind: Option<&str>) -> Result<Vec<Quote>> {
    let kind = validation::stock_type(kind)?;
    let cache_key = format!("stocks?type={}", kind);
    if let Some(stocks) = state.listings.get(&cache_key).await {
        return Ok(stocks);
    }

    let stocks = state
        .quotes
        .list_stocks(
            kind,
            &state.config.screener_region,
            state.config.screener_count,
        )
        .await?;
    tracing::info!(
        "Fetched {} {} stocks from {}",
        stocks.len(),
        kind,
        state.quotes.name()
    );

    state.listings.insert(cache_key, stocks.clone()).await;
    Ok(stocks)
}

/// Quote for a single ticker, if the provider knows it.
pub async fn get_stock_info(state: &AppState, stock_code: &str) -> Result<Option<Quote>> {
    let stock_code = validation::stock_code(stock_code)?;
    let quotes = state.quotes.get_quotes(&[stock_code]).await?;
    Ok(quotes.into_iter().next())
}

/// Searches by name or ticker and returns full quotes for the hits.
pub async fn search_stocks(state: &AppState, query: &str) -> Result<Vec<Quote>> {
    let query = validation::search_query(query)?;
    let cache_key = format!("stocks/search?query={}", query);
    if let Some(stocks) = state.listings.get(&cache_key).await {
        return Ok(stocks);
    }

    let hits = state.quotes.search(&query).await?;
    let symbols: Vec<String> = hits.into_iter().map(|hit| hit.symbol).collect();
    let stocks = state.quotes.get_quotes(&symbols).await?;
    tracing::info!("Search {:?} matched {} stocks", query, stocks.len());

    state.listings.insert(cache_key, stocks.clone()).await;
    Ok(stocks)
}
