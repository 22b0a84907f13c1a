use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use portfolio_tracker::cache::{Cache, MemoryCache};
use portfolio_tracker::fx::FrankfurterConverter;
use portfolio_tracker::market::{CurrencyConverter, RateTable};
use portfolio_tracker::AppError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_rate(server: &MockServer, from: &str, to: &str, rate: f64, expected_calls: u64) {
    let body = format!(
        r#"{{"amount":1.0,"base":"{}","date":"2024-05-02","rates":{{"{}":{}}}}}"#,
        from, to, rate
    );
    Mock::given(method("GET"))
        .and(path("/latest"))
        .and(query_param("from", from))
        .and(query_param("to", to))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn converter(server: &MockServer) -> FrankfurterConverter {
    FrankfurterConverter::new(&server.uri(), Duration::from_secs(5)).expect("valid mock URL")
}

#[tokio::test]
async fn converts_through_the_latest_rate() -> Result<()> {
    let server = MockServer::start().await;
    mount_rate(&server, "USD", "INR", 83.5, 1).await;

    let amount = converter(&server).convert(dec!(10), "usd", "inr").await?;
    assert_eq!(amount, dec!(835));
    Ok(())
}

#[tokio::test]
async fn cached_rates_are_fetched_once() -> Result<()> {
    let server = MockServer::start().await;
    mount_rate(&server, "EUR", "USD", 1.08, 1).await;

    let cache: Arc<dyn Cache<Decimal>> = Arc::new(MemoryCache::new(Duration::from_secs(60)));
    let fx = converter(&server).with_cache(cache.clone());

    assert_eq!(fx.rate("EUR", "USD").await?, dec!(1.08));
    assert_eq!(fx.rate("EUR", "USD").await?, dec!(1.08));
    assert_eq!(cache.get("fx:EUR:USD").await, Some(dec!(1.08)));
    Ok(())
}

#[tokio::test]
async fn same_currency_never_hits_the_network() -> Result<()> {
    let server = MockServer::start().await;

    assert_eq!(converter(&server).rate("INR", "inr").await?, Decimal::ONE);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_currency_is_conversion_unavailable() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"message":"not found"}"#))
        .mount(&server)
        .await;

    let err = converter(&server)
        .rate("XYZ", "INR")
        .await
        .expect_err("unknown currency");

    match &err {
        AppError::ConversionUnavailable { from, to, .. } => {
            assert_eq!(from, "XYZ");
            assert_eq!(to, "INR");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.status_code().as_u16(), 503);
    Ok(())
}

#[tokio::test]
async fn rate_table_fetches_each_currency_once() -> Result<()> {
    let server = MockServer::start().await;
    mount_rate(&server, "USD", "INR", 83.0, 1).await;
    mount_rate(&server, "EUR", "INR", 90.0, 1).await;

    let fx = converter(&server);
    let table = RateTable::resolve(&fx, ["USD", "EUR", "USD", "INR", "EUR"], "INR").await?;

    assert_eq!(table.convert(dec!(2), "USD", "INR")?, dec!(166));
    assert_eq!(table.convert(dec!(2), "EUR", "INR")?, dec!(180));
    assert_eq!(table.convert(dec!(2), "INR", "INR")?, dec!(2));
    Ok(())
}
