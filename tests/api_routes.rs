mod common;

use std::sync::atomic::Ordering;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::setup;
use portfolio_tracker::routes::app_router;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?,
        None => request.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

#[tokio::test]
async fn holdings_round_trip_over_http() -> Result<()> {
    let (state, quotes) = setup()?;
    let app = app_router(state);

    let (status, body) = call(
        &app,
        "POST",
        "/users",
        Some(json!({
            "username": "nia",
            "email": "nia@example.com",
            "local_currency": "inr"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["local_currency"], "INR");
    let id = body["data"]["user"]["id"].as_i64().unwrap_or_default();

    let (status, body) = call(
        &app,
        "POST",
        &format!("/users/{}/stocks", id),
        Some(json!({
            "stock_code": "aapl",
            "quantity": 2,
            "purchase_price": 150,
            "purchase_date": "2024-02-01"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["stock"]["stock_code"], "AAPL");
    let stock_id = body["data"]["stock"]["user_stock_id"].as_i64().unwrap_or_default();

    let (status, body) = call(&app, "GET", &format!("/users/{}/stocks", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["localCurrency"], "INR");
    assert_eq!(body["data"]["totalStocks"], 2);
    assert_eq!(body["data"]["stocks"][0]["sector"], "Technology");

    // Served from the report cache, the provider sees no new batch
    let batches = quotes.batches.load(Ordering::SeqCst);
    let (status, _) = call(&app, "GET", &format!("/users/{}/stocks", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quotes.batches.load(Ordering::SeqCst), batches);

    let (status, body) = call(
        &app,
        "DELETE",
        &format!("/users/{}/stocks/{}", id, stock_id),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "data": {} }));

    let (_, body) = call(&app, "GET", &format!("/users/{}/stocks", id), None).await?;
    assert_eq!(body["data"]["totalStocks"], 0);
    Ok(())
}

#[tokio::test]
async fn validation_failures_use_the_error_envelope() -> Result<()> {
    let (state, _) = setup()?;
    let app = app_router(state);

    let (status, body) = call(
        &app,
        "POST",
        "/users",
        Some(json!({ "username": "x", "email": "nope" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Validation error");
    assert_eq!(body["metadata"]["errors"][0]["field"], "email");

    let (status, body) = call(&app, "GET", "/users/abc", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["metadata"]["errors"][0]["field"], "path");
    Ok(())
}

#[tokio::test]
async fn market_routes_wrap_their_payloads() -> Result<()> {
    let (state, quotes) = setup()?;
    let app = app_router(state);

    let (status, body) = call(&app, "GET", "/stocks?type=day_gainers", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["stocks"].as_array().is_some_and(|s| !s.is_empty()));

    let (status, body) = call(&app, "GET", "/stocks/search?query=apple", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["symbol"], "AAPL");

    let (status, body) = call(&app, "GET", "/stocks/jpm", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stock"]["name"], "JPMorgan Chase");

    let (status, _) = call(&app, "GET", "/stocks?type=penny_stocks", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    quotes.down.store(true, Ordering::SeqCst);
    let (status, body) = call(&app, "GET", "/stocks/MSFT", None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Unable to fetch stocks. Please try again later");
    Ok(())
}

#[tokio::test]
async fn unknown_routes_and_users_are_not_found() -> Result<()> {
    let (state, _) = setup()?;
    let app = app_router(state);

    let (status, body) = call(&app, "GET", "/nowhere", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route /nowhere not found");

    let (status, body) = call(&app, "GET", "/users/99", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
    Ok(())
}
