//! HTTP surface: thin axum adapters over the operations in [`crate::handlers`].
//!
//! Every body is an [`ApiResponse`] envelope; failures carry the status from
//! [`AppError::status_code`].

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, FieldError};
use crate::handlers::{portfolio, stocks, users};
use crate::models::{NewHolding, NewUser, ProfileUpdate};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::valuation::PortfolioReport;

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

fn respond<T: Serialize>(status: StatusCode, data: T) -> ApiResult<T> {
    Ok((status, Json(ApiResponse::success(data))))
}

fn bad_input(field: &str, message: String) -> AppError {
    AppError::Validation(vec![FieldError {
        field: field.to_string(),
        message,
    }])
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| bad_input("body", rejection.body_text()))
}

fn path<T>(param: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    param
        .map(|Path(value)| value)
        .map_err(|rejection| bad_input("path", rejection.body_text()))
}

#[derive(Debug, Deserialize)]
pub struct StocksQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

/// Builds the application routes over `state`.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        // User routes
        .route("/users", post(create_user))
        .route(
            "/users/:user_id",
            get(get_profile).patch(update_profile).delete(delete_profile),
        )
        // Holding routes
        .route(
            "/users/:user_id/stocks",
            get(get_my_stocks).post(create_my_stock),
        )
        .route("/users/:user_id/stocks/:stock_id", delete(delete_my_stock))
        // Market data routes
        .route("/stocks", get(get_dashboard_stocks))
        .route("/stocks/search", get(search_stocks))
        .route("/stocks/:stock_code", get(get_stock_info))
        .fallback(route_not_found)
        .with_state(state)
}

async fn route_not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Route {} not found", uri.path()))
}

async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<Value> {
    let user = users::create_user(&state, body(payload)?).await?;
    respond(StatusCode::CREATED, json!({ "user": user }))
}

async fn get_profile(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Value> {
    let user = users::get_profile(&state, path(user_id)?).await?;
    respond(StatusCode::OK, json!({ "user": user }))
}

async fn update_profile(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<Value> {
    let user = users::update_profile(&state, path(user_id)?, body(payload)?).await?;
    respond(StatusCode::OK, json!({ "user": user }))
}

async fn delete_profile(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Value> {
    users::delete_profile(&state, path(user_id)?).await?;
    respond(StatusCode::OK, json!({}))
}

async fn get_my_stocks(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<PortfolioReport> {
    let report = portfolio::get_my_stocks(&state, path(user_id)?).await?;
    respond(StatusCode::OK, report)
}

async fn create_my_stock(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<NewHolding>, JsonRejection>,
) -> ApiResult<Value> {
    let stock = portfolio::create_my_stock(&state, path(user_id)?, body(payload)?).await?;
    respond(StatusCode::CREATED, json!({ "stock": stock }))
}

async fn delete_my_stock(
    State(state): State<AppState>,
    ids: Result<Path<(i64, i64)>, PathRejection>,
) -> ApiResult<Value> {
    let (user_id, stock_id) = path(ids)?;
    portfolio::delete_my_stock(&state, user_id, stock_id).await?;
    respond(StatusCode::OK, json!({}))
}

async fn get_dashboard_stocks(
    State(state): State<AppState>,
    Query(params): Query<StocksQuery>,
) -> ApiResult<Value> {
    let stocks = stocks::get_dashboard_stocks(&state, params.kind.as_deref()).await?;
    respond(StatusCode::OK, json!({ "stocks": stocks }))
}

async fn search_stocks(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Value> {
    let query = params.query.unwrap_or_default();
    let found = stocks::search_stocks(&state, &query).await?;
    respond(StatusCode::OK, json!(found))
}

async fn get_stock_info(
    State(state): State<AppState>,
    Path(stock_code): Path<String>,
) -> ApiResult<Value> {
    let stock = stocks::get_stock_info(&state, &stock_code).await?;
    respond(StatusCode::OK, json!({ "stock": stock }))
}
