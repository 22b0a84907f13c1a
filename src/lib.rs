pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod fx;
pub mod handlers;
pub mod market;
pub mod models;
pub mod response;
pub mod routes;
pub mod state;
pub mod validation;
pub mod valuation;
pub mod yahoo;

// Re-export commonly used items
pub use config::Config;
pub use db::DatabasePool;
pub use error::{AppError, Result};
pub use models::*;
pub use state::AppState;
pub use valuation::{build_portfolio_report, PortfolioReport};
