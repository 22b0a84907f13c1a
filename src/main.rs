use std::process::ExitCode;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use portfolio_tracker::routes::app_router;
use portfolio_tracker::{AppError, AppState, Config};
use tower_http::cors::CorsLayer;
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "portfolio-tracker",
    version,
    about = "Track stock holdings and value them in your local currency"
)]
struct Cli {
    /// One of debug, info, warn, error
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Address to listen on, overrides BIND_ADDR
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set the log level based on the flag
    let log_level = match cli.log_level.as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .with_max_level(log_level)
        .init();

    tracing::info!("Log level set to: {}", log_level);

    match serve(cli.bind).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve(bind: Option<String>) -> Result<(), AppError> {
    let mut config = Config::from_env()?;
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }

    // Initialize CORS layer
    let origin = config
        .frontend_url
        .parse::<HeaderValue>()
        .map_err(|e| AppError::Config(format!("FRONTEND_URL: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(vec![CONTENT_TYPE]);

    let bind_addr = config.bind_addr.clone();
    let state = AppState::from_config(config)?;

    // Build application with routes
    let app = app_router(state).layer(cors).layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    );

    // Run server
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Config(format!("cannot bind {}: {}", bind_addr, e)))?;
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening on: {}", addr);
    }

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Config(format!("server stopped: {}", e)))
}
