use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use routine::{
    config::AppState,
    routes::{api_routes, docs_routes, middleware::configure_middleware},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn handler_404() -> Response {
    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}

#[tokio::main]
async fn main() {
    // Setup formatting and environment for trace
    let fmt_layer = fmt::layer().with_file(true).with_line_number(true).pretty();
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    dotenvy::dotenv().ok();

    let app_state = match AppState::new().await {
        Ok(state) => Arc::new(RwLock::new(state)),
        Err(e) => {
            error!("Could not set up the database: {}", e);
            std::process::exit(1);
        }
    };

    let app = Router::new()
        .nest("/api/v1", api_routes::get_routes())
        .merge(docs_routes::get_routes())
        .fallback(handler_404)
        .with_state(app_state);
    let app = configure_middleware(app);

    let addr = std::env::var("ROUTINE_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let ip: SocketAddr = match addr.parse() {
        Ok(ip) => ip,
        Err(e) => {
            error!("Bad ROUTINE_ADDR {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(ip).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Could not bind {}: {}", ip, e);
            std::process::exit(1);
        }
    };
    info!("serving {}", ip);
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server stopped: {}", e);
    }
}
