//! Campus Server
//!
//! REST API and WebSocket gateway for the school administration: reference
//! data, students and their wallets, tuition, withdrawals and section clerks.
//!
//! Uses SQLite (embedded) for storage and an in-memory read-through cache.

mod config;
mod extractors;
mod handlers;
mod services;
mod state;
mod storage;

use anyhow::{Context, Result};
use axum::{http::Method, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use services::{mailer, payment};
pub use state::AppState;
use storage::Database;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[PANIC] at {:?}: {}", location, payload);
        tracing::error!("PANIC at {:?}: {}", location, payload);
    }));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting Campus Server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    info!(
        "Config loaded: bind={}, db={}, environment={}",
        config.server.bind_address, config.database.path, config.environment
    );

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create data directory {}", parent.display())
            })?;
        }
    }

    let db = Arc::new(
        Database::new(&config.database.path)
            .await
            .context("Failed to initialize database")?,
    );
    info!("SQLite database initialized at: {}", config.database.path);

    let mailer = mailer::from_config(&config.mail);
    let gateway = payment::from_config(&config.payment);
    let addr: SocketAddr = config
        .server
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;

    let state = AppState::new(config, db, mailer, gateway);
    spawn_cleanup(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app(state))
        .await
        .context("Server error")?;

    Ok(())
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(handlers::ws::handler))
        .nest("/api", api_routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/annees", handlers::annees::routes())
        .nest("/agents", handlers::agents::routes())
        .nest("/sections", handlers::sections::routes())
        .nest("/promotions", handlers::promotions::routes())
        .nest("/matieres", handlers::matieres::routes())
        .nest("/etudiants", handlers::etudiants::routes())
        .nest("/minervals", handlers::minervals::routes())
        .nest("/retraits", handlers::retraits::routes())
        .nest("/appariteurs", handlers::appariteurs::routes())
}

/// Periodically drops expired login codes and unbinds idle sessions.
fn spawn_cleanup(state: AppState) {
    let every = Duration::from_secs(state.config.auth.cleanup_interval_secs.max(1));
    let max_idle = Duration::from_secs(state.config.auth.session_idle_hours * 3600);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let otps = state.auth.purge_expired_otps();
            let sessions = state.connections.prune_idle(max_idle).await;
            if otps > 0 || sessions > 0 {
                info!(
                    "Cleanup: {} expired code(s), {} idle session(s)",
                    otps, sessions
                );
            } else {
                debug!("Cleanup: nothing to do");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::call;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health() {
        let app = app(AppState::for_tests().await);
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = app(AppState::for_tests().await);
        let (status, _) = call(&app, "GET", "/api/jurys", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
