//! Charity fund ledger service — entry point.
//!
//! Stores charity projects and donations in SQLite, allocates every new
//! donation to waiting projects (and every new project from waiting
//! donations) in arrival order, and exposes the ledger over an Axum REST
//! API. A background auditor periodically re-checks the stored ledger.

mod api;
mod auditor;
mod auth;
mod config;
mod db;
mod dto;
mod errors;
mod funding;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use funding::Ledger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url, config.max_connections).await?;

    let shutdown = CancellationToken::new();

    // ─── Background auditor ───────────────────────────────
    if config.audit_interval_secs > 0 {
        tokio::spawn(auditor::run(
            pool.clone(),
            Duration::from_secs(config.audit_interval_secs),
            shutdown.clone(),
        ));
    } else {
        info!("Ledger auditor disabled");
    }

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState {
        ledger: Ledger::new(pool),
        tokens: auth::TokenVerifier::new(&config.secret),
        app_title: config.app_title.clone(),
    });

    let app = api::router(api_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("{} API listening on http://{addr}", config.app_title);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    Ok(())
}
