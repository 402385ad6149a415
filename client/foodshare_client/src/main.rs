//! FoodShare tracker: entry point.
//!
//! Restores (or establishes) a session, starts a background task that
//! re-fetches the user's donations and records lifecycle changes as local
//! notifications, and exposes a small Axum REST API for a UI shell.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use foodshare_client::actions::{ClaimActions, StoreEffects};
use foodshare_client::api::{Credentials, DonationApi, HttpApi};
use foodshare_client::config::Config;
use foodshare_client::session::{Persistence, Session};
use foodshare_client::tracker::{self, TrackerState};
use foodshare_client::{db, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Local state: remembered token, notifications, tracker stages.
    let pool = db::init_pool(&config.database_url).await?;

    let session = Session::restore(pool.clone()).await?.into_handle();
    let http = Arc::new(HttpApi::new(&config, session.clone())?);

    if !session.read().await.is_authenticated() {
        match (&config.login_email, &config.login_password) {
            (Some(email), Some(password)) => {
                let persistence = if config.remember_me {
                    Persistence::Remembered
                } else {
                    Persistence::Ephemeral
                };
                let credentials = Credentials {
                    email: email.clone(),
                    password: password.clone(),
                };
                http.login(&credentials, persistence).await?;
            }
            _ => warn!("No remembered session and no FOODSHARE_EMAIL/FOODSHARE_PASSWORD; polls will fail until login"),
        }
    } else if let Err(e) = http.me().await {
        warn!("Could not load profile: {e}");
    }

    // ─── Background tracker ───────────────────────────────
    let cancel = CancellationToken::new();
    let api: Arc<dyn DonationApi> = http.clone();
    let refresh = Arc::new(Notify::new());
    let tracker_state = Arc::new(TrackerState::new(
        pool.clone(),
        api.clone(),
        Duration::from_secs(config.poll_interval_secs),
        refresh.clone(),
    ));
    let tracker_task = tokio::spawn(tracker::run(tracker_state.clone(), cancel.clone()));

    // ─── Local REST API ───────────────────────────────────
    // Successful or conflicting actions wake the tracker for a re-fetch.
    let effects = Arc::new(StoreEffects::new(pool.clone(), refresh));
    let api_state = Arc::new(server::ApiState {
        pool,
        tracker: tracker_state,
        actions: Arc::new(ClaimActions::new(api, effects)),
        critical_threshold: config.critical_threshold(),
        shutdown: cancel.clone(),
    });
    let app = server::router(api_state);

    let addr = format!("127.0.0.1:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    tracker_task.await?;
    Ok(())
}
