//! Long-running background task that re-fetches the signed-in user's
//! donations and reports lifecycle changes made elsewhere (claims by other
//! volunteers, backend expiry, cancellations).

use std::sync::Arc;
use std::time::Duration;

use foodshare_lifecycle::{Donation, DonationId, Lifecycle, Stage};
use sqlx::SqlitePool;
use tokio::sync::{Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::DonationApi;
use crate::db;
use crate::errors::{ApiError, ClientError, Result};
use crate::notifications::NewNotification;

pub struct TrackerState {
    pub pool: SqlitePool,
    pub api: Arc<dyn DonationApi>,
    pub poll_interval: Duration,
    /// Latest fetched donations, served by the local API.
    pub snapshot: RwLock<Vec<Donation>>,
    /// Wakes the loop early (e.g. after a 409 on a claim).
    pub refresh: Arc<Notify>,
}

impl TrackerState {
    pub fn new(
        pool: SqlitePool,
        api: Arc<dyn DonationApi>,
        poll_interval: Duration,
        refresh: Arc<Notify>,
    ) -> Self {
        Self {
            pool,
            api,
            poll_interval,
            snapshot: RwLock::new(Vec::new()),
            refresh,
        }
    }
}

/// A stage change observed between two fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub donation_id: DonationId,
    pub from: Stage,
    pub to: Stage,
}

/// Run the poll loop until `cancel` fires.
pub async fn run(state: Arc<TrackerState>, cancel: CancellationToken) {
    info!(
        "Tracker starting: polling every {}s",
        state.poll_interval.as_secs()
    );

    loop {
        match poll_once(&state).await {
            Ok(transitions) if !transitions.is_empty() => {
                info!("Observed {} lifecycle change(s)", transitions.len());
            }
            Ok(_) => {}
            Err(ClientError::Api(ApiError::Unauthenticated)) => {
                error!("Tracker poll rejected: login required");
            }
            Err(e) => {
                error!("Tracker poll error: {e}");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = state.refresh.notified() => {}
            _ = tokio::time::sleep(state.poll_interval) => {}
        }
    }

    info!("Tracker stopped");
}

/// Perform a single poll iteration.
///
/// The first sighting of a donation only records its stage; later changes
/// are logged, stored and announced as local notifications.
pub async fn poll_once(state: &TrackerState) -> Result<Vec<Transition>> {
    let donations = state.api.my_donations().await?;
    let mut transitions = Vec::new();

    for donation in &donations {
        let to = Lifecycle::resolve(donation).stage();
        let previous = db::get_tracked_stage(&state.pool, donation.id).await?;

        match previous {
            Some(from) if from == to => continue,
            Some(from) => {
                if !from.can_advance_to(to) {
                    warn!(
                        donation = %donation.id,
                        "Backend reported out-of-order transition {from} -> {to}"
                    );
                }
                info!(donation = %donation.id, "{from} -> {to}");
                db::enqueue_notification(
                    &state.pool,
                    &NewNotification::stage_changed(donation.id, &donation.title, to),
                )
                .await?;
                transitions.push(Transition {
                    donation_id: donation.id,
                    from,
                    to,
                });
            }
            None => {}
        }

        db::save_tracked_stage(&state.pool, donation.id, to).await?;
    }

    *state.snapshot.write().await = donations;
    Ok(transitions)
}
