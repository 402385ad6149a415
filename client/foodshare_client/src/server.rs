//! Axum REST API serving derived display state to a local UI shell.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use foodshare_lifecycle::{
    ClaimId, Countdown, Donation, DonationId, Lifecycle, PickupCode, StatusBadge, Timeline,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::actions::{ActionOutcome, ClaimActions, OutcomeKind, StoreEffects, Toast};
use crate::api::DonationApi;
use crate::db;
use crate::tracker::TrackerState;

pub type LocalActions = ClaimActions<dyn DonationApi, StoreEffects>;

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
    pub tracker: Arc<TrackerState>,
    pub actions: Arc<LocalActions>,
    pub critical_threshold: chrono::Duration,
    /// Cancelled on shutdown; in-flight actions are abandoned.
    pub shutdown: CancellationToken,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/donations", get(get_donations))
        .route("/donations/:id/timeline", get(get_timeline))
        .route("/notifications", get(get_notifications))
        .route("/notifications/:id/read", post(mark_read))
        .route("/donations/:id/claim", post(claim_donation))
        .route("/claims/:id/cancel", post(cancel_claim))
        .route("/claims/:id/pickup", post(verify_pickup))
        .route("/claims/:id/deliver", post(confirm_delivery))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

/// A donation with everything a card needs to render.
#[derive(Serialize)]
pub struct DonationView {
    pub donation: Donation,
    pub lifecycle: Lifecycle,
    pub badge: StatusBadge,
    pub timeline: Timeline,
    pub countdown: Countdown,
}

impl DonationView {
    pub fn build(donation: Donation, now: DateTime<Utc>, critical: chrono::Duration) -> Self {
        let lifecycle = Lifecycle::resolve(&donation);
        Self {
            badge: lifecycle.badge(),
            timeline: Timeline::derive(&donation),
            countdown: Countdown::until(donation.expiry_time, now, critical),
            lifecycle,
            donation,
        }
    }
}

#[derive(Serialize)]
pub struct DonationsResponse {
    pub count: usize,
    pub donations: Vec<DonationView>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Result of an action forwarded to the FoodShare API.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub outcome: OutcomeKind,
    pub toast: Option<Toast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimTarget {
    #[serde(default)]
    pub donation_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PickupRequest {
    pub code: String,
    #[serde(default)]
    pub donation_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeliverRequest {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub donation_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /donations`
///
/// The tracker's latest snapshot with badge, timeline and countdown.
pub async fn get_donations(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let now = Utc::now();
    let donations: Vec<DonationView> = state
        .tracker
        .snapshot
        .read()
        .await
        .iter()
        .cloned()
        .map(|d| DonationView::build(d, now, state.critical_threshold))
        .collect();

    Json(DonationsResponse {
        count: donations.len(),
        donations,
    })
}

/// `GET /donations/:id/timeline`
pub async fn get_timeline(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let snapshot = state.tracker.snapshot.read().await;
    match snapshot.iter().find(|d| d.id.0 == id) {
        Some(donation) => (StatusCode::OK, Json(Timeline::derive(donation))).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("donation {id} is not tracked")),
    }
}

/// `GET /notifications?unread=true`
pub async fn get_notifications(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<NotificationQuery>,
) -> impl IntoResponse {
    match db::list_notifications(&state.pool, query.unread).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `POST /notifications/:id/read`
pub async fn mark_read(State(state): State<Arc<ApiState>>, Path(id): Path<i64>) -> impl IntoResponse {
    match db::mark_notification_read(&state.pool, id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, format!("notification {id} not found")),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ─────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────

fn outcome_status(kind: OutcomeKind) -> StatusCode {
    match kind {
        OutcomeKind::Success => StatusCode::OK,
        OutcomeKind::Conflict => StatusCode::CONFLICT,
        OutcomeKind::Forbidden => StatusCode::FORBIDDEN,
        OutcomeKind::NotFound => StatusCode::NOT_FOUND,
        OutcomeKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        OutcomeKind::Failure => StatusCode::BAD_GATEWAY,
        OutcomeKind::Busy => StatusCode::TOO_MANY_REQUESTS,
        OutcomeKind::Abandoned => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn action_response<T>(outcome: &ActionOutcome<T>, pickup_code: Option<String>) -> axum::response::Response {
    let kind = outcome.kind();
    (
        outcome_status(kind),
        Json(ActionResponse {
            outcome: kind,
            toast: outcome.toast().cloned(),
            pickup_code,
        }),
    )
        .into_response()
}

/// `POST /donations/:id/claim`
pub async fn claim_donation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let cancel = state.shutdown.child_token();
    let outcome = state.actions.claim(DonationId(id), &cancel).await;
    let code = outcome.value().map(|r| r.pickup_code.to_string());
    action_response(&outcome, code)
}

/// `POST /claims/:id/cancel`
pub async fn cancel_claim(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<u64>,
    body: Option<Json<ClaimTarget>>,
) -> impl IntoResponse {
    let donation = body.and_then(|Json(b)| b.donation_id).map(DonationId);
    let cancel = state.shutdown.child_token();
    let outcome = state.actions.cancel(ClaimId(id), donation, &cancel).await;
    action_response(&outcome, None)
}

/// `POST /claims/:id/pickup`
pub async fn verify_pickup(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<u64>,
    Json(body): Json<PickupRequest>,
) -> impl IntoResponse {
    let code = match PickupCode::parse(body.code.trim()) {
        Ok(code) => code,
        Err(e) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    };
    let cancel = state.shutdown.child_token();
    let outcome = state
        .actions
        .verify_pickup(ClaimId(id), body.donation_id.map(DonationId), &code, &cancel)
        .await;
    action_response(&outcome, None)
}

/// `POST /claims/:id/deliver`
pub async fn confirm_delivery(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<u64>,
    body: Option<Json<DeliverRequest>>,
) -> impl IntoResponse {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let cancel = state.shutdown.child_token();
    let outcome = state
        .actions
        .confirm_delivery(
            ClaimId(id),
            body.donation_id.map(DonationId),
            body.notes.as_deref(),
            &cancel,
        )
        .await;
    action_response(&outcome, None)
}
