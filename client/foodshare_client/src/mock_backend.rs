//! Test doubles: an in-process FoodShare backend served over HTTP, a
//! scripted [`DonationApi`] and recording [`ActionEffects`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use foodshare_lifecycle::envelope::Page;
use foodshare_lifecycle::{
    Claim, ClaimId, ClaimStatus, Donation, DonationId, DonationStatus, NewDonation, PickupCode,
    UserId,
};
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::actions::ActionEffects;
use crate::api::{ApiResult, ClaimReceipt, DeliveryReceipt, DonationApi, IdempotencyKey};
use crate::errors::ApiError;
use crate::notifications::NewNotification;

pub const GOOD_CODE: &str = "042318";
pub const EXPIRED_TOKEN: &str = "expired";

// ─────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────

pub fn donation_json(id: u64, status: &str, claim: Option<Value>) -> Value {
    json!({
        "id": id,
        "title": "Bread rolls",
        "description": "Two crates from this morning's bake",
        "food_type": "bakery",
        "quantity": "2 crates",
        "expiry_time": "2024-03-01T20:00:00Z",
        "pickup_address": "12 Mill Lane",
        "latitude": 51.5,
        "longitude": -0.12,
        "status": status,
        "donor_id": 1,
        "claim": claim,
        "created_at": "2024-03-01T08:00:00Z"
    })
}

pub fn claim_json(id: u64, donation: u64, status: &str) -> Value {
    json!({
        "id": id,
        "donation_id": donation,
        "volunteer_id": 4,
        "status": status,
        "created_at": "2024-03-01T09:15:00Z",
        "picked_up_at": if status == "picked_up" || status == "delivered" {
            Value::from("2024-03-01T10:40:00Z")
        } else {
            Value::Null
        },
        "delivered_at": if status == "delivered" {
            Value::from("2024-03-01T11:05:00Z")
        } else {
            Value::Null
        }
    })
}

pub fn donation(id: u64, status: &str) -> Donation {
    Donation {
        id: DonationId(id),
        title: "Bread rolls".to_string(),
        description: String::new(),
        food_type: "bakery".to_string(),
        quantity: "2 crates".to_string(),
        expiry_time: Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap(),
        pickup_address: "12 Mill Lane".to_string(),
        latitude: None,
        longitude: None,
        status: DonationStatus::parse(status),
        donor_id: Some(UserId(1)),
        donor: None,
        claim: None,
        created_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()),
    }
}

pub fn claim(id: u64, donation: u64, status: &str) -> Claim {
    Claim {
        id: ClaimId(id),
        donation_id: DonationId(donation),
        volunteer_id: UserId(4),
        status: ClaimStatus::parse(status),
        created_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap()),
        picked_up_at: None,
        delivered_at: None,
        notes: None,
        volunteer: None,
    }
}

pub fn receipt(donation: u64, code: &str) -> ClaimReceipt {
    ClaimReceipt {
        donation_id: DonationId(donation),
        pickup_code: PickupCode::parse(code).unwrap(),
        synthesized: false,
        claim: Some(claim(30, donation, "active")),
    }
}

pub fn conflict() -> ApiError {
    ApiError::Conflict {
        message: "This donation has already been claimed.".to_string(),
    }
}

// ─────────────────────────────────────────────────────────
// HTTP backend
// ─────────────────────────────────────────────────────────

/// Behaviour switches and request log of the in-process backend.
#[derive(Default)]
pub struct Backend {
    /// Set by the first successful claim; later claims get 409.
    pub claimed: AtomicBool,
    /// Leave `pickup_code` out of claim receipts.
    pub omit_pickup_code: AtomicBool,
    /// Serve `/donations/mine` with a single `data` level.
    pub flat_list: AtomicBool,
    /// Accept the next claim but answer 504, as if the response were lost.
    pub drop_claim_response: AtomicBool,
    /// Idempotency key of the accepted claim; a repeat replays its receipt.
    pub claim_key: Mutex<Option<String>>,
    pub idempotency_keys: Mutex<Vec<String>>,
    pub authorizations: Mutex<Vec<Option<String>>>,
}

type Shared = Arc<Backend>;

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "message": message, "status": status.as_u16() })),
    )
        .into_response()
}

impl Backend {
    /// Log the request headers; refuse the expired token.
    fn admit(&self, headers: &HeaderMap) -> Result<(), Response> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(key) = headers.get("idempotency-key").and_then(|v| v.to_str().ok()) {
            self.idempotency_keys.lock().unwrap().push(key.to_string());
        }
        let expired = auth.as_deref() == Some(format!("Bearer {EXPIRED_TOKEN}").as_str());
        self.authorizations.lock().unwrap().push(auth);
        if expired {
            return Err(error(StatusCode::UNAUTHORIZED, "Unauthenticated."));
        }
        Ok(())
    }
}

async fn login() -> Json<Value> {
    Json(json!({
        "data": {
            "token": "tok-123",
            "user": { "id": 4, "name": "Sam", "email": "sam@example.org", "role": "volunteer" }
        }
    }))
}

async fn me(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(r) = backend.admit(&headers) {
        return r;
    }
    Json(json!({
        "data": { "id": 4, "name": "Sam", "email": "sam@example.org", "role": "volunteer", "impact_score": 12 }
    }))
    .into_response()
}

async fn mine(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(r) = backend.admit(&headers) {
        return r;
    }
    let items = json!([
        donation_json(7, "claimed", Some(claim_json(30, 7, "active"))),
        donation_json(8, "pending", None),
    ]);
    if backend.flat_list.load(Ordering::SeqCst) {
        return Json(json!({ "data": items })).into_response();
    }
    Json(json!({
        "data": { "data": items, "current_page": 1, "last_page": 2, "per_page": 2, "total": 3 }
    }))
    .into_response()
}

async fn browse(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(r) = backend.admit(&headers) {
        return r;
    }
    Json(json!({
        "data": {
            "data": [donation_json(8, "available", None)],
            "current_page": 1,
            "last_page": 3
        }
    }))
    .into_response()
}

async fn create(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(r) = backend.admit(&headers) {
        return r;
    }
    let mut created = donation_json(11, "pending", None);
    created["title"] = body["title"].clone();
    (StatusCode::CREATED, Json(json!({ "data": created }))).into_response()
}

async fn logout() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn show(State(backend): State<Shared>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if let Err(r) = backend.admit(&headers) {
        return r;
    }
    if id != 7 {
        return error(StatusCode::NOT_FOUND, "Donation not found.");
    }
    Json(json!({ "data": donation_json(7, "pending", None) })).into_response()
}

async fn claim_donation(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    if let Err(r) = backend.admit(&headers) {
        return r;
    }
    let key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let replay = key.is_some() && *backend.claim_key.lock().unwrap() == key;
    if !replay {
        if backend.claimed.swap(true, Ordering::SeqCst) {
            return error(StatusCode::CONFLICT, "This donation has already been claimed.");
        }
        *backend.claim_key.lock().unwrap() = key;
        if backend.drop_claim_response.swap(false, Ordering::SeqCst) {
            return error(StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout");
        }
    }
    let claim = claim_json(30, id, "active");
    if backend.omit_pickup_code.load(Ordering::SeqCst) {
        return Json(json!({ "data": { "claim": claim } })).into_response();
    }
    Json(json!({ "data": { "pickup_code": GOOD_CODE, "claim": claim } })).into_response()
}

async fn verify_pickup(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(r) = backend.admit(&headers) {
        return r;
    }
    if body["code"] != GOOD_CODE {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "Invalid pickup code.",
                "errors": { "code": ["Invalid pickup code."] },
                "status": 422
            })),
        )
            .into_response();
    }
    Json(json!({ "data": claim_json(id, 7, "picked_up") })).into_response()
}

async fn cancel(State(backend): State<Shared>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if let Err(r) = backend.admit(&headers) {
        return r;
    }
    if id != 30 {
        return error(StatusCode::FORBIDDEN, "You can only cancel your own claims.");
    }
    backend.claimed.store(false, Ordering::SeqCst);
    Json(json!({ "data": claim_json(id, 7, "cancelled") })).into_response()
}

async fn deliver(State(backend): State<Shared>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if let Err(r) = backend.admit(&headers) {
        return r;
    }
    Json(json!({
        "data": { "claim": claim_json(id, 7, "delivered"), "impact_score": 42 }
    }))
    .into_response()
}

pub fn backend_router(backend: Shared) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/donations", get(browse).post(create))
        .route("/donations/mine", get(mine))
        .route("/donations/:id", get(show))
        .route("/donations/:id/claim", post(claim_donation))
        .route("/claims/:id/cancel", post(cancel))
        .route("/claims/:id/pickup", post(verify_pickup))
        .route("/claims/:id/deliver", post(deliver))
        .with_state(backend)
}

/// Serve `backend` on an ephemeral port and return its base URL.
pub async fn spawn_backend(backend: Shared) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, backend_router(backend)).await.unwrap();
    });
    format!("http://{addr}")
}

// ─────────────────────────────────────────────────────────
// Scripted API
// ─────────────────────────────────────────────────────────

/// Answers each write from a queue; an empty queue is a 500.
#[derive(Default)]
pub struct ScriptedApi {
    pub mine: Mutex<Vec<Donation>>,
    pub claims: Mutex<VecDeque<ApiResult<ClaimReceipt>>>,
    pub claim_updates: Mutex<VecDeque<ApiResult<Claim>>>,
    pub deliveries: Mutex<VecDeque<ApiResult<DeliveryReceipt>>>,
    /// Number of writes that reached the API.
    pub calls: AtomicUsize,
    /// Idempotency key of every write, in order.
    pub keys: Mutex<Vec<IdempotencyKey>>,
    /// When set, claims wait for a permit before answering.
    pub gate: Option<Arc<Notify>>,
}

impl ScriptedApi {
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (
            Self {
                gate: Some(gate.clone()),
                ..Self::default()
            },
            gate,
        )
    }

    async fn answer<T>(
        &self,
        queue: &Mutex<VecDeque<ApiResult<T>>>,
        key: IdempotencyKey,
        gate: Option<&Notify>,
    ) -> ApiResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(key);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        queue.lock().unwrap().pop_front().unwrap_or(Err(ApiError::Server {
            status: 500,
            message: "unscripted call".to_string(),
        }))
    }
}

#[async_trait]
impl DonationApi for ScriptedApi {
    async fn browse_donations(&self, _page: u32) -> ApiResult<Page<Donation>> {
        Ok(Page {
            data: self.mine.lock().unwrap().clone(),
            current_page: Some(1),
            last_page: Some(1),
            per_page: None,
            total: None,
        })
    }

    async fn my_donations(&self) -> ApiResult<Vec<Donation>> {
        Ok(self.mine.lock().unwrap().clone())
    }

    async fn donation(&self, id: DonationId) -> ApiResult<Donation> {
        self.mine
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or(ApiError::NotFound {
                message: "Donation not found.".to_string(),
            })
    }

    async fn create_donation(&self, _form: &NewDonation, _key: IdempotencyKey) -> ApiResult<Donation> {
        Err(ApiError::Forbidden {
            message: "Only donors can create donations.".to_string(),
        })
    }

    async fn claim_donation(&self, _id: DonationId, key: IdempotencyKey) -> ApiResult<ClaimReceipt> {
        self.answer(&self.claims, key, self.gate.as_deref()).await
    }

    async fn cancel_claim(&self, _id: ClaimId, key: IdempotencyKey) -> ApiResult<Claim> {
        self.answer(&self.claim_updates, key, None).await
    }

    async fn verify_pickup(
        &self,
        _id: ClaimId,
        _code: &PickupCode,
        key: IdempotencyKey,
    ) -> ApiResult<Claim> {
        self.answer(&self.claim_updates, key, None).await
    }

    async fn confirm_delivery(
        &self,
        _id: ClaimId,
        _notes: Option<&str>,
        key: IdempotencyKey,
    ) -> ApiResult<DeliveryReceipt> {
        self.answer(&self.deliveries, key, None).await
    }
}

// ─────────────────────────────────────────────────────────
// Recording effects
// ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEffects {
    pub revealed: Mutex<Vec<String>>,
    pub refreshes: Mutex<Vec<Option<DonationId>>>,
    pub notifications: Mutex<Vec<NewNotification>>,
}

impl RecordingEffects {
    pub fn refresh_count(&self) -> usize {
        self.refreshes.lock().unwrap().len()
    }

    pub fn is_untouched(&self) -> bool {
        self.revealed.lock().unwrap().is_empty()
            && self.refreshes.lock().unwrap().is_empty()
            && self.notifications.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ActionEffects for RecordingEffects {
    async fn reveal_pickup_code(&self, receipt: &ClaimReceipt) {
        self.revealed
            .lock()
            .unwrap()
            .push(receipt.pickup_code.as_str().to_string());
    }

    async fn refresh(&self, donation: Option<DonationId>) {
        self.refreshes.lock().unwrap().push(donation);
    }

    async fn notify(&self, notification: NewNotification) {
        self.notifications.lock().unwrap().push(notification);
    }
}
