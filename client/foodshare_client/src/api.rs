//! FoodShare REST client.
//!
//! ## Conventions
//!
//! * Every request carries the bearer token of the [`Session`] this client
//!   was built with; nothing reads ambient storage.
//! * Every write carries an `Idempotency-Key` chosen by the caller, one per
//!   user action, so the backend can drop duplicate submissions.
//! * A 401 clears the session before [`ApiError::Unauthenticated`] is
//!   returned. Nothing is retried automatically.

use std::fmt;

use async_trait::async_trait;
use foodshare_lifecycle::envelope::{decode_envelope, decode_page, ErrorBody, Page};
use foodshare_lifecycle::{
    Claim, ClaimId, Donation, DonationId, NewDonation, PickupCode, UserProfile,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{ApiError, Result};
use crate::session::{Persistence, SessionHandle};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

/// One per user action. [`ClaimActions`](crate::actions::ClaimActions)
/// re-sends it while the action's outcome is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(Uuid);

impl IdempotencyKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginReceipt {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct ClaimReceiptWire {
    #[serde(default)]
    pickup_code: Option<PickupCode>,
    #[serde(default)]
    claim: Option<Claim>,
}

/// Result of a successful claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimReceipt {
    pub donation_id: DonationId,
    pub pickup_code: PickupCode,
    /// The backend omitted the code and a local stand-in was used.
    pub synthesized: bool,
    pub claim: Option<Claim>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeliveryReceipt {
    pub claim: Claim,
    #[serde(default)]
    pub impact_score: Option<i64>,
}

// ─────────────────────────────────────────────────────────
// The seam used by actions and the tracker
// ─────────────────────────────────────────────────────────

#[async_trait]
pub trait DonationApi: Send + Sync {
    async fn browse_donations(&self, page: u32) -> ApiResult<Page<Donation>>;
    async fn my_donations(&self) -> ApiResult<Vec<Donation>>;
    async fn donation(&self, id: DonationId) -> ApiResult<Donation>;
    async fn create_donation(&self, form: &NewDonation, key: IdempotencyKey) -> ApiResult<Donation>;
    async fn claim_donation(&self, id: DonationId, key: IdempotencyKey) -> ApiResult<ClaimReceipt>;
    async fn cancel_claim(&self, id: ClaimId, key: IdempotencyKey) -> ApiResult<Claim>;
    async fn verify_pickup(
        &self,
        id: ClaimId,
        code: &PickupCode,
        key: IdempotencyKey,
    ) -> ApiResult<Claim>;
    async fn confirm_delivery(
        &self,
        id: ClaimId,
        notes: Option<&str>,
        key: IdempotencyKey,
    ) -> ApiResult<DeliveryReceipt>;
}

// ─────────────────────────────────────────────────────────
// HTTP implementation
// ─────────────────────────────────────────────────────────

pub struct HttpApi {
    client: Client,
    base_url: String,
    session: SessionHandle,
}

impl HttpApi {
    pub fn new(config: &Config, session: SessionHandle) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, &config.api_base_url, session))
    }

    pub fn with_client(client: Client, base_url: &str, session: SessionHandle) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Attach auth, send, and turn every non-2xx status into an [`ApiError`].
    async fn send(&self, endpoint: &str, request: RequestBuilder) -> ApiResult<Vec<u8>> {
        let token = self.session.read().await.token().map(str::to_string);
        let mut request = request.header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ApiError::Network)?;
        let status = response.status();
        let body = response.bytes().await.map_err(ApiError::Network)?.to_vec();
        debug!("{endpoint} -> {status}");

        if status.is_success() {
            return Ok(body);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("{endpoint} returned 401; clearing session");
            self.session.write().await.clear().await;
            return Err(ApiError::Unauthenticated);
        }

        let err = classify(status, parse_error_body(&body));
        if let ApiError::Server { status, message } = &err {
            error!("{endpoint} failed with {status}: {message}");
        }
        Err(err)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let endpoint = format!("GET {path}");
        let body = self.send(&endpoint, self.client.get(self.url(path))).await?;
        decode_envelope(&body).map_err(|source| ApiError::Decode { endpoint, source })
    }

    async fn get_page<T: DeserializeOwned>(&self, path: &str) -> ApiResult<Page<T>> {
        let endpoint = format!("GET {path}");
        let body = self.send(&endpoint, self.client.get(self.url(path))).await?;
        decode_page(&body).map_err(|source| ApiError::Decode { endpoint, source })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: serde_json::Value,
        key: Option<IdempotencyKey>,
    ) -> ApiResult<T> {
        let endpoint = format!("POST {path}");
        let mut request = self.client.post(self.url(path)).json(&payload);
        if let Some(key) = key {
            request = request.header(IDEMPOTENCY_HEADER, key.to_string());
        }
        let body = self.send(&endpoint, request).await?;
        decode_envelope(&body).map_err(|source| ApiError::Decode { endpoint, source })
    }

    // ─── Authentication ───────────────────────────────────

    /// `POST /auth/login`; on success the session holds the new token.
    pub async fn login(
        &self,
        credentials: &Credentials,
        persistence: Persistence,
    ) -> Result<UserProfile> {
        let receipt: LoginReceipt = self
            .post("/auth/login", json!(credentials), None)
            .await?;
        let user = receipt.user.clone();
        self.session
            .write()
            .await
            .sign_in(receipt.token, Some(receipt.user), persistence)
            .await?;
        info!(user = %user.id, "Signed in");
        Ok(user)
    }

    /// `POST /auth/logout`. The local session is cleared whatever the
    /// server says; a failed call is only logged.
    pub async fn logout(&self) {
        let endpoint = "POST /auth/logout";
        let request = self.client.post(self.url("/auth/logout"));
        if let Err(e) = self.send(endpoint, request).await {
            warn!("Logout request failed: {e}");
        }
        self.session.write().await.clear().await;
    }

    /// `GET /auth/me`, cached on the session.
    pub async fn me(&self) -> ApiResult<UserProfile> {
        let profile: UserProfile = self.get("/auth/me").await?;
        self.session.write().await.set_user(profile.clone());
        Ok(profile)
    }
}

fn parse_error_body(body: &[u8]) -> ErrorBody {
    serde_json::from_slice(body).unwrap_or_default()
}

/// Map a non-2xx status (other than 401) and its body to the error taxonomy.
pub(crate) fn classify(status: StatusCode, body: ErrorBody) -> ApiError {
    let message = if body.message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    } else {
        body.message
    };

    match status.as_u16() {
        401 => ApiError::Unauthenticated,
        403 => ApiError::Forbidden { message },
        404 => ApiError::NotFound { message },
        409 => ApiError::Conflict { message },
        422 => ApiError::Validation {
            message,
            errors: body.errors.unwrap_or_default(),
        },
        s if s >= 500 => ApiError::Server { status: s, message },
        s => ApiError::Unexpected { status: s, message },
    }
}

#[async_trait]
impl DonationApi for HttpApi {
    async fn browse_donations(&self, page: u32) -> ApiResult<Page<Donation>> {
        self.get_page(&format!("/donations?page={page}")).await
    }

    async fn my_donations(&self) -> ApiResult<Vec<Donation>> {
        let page: Page<Donation> = self.get_page("/donations/mine").await?;
        Ok(page.data)
    }

    async fn donation(&self, id: DonationId) -> ApiResult<Donation> {
        self.get(&format!("/donations/{id}")).await
    }

    async fn create_donation(&self, form: &NewDonation, key: IdempotencyKey) -> ApiResult<Donation> {
        self.post("/donations", json!(form), Some(key)).await
    }

    async fn claim_donation(&self, id: DonationId, key: IdempotencyKey) -> ApiResult<ClaimReceipt> {
        let wire: ClaimReceiptWire = self
            .post(&format!("/donations/{id}/claim"), json!({}), Some(key))
            .await?;

        let (pickup_code, synthesized) = match wire.pickup_code {
            Some(code) => (code, false),
            None => {
                warn!(donation = %id, "Claim response had no pickup code; using local stand-in");
                (PickupCode::synthesized_for(id), true)
            }
        };

        Ok(ClaimReceipt {
            donation_id: id,
            pickup_code,
            synthesized,
            claim: wire.claim,
        })
    }

    async fn cancel_claim(&self, id: ClaimId, key: IdempotencyKey) -> ApiResult<Claim> {
        self.post(&format!("/claims/{id}/cancel"), json!({}), Some(key))
            .await
    }

    async fn verify_pickup(
        &self,
        id: ClaimId,
        code: &PickupCode,
        key: IdempotencyKey,
    ) -> ApiResult<Claim> {
        self.post(
            &format!("/claims/{id}/pickup"),
            json!({ "code": code.as_str() }),
            Some(key),
        )
        .await
    }

    async fn confirm_delivery(
        &self,
        id: ClaimId,
        notes: Option<&str>,
        key: IdempotencyKey,
    ) -> ApiResult<DeliveryReceipt> {
        let payload = match notes {
            Some(notes) => json!({ "notes": notes }),
            None => json!({}),
        };
        self.post(&format!("/claims/{id}/deliver"), payload, Some(key))
            .await
    }
}
