//! Claim action handlers: claim, cancel, verify pickup, confirm delivery.
//!
//! Each handler issues exactly one write and classifies the result:
//!
//! | Result | Outcome                         | Side effects                  |
//! |--------|---------------------------------|-------------------------------|
//! | 2xx    | `Success`                       | dialog / refresh + notify     |
//! | 409    | `Rejected(Conflict)`            | one refresh, nothing else     |
//! | 403    | `Rejected(Forbidden)`           | none                          |
//! | 404    | `Rejected(NotFound)`            | none                          |
//! | 422    | `Rejected(Validation)`          | none                          |
//! | other  | `Rejected(Failure)`             | none                          |
//!
//! "At most one claimant" is the backend's job. Locally we only refuse a
//! second submission of the same action on the same donation or claim while
//! one is in flight, and drop the result if the owning view was torn down
//! before it arrived.
//!
//! An action whose outcome is unknown (no response, 5xx, unreadable body,
//! or abandoned mid-flight) keeps its idempotency key; the next submission for that target re-sends
//! it so the backend can recognise the repeat. Any definitive answer
//! retires the key.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use foodshare_lifecycle::envelope::FieldMessages;
use foodshare_lifecycle::{Claim, ClaimId, DonationId, PickupCode};
use serde::Serialize;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiResult, ClaimReceipt, DeliveryReceipt, DonationApi, IdempotencyKey};
use crate::errors::ApiError;
use crate::notifications::{NewNotification, NotificationKind};

// ─────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub body: String,
}

impl Toast {
    fn new(level: ToastLevel, title: &str, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.to_string(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Conflict,
    Forbidden,
    NotFound,
    Validation(FieldMessages),
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Conflict,
    Forbidden,
    NotFound,
    Validation,
    Failure,
    Busy,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome<T> {
    Success { value: T, toast: Toast },
    Rejected { rejection: Rejection, toast: Toast },
    /// Another submission from this handler is still in flight; nothing sent.
    Busy,
    /// The caller's view went away before the response arrived.
    Abandoned,
}

impl<T> ActionOutcome<T> {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success { .. } => OutcomeKind::Success,
            Self::Rejected { rejection, .. } => match rejection {
                Rejection::Conflict => OutcomeKind::Conflict,
                Rejection::Forbidden => OutcomeKind::Forbidden,
                Rejection::NotFound => OutcomeKind::NotFound,
                Rejection::Validation(_) => OutcomeKind::Validation,
                Rejection::Failure => OutcomeKind::Failure,
            },
            Self::Busy => OutcomeKind::Busy,
            Self::Abandoned => OutcomeKind::Abandoned,
        }
    }

    pub fn toast(&self) -> Option<&Toast> {
        match self {
            Self::Success { toast, .. } | Self::Rejected { toast, .. } => Some(toast),
            Self::Busy | Self::Abandoned => None,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value, .. } => Some(value),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Side effects
// ─────────────────────────────────────────────────────────

/// What a successful (or conflicting) action does to the rest of the client.
#[async_trait]
pub trait ActionEffects: Send + Sync {
    /// Show the pickup code dialog after a successful claim.
    async fn reveal_pickup_code(&self, receipt: &ClaimReceipt);
    /// Re-fetch local view state.
    async fn refresh(&self, donation: Option<DonationId>);
    /// Enqueue a local notification.
    async fn notify(&self, notification: NewNotification);
}

/// Effects for the tracker process: notifications go to the state store,
/// refreshes wake the tracker loop.
pub struct StoreEffects {
    pool: sqlx::SqlitePool,
    refresh: Arc<Notify>,
}

impl StoreEffects {
    pub fn new(pool: sqlx::SqlitePool, refresh: Arc<Notify>) -> Self {
        Self { pool, refresh }
    }
}

#[async_trait]
impl ActionEffects for StoreEffects {
    async fn reveal_pickup_code(&self, receipt: &ClaimReceipt) {
        info!(
            donation = %receipt.donation_id,
            synthesized = receipt.synthesized,
            "Pickup code ready"
        );
    }

    async fn refresh(&self, donation: Option<DonationId>) {
        debug!(?donation, "Refresh requested");
        self.refresh.notify_one();
    }

    async fn notify(&self, notification: NewNotification) {
        if let Err(e) = crate::db::enqueue_notification(&self.pool, &notification).await {
            warn!("Failed to store notification: {e}");
        }
    }
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Claim,
    Cancel,
    VerifyPickup,
    ConfirmDelivery,
}

/// Title and body for a rejected action.
fn rejection_copy(action: ActionKind, rejection: &Rejection) -> (&'static str, &'static str) {
    use ActionKind as K;
    match (action, rejection) {
        (K::Claim, Rejection::Conflict) => (
            "Already Claimed",
            "Another volunteer claimed this donation first.",
        ),
        (K::Claim, Rejection::Forbidden) => ("Not Allowed", "Only volunteers can claim donations."),
        (K::Claim, Rejection::NotFound) => ("Not Found", "This donation is no longer available."),
        (K::Claim, Rejection::Validation(_)) => ("Cannot Claim", "This donation cannot be claimed."),
        (K::Claim, Rejection::Failure) => ("Claim Failed", "Could not claim donation. Please try again."),

        (K::Cancel, Rejection::Conflict) => ("Cannot Cancel", "This claim can no longer be cancelled."),
        (K::Cancel, Rejection::Forbidden) => ("Not Allowed", "You can only cancel your own claims."),
        (K::Cancel, Rejection::NotFound) => ("Not Found", "This claim no longer exists."),
        (K::Cancel, Rejection::Validation(_)) => ("Cannot Cancel", "This claim cannot be cancelled."),
        (K::Cancel, Rejection::Failure) => ("Cancel Failed", "Could not cancel claim. Please try again."),

        (K::VerifyPickup, Rejection::Conflict) => (
            "Pickup Not Allowed",
            "This claim is not waiting for pickup.",
        ),
        (K::VerifyPickup, Rejection::Forbidden) => (
            "Not Allowed",
            "Only the donor can verify this pickup.",
        ),
        (K::VerifyPickup, Rejection::NotFound) => ("Not Found", "This claim no longer exists."),
        (K::VerifyPickup, Rejection::Validation(_)) => ("Invalid Code", "The pickup code is incorrect."),
        (K::VerifyPickup, Rejection::Failure) => (
            "Verification Failed",
            "Could not verify pickup. Please try again.",
        ),

        (K::ConfirmDelivery, Rejection::Conflict) => (
            "Cannot Confirm",
            "This donation has not been picked up yet.",
        ),
        (K::ConfirmDelivery, Rejection::Forbidden) => (
            "Not Allowed",
            "Only the assigned volunteer can confirm delivery.",
        ),
        (K::ConfirmDelivery, Rejection::NotFound) => ("Not Found", "This claim no longer exists."),
        (K::ConfirmDelivery, Rejection::Validation(_)) => (
            "Cannot Confirm",
            "Please check the delivery details.",
        ),
        (K::ConfirmDelivery, Rejection::Failure) => (
            "Confirmation Failed",
            "Could not confirm delivery. Please try again.",
        ),
    }
}

/// An action against one donation or claim id.
type Target = (ActionKind, u64);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases its target on drop.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<Target>>,
    target: Target,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.set).remove(&self.target);
    }
}

pub struct ClaimActions<A: ?Sized, E: ?Sized> {
    api: Arc<A>,
    effects: Arc<E>,
    in_flight: Mutex<HashSet<Target>>,
    /// Keys of actions whose outcome is still unknown.
    pending_keys: Mutex<HashMap<Target, IdempotencyKey>>,
}

impl<A, E> ClaimActions<A, E>
where
    A: DonationApi + ?Sized,
    E: ActionEffects + ?Sized,
{
    pub fn new(api: Arc<A>, effects: Arc<E>) -> Self {
        Self {
            api,
            effects,
            in_flight: Mutex::new(HashSet::new()),
            pending_keys: Mutex::new(HashMap::new()),
        }
    }

    /// Whether any action is in flight.
    pub fn is_busy(&self) -> bool {
        !lock(&self.in_flight).is_empty()
    }

    /// Whether `action` on `id` is in flight.
    pub fn is_busy_for(&self, action: ActionKind, id: u64) -> bool {
        lock(&self.in_flight).contains(&(action, id))
    }

    /// Claim `target` and pick its idempotency key, or `None` if it is
    /// already in flight.
    fn begin(&self, target: Target) -> Option<(InFlight<'_>, IdempotencyKey)> {
        if !lock(&self.in_flight).insert(target) {
            return None;
        }
        let key = *lock(&self.pending_keys).entry(target).or_default();
        Some((
            InFlight {
                set: &self.in_flight,
                target,
            },
            key,
        ))
    }

    /// Retire the key once the backend has given a definitive answer.
    fn settle_key<T>(&self, target: Target, result: &ApiResult<T>) {
        match result {
            Err(e) if e.outcome_unknown() => {
                debug!(action = ?target.0, id = target.1, "Keeping idempotency key for retry");
            }
            _ => {
                lock(&self.pending_keys).remove(&target);
            }
        }
    }

    /// Classify a failed write. A 409 triggers exactly one refresh so a
    /// losing racer sees the corrected status.
    async fn reject<T>(
        &self,
        action: ActionKind,
        donation: Option<DonationId>,
        err: ApiError,
    ) -> ActionOutcome<T> {
        let (rejection, server_message) = match err {
            ApiError::Conflict { message } => (Rejection::Conflict, Some(message)),
            ApiError::Forbidden { message } => (Rejection::Forbidden, Some(message)),
            ApiError::NotFound { message } => (Rejection::NotFound, Some(message)),
            ApiError::Validation { message, errors } => {
                (Rejection::Validation(errors), Some(message))
            }
            ApiError::Unauthenticated => {
                return ActionOutcome::Rejected {
                    rejection: Rejection::Failure,
                    toast: Toast::new(
                        ToastLevel::Error,
                        "Session Expired",
                        "Please log in again.",
                    ),
                };
            }
            ApiError::Network(e) => {
                warn!(?action, "Network error: {e}");
                return ActionOutcome::Rejected {
                    rejection: Rejection::Failure,
                    toast: Toast::new(
                        ToastLevel::Error,
                        "Network Error",
                        "Check your connection and try again.",
                    ),
                };
            }
            other => {
                warn!(?action, "Action failed: {other}");
                (Rejection::Failure, None)
            }
        };

        if rejection == Rejection::Conflict {
            self.effects.refresh(donation).await;
        }

        let (title, fallback) = rejection_copy(action, &rejection);
        // Validation bodies carry the backend's explanation; prefer it.
        let body = match (&rejection, server_message) {
            (Rejection::Validation(_), Some(m)) if !m.is_empty() => m,
            _ => fallback.to_string(),
        };
        let level = match rejection {
            Rejection::Conflict | Rejection::Validation(_) => ToastLevel::Warning,
            _ => ToastLevel::Error,
        };

        ActionOutcome::Rejected {
            rejection,
            toast: Toast::new(level, title, body),
        }
    }

    /// `POST /donations/:id/claim`.
    pub async fn claim(
        &self,
        donation: DonationId,
        cancel: &CancellationToken,
    ) -> ActionOutcome<ClaimReceipt> {
        let target = (ActionKind::Claim, donation.0);
        let Some((_guard, key)) = self.begin(target) else {
            return ActionOutcome::Busy;
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ActionOutcome::Abandoned,
            r = self.api.claim_donation(donation, key) => r,
        };
        self.settle_key(target, &result);

        match result {
            Ok(receipt) => {
                info!(donation = %donation, "Donation claimed");
                self.effects.reveal_pickup_code(&receipt).await;
                self.effects
                    .notify(NewNotification {
                        donation_id: Some(donation),
                        kind: NotificationKind::ClaimConfirmed,
                        title: "Donation claimed".to_string(),
                        body: "Show your pickup code to the donor.".to_string(),
                    })
                    .await;
                let toast = Toast::new(
                    ToastLevel::Success,
                    "Donation Claimed!",
                    format!("Your pickup code is {}.", receipt.pickup_code),
                );
                ActionOutcome::Success {
                    value: receipt,
                    toast,
                }
            }
            Err(err) => self.reject(ActionKind::Claim, Some(donation), err).await,
        }
    }

    /// `POST /claims/:id/cancel`.
    pub async fn cancel(
        &self,
        claim: ClaimId,
        donation: Option<DonationId>,
        cancel: &CancellationToken,
    ) -> ActionOutcome<Claim> {
        let target = (ActionKind::Cancel, claim.0);
        let Some((_guard, key)) = self.begin(target) else {
            return ActionOutcome::Busy;
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ActionOutcome::Abandoned,
            r = self.api.cancel_claim(claim, key) => r,
        };
        self.settle_key(target, &result);

        match result {
            Ok(updated) => {
                self.succeeded(
                    &updated,
                    NotificationKind::ClaimCancelled,
                    "Claim cancelled",
                    "The donation is available to other volunteers again.",
                )
                .await;
                ActionOutcome::Success {
                    value: updated,
                    toast: Toast::new(
                        ToastLevel::Info,
                        "Claim Cancelled",
                        "Your claim has been cancelled.",
                    ),
                }
            }
            Err(err) => self.reject(ActionKind::Cancel, donation, err).await,
        }
    }

    /// `POST /claims/:id/pickup`.
    pub async fn verify_pickup(
        &self,
        claim: ClaimId,
        donation: Option<DonationId>,
        code: &PickupCode,
        cancel: &CancellationToken,
    ) -> ActionOutcome<Claim> {
        let target = (ActionKind::VerifyPickup, claim.0);
        let Some((_guard, key)) = self.begin(target) else {
            return ActionOutcome::Busy;
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ActionOutcome::Abandoned,
            r = self.api.verify_pickup(claim, code, key) => r,
        };
        self.settle_key(target, &result);

        match result {
            Ok(updated) => {
                self.succeeded(
                    &updated,
                    NotificationKind::PickupVerified,
                    "Pickup verified",
                    "The volunteer is on the way.",
                )
                .await;
                ActionOutcome::Success {
                    value: updated,
                    toast: Toast::new(
                        ToastLevel::Success,
                        "Pickup Verified",
                        "The donation has been picked up.",
                    ),
                }
            }
            Err(err) => self.reject(ActionKind::VerifyPickup, donation, err).await,
        }
    }

    /// `POST /claims/:id/deliver`.
    pub async fn confirm_delivery(
        &self,
        claim: ClaimId,
        donation: Option<DonationId>,
        notes: Option<&str>,
        cancel: &CancellationToken,
    ) -> ActionOutcome<DeliveryReceipt> {
        let target = (ActionKind::ConfirmDelivery, claim.0);
        let Some((_guard, key)) = self.begin(target) else {
            return ActionOutcome::Busy;
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ActionOutcome::Abandoned,
            r = self.api.confirm_delivery(claim, notes, key) => r,
        };
        self.settle_key(target, &result);

        match result {
            Ok(receipt) => {
                self.succeeded(
                    &receipt.claim,
                    NotificationKind::DeliveryConfirmed,
                    "Delivery confirmed",
                    "Thank you for completing this delivery.",
                )
                .await;
                let body = match receipt.impact_score {
                    Some(score) => format!("Thank you! Your impact score is now {score}."),
                    None => "Thank you for completing this delivery.".to_string(),
                };
                ActionOutcome::Success {
                    value: receipt,
                    toast: Toast::new(ToastLevel::Success, "Delivery Confirmed", body),
                }
            }
            Err(err) => self.reject(ActionKind::ConfirmDelivery, donation, err).await,
        }
    }

    async fn succeeded(&self, claim: &Claim, kind: NotificationKind, title: &str, body: &str) {
        info!(claim = %claim.id, status = %claim.status, "Claim updated");
        self.effects.refresh(Some(claim.donation_id)).await;
        self.effects
            .notify(NewNotification {
                donation_id: Some(claim.donation_id),
                kind,
                title: title.to_string(),
                body: body.to_string(),
            })
            .await;
    }
}
