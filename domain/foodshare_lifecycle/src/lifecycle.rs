//! # Lifecycle
//!
//! The single source of truth for "where is this donation". Computed once
//! from a [`Donation`] and its embedded [`Claim`](crate::types::Claim), then
//! consumed by the badge mapper, the timeline and the tracker.
//!
//! ```text
//! Pending ──► Claimed ──► PickedUp ──► Delivered
//!    │           │
//!    ├──► Expired◄┤
//!    └──► Cancelled◄┘
//! ```
//!
//! Expired and Cancelled are decided by the backend (time-based expiry,
//! claim cancellation) and only ever observed on the next fetch.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::{ClaimStatus, DonationStatus};
use crate::types::{ClaimId, Donation};

/// Fieldless discriminant of [`Lifecycle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Claimed,
    PickedUp,
    Delivered,
    Expired,
    Cancelled,
    Unknown,
}

impl Stage {
    /// Progress along the happy path, `None` off it.
    pub fn progress(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Claimed => Some(1),
            Self::PickedUp => Some(2),
            Self::Delivered => Some(3),
            Self::Expired | Self::Cancelled | Self::Unknown => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Expired | Self::Cancelled)
    }

    /// Forward-only transitions. Terminal stages have none.
    pub fn can_advance_to(self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Claimed)
                | (Self::Pending, Self::Expired)
                | (Self::Pending, Self::Cancelled)
                | (Self::Claimed, Self::PickedUp)
                | (Self::Claimed, Self::Expired)
                | (Self::Claimed, Self::Cancelled)
                | (Self::PickedUp, Self::Delivered)
        )
    }

    /// Stored identifier, also the status string the badge mapper accepts.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::PickedUp => "picked_up",
            Self::Delivered => "delivered",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match DonationStatus::parse(s) {
            DonationStatus::Pending => Self::Pending,
            DonationStatus::Claimed => Self::Claimed,
            DonationStatus::PickedUp => Self::PickedUp,
            DonationStatus::Delivered => Self::Delivered,
            DonationStatus::Expired => Self::Expired,
            DonationStatus::Cancelled => Self::Cancelled,
            DonationStatus::Unrecognized(_) => Self::Unknown,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combined donation + claim state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Lifecycle {
    Pending,
    Claimed {
        claim_id: Option<ClaimId>,
        since: Option<DateTime<Utc>>,
    },
    PickedUp {
        claim_id: Option<ClaimId>,
        at: Option<DateTime<Utc>>,
    },
    Delivered {
        claim_id: Option<ClaimId>,
        at: Option<DateTime<Utc>>,
    },
    Expired,
    Cancelled,
    Unknown {
        raw: String,
    },
}

impl Lifecycle {
    /// Resolve the lifecycle of a donation.
    ///
    /// A backend-decided `expired`/`cancelled` donation status always wins.
    /// Otherwise the further-along of the donation status and the embedded
    /// claim status is taken, since the claim is updated first on the
    /// backend. A cancelled claim contributes nothing.
    pub fn resolve(donation: &Donation) -> Self {
        let from_donation = match &donation.status {
            DonationStatus::Expired => return Self::Expired,
            DonationStatus::Cancelled => return Self::Cancelled,
            DonationStatus::Pending => Some(Stage::Pending),
            DonationStatus::Claimed => Some(Stage::Claimed),
            DonationStatus::PickedUp => Some(Stage::PickedUp),
            DonationStatus::Delivered => Some(Stage::Delivered),
            DonationStatus::Unrecognized(_) => None,
        };

        let claim = donation.active_claim();
        let from_claim = claim.and_then(|c| match c.status {
            ClaimStatus::Active => Some(Stage::Claimed),
            ClaimStatus::PickedUp => Some(Stage::PickedUp),
            ClaimStatus::Delivered => Some(Stage::Delivered),
            ClaimStatus::Cancelled | ClaimStatus::Unrecognized(_) => None,
        });

        let stage = match (from_donation, from_claim) {
            (Some(d), Some(c)) => {
                if c.progress() > d.progress() {
                    c
                } else {
                    d
                }
            }
            (Some(d), None) => d,
            (None, Some(c)) => c,
            (None, None) => {
                return Self::Unknown {
                    raw: donation.status.as_str().to_string(),
                }
            }
        };

        let claim_id = claim.map(|c| c.id);
        match stage {
            Stage::Pending => Self::Pending,
            Stage::Claimed => Self::Claimed {
                claim_id,
                since: claim.and_then(|c| c.created_at),
            },
            Stage::PickedUp => Self::PickedUp {
                claim_id,
                at: claim.and_then(|c| c.picked_up_at),
            },
            Stage::Delivered => Self::Delivered {
                claim_id,
                at: claim.and_then(|c| c.delivered_at),
            },
            Stage::Expired => Self::Expired,
            Stage::Cancelled => Self::Cancelled,
            Stage::Unknown => Self::Unknown {
                raw: donation.status.as_str().to_string(),
            },
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Pending => Stage::Pending,
            Self::Claimed { .. } => Stage::Claimed,
            Self::PickedUp { .. } => Stage::PickedUp,
            Self::Delivered { .. } => Stage::Delivered,
            Self::Expired => Stage::Expired,
            Self::Cancelled => Stage::Cancelled,
            Self::Unknown { .. } => Stage::Unknown,
        }
    }

    pub fn claim_id(&self) -> Option<ClaimId> {
        match self {
            Self::Claimed { claim_id, .. }
            | Self::PickedUp { claim_id, .. }
            | Self::Delivered { claim_id, .. } => *claim_id,
            _ => None,
        }
    }
}

/// A user action that moves a donation forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Claim,
    CancelClaim,
    VerifyPickup,
    ConfirmDelivery,
}

impl LifecycleAction {
    pub fn target(self) -> Stage {
        match self {
            Self::Claim => Stage::Claimed,
            Self::CancelClaim => Stage::Cancelled,
            Self::VerifyPickup => Stage::PickedUp,
            Self::ConfirmDelivery => Stage::Delivered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action:?} a donation that is {from}")]
pub struct TransitionError {
    pub from: Stage,
    pub action: LifecycleAction,
}

impl Donation {
    /// Optimistically apply `action` to this local copy. The backend stays
    /// authoritative; the next fetch overwrites whatever is set here.
    pub fn apply(&mut self, action: LifecycleAction, at: DateTime<Utc>) -> Result<Stage, TransitionError> {
        let from = Lifecycle::resolve(self).stage();
        let to = action.target();
        if !from.can_advance_to(to) {
            return Err(TransitionError { from, action });
        }

        match action {
            LifecycleAction::Claim => self.status = DonationStatus::Claimed,
            LifecycleAction::CancelClaim => {
                self.status = DonationStatus::Cancelled;
                if let Some(claim) = self.claim.as_mut() {
                    claim.status = ClaimStatus::Cancelled;
                }
            }
            LifecycleAction::VerifyPickup => {
                self.status = DonationStatus::PickedUp;
                if let Some(claim) = self.claim.as_mut() {
                    claim.status = ClaimStatus::PickedUp;
                    claim.picked_up_at = Some(at);
                }
            }
            LifecycleAction::ConfirmDelivery => {
                self.status = DonationStatus::Delivered;
                if let Some(claim) = self.claim.as_mut() {
                    claim.status = ClaimStatus::Delivered;
                    claim.delivered_at = Some(at);
                }
            }
        }
        Ok(to)
    }
}
