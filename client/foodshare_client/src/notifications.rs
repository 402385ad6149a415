//! Local notifications raised by claim actions and by the tracker.

use foodshare_lifecycle::{DonationId, Stage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// This client claimed a donation.
    ClaimConfirmed,
    /// This client cancelled its claim.
    ClaimCancelled,
    /// Pickup code accepted.
    PickupVerified,
    /// Delivery confirmed by this client.
    DeliveryConfirmed,
    /// The tracker observed a stage change made elsewhere.
    StageChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClaimConfirmed => "claim_confirmed",
            Self::ClaimCancelled => "claim_cancelled",
            Self::PickupVerified => "pickup_verified",
            Self::DeliveryConfirmed => "delivery_confirmed",
            Self::StageChanged => "stage_changed",
        }
    }
}

/// A notification waiting to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub donation_id: Option<DonationId>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

impl NewNotification {
    /// Message for a transition observed on fetch.
    pub fn stage_changed(donation_id: DonationId, title: &str, to: Stage) -> Self {
        let headline = match to {
            Stage::Pending => "Donation available again",
            Stage::Claimed => "Donation claimed",
            Stage::PickedUp => "Donation picked up",
            Stage::Delivered => "Donation delivered",
            Stage::Expired => "Donation expired",
            Stage::Cancelled => "Donation cancelled",
            Stage::Unknown => "Donation status changed",
        };
        Self {
            donation_id: Some(donation_id),
            kind: NotificationKind::StageChanged,
            title: headline.to_string(),
            body: format!("\"{title}\" is now {}.", to.as_str().replace('_', " ")),
        }
    }
}

/// A stored notification as read back from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub donation_id: Option<i64>,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: i64,
}
