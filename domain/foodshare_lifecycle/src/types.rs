//! # Types
//!
//! Records as the FoodShare API serves them. The client only ever holds a
//! read-only, possibly stale copy; the backend owns every transition.
//!
//! ## Donation vs. Claim
//!
//! A [`Donation`] carries its own [`DonationStatus`] and, once a volunteer
//! has reserved it, an embedded [`Claim`] with a finer-grained
//! [`ClaimStatus`]. The two are reconciled into one
//! [`Lifecycle`](crate::lifecycle::Lifecycle) in exactly one place.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{ClaimStatus, DonationStatus};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Backend identifier of a donation.
    DonationId
);
id_type!(
    /// Backend identifier of a claim.
    ClaimId
);
id_type!(
    /// Backend identifier of a user (donor, volunteer or recipient).
    UserId
);

/// Geographic point for the pickup location.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Compact user reference embedded in donations and claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Donor,
    Volunteer,
    Recipient,
    Admin,
}

/// The signed-in user's profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Volunteer gamification metric, awarded on delivery. Display only.
    #[serde(default)]
    pub impact_score: Option<i64>,
}

/// A volunteer's reservation against a donation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub donation_id: DonationId,
    pub volunteer_id: UserId,
    pub status: ClaimStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub picked_up_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub volunteer: Option<UserRef>,
}

/// A food-sharing listing created by a donor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: DonationId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub food_type: String,
    pub quantity: String,
    pub expiry_time: DateTime<Utc>,
    pub pickup_address: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub status: DonationStatus,
    #[serde(default)]
    pub donor_id: Option<UserId>,
    #[serde(default)]
    pub donor: Option<UserRef>,
    #[serde(default)]
    pub claim: Option<Claim>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Donation {
    /// Pickup location, only when both halves are present.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    /// The embedded claim, unless it has been cancelled.
    pub fn active_claim(&self) -> Option<&Claim> {
        self.claim
            .as_ref()
            .filter(|c| c.status != ClaimStatus::Cancelled)
    }
}
