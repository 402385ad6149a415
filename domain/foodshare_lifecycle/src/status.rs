//! # Status strings
//!
//! The API reports two status enumerations: one on the donation and a
//! finer-grained one on the embedded claim. Both arrive as free-form strings
//! and are matched case-insensitively. Anything we do not recognise is kept
//! verbatim in an `Unrecognized` variant instead of failing the whole
//! payload, so a single odd row never blanks out a list.
//!
//! | Donation status        | Aliases     |
//! |------------------------|-------------|
//! | `pending`              | `available` |
//! | `claimed`              | `active`    |
//! | `picked_up`            |             |
//! | `delivered`            |             |
//! | `expired`              |             |
//! | `cancelled`            |             |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalise a raw status string for matching: trimmed and lower-cased.
pub(crate) fn normalise(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Donation-level status as reported by the API.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DonationStatus {
    Pending,
    Claimed,
    PickedUp,
    Delivered,
    Expired,
    Cancelled,
    /// A status string outside the known set, preserved as received.
    Unrecognized(String),
}

impl DonationStatus {
    pub fn parse(raw: &str) -> Self {
        match normalise(raw).as_str() {
            "pending" | "available" => Self::Pending,
            "claimed" | "active" => Self::Claimed,
            "picked_up" => Self::PickedUp,
            "delivered" => Self::Delivered,
            "expired" => Self::Expired,
            "cancelled" => Self::Cancelled,
            _ => Self::Unrecognized(raw.to_string()),
        }
    }

    /// Canonical wire value.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::PickedUp => "picked_up",
            Self::Delivered => "delivered",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl From<String> for DonationStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<DonationStatus> for String {
    fn from(status: DonationStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claim-level status. Runs `active → picked_up → delivered`, or `→ cancelled`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClaimStatus {
    Active,
    PickedUp,
    Delivered,
    Cancelled,
    Unrecognized(String),
}

impl ClaimStatus {
    pub fn parse(raw: &str) -> Self {
        match normalise(raw).as_str() {
            "active" => Self::Active,
            "picked_up" => Self::PickedUp,
            "delivered" => Self::Delivered,
            "cancelled" => Self::Cancelled,
            _ => Self::Unrecognized(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::PickedUp => "picked_up",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Position in the forward-only claim lifecycle. `None` for statuses
    /// that are not on the main path.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Active => Some(0),
            Self::PickedUp => Some(1),
            Self::Delivered => Some(2),
            Self::Cancelled | Self::Unrecognized(_) => None,
        }
    }
}

impl From<String> for ClaimStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ClaimStatus> for String {
    fn from(status: ClaimStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
