//! Pickup codes.
//!
//! The code is an opaque credential generated and checked by the backend.
//! Locally we only know its length and that it is shown exactly as issued.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::DonationId;

pub const PICKUP_CODE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickupCodeError {
    #[error("pickup code must be 6 characters, got {0}")]
    Length(usize),

    #[error("pickup code must not contain whitespace")]
    Whitespace,
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PickupCode(String);

impl PickupCode {
    pub fn parse(raw: &str) -> Result<Self, PickupCodeError> {
        if raw.chars().any(char::is_whitespace) {
            return Err(PickupCodeError::Whitespace);
        }
        let len = raw.chars().count();
        if len != PICKUP_CODE_LEN {
            return Err(PickupCodeError::Length(len));
        }
        Ok(Self(raw.to_string()))
    }

    /// Stand-in for claim responses that omit the code: the donation id
    /// folded into six zero-padded digits. Not a credential the backend
    /// is guaranteed to accept.
    pub fn synthesized_for(donation: DonationId) -> Self {
        Self(format!("{:06}", donation.0 % 1_000_000))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PickupCode {
    type Error = PickupCodeError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<PickupCode> for String {
    fn from(code: PickupCode) -> Self {
        code.0
    }
}

impl fmt::Display for PickupCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Credentials stay out of logs.
impl fmt::Debug for PickupCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PickupCode(******)")
    }
}
