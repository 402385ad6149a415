//! Client-side checks for the "new donation" form.
//!
//! Failures are collected per field in the same `{field: [messages]}` shape
//! the API uses for 422 responses, so both render through one path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::FieldMessages;

pub const FOOD_TYPES: [&str; 7] = [
    "produce",
    "bakery",
    "dairy",
    "prepared",
    "canned",
    "frozen",
    "other",
];

const TITLE_MIN: usize = 3;
const TITLE_MAX: usize = 120;

/// Payload for `POST /donations`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewDonation {
    pub title: String,
    pub description: String,
    pub food_type: String,
    pub quantity: String,
    pub expiry_time: DateTime<Utc>,
    pub pickup_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors(pub FieldMessages);

impl FieldErrors {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

impl NewDonation {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        let title_len = self.title.trim().chars().count();
        if title_len < TITLE_MIN {
            errors.push("title", format!("Title must be at least {TITLE_MIN} characters."));
        } else if title_len > TITLE_MAX {
            errors.push("title", format!("Title must be at most {TITLE_MAX} characters."));
        }

        if self.description.trim().is_empty() {
            errors.push("description", "Description is required.");
        }

        if !FOOD_TYPES.contains(&self.food_type.trim().to_ascii_lowercase().as_str()) {
            errors.push("food_type", "Choose a valid food type.");
        }

        if self.quantity.trim().is_empty() {
            errors.push("quantity", "Quantity is required.");
        }

        if self.expiry_time <= now {
            errors.push("expiry_time", "Expiry time must be in the future.");
        }

        if self.pickup_address.trim().is_empty() {
            errors.push("pickup_address", "Pickup address is required.");
        }

        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    errors.push("latitude", "Latitude must be between -90 and 90.");
                }
                if !(-180.0..=180.0).contains(&lng) {
                    errors.push("longitude", "Longitude must be between -180 and 180.");
                }
            }
            (None, None) => {}
            (Some(_), None) => errors.push("longitude", "Longitude is required with latitude."),
            (None, Some(_)) => errors.push("latitude", "Latitude is required with longitude."),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
