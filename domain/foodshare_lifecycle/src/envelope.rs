//! Response envelopes.
//!
//! Single resources and action receipts arrive as `{"data": T}`; lists are
//! paginated and arrive as `{"data": {"data": [T, ...], "current_page": ..}}`.
//! Each endpoint has exactly one of these shapes. A body that does not match
//! is an [`EnvelopeError`], never a guess at a different nesting depth.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub last_page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        matches!((self.current_page, self.last_page), (Some(c), Some(l)) if c < l)
    }
}

/// Field name → messages, as in a 422 body.
pub type FieldMessages = BTreeMap<String, Vec<String>>;

/// Error body: `{message, errors?, status?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Option<FieldMessages>,
    #[serde(default)]
    pub status: Option<u16>,
}

impl ErrorBody {
    /// First message for `field`, if the server reported one.
    pub fn first_error(&self, field: &str) -> Option<&str> {
        self.errors
            .as_ref()
            .and_then(|e| e.get(field))
            .and_then(|msgs| msgs.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("response is not a JSON object with a `data` field")]
    MissingData,

    #[error("response `data` does not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

fn take_data(body: &[u8]) -> Result<Value, EnvelopeError> {
    let value: Value = serde_json::from_slice(body)?;
    match value {
        Value::Object(mut map) => map.remove("data").ok_or(EnvelopeError::MissingData),
        _ => Err(EnvelopeError::MissingData),
    }
}

/// Decode `{"data": T}`.
pub fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T, EnvelopeError> {
    let data = take_data(body)?;
    Ok(serde_json::from_value(data)?)
}

/// Decode `{"data": {"data": [T, ...]}}`.
pub fn decode_page<T: DeserializeOwned>(body: &[u8]) -> Result<Page<T>, EnvelopeError> {
    decode_envelope::<Page<T>>(body)
}
