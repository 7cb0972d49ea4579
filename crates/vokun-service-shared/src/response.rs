//! Envelope for successful history responses.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Outcome marker carried in the envelope metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Envelope metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub status: ResponseStatus,
    pub message: String,
    /// Number of entries in `data`.
    pub count: usize,
}

/// `{"meta": {...}, "data": [...]}` wrapper around a list payload.
///
/// # Example
///
/// ```
/// use vokun_service_shared::Envelope;
///
/// let envelope = Envelope::ok(vec!["a", "b"]);
/// assert_eq!(envelope.meta.count, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub meta: Meta,
    pub data: Vec<T>,
}

impl<T> Envelope<T> {
    /// Successful envelope; `count` is taken from `data`.
    pub fn ok(data: Vec<T>) -> Self {
        Self {
            meta: Meta {
                status: ResponseStatus::Ok,
                message: String::new(),
                count: data.len(),
            },
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
