//! The JSON envelopes used for every API response.
//!
//! Successful responses look like `{"success": true, "payload": ...}` and
//! failed responses look like `{"success": false, "errors": [...]}`.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::validation::FieldError;

/// The body of a successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessBody<T> {
    /// Always `true`.
    pub success: bool,
    /// The data returned by the endpoint.
    pub payload: T,
}

impl<T> SuccessBody<T> {
    /// Wrap `payload` in a success envelope.
    pub fn new(payload: T) -> Self {
        Self {
            success: true,
            payload,
        }
    }
}

impl<T> IntoResponse for SuccessBody<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// The body of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// What went wrong, one entry per problem.
    pub errors: Vec<FieldError>,
}

impl ErrorBody {
    /// Wrap `errors` in a failure envelope.
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self {
            success: false,
            errors,
        }
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
