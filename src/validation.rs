//! Request body parsing and the field-level error type reported to clients.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::Error;

/// A validation error for a single field of a request body.
///
/// Errors that are not tied to a particular field (e.g., a malformed body)
/// have no `field`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// The name of the offending field as it appears in the JSON body.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub field: Option<String>,
    /// A human readable explanation of what is wrong.
    pub message: String,
}

impl FieldError {
    /// Create an error for the field `field`.
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.to_owned()),
            message: message.into(),
        }
    }

    /// Create an error that applies to the request as a whole.
    pub fn body(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

/// Convert a list of field errors into a result, `Ok(())` if there are none.
pub(crate) fn check(errors: Vec<FieldError>) -> Result<(), Error> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

/// A JSON body extractor that reports rejections with the app's error format.
///
/// Works the same as [axum::Json], but a missing content type, malformed JSON
/// or a field of the wrong type produces a `400` [Error::InvalidJson] instead of
/// axum's plain text rejection.
#[derive(Debug)]
pub(crate) struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!("rejected request body: {rejection}");
                Err(Error::InvalidJson(rejection_message(&rejection)))
            }
        }
    }
}

fn rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Expected request with `Content-Type: application/json`".to_owned()
        }
        other => other.body_text(),
    }
}
