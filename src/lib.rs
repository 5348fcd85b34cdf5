//! Points Ledger is a small web service that records point transactions for
//! users and keeps each user's point balance in step with their ledger.
//!
//! This library provides a JSON REST API backed by SQLite.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use tokio::signal;

mod app_state;
mod auth;
mod database_id;
mod db;
mod endpoints;
mod logging;
mod response_body;
mod routing;
mod transaction;
mod user;
mod validation;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{PasswordHash, ValidatedPassword};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, MAX_REQUEST_BODY_SIZE, logging_middleware};
pub use routing::build_router;
pub use user::{User, UserID, get_user_by_id};
pub use validation::FieldError;

use crate::response_body::ErrorBody;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate_signal) => {
                terminate_signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// One or more fields in the request body failed validation.
    #[error("the request body failed validation: {0:?}")]
    Validation(Vec<FieldError>),

    /// The request body could not be parsed as the expected JSON object.
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    /// The email address given at registration or log-in is not a valid email address.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// The email and password combination does not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The request does not carry a valid session, or the session refers to a
    /// user that no longer exists.
    #[error("unauthorized")]
    Unauthorized,

    /// Applying a points change would overflow the user's point balance.
    #[error("the points change would overflow the user's point balance")]
    PointsOverflow,

    /// The email address is already registered to another user.
    #[error("the email address is already in use")]
    DuplicateEmail,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// The request body is larger than the server accepts.
    #[error("the request body is too large")]
    PayloadTooLarge,

    /// A response body could not be read back for logging.
    #[error("could not read body: {0}")]
    BodyReadError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                Some(ref desc),
            ) if desc.ends_with("user.email") => Error::DuplicateEmail,
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_)
            | Error::InvalidJson(_)
            | Error::InvalidEmail(_)
            | Error::TooWeak(_)
            | Error::PointsOverflow => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials | Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::DuplicateEmail => StatusCode::CONFLICT,
            Error::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Error::HashingError(_)
            | Error::JSONSerializationError(_)
            | Error::BodyReadError(_)
            | Error::DatabaseLockError
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_field_errors(self) -> Vec<FieldError> {
        match self {
            Error::Validation(errors) => errors,
            Error::InvalidJson(reason) => vec![FieldError::body(reason)],
            Error::InvalidEmail(_) => vec![FieldError::new("email", "Email must be valid")],
            Error::TooWeak(feedback) => vec![FieldError::new("password", feedback)],
            Error::InvalidCredentials => vec![FieldError::body("Invalid email or password")],
            Error::Unauthorized => vec![FieldError::body("Not authorized")],
            Error::PointsOverflow => vec![FieldError::new(
                "pointsChange",
                "Points change would overflow the point balance",
            )],
            Error::DuplicateEmail => vec![FieldError::new("email", "Email is already in use")],
            Error::NotFound => vec![FieldError::body("Not found")],
            Error::PayloadTooLarge => vec![FieldError::body("Request body is too large")],
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                vec![FieldError::body("Something went wrong")]
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let errors = self.into_field_errors();

        (status_code, ErrorBody::new(errors)).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{Error, FieldError};

    #[test]
    fn unique_email_violation_maps_to_duplicate_email() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE user (email TEXT UNIQUE NOT NULL)", ())
            .unwrap();
        conn.execute("INSERT INTO user (email) VALUES ('a@b.c')", ())
            .unwrap();

        let error: Error = conn
            .execute("INSERT INTO user (email) VALUES ('a@b.c')", ())
            .unwrap_err()
            .into();

        assert_eq!(error, Error::DuplicateEmail);
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }

    #[test]
    fn status_codes() {
        let cases = [
            (Error::Validation(vec![]), StatusCode::BAD_REQUEST),
            (Error::InvalidJson("bad".to_owned()), StatusCode::BAD_REQUEST),
            (Error::PointsOverflow, StatusCode::BAD_REQUEST),
            (Error::Unauthorized, StatusCode::UNAUTHORIZED),
            (Error::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (Error::NotFound, StatusCode::NOT_FOUND),
            (Error::DuplicateEmail, StatusCode::CONFLICT),
            (Error::PayloadTooLarge, StatusCode::PAYLOAD_TOO_LARGE),
            (Error::DatabaseLockError, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, want) in cases {
            let got = error.into_response().status();
            assert_eq!(got, want);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let errors = Error::HashingError("secret details".to_owned()).into_field_errors();

        assert_eq!(errors, vec![FieldError::body("Something went wrong")]);
    }
}
