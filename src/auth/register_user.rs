//! Defines the route handler for registering a new user.

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use email_address::EmailAddress;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::PasswordHash,
    response_body::SuccessBody,
    user::{UserPayload, create_user},
    validation::JsonBody,
};

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The database connection for managing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data for registering a new user.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterData {
    /// The email address to log in with.
    pub email: String,
    /// The user's chosen password, checked for strength before hashing.
    pub password: String,
}

/// A route handler for creating a new user.
///
/// Responds with `201 Created` and the new user on success.
///
/// # Errors
///
/// Responds with:
/// - `400` if the email address is invalid or the password is too weak,
/// - `409` if the email address is already registered.
pub async fn register_user(
    State(state): State<RegistrationState>,
    JsonBody(user_data): JsonBody<RegisterData>,
) -> Response {
    let email = match EmailAddress::from_str(&user_data.email) {
        Ok(email) => email,
        Err(error) => return Error::InvalidEmail(error.to_string()).into_response(),
    };

    let password_hash =
        match PasswordHash::from_raw_password(&user_data.password, PasswordHash::DEFAULT_COST) {
            Ok(password_hash) => password_hash,
            Err(error) => return error.into_response(),
        };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_user(email, password_hash, &connection) {
        Ok(user) => {
            tracing::info!("Registered user {}", user.id);
            (StatusCode::CREATED, SuccessBody::new(UserPayload { user })).into_response()
        }
        Err(error) => error.into_response(),
    }
}
