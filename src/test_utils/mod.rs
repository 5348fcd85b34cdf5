//! Helpers shared by tests that need a database, users or auth cookies.
#![allow(missing_docs)]

use axum::{http::header::SET_COOKIE, response::IntoResponse};
use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, Key},
};
use email_address::EmailAddress;
use rusqlite::Connection;
use time::Duration;

use crate::{
    AppState,
    auth::{DEFAULT_COOKIE_DURATION, PasswordHash, ValidatedPassword, set_auth_cookie},
    user::{User, UserID, create_user},
};

/// A password strong enough to pass validation.
pub(crate) const TEST_PASSWORD: &str = "averysafeandsecurepassword";

/// The lowest cost bcrypt accepts, keeps tests that hash passwords fast.
const TEST_HASH_COST: u32 = 4;

#[track_caller]
pub(crate) fn get_test_app_state() -> AppState {
    let connection =
        Connection::open_in_memory().expect("Could not open in-memory SQLite database");

    AppState::new(connection, "42").expect("Could not create app state")
}

/// Register a user with the password [TEST_PASSWORD].
#[track_caller]
pub(crate) fn create_test_user(state: &AppState, email: &str) -> User {
    let email = EmailAddress::new_unchecked(email);
    let password = ValidatedPassword::new(TEST_PASSWORD).expect("Test password is too weak");
    let password_hash =
        PasswordHash::new(password, TEST_HASH_COST).expect("Could not hash test password");

    create_user(
        email,
        password_hash,
        &state.db_connection.lock().expect("Could not acquire lock"),
    )
    .expect("Could not create test user")
}

/// Overwrite a user's points column, `None` stores `NULL`.
#[track_caller]
pub(crate) fn set_points(state: &AppState, user_id: UserID, points: Option<i64>) {
    state
        .db_connection
        .lock()
        .expect("Could not acquire lock")
        .execute(
            "UPDATE user SET points = ?1 WHERE id = ?2",
            (points, user_id.as_i64()),
        )
        .expect("Could not set points");
}

/// Build the encrypted auth cookie a client would hold after logging in as `user_id`.
#[track_caller]
pub(crate) fn auth_cookie_for(state: &AppState, user_id: UserID) -> Cookie<'static> {
    session_cookie(&state.cookie_key, user_id, DEFAULT_COOKIE_DURATION)
}

/// Build a session cookie encrypted with `key` that expires after `duration`.
#[track_caller]
pub(crate) fn session_cookie(key: &Key, user_id: UserID, duration: Duration) -> Cookie<'static> {
    let jar = set_auth_cookie(PrivateCookieJar::new(key.clone()), user_id, duration)
        .expect("Could not set auth cookie");

    let response = jar.into_response();
    let header = response
        .headers()
        .get(SET_COOKIE)
        .expect("Auth cookie was not set")
        .to_str()
        .expect("Could not convert cookie header to str");

    Cookie::parse(header)
        .expect("Could not parse auth cookie")
        .into_owned()
}
