//! Ending a session.

use axum::response::{IntoResponse, Response};
use axum_extra::extract::PrivateCookieJar;

use crate::{auth::invalidate_auth_cookie, response_body::SuccessBody};

/// Replace the session cookie with an expired one.
///
/// Always succeeds, even for clients that were never logged in.
pub async fn get_log_out(jar: PrivateCookieJar) -> Response {
    (invalidate_auth_cookie(jar), SuccessBody::new(())).into_response()
}
