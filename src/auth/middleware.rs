//! The auth guard that protects routes behind a session cookie.

use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use time::Duration;

use crate::auth::cookie::{extend_session, read_session};

/// Every authenticated request keeps the session alive for at least this long.
const SESSION_EXTENSION: Duration = Duration::minutes(5);

/// Reject requests without a live session with a `401` JSON error.
///
/// For requests with a live session, the session's [UserID](crate::UserID) is
/// added to the request extensions for handlers to pick up with
/// `Extension<UserID>`, and the session is extended after the handler runs.
pub async fn auth_guard(State(key): State<Key>, mut request: Request, next: Next) -> Response {
    let jar = PrivateCookieJar::from_headers(request.headers(), key);

    let session = match read_session(&jar) {
        Ok(session) => session,
        Err(error) => return error.into_response(),
    };

    request.extensions_mut().insert(session.user_id);
    let mut response = next.run(request).await;

    match extend_session(jar, SESSION_EXTENSION) {
        Ok(jar) => {
            let refreshed = jar.into_response();
            for cookie in refreshed.headers().get_all(SET_COOKIE) {
                response.headers_mut().append(SET_COOKIE, cookie.clone());
            }
        }
        Err(error) => {
            tracing::warn!("could not extend session for user {}: {error}", session.user_id);
        }
    }

    response
}
