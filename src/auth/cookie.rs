//! Cookie based sessions.
//!
//! A logged in client holds a single private cookie named [COOKIE_TOKEN]. Its
//! value is a JSON encoded [Session], encrypted and signed by the
//! [PrivateCookieJar], so clients can neither read nor forge it.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Error, user::UserID};

/// The name of the cookie holding the session.
pub const COOKIE_TOKEN: &str = "token";
/// How long a session lasts after logging in.
pub const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(15);

/// The contents of the auth cookie.
///
/// Serialized with short keys and a unix timestamp, e.g.
/// `{"uid":1,"exp":1766289240}`.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Session {
    #[serde(rename = "uid")]
    pub user_id: UserID,
    #[serde(rename = "exp", with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    fn is_live_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

fn session_cookie(value: String, expires_at: OffsetDateTime) -> Cookie<'static> {
    Cookie::build((COOKIE_TOKEN, value))
        .path("/")
        .expires(expires_at)
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(true)
        .build()
}

fn store_session(jar: PrivateCookieJar, session: &Session) -> Result<PrivateCookieJar, Error> {
    let value = serde_json::to_string(session)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    Ok(jar.add(session_cookie(value, session.expires_at)))
}

/// Start a session for `user_id` that lasts `duration` from now.
///
/// # Errors
///
/// Returns [Error::JSONSerializationError] if the session could not be encoded.
pub fn set_auth_cookie(
    jar: PrivateCookieJar,
    user_id: UserID,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let session = Session {
        user_id,
        expires_at: OffsetDateTime::now_utc() + duration,
    };

    store_session(jar, &session)
}

/// Overwrite the session cookie with an expired placeholder so the client drops it.
pub fn invalidate_auth_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    let mut cookie = session_cookie("deleted".to_owned(), OffsetDateTime::UNIX_EPOCH);
    cookie.set_max_age(Duration::ZERO);

    jar.add(cookie)
}

/// Read the session from `jar`.
///
/// # Errors
///
/// Returns [Error::Unauthorized] if there is no session cookie, it does not
/// decode, or it has expired.
pub(crate) fn read_session(jar: &PrivateCookieJar) -> Result<Session, Error> {
    let cookie = jar.get(COOKIE_TOKEN).ok_or(Error::Unauthorized)?;

    let session: Session = serde_json::from_str(cookie.value_trimmed()).map_err(|error| {
        tracing::debug!("could not decode session cookie: {error}");
        Error::Unauthorized
    })?;

    if !session.is_live_at(OffsetDateTime::now_utc()) {
        return Err(Error::Unauthorized);
    }

    Ok(session)
}

/// Make sure the session in `jar` lasts at least `duration` from now.
///
/// A session that already runs longer is left as it is.
///
/// # Errors
///
/// Returns [Error::Unauthorized] if there is no live session or the new expiry
/// overflows, and [Error::JSONSerializationError] if encoding fails.
pub(crate) fn extend_session(
    jar: PrivateCookieJar,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let session = read_session(&jar)?;

    let minimum_expiry = OffsetDateTime::now_utc()
        .checked_add(duration)
        .ok_or(Error::Unauthorized)?;

    if session.expires_at >= minimum_expiry {
        return Ok(jar);
    }

    store_session(
        jar,
        &Session {
            user_id: session.user_id,
            expires_at: minimum_expiry,
        },
    )
}
