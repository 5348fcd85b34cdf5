//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request},
    http::{
        HeaderMap, StatusCode,
        header::{COOKIE, SET_COOKIE},
        request, response,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::Error;

/// Bodies longer than this many bytes are truncated in the `info` logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Request bodies larger than this are rejected with `413 Payload Too Large`.
///
/// Install it outside [logging_middleware] with
/// `DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE)`.
pub const MAX_REQUEST_BODY_SIZE: usize = 2 * 1024 * 1024;

/// The JSON field whose value is never written to the logs.
const PASSWORD_FIELD: &str = "password";
const REDACTED: &str = "********";

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and the full body is logged at the `debug` level.
/// Passwords in JSON request bodies and cookie headers are left out.
///
/// The request body is buffered under the `DefaultBodyLimit` of the request,
/// or axum's default of 2 MiB, and larger bodies get a `413` JSON error.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body_text) = match request_into_parts_and_text(request).await {
        Ok(parts_and_text) => parts_and_text,
        Err(error) => return error.into_response(),
    };

    log_request(&parts, &redact_password(&body_text));

    let request = Request::from_parts(parts, Body::from(body_text));
    let response = next.run(request).await;

    let (parts, body_text) = match response_into_parts_and_text(response).await {
        Ok(parts_and_text) => parts_and_text,
        Err(error) => {
            tracing::error!("could not read response body: {error}");
            return Error::BodyReadError(error.to_string()).into_response();
        }
    };

    log_response(&parts, &body_text);

    Response::from_parts(parts, Body::from(body_text))
}

/// Replace the value of a top level `password` field with asterisks.
///
/// Text that is not a JSON object is returned unchanged.
fn redact_password(body_text: &str) -> String {
    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(body_text) else {
        return body_text.to_owned();
    };

    match object.get_mut(PASSWORD_FIELD) {
        Some(password) => {
            *password = Value::String(REDACTED.to_owned());
            Value::Object(object).to_string()
        }
        None => body_text.to_owned(),
    }
}

/// Copy `headers` without the session cookie headers.
fn without_cookies(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();
    headers.remove(COOKIE);
    headers.remove(SET_COOKIE);
    headers
}

async fn request_into_parts_and_text(request: Request) -> Result<(request::Parts, String), Error> {
    let (parts, body) = request.into_parts();

    // The body limit set by `DefaultBodyLimit` lives in the extensions.
    let mut body_request = Request::new(body);
    *body_request.extensions_mut() = parts.extensions.clone();

    let body_bytes = Bytes::from_request(body_request, &())
        .await
        .map_err(|rejection| {
            tracing::warn!("could not read request body: {rejection}");

            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                Error::PayloadTooLarge
            } else {
                Error::InvalidJson("Could not read request body".to_owned())
            }
        })?;

    Ok((parts, String::from_utf8_lossy(&body_bytes).to_string()))
}

async fn response_into_parts_and_text(
    response: Response,
) -> Result<(response::Parts, String), axum::Error> {
    let (parts, body) = response.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX).await?;

    Ok((parts, String::from_utf8_lossy(&body_bytes).to_string()))
}

/// Cut `text` to at most [LOG_BODY_LENGTH_LIMIT] bytes without splitting a character.
fn truncate(text: &str) -> Option<&str> {
    if text.len() <= LOG_BODY_LENGTH_LIMIT {
        return None;
    }

    let end = (0..=LOG_BODY_LENGTH_LIMIT)
        .rev()
        .find(|&index| text.is_char_boundary(index))
        .unwrap_or(0);

    Some(&text[..end])
}

fn log_request(parts: &request::Parts, body: &str) {
    let line = format!("{} {} {:?}", parts.method, parts.uri, parts.version);
    let headers = without_cookies(&parts.headers);

    match truncate(body) {
        Some(truncated) => {
            tracing::info!("Received request: {line}\nheaders: {headers:#?}\nbody: {truncated}...");
            tracing::debug!("Full request body: {body:?}");
        }
        None => tracing::info!("Received request: {line}\nheaders: {headers:#?}\nbody: {body:?}"),
    }
}

fn log_response(parts: &response::Parts, body: &str) {
    let line = format!("{:?} {}", parts.version, parts.status);
    let headers = without_cookies(&parts.headers);

    match truncate(body) {
        Some(truncated) => {
            tracing::info!("Sending response: {line}\nheaders: {headers:#?}\nbody: {truncated}...");
            tracing::debug!("Full response body: {body:?}");
        }
        None => tracing::info!("Sending response: {line}\nheaders: {headers:#?}\nbody: {body:?}"),
    }
}

#[cfg(test)]
mod logging_tests {
    use axum::{
        Router,
        extract::DefaultBodyLimit,
        http::{
            HeaderMap, HeaderValue, StatusCode,
            header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        },
        middleware,
        routing::post,
    };
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use super::{
        LOG_BODY_LENGTH_LIMIT, logging_middleware, redact_password, truncate, without_cookies,
    };

    fn echo_server(body_limit: usize) -> TestServer {
        let app = Router::new()
            .route("/echo", post(|body: String| async move { body }))
            .layer(middleware::from_fn(logging_middleware))
            .layer(DefaultBodyLimit::max(body_limit));

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[test]
    fn redacts_password_field() {
        let body = json!({ "email": "foo@bar.baz", "password": "hunter2" }).to_string();

        let redacted = redact_password(&body);

        assert!(!redacted.contains("hunter2"));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&redacted).unwrap(),
            json!({ "email": "foo@bar.baz", "password": "********" })
        );
    }

    #[test]
    fn leaves_other_bodies_untouched() {
        for body in ["", "not json", r#"{"pointsChange":5}"#, "[1,2,3]"] {
            assert_eq!(redact_password(body), body);
        }
    }

    #[test]
    fn short_bodies_are_not_truncated() {
        assert_eq!(truncate(&"a".repeat(LOG_BODY_LENGTH_LIMIT)), None);
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundary() {
        let body = format!("{}é", "a".repeat(LOG_BODY_LENGTH_LIMIT - 1));

        let truncated = truncate(&body).unwrap();

        assert_eq!(truncated, "a".repeat(LOG_BODY_LENGTH_LIMIT - 1));
    }

    #[tokio::test]
    async fn middleware_passes_bodies_through() {
        let server = echo_server(1024);
        let body = json!({ "password": "hunter2", "padding": "x".repeat(100) }).to_string();

        let response = server.post("/echo").text(body.clone()).await;

        response.assert_status_ok();
        response.assert_text(body);
    }

    #[tokio::test]
    async fn oversized_request_body_is_rejected() {
        let server = echo_server(16);

        let response = server.post("/echo").text("x".repeat(17)).await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            response.json::<Value>(),
            json!({ "success": false, "errors": [{ "message": "Request body is too large" }] })
        );
    }

    #[tokio::test]
    async fn request_body_at_limit_is_accepted() {
        let server = echo_server(16);

        let response = server.post("/echo").text("x".repeat(16)).await;

        response.assert_status_ok();
        response.assert_text("x".repeat(16));
    }

    #[test]
    fn cookie_headers_are_left_out_of_logs() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("token=secret"));
        headers.insert(SET_COOKIE, HeaderValue::from_static("token=secret; Path=/"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let logged = without_cookies(&headers);

        assert_eq!(logged.len(), 1);
        assert!(!format!("{logged:?}").contains("secret"));
        assert_eq!(logged[CONTENT_TYPE], "application/json");
    }
}
