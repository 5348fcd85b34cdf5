//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    AppState, Error,
    auth::{auth_guard, get_log_out, post_log_in, register_user},
    endpoints,
    transaction::create_transaction_endpoint,
    user::get_current_user_endpoint,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::LOG_OUT, get(get_log_out));

    let transaction_routes = Router::new().route(
        endpoints::CREATE_TRANSACTION,
        post(create_transaction_endpoint),
    );

    let protected_routes = Router::new()
        .route(endpoints::CURRENT_USER, get(get_current_user_endpoint))
        .nest(endpoints::TRANSACTIONS, transaction_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}

#[cfg(test)]
mod routing_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::{
        build_router, endpoints,
        test_utils::{auth_cookie_for, create_test_user, get_test_app_state},
    };

    fn get_test_server() -> TestServer {
        TestServer::try_new(build_router(get_test_app_state())).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn unknown_path_returns_json_not_found() {
        let server = get_test_server();

        let response = server.get("/api/nope").await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(
            response.json::<Value>(),
            json!({ "success": false, "errors": [{ "message": "Not found" }] })
        );
    }

    #[tokio::test]
    async fn unknown_path_under_transactions_returns_not_found() {
        let server = get_test_server();

        let response = server
            .post(&format!("{}/extra", endpoints::TRANSACTIONS))
            .json(&json!({ "pointsChange": 1 }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn protected_routes_require_auth() {
        let server = get_test_server();

        server
            .get(endpoints::CURRENT_USER)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post(endpoints::TRANSACTIONS)
            .json(&json!({ "pointsChange": 1 }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn current_user_returns_points() {
        let state = get_test_app_state();
        let user = create_test_user(&state, "foo@bar.baz");
        let server =
            TestServer::try_new(build_router(state.clone())).expect("Could not create test server.");

        let response = server
            .get(endpoints::CURRENT_USER)
            .add_cookie(auth_cookie_for(&state, user.id))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>(),
            json!({
                "success": true,
                "payload": { "user": { "id": user.id.as_i64(), "email": "foo@bar.baz", "points": 0 } }
            })
        );
    }
}
