use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::IntoResponse;
use director_auth::error::{FieldError, expose_internal_errors};
use director_auth::testing::TestApp;
use director_auth::{App, AuthError};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn test_status_codes() {
    let cases = [
        (AuthError::Validation("x".into()), StatusCode::BAD_REQUEST),
        (AuthError::DuplicateIdentity("x".into()), StatusCode::BAD_REQUEST),
        (AuthError::InvalidOneTimeToken, StatusCode::BAD_REQUEST),
        (AuthError::NoToken, StatusCode::UNAUTHORIZED),
        (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
        (AuthError::InvalidOrExpiredToken, StatusCode::UNAUTHORIZED),
        (AuthError::InvalidSession, StatusCode::UNAUTHORIZED),
        (AuthError::SessionNotFound, StatusCode::UNAUTHORIZED),
        (AuthError::UserNotFound, StatusCode::UNAUTHORIZED),
        (
            AuthError::AccountLocked {
                retry_after_secs: 10,
            },
            StatusCode::FORBIDDEN,
        ),
        (AuthError::AccountInactive, StatusCode::FORBIDDEN),
        (AuthError::Forbidden("x".into()), StatusCode::FORBIDDEN),
        (AuthError::NotFound("x".into()), StatusCode::NOT_FOUND),
        (
            AuthError::RateLimited {
                retry_after_secs: 10,
            },
            StatusCode::TOO_MANY_REQUESTS,
        ),
        (AuthError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];

    for (err, status) in cases {
        assert_eq!(err.status_code(), status, "{err:?}");
    }
}

#[tokio::test]
async fn test_locked_response_carries_retry_after() {
    let response = AuthError::AccountLocked {
        retry_after_secs: 42,
    }
    .into_response();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()[header::RETRY_AFTER], "42");

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "ACCOUNT_LOCKED");
}

#[tokio::test]
async fn test_field_errors_are_listed() {
    let response = AuthError::validation_fields(vec![
        FieldError::with_code("email", "Must be a valid email address", "email"),
        FieldError::new("username", "Username is required"),
    ])
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let fields = body["error"]["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0]["field"], "email");
    assert_eq!(fields[0]["code"], "email");
    assert!(fields[1].get("code").is_none());
}

#[tokio::test]
async fn test_internal_detail_is_hidden() {
    expose_internal_errors(false);
    let response = AuthError::Internal("connection string leaked".into()).into_response();
    let body = body_json(response).await;

    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(body["error"]["message"], "Internal server error");
}

#[tokio::test]
async fn test_router_answers_without_network() {
    let app = App::with_config(TestApp::test_config()).await.unwrap();
    let router = app.router();

    let response = router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::get("/api/v1/auth/me")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "INVALID_TOKEN");
}
