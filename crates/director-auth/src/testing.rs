use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::HeaderMap;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, sea_query::Expr};
use tokio::net::TcpListener;

use crate::auth::AccountNotifier;
use crate::config::{Config, SecurityConfig};
use crate::error::AuthError;
use crate::models::user::{self, Role};
use crate::state::AppState;

/// A test application builder for integration testing.
///
/// Spins up the server on a random port with an in-memory SQLite database
/// and a [`RecordingNotifier`] that captures one-time tokens.
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_register() {
///     let app = TestApp::new().await;
///     let res = app.register("a@b.com", "bob", "Str0ng!Pass").await;
///     assert_eq!(res.status, 201);
/// }
/// ```
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: TestClient,
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    /// Defaults for tests: cheap password hashing and an auth rate limit
    /// high enough not to interfere.
    pub fn test_config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret-key-for-testing".to_string(),
            access_token_expiry_secs: 900,
            server_host: "127.0.0.1".to_string(),
            server_port: 0, // OS assigns a random port
            environment: "test".to_string(),
            api_prefix: "/api/v1".to_string(),
            security: SecurityConfig {
                password_hash_iterations: 1,
                password_hash_memory_kib: 1024,
                password_hash_parallelism: 1,
                auth_rate_limit_max_requests: 1000,
                ..SecurityConfig::default()
            },
        }
    }

    /// Create a new test app with the default test config.
    pub async fn new() -> Self {
        Self::with_config(Self::test_config()).await
    }

    /// Create a new test app with a custom config.
    pub async fn with_config(config: Config) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let app = crate::App::with_config(config)
            .await
            .expect("Failed to create test app")
            .with_notifier(notifier.clone());

        let state = app.state();
        let router = crate::build_router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to get local addr");

        // Spawn the server in the background
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("test server failed");
        });

        TestApp {
            addr,
            client: TestClient::new(addr),
            db: app.db.clone(),
            config: app.config.clone(),
            state,
            notifier,
        }
    }

    /// Get the URL for a path on the test server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// URL of an API route (`path` is relative to the API prefix).
    pub fn api(&self, path: &str) -> String {
        self.url(&format!("{}{}", self.config.api_prefix, path))
    }

    /// POST /auth/register.
    pub async fn register(&self, email: &str, username: &str, password: &str) -> TestResponse {
        let body = serde_json::json!({
            "email": email,
            "username": username,
            "password": password,
        });
        self.client
            .post(&self.api("/auth/register"), &body.to_string())
            .await
    }

    /// Register and return `(access_token, refresh_token, user)`.
    pub async fn create_user(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> (String, String, serde_json::Value) {
        let res = self.register(email, username, password).await;
        assert_eq!(res.status, 201, "Register failed: {}", res.body);

        let data = res.data();
        (
            data["accessToken"].as_str().unwrap().to_string(),
            data["refreshToken"].as_str().unwrap().to_string(),
            data["user"].clone(),
        )
    }

    /// POST /auth/login.
    pub async fn login(&self, email_or_username: &str, password: &str) -> TestResponse {
        let body = serde_json::json!({
            "emailOrUsername": email_or_username,
            "password": password,
        });
        self.client
            .post(&self.api("/auth/login"), &body.to_string())
            .await
    }

    /// Set a user's role directly in the database.
    pub async fn set_role(&self, user_id: i64, role: Role) {
        user::Entity::update_many()
            .col_expr(user::Column::Role, Expr::value(role.as_str()))
            .filter(user::Column::Id.eq(user_id as i32))
            .exec(&self.db)
            .await
            .expect("Failed to set role");
    }

    /// Load a user row by email.
    pub async fn user_by_email(&self, email: &str) -> Option<user::Model> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .expect("Failed to load user")
    }
}

/// Notifier that keeps every token it is given, for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentToken>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    EmailVerification,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct SentToken {
    pub kind: TokenKind,
    pub email: String,
    pub token: String,
}

impl RecordingNotifier {
    fn push(&self, kind: TokenKind, user: &user::Model, token: &str) {
        self.sent.lock().unwrap().push(SentToken {
            kind,
            email: user.email.clone(),
            token: token.to_string(),
        });
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<SentToken> {
        self.sent.lock().unwrap().clone()
    }

    fn last(&self, kind: TokenKind, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.kind == kind && s.email == email)
            .map(|s| s.token.clone())
    }

    pub fn last_reset_token(&self, email: &str) -> Option<String> {
        self.last(TokenKind::PasswordReset, email)
    }

    pub fn last_verification_token(&self, email: &str) -> Option<String> {
        self.last(TokenKind::EmailVerification, email)
    }
}

#[async_trait]
impl AccountNotifier for RecordingNotifier {
    async fn send_email_verification(
        &self,
        user: &user::Model,
        token: &str,
    ) -> Result<(), AuthError> {
        self.push(TokenKind::EmailVerification, user, token);
        Ok(())
    }

    async fn send_password_reset(&self, user: &user::Model, token: &str) -> Result<(), AuthError> {
        self.push(TokenKind::PasswordReset, user, token);
        Ok(())
    }
}

/// A simple HTTP test client with helper methods.
#[derive(Clone)]
pub struct TestClient {
    inner: reqwest::Client,
    base_addr: SocketAddr,
}

impl TestClient {
    /// Create a new test client pointing at the given address.
    pub fn new(addr: SocketAddr) -> Self {
        TestClient {
            inner: reqwest::Client::new(),
            base_addr: addr,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> TestResponse {
        let res = request.send().await.expect("request failed");
        TestResponse::from_response(res).await
    }

    /// Send a GET request.
    pub async fn get(&self, url: &str) -> TestResponse {
        self.send(self.inner.get(url)).await
    }

    /// Send a GET request with an auth token.
    pub async fn get_with_auth(&self, url: &str, token: &str) -> TestResponse {
        self.send(self.inner.get(url).bearer_auth(token)).await
    }

    /// Send a GET request with extra headers.
    pub async fn get_with_headers(&self, url: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut request = self.inner.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(request).await
    }

    /// Send a POST request with a JSON body.
    pub async fn post(&self, url: &str, body: &str) -> TestResponse {
        self.send(
            self.inner
                .post(url)
                .header("Content-Type", "application/json")
                .body(body.to_string()),
        )
        .await
    }

    /// Send a POST request with a JSON body and extra headers.
    pub async fn post_with_headers(
        &self,
        url: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request = self
            .inner
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_string());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(request).await
    }

    /// Send a POST request with auth token and JSON body.
    pub async fn post_with_auth(&self, url: &str, token: &str, body: &str) -> TestResponse {
        self.send(
            self.inner
                .post(url)
                .header("Content-Type", "application/json")
                .bearer_auth(token)
                .body(body.to_string()),
        )
        .await
    }

    /// Send a PUT request with auth token and JSON body.
    pub async fn put_with_auth(&self, url: &str, token: &str, body: &str) -> TestResponse {
        self.send(
            self.inner
                .put(url)
                .header("Content-Type", "application/json")
                .bearer_auth(token)
                .body(body.to_string()),
        )
        .await
    }

    /// Send a PATCH request with auth token and JSON body.
    pub async fn patch_with_auth(&self, url: &str, token: &str, body: &str) -> TestResponse {
        self.send(
            self.inner
                .patch(url)
                .header("Content-Type", "application/json")
                .bearer_auth(token)
                .body(body.to_string()),
        )
        .await
    }

    /// Send a DELETE request with auth token.
    pub async fn delete_with_auth(&self, url: &str, token: &str) -> TestResponse {
        self.send(self.inner.delete(url).bearer_auth(token)).await
    }

    /// Send a DELETE request with extra headers.
    pub async fn delete_with_headers(&self, url: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut request = self.inner.delete(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(request).await
    }

    /// Get the base URL.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.base_addr)
    }
}

/// A simplified HTTP response for test assertions.
#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub body: String,
    pub headers: HeaderMap,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let body = res.text().await.unwrap_or_default();
        TestResponse {
            status,
            body,
            headers,
        }
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("Failed to parse response as JSON")
    }

    /// Check if the response indicates success.
    pub fn is_success(&self) -> bool {
        self.json()["success"].as_bool().unwrap_or(false)
    }

    /// Get the data field from the response.
    pub fn data(&self) -> serde_json::Value {
        self.json()["data"].clone()
    }

    /// Get the error field from the response.
    pub fn error(&self) -> serde_json::Value {
        self.json()["error"].clone()
    }

    /// The `error.code` string, if any.
    pub fn error_code(&self) -> String {
        self.error()["code"].as_str().unwrap_or_default().to_string()
    }
}
