//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum
//! router on in-memory stores, plus request builders carrying the acting
//! identity headers.
//!
//! ## Test Servers
//!
//! Use [`spawn_test_server()`] when a real socket is needed, e.g. for the
//! remote membership client.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use uuid::Uuid;
use vc_authz::api::{create_router, AppState, ADMIN_HEADER, SERVICE_TOKEN_HEADER, USER_ID_HEADER};
use vc_authz::config::Config;

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub config: Arc<Config>,
}

impl TestApp {
    /// Create a new test app on fresh in-memory stores.
    pub fn new() -> Self {
        Self::from_state(AppState::in_memory(Config::default_for_test()))
    }

    /// Wrap prepared state (custom stores or membership query).
    pub fn from_state(state: AppState) -> Self {
        let config = Arc::clone(&state.config);
        let router = create_router(state.clone());
        Self {
            router,
            state,
            config,
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Build a request acting as `user_id`.
    pub fn request_as(method: Method, uri: &str, user_id: Uuid) -> http::request::Builder {
        Self::request(method, uri).header(USER_ID_HEADER, user_id.to_string())
    }

    /// Build a request acting as a platform admin.
    pub fn request_as_admin(method: Method, uri: &str, user_id: Uuid) -> http::request::Builder {
        Self::request_as(method, uri, user_id).header(ADMIN_HEADER, "true")
    }

    /// Build a service-to-service request carrying this app's service token.
    pub fn internal_request(&self, method: Method, uri: &str) -> http::request::Builder {
        let token = self
            .config
            .internal_service_token
            .clone()
            .expect("test config should carry a service token");
        Self::request(method, uri).header(SERVICE_TOKEN_HEADER, token)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Send a request without a body.
    pub async fn send(&self, builder: http::request::Builder) -> Response<Body> {
        self.oneshot(builder.body(Body::empty()).unwrap()).await
    }

    /// Send a request with a JSON body.
    pub async fn send_json(
        &self,
        builder: http::request::Builder,
        body: serde_json::Value,
    ) -> Response<Body> {
        let req = builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap();
        self.oneshot(req).await
    }

    /// Create a channel owned by `owner` and return its id.
    pub async fn create_channel(&self, owner: Uuid, channel_type: &str) -> Uuid {
        let resp = self
            .send_json(
                Self::request_as(Method::POST, "/api/channels", owner),
                serde_json::json!({ "name": "general", "channel_type": channel_type }),
            )
            .await;
        assert_eq!(resp.status(), 201, "Channel creation should return 201");
        parse_id(&body_to_json(resp).await)
    }

    /// Add `user_id` to a channel with `role`, acting as `actor`.
    pub async fn add_member(&self, channel_id: Uuid, actor: Uuid, user_id: Uuid, role: &str) {
        let resp = self
            .send_json(
                Self::request_as(
                    Method::POST,
                    &format!("/api/channels/{channel_id}/members"),
                    actor,
                ),
                serde_json::json!({ "user_id": user_id, "role": role }),
            )
            .await;
        assert_eq!(resp.status(), 201, "Adding a member should return 201");
    }

    /// Register a file uploaded by `uploader` and return its id.
    pub async fn create_file(
        &self,
        uploader: Uuid,
        access_level: &str,
        channel_id: Option<Uuid>,
    ) -> Uuid {
        let resp = self
            .send_json(
                Self::request_as(Method::POST, "/api/files", uploader),
                serde_json::json!({ "access_level": access_level, "channel_id": channel_id }),
            )
            .await;
        assert_eq!(resp.status(), 201, "File creation should return 201");
        parse_id(&body_to_json(resp).await)
    }

    /// Ask whether `requester` may read the file.
    pub async fn can_access(&self, file_id: Uuid, requester: Uuid) -> bool {
        let resp = self
            .send(Self::request_as(
                Method::GET,
                &format!("/api/files/{file_id}/access"),
                requester,
            ))
            .await;
        assert_eq!(resp.status(), 200, "Access check should return 200");
        body_to_json(resp).await["allowed"]
            .as_bool()
            .expect("allowed should be a bool")
    }
}

// ============================================================================
// Test Server
// ============================================================================

/// A running test server bound to a random port.
pub struct TestServer {
    /// Server address (127.0.0.1:PORT).
    pub addr: SocketAddr,
    /// Base URL for HTTP requests (e.g., `http://127.0.0.1:12345`).
    pub url: String,
    /// Handle to the server task for cleanup.
    _handle: JoinHandle<()>,
}

/// Spawn a real HTTP server on a random port.
pub async fn spawn_test_server(router: Router) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local addr");
    let url = format!("http://{addr}");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Test server failed");
    });

    TestServer {
        addr,
        url,
        _handle: handle,
    }
}

// ============================================================================
// Response helpers
// ============================================================================

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}

/// Read the `id` field of a JSON response.
pub fn parse_id(json: &serde_json::Value) -> Uuid {
    json["id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("Response should have a uuid id")
}
