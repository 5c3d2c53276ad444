//! API Router and Application State
//!
//! Central routing configuration and shared state.

mod actor;
pub mod channels;
pub mod error;
pub mod files;
mod internal;

use std::sync::Arc;

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

pub use actor::{Actor, ActorRejection, ADMIN_HEADER, USER_ID_HEADER};
pub use error::ApiError;
pub use internal::{ServiceTokenRejection, SERVICE_TOKEN_HEADER};

use crate::channels::Channel;
use crate::config::Config;
use crate::files::File;
use crate::membership::{LedgerMembershipQuery, MembershipQuery};
use crate::services::{ChannelService, FileService};
use crate::store::{ChannelStore, FileStore, MemoryStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Channel membership operations
    pub channels: ChannelService,
    /// File access operations
    pub files: FileService,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        config: Config,
        channel_store: Arc<ChannelStore>,
        file_store: Arc<FileStore>,
        membership: Arc<dyn MembershipQuery>,
    ) -> Self {
        let channels = ChannelService::new(channel_store, config.max_retries);
        let files = FileService::new(
            file_store,
            membership,
            config.membership_query_timeout,
            config.max_retries,
        );

        Self {
            config: Arc::new(config),
            channels,
            files,
        }
    }

    /// State backed by in-memory stores, answering membership from the local
    /// channel store.
    #[must_use]
    pub fn in_memory(config: Config) -> Self {
        let channel_store: Arc<ChannelStore> = Arc::new(MemoryStore::<Channel>::new());
        let file_store: Arc<FileStore> = Arc::new(MemoryStore::<File>::new());
        let membership = Arc::new(LedgerMembershipQuery::new(Arc::clone(&channel_store)));

        Self::new(config, channel_store, file_store, membership)
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let channel_routes = Router::new()
        .route("/api/channels", post(channels::create))
        .route("/api/channels/{id}", get(channels::get))
        .route("/api/channels/{id}/members", post(channels::add_member))
        .route(
            "/api/channels/{id}/members/{user_id}",
            get(channels::membership)
                .delete(channels::remove_member)
                .patch(channels::change_role),
        )
        .route("/api/channels/{id}/leave", post(channels::leave))
        .route("/api/channels/{id}/archive", post(channels::archive))
        .route("/api/channels/{id}/unarchive", post(channels::unarchive));

    let file_routes = Router::new()
        .route("/api/files", post(files::create))
        .route("/api/files/{id}", get(files::get).delete(files::delete))
        .route("/api/files/{id}/access", get(files::check_access))
        .route("/api/files/{id}/access-level", put(files::update_access_level))
        .route(
            "/api/files/{id}/grants/{user_id}",
            put(files::grant).delete(files::revoke),
        );

    let internal_routes = Router::new()
        .route(
            "/internal/channels/{channel_id}/members/{user_id}",
            get(internal::membership),
        )
        .layer(from_fn_with_state(
            state.clone(),
            internal::require_service_token,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(internal_routes)
        .merge(channel_routes)
        .merge(file_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Whether membership is answered by a remote service
    remote_membership: bool,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        remote_membership: state.config.has_remote_membership(),
    })
}
