//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8090")
    pub bind_address: String,

    /// `PostgreSQL` connection URL. The in-memory store is used when unset.
    pub database_url: Option<String>,

    /// Base URL of a remote membership service. Membership is answered from
    /// the local channel store when unset.
    pub membership_service_url: Option<String>,

    /// Deadline for one membership query (default: 500ms)
    pub membership_query_timeout: Duration,

    /// Attempts after a version conflict before giving up (default: 3)
    pub max_retries: u32,

    /// Shared secret required on `/internal/*` routes. Internal routes reject
    /// every request when unset.
    pub internal_service_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let membership_query_timeout_ms: u64 = match env::var("MEMBERSHIP_QUERY_TIMEOUT_MS") {
            Ok(v) => v
                .parse()
                .context("MEMBERSHIP_QUERY_TIMEOUT_MS must be a number of milliseconds")?,
            Err(_) => 500,
        };

        let max_retries: u32 = match env::var("AUTHZ_MAX_RETRIES") {
            Ok(v) => v
                .parse()
                .context("AUTHZ_MAX_RETRIES must be a non-negative integer")?,
            Err(_) => 3,
        };

        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8090".into()),
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            membership_service_url: env::var("MEMBERSHIP_SERVICE_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            membership_query_timeout: Duration::from_millis(membership_query_timeout_ms),
            max_retries,
            internal_service_token: env::var("INTERNAL_SERVICE_TOKEN")
                .ok()
                .filter(|v| !v.is_empty()),
        })
    }

    /// Check if a remote membership service is configured.
    #[must_use]
    pub const fn has_remote_membership(&self) -> bool {
        self.membership_service_url.is_some()
    }

    /// Create a config for testing.
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:0".into(),
            database_url: None,
            membership_service_url: None,
            membership_query_timeout: Duration::from_millis(200),
            max_retries: 3,
            internal_service_token: Some("test-internal-token".into()),
        }
    }
}
