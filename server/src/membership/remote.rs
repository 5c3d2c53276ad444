//! Remote membership lookup over HTTP.
//!
//! Calls the membership service's internal endpoint
//! `GET /internal/channels/{channel_id}/members/{user_id}`, presenting the
//! shared service token when one is configured.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MembershipQuery, MembershipQueryError};
use crate::api::SERVICE_TOKEN_HEADER;

/// Body returned by the internal membership endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipAnswer {
    pub is_member: bool,
}

/// Membership query client for a remote membership service.
#[derive(Debug, Clone)]
pub struct HttpMembershipQuery {
    client: reqwest::Client,
    base_url: String,
    service_token: Option<String>,
}

impl HttpMembershipQuery {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_token: None,
        })
    }

    /// Present `token` in `X-Service-Token` on every request.
    #[must_use]
    pub fn with_service_token(mut self, token: Option<String>) -> Self {
        self.service_token = token;
        self
    }

    fn member_url(&self, channel_id: Uuid, user_id: Uuid) -> String {
        format!(
            "{}/internal/channels/{channel_id}/members/{user_id}",
            self.base_url
        )
    }
}

impl MembershipQuery for HttpMembershipQuery {
    fn is_active_member(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'_, Result<bool, MembershipQueryError>> {
        let url = self.member_url(channel_id, user_id);
        Box::pin(async move {
            let mut request = self.client.get(&url);
            if let Some(token) = &self.service_token {
                request = request.header(SERVICE_TOKEN_HEADER, token);
            }
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(MembershipQueryError::Status(status.as_u16()));
            }
            let answer: MembershipAnswer = response.json().await?;
            Ok(answer.is_member)
        })
    }
}
