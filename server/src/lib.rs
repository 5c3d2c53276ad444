//! `VoiceChat` Authorization Core
//!
//! Decides whether an acting identity may mutate or read a shared resource
//! (a channel or an uploaded file) and keeps the membership and file-grant
//! ledgers consistent while doing so.

pub mod api;
pub mod channels;
pub mod config;
pub mod error;
pub mod files;
pub mod ledger;
pub mod membership;
pub mod services;
pub mod store;

pub use error::{AuthzError, AuthzResult, ServiceError};
