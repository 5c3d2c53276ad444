//! Channel membership and role authorization.
//!
//! A channel and its members form one aggregate. The engine methods on
//! [`Channel`] validate and apply mutations in memory; persistence is the
//! caller's job.

mod engine;
pub mod models;
pub mod rules;

pub use models::{Channel, ChannelType, Member, MemberRole};
