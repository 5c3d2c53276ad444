//! File access-level authorization.

mod engine;
pub mod models;

pub use models::{AccessLevel, File, FileAccess};
