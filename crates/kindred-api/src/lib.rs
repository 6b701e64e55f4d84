//! Kindred API Library
//!
//! This crate provides the HTTP surface of the photo service: identity
//! extraction, upload and delete handlers, error rendering and application
//! setup.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
