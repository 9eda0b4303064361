//! Shared HTTP API functionality
//!
//! Contains only framework-independent pieces: token hashing and the
//! database lookups behind bearer authentication. The axum middleware that
//! wraps them lives in the service crate.

pub mod auth;

pub use auth::{
    authenticate, generate_token, hash_token, issue_token, parse_bearer, ApiAuthError,
    AuthenticatedUser,
};
