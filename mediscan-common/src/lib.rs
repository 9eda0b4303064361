//! # MediScan Common Library
//!
//! Shared code for the MediScan services including:
//! - Diagnosis logic (score synthesis, primary selection, severity triage)
//! - Upload gatekeeping
//! - Event types (ScanEvent enum) and the EventBus
//! - Database schema initialization
//! - Bearer token authentication
//! - Configuration loading

pub mod api;
pub mod config;
pub mod db;
pub mod diagnosis;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
