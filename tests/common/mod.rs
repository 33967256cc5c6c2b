//! Shared helpers for integration tests.
//!
//! - `fixtures`: Google API response bodies, mock endpoints, config files
//! - `logger`: phase-tagged progress lines

pub mod fixtures;
pub mod logger;
