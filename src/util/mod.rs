//! Utility functions.

pub mod format;

pub use format::{format_bytes, format_duration, format_percent, format_trimmed};
