//! Core infrastructure for litewrap.
//!
//! This module holds the shared backbone of the crate: the structured error
//! taxonomy, the `Result` alias used by every fallible operation, and the
//! translation from raw engine error state into typed errors.

pub mod error;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
