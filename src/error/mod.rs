//! Error handling for the session provider
//!
//! This module defines error types and handling patterns used throughout the application.

pub mod types;

pub use types::{ChallengeKind, Error, Result};
