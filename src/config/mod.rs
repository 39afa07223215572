//! Configuration management for the session provider
//!
//! This module handles loading and managing configuration settings
//! for the library and the probe CLI.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::Settings;
