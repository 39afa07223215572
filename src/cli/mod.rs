//! Command-line interface logic

pub mod acquire;

pub use acquire::{AcquireArgs, run_acquire_mode};
