//! Utility modules for configuration, error handling, and output naming.

pub mod config;
pub mod error;
pub mod naming;

// Re-export commonly used error types for convenience
pub use error::{ConvertError, FinalizeError, OutputError, ReadinessError, SupervisorError};
