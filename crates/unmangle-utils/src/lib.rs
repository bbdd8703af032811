//! # unmangle Utilities
//!
//! Shared utilities for the unmangle workspace, mainly logging setup built on
//! `tracing`.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    init_logging, init_logging_with, init_logging_with_level, LogConfig, LogFormat, LogLevel, LoggingError,
    LoggingGuard,
};
pub use tracing::{debug, error, info, trace, warn};
