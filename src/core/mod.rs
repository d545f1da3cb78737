//! Core functionality for the hook engine server.
//!
//! This module contains fundamental components used throughout the application:
//! - Configuration management
//! - Error handling
//! - Logging and request context

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, HookEngineConfig, ProviderConfig, ServerConfig};
pub use error::{AppError, ErrorDetail, ErrorResponse, Result};
pub use logging::{get_request_id, init_tracing, request_id_middleware};
