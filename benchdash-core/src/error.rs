//! Error types for the Benchdash client core.
//!
//! Uses `thiserror` for public API error types. Most failures never surface
//! as `Err` values to readers of the dashboard state: fetch and stream
//! failures are recovered at the component boundary and recorded as
//! observable state (connected flag, error message) on the store. These
//! types cover the direct request paths (CLI one-shots, orchestrator steps)
//! where an error is part of the return contract.

/// Errors from backend API interactions.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {message}")]
    Request { message: String },

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("response parse error: {message}")]
    ResponseParse { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}
