//! Custom error types for the application.
//!
//! This module defines the primary error type, `CommError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the failure modes of instrument communication.
//!
//! ## Error Hierarchy
//!
//! Two kinds of instrument failure are distinguished:
//!
//! - **Transport failure** (`TransportUnavailable`, `MalformedReply`): the
//!   socket died or the reply frame could not be parsed. Convenience getters
//!   map these to a logged empty result so a running sweep can continue.
//! - **Missing-field failure** (`FieldMissing`): the reply was a valid
//!   envelope but lacked an expected key. This fails fast at the call site.
//!
//! `Rejected` covers a well-formed reply carrying an error object, and
//! `ConvergenceTimeout` is reported only when a poll cap has been injected
//! into the setpoint poller. `Config` and `Io` wrap the usual ambient
//! sources via `#[from]` so `?` works throughout.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, CommError>;

#[derive(Error, Debug)]
pub enum CommError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    #[error("Reply missing field '{0}'")]
    FieldMissing(String),

    #[error("Instrument rejected '{method}': {message}")]
    Rejected { method: String, message: String },

    #[error("Instrument '{instrument}' does not support: {methods:?}")]
    Unsupported {
        instrument: String,
        methods: Vec<String>,
    },

    #[error("Setpoint {target} not reached after {polls} polls")]
    ConvergenceTimeout { target: f64, polls: u64 },
}
