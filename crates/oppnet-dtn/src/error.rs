//! DTN-specific error types

use thiserror::Error;

/// Errors that can occur in the decision-engine subsystem
#[derive(Debug, Error)]
pub enum DtnError {
    /// A hook was misused
    #[error("Engine error: {0}")]
    Engine(#[from] oppnet_core::EngineError),

    /// Engine configuration is missing or invalid
    #[error("Config error: {0}")]
    Config(#[from] oppnet_core::ConfigError),

    /// Node identity could not be parsed
    #[error("Identity error: {0}")]
    Identity(#[from] oppnet_core::IdentityError),
}

/// Result type for DTN operations
pub type DtnResult<T> = Result<T, DtnError>;
