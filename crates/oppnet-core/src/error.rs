//! Error types for Oppnet

use thiserror::Error;

/// Errors related to node identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid identity format: {0}")]
    InvalidFormat(String),
}

/// Errors raised while a decision hook runs
///
/// These are usage errors, not runtime conditions to recover from. The
/// framework is expected to stop the run when one surfaces, since the
/// rank or quota state of the involved nodes can no longer be trusted.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Message {message} carries no copy quota")]
    MissingCopyQuota { message: String },

    #[error("Peer policy mismatch: local engine is {local}, peer engine is {peer}")]
    FamilyMismatch { local: String, peer: String },
}

/// Errors related to engine configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {key}")]
    Missing { key: String },

    #[error("Malformed setting {key} = {value:?} (expected {expected})")]
    Malformed {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Setting {key} out of range: {reason}")]
    OutOfRange { key: String, reason: String },

    #[error("Unknown router: {0}")]
    UnknownRouter(String),

    #[error("Settings parse error: {0}")]
    Parse(String),
}

/// Result type for decision hooks
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::MissingCopyQuota {
            message: "M7".to_string(),
        };
        assert!(format!("{}", err).contains("M7"));
        assert!(format!("{}", err).contains("copy quota"));

        let err = EngineError::FamilyMismatch {
            local: "spray-and-wait".to_string(),
            peer: "people-rank".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("spray-and-wait"));
        assert!(msg.contains("people-rank"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Missing {
            key: "PeopleRankRouter.dampingFactor".to_string(),
        };
        assert!(format!("{}", err).contains("PeopleRankRouter.dampingFactor"));

        let err = ConfigError::Malformed {
            key: "SprayAndWaitRouter.nrofCopies".to_string(),
            value: "many".to_string(),
            expected: "unsigned integer",
        };
        let msg = format!("{}", err);
        assert!(msg.contains("\"many\""));
        assert!(msg.contains("unsigned integer"));

        let err = ConfigError::UnknownRouter("EpidemicRouter".to_string());
        assert!(format!("{}", err).contains("EpidemicRouter"));
    }
}
