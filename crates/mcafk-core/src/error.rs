//! Error types for mcafk-core.

use thiserror::Error;

/// Main error type for mcafk operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol violation or malformed adapter message.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Configuration file failed validation.
    #[error("config error at {field}: {message}")]
    Config { field: String, message: String },

    /// The packet link was shut down.
    #[error("link closed")]
    LinkClosed,

    /// The remote session has not reached the spawned state.
    #[error("{predictor}: remote session not spawned")]
    NotSpawned { predictor: &'static str },

    /// A predictor failed to start.
    #[error("predictor {name} failed to start: {message}")]
    PredictorStart {
        name: &'static str,
        message: String,
    },

    /// One or more predictors failed during teardown.
    ///
    /// Collected after every member has been attempted, so a failing member
    /// never blocks the teardown of the rest.
    #[error("teardown failed for {}: {}", .failures.len(), .failures.join("; "))]
    Teardown { failures: Vec<String> },

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,
}

impl Error {
    /// Returns true if this error is transient and retrying may help.
    ///
    /// Transient errors cover link interruptions where the remote session
    /// may still be alive and a restart could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::LinkClosed | Error::Timeout | Error::Io(_) | Error::NotSpawned { .. }
        )
    }

    /// Returns true if this error is fatal and retrying won't help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config { .. } | Error::Protocol { .. })
    }

    /// Shorthand for a protocol error with a message.
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    /// Shorthand for a config error with a field path and message.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Convenience result type for mcafk operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_protocol() {
        let err = Error::protocol("unknown adapter message");
        assert_eq!(err.to_string(), "protocol error: unknown adapter message");
    }

    #[test]
    fn error_display_config() {
        let err = Error::config("minecraft.account.username", "too short");
        assert_eq!(
            err.to_string(),
            "config error at minecraft.account.username: too short"
        );
    }

    #[test]
    fn error_display_not_spawned() {
        let err = Error::NotSpawned {
            predictor: "position",
        };
        assert_eq!(err.to_string(), "position: remote session not spawned");
    }

    #[test]
    fn error_display_teardown_joins_failures() {
        let err = Error::Teardown {
            failures: vec!["vitals: link closed".into(), "combat: timeout".into()],
        };
        assert_eq!(
            err.to_string(),
            "teardown failed for 2: vitals: link closed; combat: timeout"
        );
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn transient_errors() {
        assert!(Error::LinkClosed.is_transient());
        assert!(Error::Timeout.is_transient());
        assert!(Error::NotSpawned { predictor: "p" }.is_transient());
        assert!(Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset"
        ))
        .is_transient());

        assert!(!Error::protocol("bad").is_transient());
        assert!(!Error::config("f", "bad").is_transient());
    }

    #[test]
    fn fatal_errors() {
        assert!(Error::protocol("bad").is_fatal());
        assert!(Error::config("f", "bad").is_fatal());

        assert!(!Error::LinkClosed.is_fatal());
        assert!(!Error::Timeout.is_fatal());
        assert!(!Error::Teardown { failures: vec![] }.is_fatal());
    }
}
