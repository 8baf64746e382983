//! Error types shared by the dispatcher and the batch runner.

use thiserror::Error;

/// Result type alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown subcommand, missing positional, unknown option or a value its
    /// converter rejected. Raised before anything is invoked.
    #[error("invalid argument '{token}': {reason}")]
    InvalidArgument { token: String, reason: String },

    /// A single batch entry could not be launched (or invoked).
    #[error("failed to execute '{command}': {reason}")]
    ExecutionFailed { command: String, reason: String },

    /// The host allow-list excluded the current machine.
    #[error("skipped on host '{host}'")]
    HostSkipped { host: String },

    /// A command descriptor failed validation at registration time.
    #[error("invalid registration for '{name}': {reason}")]
    Registration { name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            token: token.into(),
            reason: reason.into(),
        }
    }

    pub fn registration(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Registration {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(command: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::ExecutionFailed {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_names_token() {
        let err = Error::invalid("frobnicate", "unknown subcommand");
        assert!(err.is_invalid_argument());
        assert_eq!(
            err.to_string(),
            "invalid argument 'frobnicate': unknown subcommand"
        );
    }

    #[test]
    fn execution_failed_display() {
        let err = Error::execution("does-not-exist", "No such file or directory");
        assert!(!err.is_invalid_argument());
        assert!(err.to_string().starts_with("failed to execute 'does-not-exist'"));
    }
}
