//! Error types for reconciliation operations.
//!
//! Errors are categorized so the engine can decide what survives a pass:
//! transient fetch failures are retried, actuation and state-sync failures
//! are logged per resource and retried naturally on the next pass, and
//! config errors abort only the current pass.

use thiserror::Error;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors.
///
/// No category crashes the daemon; the category determines whether the
/// current pass keeps going and whether an immediate retry is worthwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or unreadable desired-state file. Aborts the pass.
    Config,
    /// Platform listing call failed or came back empty. Retried with
    /// bounded attempts, then aborts the pass.
    Transient,
    /// A single create/start/delete call failed. That resource is skipped,
    /// the pass continues.
    Actuation,
    /// A state-store operation failed. Logged; imports are idempotent by
    /// address so a later pass repairs the store.
    StateSync,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is worth retrying within the same pass.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Whether a failure of this category aborts the current pass.
    #[must_use]
    pub fn aborts_pass(self) -> bool {
        matches!(self, Self::Config | Self::Transient)
    }
}

/// Error type for all reconciliation operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Desired-state file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Topology failed schema validation.
    #[error("validation failed:\n - {}", .0.join("\n - "))]
    Validation(Vec<String>),

    /// Platform returned a non-2xx response; carries the response body.
    #[error("API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// Transport-level HTTP failure (connect, DNS, read).
    #[error("HTTP transport error: {0}")]
    Transport(String),

    /// Node listing stayed empty through every retry attempt.
    #[error("no nodes visible in project after {attempts} attempts")]
    EmptyListing {
        /// Number of fetch attempts made.
        attempts: u32,
    },

    /// No global template matches the requested name.
    #[error("template {0:?} does not exist on the platform")]
    TemplateNotFound(String),

    /// Project name has no counterpart on the platform.
    #[error("project {0:?} not found on the platform")]
    ProjectNotFound(String),

    /// Create response did not carry a remote ID.
    #[error("create response for {resource} is missing a remote id")]
    MissingRemoteId {
        /// Resource the create call was for.
        resource: String,
    },

    /// Infra-state store command failed.
    #[error("state store operation on {address} failed: {message}")]
    StateSync {
        /// Tracked address the operation targeted.
        address: String,
        /// Captured command output.
        message: String,
    },
}

impl Error {
    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::Validation(_) => ErrorCategory::Config,
            Error::Api { .. } | Error::Transport(_) | Error::EmptyListing { .. } => {
                ErrorCategory::Transient
            }
            Error::TemplateNotFound(_) | Error::MissingRemoteId { .. } => ErrorCategory::Actuation,
            Error::StateSync { .. } => ErrorCategory::StateSync,
            Error::ProjectNotFound(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is worth retrying within the same pass.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Api {
                status: code,
                body: String::new(),
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        let err = Error::Api {
            status: 503,
            body: "busy".into(),
        };
        assert!(err.is_retryable());
        assert!(err.category().aborts_pass());
    }

    #[test]
    fn actuation_errors_continue_the_pass() {
        let err = Error::TemplateNotFound("ubuntu-server".into());
        assert!(!err.is_retryable());
        assert!(!err.category().aborts_pass());
    }

    #[test]
    fn validation_error_lists_every_problem() {
        let err = Error::Validation(vec!["project.name is required".into(), "x".into()]);
        let text = err.to_string();
        assert!(text.contains("project.name is required"));
        assert!(text.contains("\n - x"));
    }
}
