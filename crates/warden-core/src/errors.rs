//! Unified error type for the Warden workflow
//!
//! A single error enum covers every failure the guardian recovery workflow can
//! surface. Workflow-specific kinds (sign-in, authentication, submission) sit
//! next to generic kinds used by collaborator bindings.

use serde::{Deserialize, Serialize};

/// Unified error type for all Warden operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum WardenError {
    /// The identity provider returned no assertion after the redirect
    #[error("Identity unavailable: {message}")]
    IdentityUnavailable {
        /// What the identity provider reported
        message: String,
    },

    /// Key issuance produced no usable signer key
    #[error("Mint failed: {message}")]
    MintFailed {
        /// Why the minted key was unusable
        message: String,
    },

    /// An action that needs a guardian signer ran before sign-in
    #[error("Not authenticated: {message}")]
    NotAuthenticated {
        /// Which action was attempted
        message: String,
    },

    /// The bundler or the contract rejected a submitted operation
    #[error("Operation failed: {reason}")]
    OperationFailed {
        /// Reason supplied by the bundler, opaque to the workflow
        reason: String,
    },

    /// Finalization was attempted before the module's grace period ended
    #[error("Grace period not elapsed: {reason}")]
    GracePeriodNotElapsed {
        /// Revert reason reported by the module
        reason: String,
    },

    /// The same action is already running for this session
    #[error("Action already in progress: {action}")]
    ActionInProgress {
        /// Name of the running action
        action: String,
    },

    /// A configuration value is missing or malformed
    #[error("Configuration error: {message}")]
    Config {
        /// Which key failed and how to supply it
        message: String,
    },

    /// Invalid input
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// An external collaborator could not be reached or answered garbage
    #[error("External error: {message}")]
    External {
        /// Error message describing the collaborator failure
        message: String,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl WardenError {
    /// Create an identity unavailable error
    pub fn identity_unavailable(message: impl Into<String>) -> Self {
        Self::IdentityUnavailable {
            message: message.into(),
        }
    }

    /// Create a mint failed error
    pub fn mint_failed(message: impl Into<String>) -> Self {
        Self::MintFailed {
            message: message.into(),
        }
    }

    /// Create a not authenticated error
    pub fn not_authenticated(message: impl Into<String>) -> Self {
        Self::NotAuthenticated {
            message: message.into(),
        }
    }

    /// Create an operation failed error
    pub fn operation_failed(reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            reason: reason.into(),
        }
    }

    /// Create a grace period error
    pub fn grace_period_not_elapsed(reason: impl Into<String>) -> Self {
        Self::GracePeriodNotElapsed {
            reason: reason.into(),
        }
    }

    /// Create an action in progress error
    pub fn action_in_progress(action: impl Into<String>) -> Self {
        Self::ActionInProgress {
            action: action.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an external collaborator error
    pub fn external(message: impl Into<String>) -> Self {
        Self::External {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error came from a rejected submission
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::OperationFailed { .. } | Self::GracePeriodNotElapsed { .. }
        )
    }
}

/// Standard Result type for Warden operations
pub type WardenResult<T> = std::result::Result<T, WardenError>;

impl From<std::io::Error> for WardenError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<serde_json::Error> for WardenError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid(format!("JSON: {err}"))
    }
}

impl From<toml::de::Error> for WardenError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<alloy_sol_types::Error> for WardenError {
    fn from(err: alloy_sol_types::Error) -> Self {
        Self::invalid(format!("ABI: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = WardenError::not_authenticated("add_guardian");
        assert!(matches!(err, WardenError::NotAuthenticated { .. }));
        assert_eq!(err.to_string(), "Not authenticated: add_guardian");
    }

    #[test]
    fn test_rejection_kinds() {
        assert!(WardenError::operation_failed("AA24").is_rejection());
        assert!(WardenError::grace_period_not_elapsed("pending").is_rejection());
        assert!(!WardenError::mint_failed("empty key").is_rejection());
    }

    #[test]
    fn test_error_roundtrips_through_json() {
        let err = WardenError::action_in_progress("begin_recovery");
        let json = serde_json::to_string(&err).unwrap();
        let back: WardenError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
