//! Error types for the authorization gate

use std::{fmt, io};

use thiserror::Error;

use crate::cluster::ClusterError;
use crate::gate::ActionDescriptor;

/// Result type alias for the gate
pub type Result<T> = std::result::Result<T, Error>;

/// Gate errors
///
/// Every variant maps onto a stable [`ErrorCode`] that callers can match on
/// without parsing messages.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing context, missing credential, or a credential that failed the probe
    #[error("Unauthenticated.")]
    Unauthenticated,

    /// Credential is valid but the requested action was refused
    #[error("Permission denied. {action}. Source: {cause}")]
    PermissionDenied {
        /// The action the caller asked about
        action: ActionDescriptor,
        /// Why the action was refused
        cause: String,
    },

    /// The cluster has no onboarded namespaces
    #[error("Configuration fault: {0}")]
    ConfigurationFault(String),

    /// The RBAC authority failed while answering a question about `action`
    #[error("Authorization check failed. {action}. Source: {source}")]
    Authorization {
        /// The action being checked
        action: ActionDescriptor,
        /// Collaborator failure
        #[source]
        source: ClusterError,
    },

    /// Unclassified collaborator failure
    #[error("Upstream error: {0}")]
    Upstream(#[from] ClusterError),

    /// The request itself could not be understood
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration loading error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable code for this error
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthenticated => ErrorCode::Unauthenticated,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::ConfigurationFault(_) => ErrorCode::ConfigurationFault,
            Self::Authorization { .. } | Self::Upstream(_) => ErrorCode::Upstream,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Build a `PermissionDenied` error for `action`
    pub fn permission_denied(action: &ActionDescriptor, cause: impl Into<String>) -> Self {
        Self::PermissionDenied {
            action: action.clone(),
            cause: cause.into(),
        }
    }
}

/// Stable error codes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No usable credential
    Unauthenticated,
    /// Valid credential, action refused
    PermissionDenied,
    /// Operational misconfiguration of the cluster
    ConfigurationFault,
    /// Collaborator failure, cause preserved
    Upstream,
    /// Malformed request body
    InvalidRequest,
    /// Failure inside this process
    Internal,
}

impl ErrorCode {
    /// Wire representation of the code
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ConfigurationFault => "CONFIGURATION_FAULT",
            Self::Upstream => "UPSTREAM",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
