//! Error taxonomy for remote resolution and activation
//!
//! A [`RemoteError`] is tagged by the stage at which the remote failed:
//! manifest resolution, code loading, or activation. The stage selects
//! user-facing messaging at the slot boundary. Stylesheet failures are a
//! separate category ([`StylesheetError`]) and are never fatal.

use crate::context::Environment;
use std::error::Error as StdError;
use thiserror::Error;

/// Boxed underlying cause attached to a [`RemoteError`].
pub type ErrorCause = Box<dyn StdError + Send + Sync + 'static>;

/// The stage at which a remote failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    /// The manifest could not be fetched or did not contain the remote.
    ManifestResolution,
    /// The remote's code could not be loaded, timed out, exhausted its
    /// retries, or failed contract validation.
    Load,
    /// The remote's own activation call failed.
    Activation,
}

/// Error raised while resolving, loading, or activating a remote.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{message}")]
    ManifestResolution {
        message: String,
        #[source]
        cause: Option<ErrorCause>,
    },

    #[error("{message}")]
    Load {
        message: String,
        #[source]
        cause: Option<ErrorCause>,
    },

    #[error("{message}")]
    Activation {
        message: String,
        #[source]
        cause: Option<ErrorCause>,
    },
}

impl RemoteError {
    /// Manifest-resolution failure without an underlying cause.
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::ManifestResolution {
            message: message.into(),
            cause: None,
        }
    }

    /// Manifest-resolution failure wrapping an underlying cause.
    pub fn manifest_with(message: impl Into<String>, cause: impl Into<ErrorCause>) -> Self {
        Self::ManifestResolution {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// Load failure without an underlying cause.
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
            cause: None,
        }
    }

    /// Load failure wrapping an underlying cause.
    pub fn load_with(message: impl Into<String>, cause: impl Into<ErrorCause>) -> Self {
        Self::Load {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// Activation failure without an underlying cause.
    pub fn activation(message: impl Into<String>) -> Self {
        Self::Activation {
            message: message.into(),
            cause: None,
        }
    }

    /// Activation failure wrapping an underlying cause.
    pub fn activation_with(message: impl Into<String>, cause: impl Into<ErrorCause>) -> Self {
        Self::Activation {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// The stage at which this error occurred.
    pub fn stage(&self) -> ErrorStage {
        match self {
            Self::ManifestResolution { .. } => ErrorStage::ManifestResolution,
            Self::Load { .. } => ErrorStage::Load,
            Self::Activation { .. } => ErrorStage::Activation,
        }
    }

    /// The message to display for this error in the given environment.
    ///
    /// Development environments see the full underlying message; everywhere
    /// else a generic message is shown and the cause stays in the logs.
    pub fn user_message(&self, environment: Environment) -> String {
        match environment {
            Environment::Development => self.to_string(),
            _ => "This section is temporarily unavailable.".to_string(),
        }
    }
}

/// Failure to load a stylesheet resource.
///
/// Always non-fatal: a missing stylesheet must never block code activation.
/// Callers log this and continue.
#[derive(Debug, Clone, Error)]
#[error("Failed to load stylesheet {address}: {message}")]
pub struct StylesheetError {
    /// The stylesheet address that failed to load.
    pub address: String,
    /// Description of the failure reported by the sink.
    pub message: String,
}

impl StylesheetError {
    pub fn new(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            message: message.into(),
        }
    }
}
