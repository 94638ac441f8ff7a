//! Error types for animation setup.
//!
//! Frame work never surfaces errors; these cover construction paths
//! (parsing options, naming easings) and collaborator failures that callers
//! may want to inspect before they are logged and swallowed.

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AnimationError {
    /// Easing name not in the definition table
    #[error("Unknown easing: {name}")]
    UnknownEasing { name: String },

    /// Options that cannot describe an animation
    #[error("Invalid animation options: {reason}")]
    InvalidOptions { reason: String },

    /// Keyframes that cannot be interpolated
    #[error("Cannot animate '{name}' from {from} to {to}")]
    NotAnimatable {
        name: String,
        from: String,
        to: String,
    },

    /// Failure reported by the native animation collaborator
    #[error("Native animation error: {reason}")]
    Native { reason: String },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl AnimationError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            reason: reason.into(),
        }
    }

    /// Whether the engine degrades gracefully from this error.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotAnimatable { .. } | Self::Native { .. })
    }

    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownEasing { .. } => "easing",
            Self::InvalidOptions { .. } => "options",
            Self::NotAnimatable { .. } => "keyframes",
            Self::Native { .. } => "native",
            Self::Serialization { .. } => "serialization",
        }
    }
}

pub type Result<T> = core::result::Result<T, AnimationError>;
