//! Error taxonomy shared across the ragweave workspace
//!
//! Every crate converts its local failures into [`RagError`] at its public
//! boundary. The closed [`ErrorKind`] set exists so the router and the
//! performance monitor can key off error categories without string matching.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, RagError>;

/// Workspace-wide error enum
#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("deadline exceeded: {message}")]
    Timeout { message: String },

    #[error("cancelled: {message}")]
    Cancelled { message: String },

    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("tool execution failed: {message}")]
    ToolExecution { message: String },

    #[error("embedding failure: {message}")]
    Embedding { message: String },

    #[error("generation failure: {message}")]
    Generation { message: String },

    #[error("index mismatch: {message}")]
    IndexMismatch { message: String },

    #[error("capacity exhausted: {message}")]
    Capacity { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Closed set of error categories for routing and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Timeout,
    Cancelled,
    Transport,
    ToolExecution,
    EmbeddingFailure,
    GenerationFailure,
    IndexMismatch,
    Capacity,
    Internal,
}

impl ErrorKind {
    /// Stable string form used in metrics labels and response metadata
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Transport => "transport",
            Self::ToolExecution => "tool_execution",
            Self::EmbeddingFailure => "embedding_failure",
            Self::GenerationFailure => "generation_failure",
            Self::IndexMismatch => "index_mismatch",
            Self::Capacity => "capacity",
            Self::Internal => "internal",
        }
    }

    /// Informativeness ranking used when the router must pick one error out
    /// of several path failures. Higher wins: a timeout tells the caller
    /// more than a generic transport error, which tells more than
    /// "something broke internally".
    #[must_use]
    const fn informativeness(self) -> u8 {
        match self {
            Self::Internal => 0,
            Self::Capacity => 1,
            Self::EmbeddingFailure | Self::GenerationFailure => 2,
            Self::ToolExecution => 3,
            Self::Transport => 4,
            Self::NotFound | Self::IndexMismatch | Self::InvalidArgument => 5,
            Self::Cancelled => 6,
            Self::Timeout => 7,
        }
    }

    /// Pick the more informative of two kinds
    #[must_use]
    pub fn more_informative(self, other: Self) -> Self {
        if other.informativeness() > self.informativeness() {
            other
        } else {
            self
        }
    }
}

impl RagError {
    /// Categorize this error into the closed kind set
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::ToolExecution { .. } => ErrorKind::ToolExecution,
            Self::Embedding { .. } => ErrorKind::EmbeddingFailure,
            Self::Generation { .. } => ErrorKind::GenerationFailure,
            Self::IndexMismatch { .. } => ErrorKind::IndexMismatch,
            Self::Capacity { .. } => ErrorKind::Capacity,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether a single retry after reconnection is permitted for this error
    ///
    /// `InvalidArgument` and `IndexMismatch` are never retried; retrying a
    /// cancelled or timed-out call would overrun the caller's deadline.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::ToolExecution { .. } | Self::Capacity { .. }
        )
    }

    /// Construct an error of a given kind, e.g. when re-raising the most
    /// informative of several path failures
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::InvalidArgument => Self::InvalidArgument { message },
            ErrorKind::NotFound => Self::NotFound { message },
            ErrorKind::Timeout => Self::Timeout { message },
            ErrorKind::Cancelled => Self::Cancelled { message },
            ErrorKind::Transport => Self::Transport { message },
            ErrorKind::ToolExecution => Self::ToolExecution { message },
            ErrorKind::EmbeddingFailure => Self::Embedding { message },
            ErrorKind::GenerationFailure => Self::Generation { message },
            ErrorKind::IndexMismatch => Self::IndexMismatch { message },
            ErrorKind::Capacity => Self::Capacity { message },
            ErrorKind::Internal => Self::Internal { message },
        }
    }

    /// Shorthand constructor for [`RagError::InvalidArgument`]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`RagError::NotFound`]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`RagError::Timeout`]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`RagError::Cancelled`]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`RagError::Transport`]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`RagError::ToolExecution`]
    pub fn tool_execution(message: impl Into<String>) -> Self {
        Self::ToolExecution {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`RagError::Embedding`]
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`RagError::Generation`]
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`RagError::IndexMismatch`]
    pub fn index_mismatch(message: impl Into<String>) -> Self {
        Self::IndexMismatch {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`RagError::Capacity`]
    pub fn capacity(message: impl Into<String>) -> Self {
        Self::Capacity {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`RagError::Internal`]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        let err = RagError::timeout("speculative path");
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.kind().as_str(), "timeout");
    }

    #[test]
    fn test_timeout_beats_transport_beats_internal() {
        assert_eq!(
            ErrorKind::Internal.more_informative(ErrorKind::Transport),
            ErrorKind::Transport
        );
        assert_eq!(
            ErrorKind::Transport.more_informative(ErrorKind::Timeout),
            ErrorKind::Timeout
        );
        assert_eq!(
            ErrorKind::Timeout.more_informative(ErrorKind::Internal),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_never_retried_kinds() {
        assert!(!RagError::invalid_argument("bad top_k").is_retryable());
        assert!(!RagError::index_mismatch("cosine vs l2").is_retryable());
        assert!(RagError::transport("pipe closed").is_retryable());
        assert!(RagError::tool_execution("tool crashed").is_retryable());
    }
}
