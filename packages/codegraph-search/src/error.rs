//! The core's closed error taxonomy (kinds, not type names).
//!
//! Every suspension point in the reload/query paths returns a `SearchError`
//! rather than a bag of ad hoc failure types, so callers can classify without
//! downcasting: `is_user_error()` decides whether to show the message back
//! to the caller verbatim or to fold it into an internal failure.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    /// Caller cancelled via its `CancellationToken`.
    #[error("operation cancelled")]
    Cancelled,

    /// Store not found / not initialized.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// On-disk data failed structural validation.
    #[error("store corrupt: {0}")]
    StoreCorrupt(String),

    /// Embedding provider failed.
    #[error("embedding provider failed: {0}")]
    Provider(String),

    /// A vector or text backend call failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Caller supplied bad arguments.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Operation exceeded its budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Unclassified; surfaces as a 5xx-equivalent.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SearchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::Cancelled => ErrorKind::Cancelled,
            SearchError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            SearchError::StoreCorrupt(_) => ErrorKind::StoreCorrupt,
            SearchError::Provider(_) => ErrorKind::Provider,
            SearchError::Backend(_) => ErrorKind::Backend,
            SearchError::Validation(_) => ErrorKind::Validation,
            SearchError::Timeout(_) => ErrorKind::Timeout,
            SearchError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// User errors are returned to the caller verbatim; everything else is
    /// folded into an internal failure at the protocol boundary.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Timeout | ErrorKind::Cancelled
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Cancelled)
    }
}

/// Stable, serializable name for a `SearchError` variant — used by metrics
/// and logs where the error needs a short tag rather than its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    Cancelled,
    StoreUnavailable,
    StoreCorrupt,
    Provider,
    Backend,
    Validation,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::StoreCorrupt => "store_corrupt",
            ErrorKind::Provider => "provider",
            ErrorKind::Backend => "backend",
            ErrorKind::Validation => "validation",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "cancelled" => ErrorKind::Cancelled,
            "store_unavailable" => ErrorKind::StoreUnavailable,
            "store_corrupt" => ErrorKind::StoreCorrupt,
            "provider" => ErrorKind::Provider,
            "backend" => ErrorKind::Backend,
            "validation" => ErrorKind::Validation,
            "timeout" => ErrorKind::Timeout,
            "internal" => ErrorKind::Internal,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<codegraph_storage::StorageError> for SearchError {
    fn from(err: codegraph_storage::StorageError) -> Self {
        use codegraph_storage::error::ErrorKind as StoreErrorKind;
        match err.kind {
            StoreErrorKind::Database | StoreErrorKind::IO => {
                SearchError::StoreUnavailable(err.to_string())
            }
            StoreErrorKind::Serialization => SearchError::StoreCorrupt(err.to_string()),
        }
    }
}
