use crate::{PageCursor, PostField, PostId};
use ::thiserror::Error;

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

/// Every failure a postbook operation can report. All of them are per-request;
/// none leaves the store or a [`crate::Pager`] in a partially updated state.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("retrieval failed: {message}")]
    Retrieval { message: String },

    #[error("backward page from {cursor} came back empty")]
    EmptyBoundary { cursor: PageCursor },

    #[error("post {post_id} not found or you do not have permission")]
    NotFound { post_id: PostId },

    #[error("{field} item {id} not found on post")]
    ItemNotFound { field: PostField, id: i64 },

    #[error("conflict: {message}")]
    Conflict { message: String },
}

impl Error {
    /// Failures a caller should show as a transient notice and allow to be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Retrieval { .. } | Self::EmptyBoundary { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::Retrieval { .. } => "RETRIEVAL",
            Self::EmptyBoundary { .. } => "EMPTY_BOUNDARY",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ItemNotFound { .. } => "ITEM_NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
        }
    }
}

impl From<StoreError> for Error {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Backend(message) => Self::Retrieval { message },
        }
    }
}

/// Input rejected before anything is sent to the store.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ValidationError {
    #[error("cursor must carry both created_at and id, only {present} was given")]
    PartialCursor { present: &'static str },

    #[error("malformed cursor token: {0}")]
    CursorToken(String),

    #[error("page limit must be positive")]
    ZeroLimit,

    #[error("page limit {limit} is too large, must be less than or equal to {max}")]
    LimitTooLarge { limit: u32, max: u32 },

    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("invalid field specified: {0}")]
    UnknownField(String),

    #[error("{given} data cannot be applied to the {expected} field")]
    FieldMismatch { expected: PostField, given: PostField },
}

/// Error payload returned by a [`crate::PostStore`] implementation.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum StoreError {
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    NotPositive { name: &'static str, value: String },

    #[error("{name} environment variable is not set")]
    Missing { name: &'static str },
}
