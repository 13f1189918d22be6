use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for frame operations
///
/// Each kind names a category of failure so callers can decide whether a
/// failure is their own mistake (a malformed filter or indexer), a failure of
/// a user supplied transform function, or a storage problem they may retry.
///
/// # Examples
///
/// ```rust,ignore
/// use docframe::errors::{FrameError, ErrorKind, FrameResult};
///
/// fn example() -> FrameResult<()> {
///     Err(FrameError::new("unknown suffix 'between'", ErrorKind::InvalidFilter))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Caller errors
    /// Malformed predicate specification
    InvalidFilter,
    /// Unsupported `loc`/`iloc` specification
    IndexError,
    /// Operation the frame or view refuses to perform
    UnsupportedOperation,
    /// A column that is not part of the frame was requested
    UnknownColumn,
    /// An argument is outside of its accepted range
    InvalidArgument,

    // Transform errors
    /// A user function failed while processing a chunk
    ChunkProcessing,

    // Store errors, passed through unchanged
    /// Collection does not exist
    CollectionNotFound,
    /// Error from the storage backend
    BackendError,

    /// Error encoding or decoding a value
    EncodingError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidFilter => write!(f, "Invalid filter"),
            ErrorKind::IndexError => write!(f, "Index error"),
            ErrorKind::UnsupportedOperation => write!(f, "Unsupported operation"),
            ErrorKind::UnknownColumn => write!(f, "Unknown column"),
            ErrorKind::InvalidArgument => write!(f, "Invalid argument"),
            ErrorKind::ChunkProcessing => write!(f, "Chunk processing error"),
            ErrorKind::CollectionNotFound => write!(f, "Collection not found"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type for every fallible frame, view, store and transform operation.
///
/// `FrameError` carries a message, an [ErrorKind] and an optional cause so
/// that failures raised inside worker threads keep their original reason.
///
/// ```rust,ignore
/// use docframe::errors::{FrameError, ErrorKind};
///
/// let cause = FrameError::new("division by zero", ErrorKind::InternalError);
/// let err = FrameError::new_with_cause("chunk 3 failed", ErrorKind::ChunkProcessing, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct FrameError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<FrameError>>,
    backtrace: Atomic<Backtrace>,
}

impl FrameError {
    /// Creates a new `FrameError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        FrameError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `FrameError` chained to the error that caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: FrameError) -> Self {
        FrameError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&FrameError> {
        self.cause.as_deref()
    }

    /// Walks the cause chain and returns the innermost error.
    pub fn root_cause(&self) -> &FrameError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }
}

impl Display for FrameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for FrameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for FrameError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// `FrameResult<T>` is shorthand for `Result<T, FrameError>`.
pub type FrameResult<T> = Result<T, FrameError>;

impl From<anyhow::Error> for FrameError {
    fn from(err: anyhow::Error) -> Self {
        // keep the full anyhow context chain in the message
        FrameError::new(&format!("{:#}", err), ErrorKind::InternalError)
    }
}

impl From<regex::Error> for FrameError {
    fn from(err: regex::Error) -> Self {
        FrameError::new(
            &format!("Invalid regular expression: {}", err),
            ErrorKind::InvalidFilter,
        )
    }
}

impl From<rayon::ThreadPoolBuildError> for FrameError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        FrameError::new(
            &format!("Failed to build worker pool: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<std::fmt::Error> for FrameError {
    fn from(err: std::fmt::Error) -> Self {
        FrameError::new(&format!("Formatting error: {}", err), ErrorKind::InternalError)
    }
}

impl From<String> for FrameError {
    fn from(msg: String) -> Self {
        FrameError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for FrameError {
    fn from(msg: &str) -> Self {
        FrameError::new(msg, ErrorKind::InternalError)
    }
}
