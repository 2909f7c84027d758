//! Error types for the sync engine.

use easync_protocol::{classify, Command, ParseError, StatusClass};
use easync_store::StoreError;
use easync_wbxml::WbxmlError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// How the caller should react to a failed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The payload is corrupt; retrying sends the same bytes back.
    Malformed,
    /// The payload does not have the expected shape.
    Structure,
    /// Run a folder sync, then retry.
    FolderListStale,
    /// Back off and retry the whole exchange.
    Transient,
    /// Give up; local state is as it was after the last commit.
    Fatal,
    /// The session was cancelled.
    Cancelled,
}

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The tag stream is corrupt.
    #[error("malformed stream: {0}")]
    MalformedStream(WbxmlError),

    /// The response is well formed but not shaped as expected.
    #[error("unexpected structure: {0}")]
    UnexpectedStructure(String),

    /// The server reported a non-success status.
    #[error("{command} failed with status {code}")]
    Status {
        /// Command that failed.
        command: Command,
        /// Protocol status code.
        code: i32,
    },

    /// The server's folder list changed; a folder sync is needed first.
    #[error("folder list is stale (status {status})")]
    FolderListStale {
        /// Protocol status code.
        status: i32,
    },

    /// A retryable failure without a protocol status.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The server answered with a non-success HTTP status.
    #[error("HTTP status {status}")]
    Http {
        /// HTTP status code.
        status: u16,
    },

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The store rejected a batch; nothing was applied.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates an unexpected-structure error.
    pub fn structure(message: impl Into<String>) -> Self {
        Self::UnexpectedStructure(message.into())
    }

    /// Classifies the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::MalformedStream(_) => ErrorClass::Malformed,
            SyncError::UnexpectedStructure(_) => ErrorClass::Structure,
            SyncError::Status { command, code } => match classify(*command, *code) {
                StatusClass::Transient => ErrorClass::Transient,
                StatusClass::FolderListStale => ErrorClass::FolderListStale,
                _ => ErrorClass::Fatal,
            },
            SyncError::FolderListStale { .. } => ErrorClass::FolderListStale,
            SyncError::Transient(_) => ErrorClass::Transient,
            // unauthorized, forbidden, device must provision
            SyncError::Http { status: 401 | 403 | 449 } => ErrorClass::Fatal,
            SyncError::Http { .. } => ErrorClass::Transient,
            SyncError::Transport { retryable, .. } => {
                if *retryable {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Fatal
                }
            }
            SyncError::Store(_) | SyncError::Config(_) => ErrorClass::Fatal,
            SyncError::Cancelled => ErrorClass::Cancelled,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Transient | ErrorClass::FolderListStale
        )
    }
}

impl From<ParseError> for SyncError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Malformed(e) => SyncError::MalformedStream(e),
            ParseError::UnexpectedStructure { message } => SyncError::UnexpectedStructure(message),
            other @ (ParseError::WrongRoot { .. } | ParseError::MissingScope { .. }) => {
                SyncError::Transient(other.to_string())
            }
        }
    }
}

impl From<WbxmlError> for SyncError {
    fn from(err: WbxmlError) -> Self {
        SyncError::MalformedStream(err)
    }
}
