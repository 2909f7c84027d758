//! Error types for protocol parsing.

use easync_wbxml::{Tag, WbxmlError};
use thiserror::Error;

/// Result type for protocol parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors raised while parsing a command response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The byte stream itself is corrupt.
    #[error("malformed stream: {0}")]
    Malformed(#[from] WbxmlError),

    /// The document is well formed but not shaped as expected.
    #[error("unexpected structure: {message}")]
    UnexpectedStructure {
        /// What was wrong.
        message: String,
    },

    /// The document root is not the command's root tag.
    #[error("expected root {expected}, found {found}")]
    WrongRoot {
        /// Root the parser expected.
        expected: Tag,
        /// Root actually present, or "nothing".
        found: String,
    },

    /// A parser asked to iterate a scope that is not open.
    #[error("scope {tag} is not open")]
    MissingScope {
        /// The scope's end tag.
        tag: Tag,
    },
}

impl ParseError {
    /// Creates an unexpected-structure error.
    pub fn structure(message: impl Into<String>) -> Self {
        Self::UnexpectedStructure {
            message: message.into(),
        }
    }

    /// Returns true if retrying the whole exchange may succeed.
    ///
    /// A wrong root or missing scope usually means a truncated or proxied
    /// response; a corrupt stream or a value of the wrong type does not go
    /// away on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WrongRoot { .. } | Self::MissingScope { .. })
    }
}
