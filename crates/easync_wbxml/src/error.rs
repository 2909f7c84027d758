//! Error types for the codec crate.

use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type WbxmlResult<T> = Result<T, WbxmlError>;

/// Errors raised while reading or writing a tag stream.
///
/// Every variant describes a malformed (or unwritable) stream; callers that
/// classify failures treat the whole enum as "malformed stream".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WbxmlError {
    /// The stream ended before the header or an open tag was complete.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// The stream ended while tags were still open.
    #[error("truncated stream: {open} tag(s) still open")]
    Truncated {
        /// Number of tags left open.
        open: usize,
    },

    /// A page-switch token named a page the code-page table does not define.
    #[error("unknown code page {page}")]
    UnknownPage {
        /// The page index found in the stream.
        page: u8,
    },

    /// A global token this codec does not support (literals, extensions, PIs).
    #[error("unsupported token 0x{token:02x}")]
    UnsupportedToken {
        /// The token byte.
        token: u8,
    },

    /// A tag token carried the attribute bit.
    #[error("attributes are not supported (tag token 0x{token:02x})")]
    AttributesUnsupported {
        /// The tag token byte.
        token: u8,
    },

    /// Inline or table string was not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// A multi-byte integer did not fit in 32 bits.
    #[error("integer overflow")]
    IntegerOverflow,

    /// An END token arrived with no open tag.
    #[error("END token without an open tag")]
    UnbalancedEnd,

    /// Content appeared after the root element closed.
    #[error("content outside the root element")]
    ContentOutsideRoot,

    /// A string-table reference pointed outside the table.
    #[error("string table offset {offset} out of range")]
    StringTableOffset {
        /// The referenced offset.
        offset: u32,
    },

    /// An entity token carried an invalid character code.
    #[error("invalid entity code {code}")]
    InvalidEntity {
        /// The character code.
        code: u32,
    },

    /// A length prefix exceeded the decoder's limit.
    #[error("size limit exceeded: {actual} > {limit}")]
    SizeLimitExceeded {
        /// The configured limit.
        limit: u32,
        /// The length found in the stream.
        actual: u32,
    },

    /// A tag id outside the encodable range was written.
    #[error("invalid tag id 0x{id:02x}")]
    InvalidTagId {
        /// The offending id.
        id: u8,
    },

    /// Inline text cannot contain NUL.
    #[error("text contains an embedded NUL byte")]
    EmbeddedNul,

    /// `done()` was called with open tags.
    #[error("document closed with {depth} unclosed tag(s)")]
    UnclosedTags {
        /// Number of tags still open.
        depth: usize,
    },

    /// The underlying reader failed.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O failure.
        message: String,
    },
}

impl WbxmlError {
    /// Create an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

impl From<io::Error> for WbxmlError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::UnexpectedEof,
            _ => Self::io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_eof_maps_to_unexpected_eof() {
        let err: WbxmlError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert_eq!(err, WbxmlError::UnexpectedEof);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            WbxmlError::UnknownPage { page: 42 }.to_string(),
            "unknown code page 42"
        );
        assert_eq!(
            WbxmlError::UnsupportedToken { token: 0x04 }.to_string(),
            "unsupported token 0x04"
        );
    }
}
