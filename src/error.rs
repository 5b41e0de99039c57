//! Crate error type
//!
//! Every failure in the parser and its primitives surfaces as an [`XmlError`].
//! Parse failures abort the whole pass; nothing partial is returned.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, XmlError>;

/// Errors produced by parsing, navigation and the string/entity primitives
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XmlError {
    /// Malformed input. `offset` is the byte position where the parser stopped.
    #[error("{message} (at byte {offset})")]
    Format { message: String, offset: usize },

    /// An arena would grow past the number of items it can address
    #[error("arena capacity exceeded: at most {max} items")]
    CapacityExceeded { max: usize },

    /// A slice request fell outside the view
    #[error("range {start}+{len} out of bounds for length {available}")]
    OutOfRange {
        start: usize,
        len: usize,
        available: usize,
    },

    /// API misuse, e.g. asking for the position of a foreign view
    #[error("invalid argument: {0}")]
    Argument(&'static str),

    /// The output buffer handed to the entity resolver is too short
    #[error("buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall { required: usize, available: usize },

    /// Entity resolution was forced on a string that cannot be resolved
    #[error("string contains entity references that cannot be resolved")]
    CannotResolve,

    /// Numeric parse failure (bad grammar or overflow)
    #[error("invalid {kind}: {text:?}")]
    InvalidNumber { kind: &'static str, text: String },
}

impl XmlError {
    /// Build a format error at a byte offset
    pub fn format(message: impl Into<String>, offset: usize) -> Self {
        XmlError::Format {
            message: message.into(),
            offset,
        }
    }

    /// True for malformed-input failures
    pub fn is_format(&self) -> bool {
        matches!(self, XmlError::Format { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_display() {
        let err = XmlError::format("Tag mismatch", 12);
        assert_eq!(err.to_string(), "Tag mismatch (at byte 12)");
        assert!(err.is_format());
    }

    #[test]
    fn test_capacity_display() {
        let err = XmlError::CapacityExceeded { max: 16 };
        assert!(!err.is_format());
        assert_eq!(err.to_string(), "arena capacity exceeded: at most 16 items");
    }
}
