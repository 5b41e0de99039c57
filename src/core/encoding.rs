//! XML Encoding Detection
//!
//! The parser consumes UTF-8 only. This module recognises the byte-order
//! marks and UTF-16 byte patterns so that non-UTF-8 input is rejected up front
//! rather than misparsed, and strips a UTF-8 BOM.

use crate::error::{Result, XmlError};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Detect the encoding of XML input based on BOM or byte patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl XmlEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return XmlEncoding::Utf8;
        }

        match (input[0], input[1]) {
            // UTF-16 LE BOM: 0xFF 0xFE
            (0xFF, 0xFE) => XmlEncoding::Utf16Le,
            // UTF-16 BE BOM: 0xFE 0xFF
            (0xFE, 0xFF) => XmlEncoding::Utf16Be,
            // No BOM - '<' next to a zero byte
            (0x00, b'<') => XmlEncoding::Utf16Be,
            (b'<', 0x00) => XmlEncoding::Utf16Le,
            _ => XmlEncoding::Utf8,
        }
    }
}

/// Strip a leading UTF-8 BOM; refuse input that is not UTF-8
pub fn utf8_body(input: &[u8]) -> Result<&[u8]> {
    match XmlEncoding::detect(input) {
        XmlEncoding::Utf8 => Ok(input.strip_prefix(UTF8_BOM).unwrap_or(input)),
        other => Err(XmlError::format(
            format!("{other:?} input must be transcoded to UTF-8 before parsing"),
            0,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(XmlEncoding::detect(b"<a/>"), XmlEncoding::Utf8);
        assert_eq!(XmlEncoding::detect(&[0xFF, 0xFE, b'<', 0]), XmlEncoding::Utf16Le);
        assert_eq!(XmlEncoding::detect(&[0, b'<', 0, b'a']), XmlEncoding::Utf16Be);
        assert_eq!(XmlEncoding::detect(b""), XmlEncoding::Utf8);
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(utf8_body(b"\xEF\xBB\xBF<a/>").unwrap(), b"<a/>");
        assert_eq!(utf8_body(b"<a/>").unwrap(), b"<a/>");
        // Only a full BOM is stripped
        assert_eq!(utf8_body(b"\xEF\xBB<a/>").unwrap(), b"\xEF\xBB<a/>");
    }

    #[test]
    fn test_rejects_utf16() {
        assert!(utf8_body(&[0xFE, 0xFF, 0, b'<']).unwrap_err().is_format());
    }
}
