//! XML Attribute Parsing
//!
//! Reads `name = "value"` pairs from a tag. Used for element attributes and
//! the pseudo-attributes of the XML declaration.

use super::scanner::Scanner;
use super::view::StringView;
use crate::error::{Result, XmlError};

/// An attribute as it appears in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAttribute<'a> {
    pub name: StringView<'a>,
    /// Value between the quotes, entities left unresolved
    pub value: StringView<'a>,
}

/// Read one attribute at the scanner position.
///
/// Whitespace is allowed on both sides of `=`; the value may use either quote.
pub fn read_attribute<'a>(scanner: &mut Scanner<'a>) -> Result<RawAttribute<'a>> {
    let name = scanner.read_name();
    if name.is_empty() {
        return Err(XmlError::format("Attribute name expected", scanner.position()));
    }

    scanner.skip_whitespace();
    if !scanner.eat(b"=") {
        return Err(XmlError::format(
            format!("Attribute '{name}' has no value"),
            scanner.position(),
        ));
    }
    scanner.skip_whitespace();

    let value = scanner.read_quoted().ok_or_else(|| {
        XmlError::format(
            format!("Attribute '{name}' value must be a quoted string"),
            scanner.position(),
        )
    })?;

    Ok(RawAttribute { name, value })
}

/// `xmlns` or `xmlns:*`
#[inline]
pub fn is_namespace_declaration(name: StringView<'_>) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

/// Split a name into prefix and local name at the colon
pub fn split_name(name: StringView<'_>) -> (Option<StringView<'_>>, StringView<'_>) {
    match name.split2(b':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(input: &str) -> Result<RawAttribute<'_>> {
        read_attribute(&mut Scanner::new(input.as_bytes()))
    }

    #[test]
    fn test_simple_attribute() {
        let attr = read("id=\"main\"").unwrap();
        assert_eq!(attr.name, "id");
        assert_eq!(attr.value, "main");
    }

    #[test]
    fn test_flexible_whitespace_and_quotes() {
        let attr = read("title \n=\t'say \"hi\"'").unwrap();
        assert_eq!(attr.name, "title");
        assert_eq!(attr.value, "say \"hi\"");
    }

    #[test]
    fn test_missing_value() {
        let err = read("disabled>").unwrap_err();
        assert!(err.is_format());
        assert!(read("x=1").is_err());
        assert!(read("x=\"open").is_err());
        assert!(read("=\"v\"").is_err());
    }

    #[test]
    fn test_namespace_declarations() {
        assert!(is_namespace_declaration(StringView::from("xmlns")));
        assert!(is_namespace_declaration(StringView::from("xmlns:svg")));
        assert!(!is_namespace_declaration(StringView::from("xmlnsfoo")));
        assert!(!is_namespace_declaration(StringView::from("id")));
    }

    #[test]
    fn test_split_name() {
        let (prefix, local) = split_name(StringView::from("svg:rect"));
        assert_eq!(prefix.unwrap(), "svg");
        assert_eq!(local, "rect");
        let (prefix, local) = split_name(StringView::from("rect"));
        assert!(prefix.is_none());
        assert_eq!(local, "rect");
    }
}
