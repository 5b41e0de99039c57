//! DOCTYPE declaration and internal subset
//!
//! Parses `<!DOCTYPE name [SYSTEM "sys" | PUBLIC "pub" "sys"] [ [...] ]>`.
//! External identifiers are recorded but never fetched. Inside the internal
//! subset only general `<!ENTITY name "value">` declarations are kept; comments,
//! processing instructions, parameter entities and the other markup
//! declarations are skipped opaquely.

use super::entities::{predefined, EntityTable};
use super::scanner::Scanner;
use super::view::StringView;
use crate::error::{Result, XmlError};
use memchr::memchr;
use tracing::trace;

/// `SYSTEM` / `PUBLIC` identifier of a DOCTYPE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalId<'a> {
    pub public_id: Option<StringView<'a>>,
    pub system_id: StringView<'a>,
}

/// The document type declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentType<'a> {
    /// Root element name declared by the DOCTYPE
    pub name: StringView<'a>,
    pub external_id: Option<ExternalId<'a>>,
    /// Text between `[` and `]`, empty when there is no internal subset
    pub internal_subset: StringView<'a>,
    /// The whole `<!DOCTYPE ...>` declaration
    pub body: StringView<'a>,
}

/// An internal general entity declaration
#[derive(Debug, Clone, Copy)]
struct EntityDecl<'a> {
    name: StringView<'a>,
    value: StringView<'a>,
    offset: usize,
}

fn expect_whitespace(scanner: &mut Scanner<'_>, what: &str) -> Result<()> {
    if scanner.skip_whitespace() == 0 {
        return Err(XmlError::format(
            format!("Whitespace required {what}"),
            scanner.position(),
        ));
    }
    Ok(())
}

fn quoted<'a>(scanner: &mut Scanner<'a>, what: &str) -> Result<StringView<'a>> {
    scanner
        .read_quoted()
        .ok_or_else(|| XmlError::format(format!("Quoted {what} expected"), scanner.position()))
}

/// Skip past the next occurrence of `terminator`
fn skip_past(scanner: &mut Scanner<'_>, terminator: &[u8], what: &str) -> Result<()> {
    match scanner.find_seq(terminator) {
        Some(end) => {
            scanner.set_position(end + terminator.len());
            Ok(())
        }
        None => Err(XmlError::format(
            format!("Unterminated {what}"),
            scanner.position(),
        )),
    }
}

/// Skip a markup declaration to its closing '>', ignoring '>' inside literals
fn skip_declaration(scanner: &mut Scanner<'_>) -> Result<()> {
    match scanner.find_tag_end_quoted() {
        Some(end) => {
            scanner.set_position(end + 1);
            Ok(())
        }
        None => Err(XmlError::format(
            "Unterminated markup declaration in DOCTYPE",
            scanner.position(),
        )),
    }
}

/// Parse `SYSTEM "sys"` or `PUBLIC "pub" "sys"` if present
fn parse_external_id<'a>(scanner: &mut Scanner<'a>) -> Result<Option<ExternalId<'a>>> {
    if scanner.eat(b"SYSTEM") {
        expect_whitespace(scanner, "after SYSTEM")?;
        let system_id = quoted(scanner, "system literal")?;
        return Ok(Some(ExternalId {
            public_id: None,
            system_id,
        }));
    }
    if scanner.eat(b"PUBLIC") {
        expect_whitespace(scanner, "after PUBLIC")?;
        let public_id = quoted(scanner, "public identifier")?;
        expect_whitespace(scanner, "between public and system literals")?;
        let system_id = quoted(scanner, "system literal")?;
        return Ok(Some(ExternalId {
            public_id: Some(public_id),
            system_id,
        }));
    }
    Ok(None)
}

/// `<!ENTITY` already consumed. Returns the declaration if it is an internal
/// general entity; external and parameter entities are accepted and dropped.
fn parse_entity_decl<'a>(scanner: &mut Scanner<'a>) -> Result<Option<EntityDecl<'a>>> {
    expect_whitespace(scanner, "after <!ENTITY")?;

    if scanner.peek() == Some(b'%') {
        trace!("skipping parameter entity declaration");
        skip_declaration(scanner)?;
        return Ok(None);
    }

    let name = scanner.read_name();
    if name.is_empty() {
        return Err(XmlError::format("Entity name expected", scanner.position()));
    }
    expect_whitespace(scanner, "after entity name")?;

    let offset = scanner.position();
    if matches!(scanner.peek(), Some(b'"' | b'\'')) {
        let value = quoted(scanner, "entity value")?;
        scanner.skip_whitespace();
        if !scanner.eat(b">") {
            return Err(XmlError::format(
                format!("Expected '>' after entity '{name}'"),
                scanner.position(),
            ));
        }
        return Ok(Some(EntityDecl {
            name,
            value,
            offset,
        }));
    }

    if parse_external_id(scanner)?.is_some() {
        trace!(entity = %name, "external entity accepted, not fetched");
        skip_declaration(scanner)?;
        return Ok(None);
    }

    Err(XmlError::format(
        format!("Entity '{name}' needs a quoted value or an external identifier"),
        offset,
    ))
}

/// Walk the internal subset up to (not including) the closing ']'
fn parse_internal_subset<'a>(scanner: &mut Scanner<'a>) -> Result<Vec<EntityDecl<'a>>> {
    let mut decls = Vec::new();
    loop {
        scanner.skip_whitespace();
        match scanner.peek() {
            None => {
                return Err(XmlError::format(
                    "Unterminated DOCTYPE internal subset",
                    scanner.position(),
                ))
            }
            Some(b']') => return Ok(decls),
            Some(b'%') => {
                // Parameter entity reference, skipped like its declaration
                match memchr(b';', scanner.remaining()) {
                    Some(i) => scanner.advance(i + 1),
                    None => {
                        return Err(XmlError::format(
                            "Unterminated parameter entity reference",
                            scanner.position(),
                        ))
                    }
                }
            }
            Some(b'<') => {
                if scanner.eat(b"<!--") {
                    skip_past(scanner, b"-->", "comment in DOCTYPE")?;
                } else if scanner.eat(b"<!ENTITY") {
                    decls.extend(parse_entity_decl(scanner)?);
                } else if scanner.eat(b"<?") {
                    skip_past(scanner, b"?>", "processing instruction in DOCTYPE")?;
                } else {
                    skip_declaration(scanner)?;
                }
            }
            Some(_) => {
                return Err(XmlError::format(
                    "Unexpected content in DOCTYPE internal subset",
                    scanner.position(),
                ))
            }
        }
    }
}

/// Build the entity table, sized for the declarations found. A value may only
/// reference entities declared before it; the first declaration of a name wins.
/// Each value is checked one level deep, so building stays linear in the
/// subset size however deeply entities nest.
fn build_entity_table<'a>(decls: &[EntityDecl<'a>], seed: u32) -> Result<EntityTable<'a>> {
    let mut table = EntityTable::with_seed(decls.len(), seed);
    for decl in decls {
        if predefined(decl.name.as_bytes()).is_some() {
            continue;
        }
        if !table.references_declared(decl.value) {
            return Err(XmlError::format(
                format!(
                    "Entity '{}' references an entity that is not declared before it",
                    decl.name
                ),
                decl.offset,
            ));
        }
        if !table.try_add(decl.name, decl.value) {
            trace!(entity = %decl.name, "duplicate entity declaration ignored");
        }
    }
    Ok(table)
}

/// Parse a DOCTYPE. The scanner sits just after `<!DOCTYPE`; `start` is the
/// offset of its `<`.
pub fn parse_doctype<'a>(
    scanner: &mut Scanner<'a>,
    start: usize,
    seed: u32,
) -> Result<(DocumentType<'a>, EntityTable<'a>)> {
    expect_whitespace(scanner, "after <!DOCTYPE")?;
    let name = scanner.read_name();
    if name.is_empty() {
        return Err(XmlError::format("DOCTYPE name expected", scanner.position()));
    }
    scanner.skip_whitespace();

    let external_id = parse_external_id(scanner)?;
    scanner.skip_whitespace();

    let mut internal_subset = StringView::empty();
    let mut decls = Vec::new();
    if scanner.eat(b"[") {
        let subset_start = scanner.position();
        decls = parse_internal_subset(scanner)?;
        internal_subset = scanner.view(subset_start, scanner.position());
        scanner.advance(1);
        scanner.skip_whitespace();
    }

    if !scanner.eat(b">") {
        return Err(XmlError::format(
            "Expected '>' to close DOCTYPE",
            scanner.position(),
        ));
    }

    let entities = build_entity_table(&decls, seed)?;
    trace!(doctype = %name, entities = entities.len(), "parsed DOCTYPE");

    Ok((
        DocumentType {
            name,
            external_id,
            internal_subset,
            body: scanner.view(start, scanner.position()),
        },
        entities,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};

    fn parse(input: &str) -> Result<(DocumentType<'_>, EntityTable<'_>)> {
        let mut scanner = Scanner::new(input.as_bytes());
        assert!(scanner.eat(b"<!DOCTYPE"));
        parse_doctype(&mut scanner, 0, 11)
    }

    #[test]
    fn test_name_only() {
        let (doctype, entities) = parse("<!DOCTYPE html>").unwrap();
        assert_eq!(doctype.name, "html");
        assert!(doctype.external_id.is_none());
        assert!(doctype.internal_subset.is_empty());
        assert_eq!(doctype.body, "<!DOCTYPE html>");
        assert!(entities.is_empty());
    }

    #[test]
    fn test_internal_entities() {
        let input = "<!DOCTYPE d [\n  <!ENTITY x \"hi\">\n  <!ENTITY y '&x; there'>\n]>";
        let (doctype, entities) = parse(input).unwrap();
        assert_eq!(doctype.name, "d");
        assert_eq!(
            doctype.internal_subset,
            "\n  <!ENTITY x \"hi\">\n  <!ENTITY y '&x; there'>\n"
        );
        assert_eq!(entities.len(), 2);
        assert_eq!(entities.try_get(b"x").unwrap(), "hi");
        assert_eq!(entities.decode_str(StringView::from("&y;")).unwrap(), "hi there");
    }

    #[test]
    fn test_forward_and_self_reference_rejected() {
        assert!(parse("<!DOCTYPE d [<!ENTITY a \"&b;\"><!ENTITY b \"x\">]>").is_err());
        assert!(parse("<!DOCTYPE d [<!ENTITY a \"&a;\">]>").is_err());
    }

    #[test]
    fn test_nested_entity_chain_parses_in_linear_time() {
        let mut subset = String::from("<!ENTITY e0 \"lol\">");
        for level in 1..=9 {
            let refs = format!("&e{};", level - 1).repeat(10);
            subset.push_str(&format!("<!ENTITY e{level} \"{refs}\">"));
        }
        let input = format!("<!DOCTYPE d [{subset}]>");

        let started = Instant::now();
        let (_, entities) = parse(&input).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));

        assert_eq!(entities.len(), 10);
        assert_eq!(entities.decode(StringView::from("&e2;")).unwrap().len(), 300);
        // 3 * 10^9 bytes: refused instead of allocated
        assert_eq!(
            entities.decode(StringView::from("&e9;")),
            Err(XmlError::CannotResolve)
        );
    }

    #[test]
    fn test_first_declaration_wins() {
        let (_, entities) = parse("<!DOCTYPE d [<!ENTITY a \"one\"><!ENTITY a \"two\">]>").unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities.try_get(b"a").unwrap(), "one");
    }

    #[test]
    fn test_external_ids() {
        let (doctype, _) = parse("<!DOCTYPE note SYSTEM \"note.dtd\">").unwrap();
        let ext = doctype.external_id.unwrap();
        assert!(ext.public_id.is_none());
        assert_eq!(ext.system_id, "note.dtd");

        let (doctype, _) =
            parse("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0//EN\" 'x.dtd' [<!ENTITY e \"v\">]>")
                .unwrap();
        let ext = doctype.external_id.unwrap();
        assert_eq!(ext.public_id.unwrap(), "-//W3C//DTD XHTML 1.0//EN");
        assert_eq!(ext.system_id, "x.dtd");
        assert_eq!(doctype.internal_subset, "<!ENTITY e \"v\">");
    }

    #[test]
    fn test_skips_other_declarations() {
        let input = concat!(
            "<!DOCTYPE r [",
            "<!-- <!ENTITY hidden \"no\"> -->",
            "<!ELEMENT r (#PCDATA)>",
            "<!ATTLIST r a CDATA \">\">",
            "<!ENTITY % pe \"ignored\">",
            "%pe;",
            "<?pi data?>",
            "<!ENTITY ext SYSTEM \"ext.xml\">",
            "<!ENTITY kept \"yes\">",
            "]>"
        );
        let (_, entities) = parse(input).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities.try_get(b"kept").unwrap(), "yes");
        assert!(entities.try_get(b"hidden").is_none());
        assert!(entities.try_get(b"ext").is_none());
    }

    #[test]
    fn test_malformed() {
        assert!(parse("<!DOCTYPE>").is_err());
        assert!(parse("<!DOCTYPE d [<!ENTITY x \"v\">").is_err());
        assert!(parse("<!DOCTYPE d [junk]>").is_err());
        assert!(parse("<!DOCTYPE d SYSTEM>").is_err());
        assert!(parse("<!DOCTYPE d [<!ENTITY x>]>").is_err());
    }
}
