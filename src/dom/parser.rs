//! Single-pass tree builder
//!
//! A forward, non-recursive state machine over the input. Nesting is tracked
//! on an explicit stack of open elements, so deep documents cost heap, not
//! call stack. The first error aborts the pass; nothing partial escapes.

use super::document::XmlDeclaration;
use super::node::{AttrId, AttributeRecord, NodeId, NodeRecord};
use super::store::NodeStore;
use crate::core::attributes::{is_namespace_declaration, read_attribute};
use crate::core::dtd::{parse_doctype, DocumentType};
use crate::core::entities::EntityTable;
use crate::core::scanner::Scanner;
use crate::core::view::StringView;
use crate::error::{Result, XmlError};
use tracing::{debug, trace};

/// Parser states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between constructs
    Idle,
    /// A text run inside an element
    InnerText,
    /// After `<`
    NodeHead,
    /// After `</`
    NodeTail,
    /// After `<!`
    ExtraNode,
    End,
}

#[derive(Debug, Clone, Copy)]
struct OpenElement<'a> {
    id: NodeId,
    name: StringView<'a>,
    /// Offset of the start tag's `<`
    start: usize,
}

/// Everything a successful pass produces
pub(crate) struct ParseOutput<'a> {
    pub store: NodeStore<'a>,
    pub entities: EntityTable<'a>,
    pub declaration: Option<XmlDeclaration<'a>>,
    pub doctype: Option<DocumentType<'a>>,
}

pub(crate) struct Parser<'a> {
    scanner: Scanner<'a>,
    store: NodeStore<'a>,
    entities: EntityTable<'a>,
    declaration: Option<XmlDeclaration<'a>>,
    doctype: Option<DocumentType<'a>>,
    stack: Vec<OpenElement<'a>>,
    root: Option<NodeId>,
    seed: u32,
    /// Offset of the `<` that opened the construct being parsed
    tag_start: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a [u8], seed: u32) -> Self {
        Parser {
            scanner: Scanner::new(input),
            store: NodeStore::new(),
            entities: EntityTable::with_seed(0, seed),
            declaration: None,
            doctype: None,
            stack: Vec::new(),
            root: None,
            seed,
            tag_start: 0,
        }
    }

    /// Run the state machine to completion
    pub fn run(mut self) -> Result<ParseOutput<'a>> {
        debug!(bytes = self.scanner.input().len(), "parsing document");

        let mut state = State::Idle;
        while state != State::End {
            state = match state {
                State::Idle => self.idle()?,
                State::InnerText => self.inner_text()?,
                State::NodeHead => self.node_head()?,
                State::NodeTail => self.node_tail()?,
                State::ExtraNode => self.extra_node()?,
                State::End => State::End,
            };
        }

        self.finish()
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(XmlError::format(message, self.scanner.position()))
    }

    fn error_at_tag<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(XmlError::format(message, self.tag_start))
    }

    fn idle(&mut self) -> Result<State> {
        self.scanner.skip_whitespace();
        match self.scanner.peek() {
            None => match self.stack.last() {
                Some(open) => Err(XmlError::format(
                    format!("Unclosed tag: <{}>", open.name),
                    open.start,
                )),
                None => Ok(State::End),
            },
            Some(b'<') => {
                self.tag_start = self.scanner.position();
                if self.scanner.peek_at(1) == Some(b'/') {
                    self.scanner.advance(2);
                    Ok(State::NodeTail)
                } else {
                    self.scanner.advance(1);
                    Ok(State::NodeHead)
                }
            }
            Some(_) => Ok(State::InnerText),
        }
    }

    fn inner_text(&mut self) -> Result<State> {
        let start = self.scanner.position();
        let Some(parent) = self.stack.last().map(|open| open.id) else {
            return self.error("Text is not allowed outside the root element");
        };

        let end = self
            .scanner
            .find_tag_start()
            .unwrap_or(self.scanner.input().len());
        self.scanner.set_position(end);

        // Leading whitespace was skipped in Idle
        let text = self.scanner.view(start, end).trim_end();
        let depth = self.stack.len() as u32;
        let id = self
            .store
            .append_node(NodeRecord::text(text, text, parent, depth))?;
        self.store.link_child(parent, id);
        Ok(State::Idle)
    }

    fn node_head(&mut self) -> Result<State> {
        if self.scanner.eat(b"!--") {
            let Some(end) = self.scanner.find_seq(b"-->") else {
                return self.error_at_tag("Unterminated comment");
            };
            self.scanner.set_position(end + 3);
            return Ok(State::Idle);
        }
        if self.scanner.eat(b"?") {
            return self.processing_instruction();
        }
        if self.scanner.eat(b"!") {
            return Ok(State::ExtraNode);
        }
        self.start_tag()
    }

    fn processing_instruction(&mut self) -> Result<State> {
        let target = self.scanner.read_name();
        if target.is_empty() {
            return self.error("Processing instruction target expected");
        }
        if target == "xml" {
            return self.xml_declaration();
        }

        let Some(end) = self.scanner.find_seq(b"?>") else {
            return self.error_at_tag(format!("Unterminated processing instruction <?{target}"));
        };
        self.scanner.set_position(end + 2);
        trace!(target = %target, "skipped processing instruction");
        Ok(State::Idle)
    }

    fn xml_declaration(&mut self) -> Result<State> {
        if self.tag_start != 0 || self.declaration.is_some() {
            return self.error_at_tag("XML declaration is only allowed at the start of the document");
        }

        let mut version = None;
        let mut encoding = None;
        let mut standalone = None;
        loop {
            let spaced = self.scanner.skip_whitespace() > 0;
            if self.scanner.eat(b"?>") {
                break;
            }
            if self.scanner.is_eof() {
                return self.error_at_tag("Unterminated XML declaration");
            }
            if !spaced {
                return self.error("Whitespace required between XML declaration attributes");
            }

            let offset = self.scanner.position();
            let attr = read_attribute(&mut self.scanner)?;
            let slot = match attr.name.as_bytes() {
                b"version" => &mut version,
                b"encoding" => &mut encoding,
                b"standalone" => &mut standalone,
                _ => {
                    return Err(XmlError::format(
                        format!("Unknown XML declaration attribute '{}'", attr.name),
                        offset,
                    ))
                }
            };
            if slot.replace(attr.value).is_some() {
                return Err(XmlError::format(
                    format!("Duplicate XML declaration attribute '{}'", attr.name),
                    offset,
                ));
            }
        }

        let Some(version) = version else {
            return self.error_at_tag("XML declaration without version");
        };
        if version != "1.0" {
            return self.error_at_tag(format!("Unsupported XML version '{version}'"));
        }

        trace!(version = %version, "parsed XML declaration");
        self.declaration = Some(XmlDeclaration {
            version,
            encoding,
            standalone,
            span: self.scanner.view(self.tag_start, self.scanner.position()),
        });
        Ok(State::Idle)
    }

    fn start_tag(&mut self) -> Result<State> {
        let name = self.scanner.read_name();
        if name.is_empty() {
            return self.error("Element name expected");
        }

        let parent = self.stack.last().map(|open| open.id);
        if parent.is_none() && self.root.is_some() {
            return self.error_at_tag(format!(
                "Document has multiple root elements: <{name}> follows the root"
            ));
        }

        let depth = self.stack.len() as u32;
        let attr_start = self.store.attribute_count() as AttrId;
        let id = self
            .store
            .append_node(NodeRecord::element(name, parent, depth, attr_start))?;
        match parent {
            Some(parent) => self.store.link_child(parent, id),
            None => self.root = Some(id),
        }

        let mut attr_count = 0u32;
        let mut declares_namespace = false;
        let self_closing = loop {
            let spaced = self.scanner.skip_whitespace() > 0;
            if self.scanner.eat(b"/>") {
                break true;
            }
            if self.scanner.eat(b">") {
                break false;
            }
            if self.scanner.is_eof() {
                return self.error_at_tag(format!("Unterminated start tag <{name}>"));
            }
            if !spaced {
                return self.error(format!("Whitespace required before attribute in <{name}>"));
            }

            let offset = self.scanner.position();
            let attr = read_attribute(&mut self.scanner)?;
            if self
                .store
                .attributes_from(attr_start)
                .any(|existing| existing.name == attr.name)
            {
                return Err(XmlError::format(
                    format!("Duplicate attribute '{}' on <{name}>", attr.name),
                    offset,
                ));
            }
            declares_namespace |= is_namespace_declaration(attr.name);
            self.store.append_attribute(AttributeRecord {
                name: attr.name,
                value: attr.value,
                owner: id,
            })?;
            attr_count += 1;
        };

        let span = self.scanner.view(self.tag_start, self.scanner.position());
        if let Some(node) = self.store.node_mut(id) {
            node.attr_count = attr_count;
            node.declares_namespace = declares_namespace;
            if self_closing {
                node.span = span;
            }
        }
        if !self_closing {
            self.stack.push(OpenElement {
                id,
                name,
                start: self.tag_start,
            });
        }
        Ok(State::Idle)
    }

    fn node_tail(&mut self) -> Result<State> {
        let name = self.scanner.read_name();
        self.scanner.skip_whitespace();
        if !self.scanner.eat(b">") {
            return self.error(format!("Expected '>' to close </{name}>"));
        }

        let Some(open) = self.stack.pop() else {
            return self.error_at_tag(format!(
                "Unexpected end tag: </{name}> without matching start tag"
            ));
        };
        if open.name != name {
            return self.error_at_tag(format!(
                "Tag mismatch: <{}> closed with </{}>",
                open.name, name
            ));
        }

        let span = self.scanner.view(open.start, self.scanner.position());
        if let Some(node) = self.store.node_mut(open.id) {
            node.span = span;
        }
        Ok(State::Idle)
    }

    fn extra_node(&mut self) -> Result<State> {
        if self.scanner.eat(b"[CDATA[") {
            return self.cdata();
        }
        if self.scanner.eat(b"DOCTYPE") {
            if self.doctype.is_some() {
                return self.error_at_tag("Duplicate DOCTYPE declaration");
            }
            if self.root.is_some() {
                return self.error_at_tag("DOCTYPE must precede the root element");
            }
            let (doctype, entities) = parse_doctype(&mut self.scanner, self.tag_start, self.seed)?;
            self.doctype = Some(doctype);
            self.entities = entities;
            return Ok(State::Idle);
        }
        self.error_at_tag("Unrecognized markup after '<!'")
    }

    fn cdata(&mut self) -> Result<State> {
        let Some(parent) = self.stack.last().map(|open| open.id) else {
            return self.error_at_tag("CDATA section is not allowed outside the root element");
        };

        let start = self.scanner.position();
        let Some(end) = self.scanner.find_seq(b"]]>") else {
            return self.error_at_tag("Unterminated CDATA section");
        };
        self.scanner.set_position(end + 3);

        let text = self.scanner.view(start, end);
        let span = self.scanner.view(self.tag_start, self.scanner.position());
        let mut record = NodeRecord::text(text, span, parent, self.stack.len() as u32);
        record.cdata = true;
        let id = self.store.append_node(record)?;
        self.store.link_child(parent, id);
        Ok(State::Idle)
    }

    fn finish(self) -> Result<ParseOutput<'a>> {
        if self.root.is_none() {
            return self.error("Document has no root element");
        }

        debug!(
            elements = self.store.element_count(),
            texts = self.store.text_count(),
            attributes = self.store.attribute_count(),
            entities = self.entities.len(),
            "parsed document"
        );

        Ok(ParseOutput {
            store: self.store,
            entities: self.entities,
            declaration: self.declaration,
            doctype: self.doctype,
        })
    }
}
