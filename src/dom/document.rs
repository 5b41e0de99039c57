//! XML Document
//!
//! `XmlDocument` borrows the input buffer for its whole life; every name,
//! value and span it hands out is a view into that buffer. The node and
//! attribute arenas, the entity table and the declarations are owned by the
//! document and released together when it is dropped.

use super::namespace::{find_alias, NamespaceAlias};
use super::node::{AttributeRecord, NodeId, NodeKind, NodeRecord};
use super::parser::Parser;
use super::store::NodeStore;
use crate::core::arena::ArenaIter;
use crate::core::attributes::split_name;
use crate::core::dtd::DocumentType;
use crate::core::encoding::utf8_body;
use crate::core::entities::EntityTable;
use crate::core::hash::process_seed;
use crate::core::view::StringView;
use crate::error::{Result, XmlError};
use std::borrow::Cow;
use std::fmt;

/// Parser configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Seed for the entity table hash; the process-wide seed when unset
    pub hash_seed: Option<u32>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed entity hash seed, for reproducible tables
    pub fn with_hash_seed(mut self, seed: u32) -> Self {
        self.hash_seed = Some(seed);
        self
    }
}

/// `<?xml version="1.0" encoding="..." standalone="..."?>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlDeclaration<'a> {
    pub version: StringView<'a>,
    pub encoding: Option<StringView<'a>>,
    pub standalone: Option<StringView<'a>>,
    /// The whole declaration
    pub span: StringView<'a>,
}

/// 1-based row and column; the column counts characters, not bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextPos {
    pub row: u32,
    pub col: u32,
}

impl TextPos {
    pub fn new(row: u32, col: u32) -> Self {
        TextPos { row, col }
    }
}

impl fmt::Display for TextPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

/// A parsed XML document
#[derive(Debug)]
pub struct XmlDocument<'a> {
    input: &'a [u8],
    store: NodeStore<'a>,
    entities: EntityTable<'a>,
    declaration: Option<XmlDeclaration<'a>>,
    doctype: Option<DocumentType<'a>>,
}

// Parsed documents can be shared across threads
const _: fn() = || {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<XmlDocument<'static>>();
};

impl<'a> XmlDocument<'a> {
    /// Parse a UTF-8 buffer. A leading byte-order mark is skipped.
    pub fn parse(input: &'a [u8]) -> Result<Self> {
        Self::parse_with_options(input, &ParseOptions::default())
    }

    pub fn parse_str(input: &'a str) -> Result<Self> {
        Self::parse(input.as_bytes())
    }

    pub fn parse_with_options(input: &'a [u8], options: &ParseOptions) -> Result<Self> {
        let body = utf8_body(input)?;
        let seed = options.hash_seed.unwrap_or_else(process_seed);
        let output = Parser::new(body, seed).run()?;

        Ok(XmlDocument {
            input: body,
            store: output.store,
            entities: output.entities,
            declaration: output.declaration,
            doctype: output.doctype,
        })
    }

    /// The root element. Always `nodes[0]`.
    pub fn root(&self) -> Node<'_, 'a> {
        // A successful parse guarantees a root element
        self.node(0)
            .unwrap_or_else(|| unreachable!("document without root element"))
    }

    pub fn node(&self, id: NodeId) -> Option<Node<'_, 'a>> {
        self.store.node(id).map(|record| Node {
            doc: self,
            id,
            record,
        })
    }

    /// All nodes in document order
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_, 'a>> + '_ {
        self.store
            .nodes()
            .enumerate()
            .map(move |(id, record)| Node {
                doc: self,
                id: id as NodeId,
                record,
            })
    }

    pub fn declaration(&self) -> Option<&XmlDeclaration<'a>> {
        self.declaration.as_ref()
    }

    pub fn doctype(&self) -> Option<&DocumentType<'a>> {
        self.doctype.as_ref()
    }

    pub fn entities(&self) -> &EntityTable<'a> {
        &self.entities
    }

    /// The parsed buffer, without any byte-order mark
    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    pub(crate) fn store(&self) -> &NodeStore<'a> {
        &self.store
    }

    pub fn element_count(&self) -> usize {
        self.store.element_count()
    }

    pub fn text_count(&self) -> usize {
        self.store.text_count()
    }

    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    pub fn attribute_count(&self) -> usize {
        self.store.attribute_count()
    }

    /// Byte offset of `view` in the input. Fails for views that are not a
    /// sub-range of this document's buffer.
    pub fn offset_of(&self, view: StringView<'_>) -> Result<usize> {
        view.offset_in(self.input)
            .ok_or(XmlError::Argument("view does not belong to this document"))
    }

    /// Row and column of a byte offset; offsets past the end are clamped
    pub fn text_pos_at(&self, offset: usize) -> TextPos {
        let before = &self.input[..offset.min(self.input.len())];
        let row = memchr::memchr_iter(b'\n', before).count() + 1;
        let line_start = memchr::memrchr(b'\n', before).map_or(0, |i| i + 1);
        // Count characters by skipping UTF-8 continuation bytes
        let col = before[line_start..]
            .iter()
            .filter(|&&b| b & 0xC0 != 0x80)
            .count()
            + 1;
        TextPos::new(row as u32, col as u32)
    }

    pub fn text_pos_of(&self, view: StringView<'_>) -> Result<TextPos> {
        self.offset_of(view).map(|offset| self.text_pos_at(offset))
    }
}

/// A node handle
#[derive(Clone, Copy)]
pub struct Node<'d, 'a> {
    doc: &'d XmlDocument<'a>,
    id: NodeId,
    record: &'d NodeRecord<'a>,
}

impl PartialEq for Node<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.doc, other.doc)
    }
}

impl Eq for Node<'_, '_> {}

impl fmt::Debug for Node<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.record.kind {
            NodeKind::Element => write!(f, "Element {{ id: {}, name: {} }}", self.id, self.record.name),
            NodeKind::Text => write!(f, "Text {{ id: {}, text: {:?} }}", self.id, self.record.inner_text),
        }
    }
}

impl<'d, 'a> Node<'d, 'a> {
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn document(&self) -> &'d XmlDocument<'a> {
        self.doc
    }

    #[inline]
    pub fn record(&self) -> &'d NodeRecord<'a> {
        self.record
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.record.kind
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.record.is_element()
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.record.is_text()
    }

    /// Text node that came from a CDATA section
    #[inline]
    pub fn is_cdata(&self) -> bool {
        self.record.cdata
    }

    /// Qualified name; empty for text nodes
    #[inline]
    pub fn name(&self) -> StringView<'a> {
        self.record.name
    }

    pub fn local_name(&self) -> StringView<'a> {
        split_name(self.record.name).1
    }

    pub fn prefix(&self) -> Option<StringView<'a>> {
        split_name(self.record.name).0
    }

    /// Raw text: the run itself for text nodes, the sole text child's run for
    /// elements, empty otherwise. Entities are not resolved.
    #[inline]
    pub fn inner_text(&self) -> StringView<'a> {
        self.record.inner_text
    }

    /// `inner_text` with entity and character references expanded
    pub fn resolved_inner_text(&self) -> Result<Cow<'a, str>> {
        self.doc.entities.decode_str(self.record.inner_text)
    }

    /// Source bytes of the node, tags included
    #[inline]
    pub fn span(&self) -> StringView<'a> {
        self.record.span
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.record.depth
    }

    pub fn text_pos(&self) -> TextPos {
        let offset = self.record.span.offset_in(self.doc.input).unwrap_or(0);
        self.doc.text_pos_at(offset)
    }

    pub fn parent(&self) -> Option<Node<'d, 'a>> {
        self.record.parent.and_then(|id| self.doc.node(id))
    }

    pub fn first_child(&self) -> Option<Node<'d, 'a>> {
        self.record.first_child.and_then(|id| self.doc.node(id))
    }

    pub fn last_child(&self) -> Option<Node<'d, 'a>> {
        self.record.last_child.and_then(|id| self.doc.node(id))
    }

    pub fn next_sibling(&self) -> Option<Node<'d, 'a>> {
        self.record.next_sibling.and_then(|id| self.doc.node(id))
    }

    pub fn has_children(&self) -> bool {
        self.record.has_children()
    }

    pub fn children(&self) -> Children<'d, 'a> {
        Children {
            next: self.first_child(),
        }
    }

    pub fn child_elements(&self) -> impl Iterator<Item = Node<'d, 'a>> {
        self.children().filter(|node| node.is_element())
    }

    /// First child element named `name`
    pub fn child(&self, name: impl AsRef<[u8]>) -> Option<Node<'d, 'a>> {
        let name = name.as_ref();
        self.child_elements().find(|node| node.record.name == name)
    }

    /// First child element whose name spells `local` in `namespace`
    pub fn child_ns(
        &self,
        namespace: impl AsRef<[u8]>,
        local: impl AsRef<[u8]>,
    ) -> Option<Node<'d, 'a>> {
        let (namespace, local) = (namespace.as_ref(), local.as_ref());
        let store = &self.doc.store;
        let inherited = find_alias(store, self.id, namespace);

        self.child_elements().find(|child| {
            // A child may rebind the namespace itself
            let alias = if child.record.declares_namespace {
                find_alias(store, child.id, namespace)
            } else {
                inherited
            };
            alias.is_some_and(|alias| alias.matches(child.record.name, local))
        })
    }

    /// Alias bound to `namespace` as seen from this node
    pub fn lookup_namespace_alias(&self, namespace: impl AsRef<[u8]>) -> Option<NamespaceAlias<'a>> {
        find_alias(&self.doc.store, self.id, namespace.as_ref())
    }

    pub fn attributes(&self) -> ArenaIter<'d, AttributeRecord<'a>> {
        self.doc.store.attributes_of(self.record)
    }

    pub fn find_attribute(&self, name: impl AsRef<[u8]>) -> Option<&'d AttributeRecord<'a>> {
        let name = name.as_ref();
        self.attributes().find(|attr| attr.name == name)
    }

    /// Raw value of the first attribute named `name`
    pub fn attribute(&self, name: impl AsRef<[u8]>) -> Option<StringView<'a>> {
        self.find_attribute(name).map(|attr| attr.value)
    }

    /// Attribute value with references expanded
    pub fn resolved_attribute(&self, name: impl AsRef<[u8]>) -> Result<Option<Cow<'a, str>>> {
        self.attribute(name)
            .map(|value| self.doc.entities.decode_str(value))
            .transpose()
    }

    /// Value of the attribute whose name spells `local` in `namespace`
    pub fn attribute_ns(
        &self,
        namespace: impl AsRef<[u8]>,
        local: impl AsRef<[u8]>,
    ) -> Option<StringView<'a>> {
        let alias = self.lookup_namespace_alias(namespace)?;
        let local = local.as_ref();
        self.attributes()
            .find(|attr| alias.matches(attr.name, local))
            .map(|attr| attr.value)
    }
}

/// Iterator over a node's children
pub struct Children<'d, 'a> {
    next: Option<Node<'d, 'a>>,
}

impl<'d, 'a> Iterator for Children<'d, 'a> {
    type Item = Node<'d, 'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next.take()?;
        self.next = node.next_sibling();
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_navigation() {
        let doc = XmlDocument::parse_str("<a><b x=\"1\" y='2'/><c>t</c>tail</a>").unwrap();
        let root = doc.root();
        assert_eq!(root.name(), "a");
        assert_eq!(root.depth(), 0);
        assert!(root.parent().is_none());

        let names: Vec<_> = root.child_elements().map(|n| n.name()).collect();
        assert_eq!(names, vec![StringView::from("b"), StringView::from("c")]);
        assert_eq!(root.children().count(), 3);
        assert_eq!(root.last_child().unwrap().inner_text(), "tail");

        let b = root.child("b").unwrap();
        assert_eq!(b.attribute("x").unwrap(), "1");
        assert_eq!(b.attribute("y").unwrap(), "2");
        assert!(b.attribute("z").is_none());
        assert_eq!(b.find_attribute("y").unwrap().owner, b.id());
        assert!(b.record().has_attributes());
        assert!(!root.record().has_attributes());
        assert!(std::ptr::eq(b.document(), &doc));
        assert_eq!(b.parent().unwrap(), root);
        assert_eq!(b.next_sibling().unwrap().name(), "c");
        assert!(root.child("missing").is_none());
    }

    #[test]
    fn test_names() {
        let doc = XmlDocument::parse_str("<svg:rect/>").unwrap();
        let root = doc.root();
        assert_eq!(root.local_name(), "rect");
        assert_eq!(root.prefix().unwrap(), "svg");
    }

    #[test]
    fn test_bom_and_counts() {
        let doc = XmlDocument::parse(b"\xEF\xBB\xBF<a k=\"v\">x</a>").unwrap();
        assert_eq!(doc.input(), b"<a k=\"v\">x</a>");
        assert_eq!(doc.element_count(), 1);
        assert_eq!(doc.text_count(), 1);
        assert_eq!(doc.node_count(), 2);
        assert_eq!(doc.attribute_count(), 1);
        assert_eq!(doc.nodes().count(), 2);
    }

    #[test]
    fn test_offsets_and_positions() {
        let doc = XmlDocument::parse_str("<a>\n  <b>é<c/></b>\n</a>").unwrap();
        let b = doc.root().child("b").unwrap();
        assert_eq!(doc.offset_of(b.span()).unwrap(), 6);
        assert_eq!(b.text_pos(), TextPos::new(2, 3));

        let c = b.child("c").unwrap();
        // `é` is two bytes but one column
        assert_eq!(c.text_pos(), TextPos::new(2, 7));
        assert_eq!(c.text_pos().to_string(), "2:7");

        let foreign = String::from("<b>");
        assert_eq!(
            doc.offset_of(StringView::from(foreign.as_str())),
            Err(XmlError::Argument("view does not belong to this document"))
        );
        assert!(doc.text_pos_of(StringView::from("x")).is_err());
        assert_eq!(doc.text_pos_at(usize::MAX), TextPos::new(3, 5));
    }

    #[test]
    fn test_resolved_text_and_attributes() {
        let doc = XmlDocument::parse_str(
            "<!DOCTYPE a [<!ENTITY who \"world\">]><a title=\"&lt;&who;&gt;\">hello &who;&#33;</a>",
        )
        .unwrap();
        let root = doc.root();
        assert_eq!(root.inner_text(), "hello &who;&#33;");
        assert_eq!(root.resolved_inner_text().unwrap(), "hello world!");
        assert_eq!(root.resolved_attribute("title").unwrap().unwrap(), "<world>");
        assert_eq!(root.resolved_attribute("none").unwrap(), None);

        let doc = XmlDocument::parse_str("<a>&nope;</a>").unwrap();
        assert_eq!(doc.root().resolved_inner_text(), Err(XmlError::CannotResolve));
    }

    #[test]
    fn test_options_seed() {
        let options = ParseOptions::new().with_hash_seed(42);
        let doc = XmlDocument::parse_with_options(
            b"<!DOCTYPE a [<!ENTITY e \"v\">]><a/>",
            &options,
        )
        .unwrap();
        assert_eq!(doc.entities().try_get(b"e").unwrap(), "v");
        assert_eq!(doc.doctype().unwrap().name, "a");
    }

    #[test]
    fn test_rejects_utf16() {
        assert!(XmlDocument::parse(&[0xFF, 0xFE, b'<', 0]).unwrap_err().is_format());
    }
}
