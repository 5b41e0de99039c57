//! XML Node representation
//!
//! Uses NodeId (u32) for compact, cache-friendly node references. Links
//! between records are arena indices, never pointers; the arena owns every
//! record and everything else holds plain indices.

use crate::core::view::StringView;

/// Compact node identifier (index into the node arena)
pub type NodeId = u32;

/// Index into the attribute arena
pub type AttrId = u32;

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    /// Text run or CDATA section
    Text,
}

/// A node stored in the arena
#[derive(Debug, Clone)]
pub struct NodeRecord<'a> {
    pub kind: NodeKind,
    /// Qualified name for elements, empty for text
    pub name: StringView<'a>,
    /// Text of a text node; for an element, the text of its only child when
    /// that child is text, empty otherwise
    pub inner_text: StringView<'a>,
    /// Source bytes of the whole node, tags included
    pub span: StringView<'a>,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// Depth in the tree, 0 for the root element
    pub depth: u32,
    /// Start of attributes in the attribute arena
    pub attr_start: AttrId,
    pub attr_count: u32,
    /// Text that came from a CDATA section
    pub cdata: bool,
    /// Carries an `xmlns` or `xmlns:*` attribute
    pub declares_namespace: bool,
}

impl<'a> NodeRecord<'a> {
    /// Create a new element node
    pub fn element(
        name: StringView<'a>,
        parent: Option<NodeId>,
        depth: u32,
        attr_start: AttrId,
    ) -> Self {
        NodeRecord {
            kind: NodeKind::Element,
            name,
            inner_text: StringView::empty(),
            span: StringView::empty(),
            parent,
            first_child: None,
            last_child: None,
            next_sibling: None,
            depth,
            attr_start,
            attr_count: 0,
            cdata: false,
            declares_namespace: false,
        }
    }

    /// Create a new text node
    pub fn text(text: StringView<'a>, span: StringView<'a>, parent: NodeId, depth: u32) -> Self {
        NodeRecord {
            kind: NodeKind::Text,
            name: StringView::empty(),
            inner_text: text,
            span,
            parent: Some(parent),
            first_child: None,
            last_child: None,
            next_sibling: None,
            depth,
            attr_start: 0,
            attr_count: 0,
            cdata: false,
            declares_namespace: false,
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }

    #[inline]
    pub fn has_attributes(&self) -> bool {
        self.attr_count > 0
    }
}

/// Stored attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRecord<'a> {
    pub name: StringView<'a>,
    /// Raw value, entities unresolved
    pub value: StringView<'a>,
    /// Element that carries this attribute
    pub owner: NodeId,
}
