//! Node store - the two arenas that hold a parsed tree
//!
//! Nodes and attributes live in separate stable-address arenas. Each element
//! owns a contiguous run of the attribute arena (`attr_start`, `attr_count`);
//! runs never overlap because an element's attributes are appended before
//! any of its descendants are seen.

use super::node::{AttrId, AttributeRecord, NodeId, NodeKind, NodeRecord};
use crate::core::arena::{Arena, ArenaIter};
use crate::core::view::StringView;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct NodeStore<'a> {
    nodes: Arena<NodeRecord<'a>>,
    attributes: Arena<AttributeRecord<'a>>,
    element_count: usize,
    text_count: usize,
}

impl<'a> NodeStore<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node record; counts are kept per kind
    pub fn append_node(&mut self, record: NodeRecord<'a>) -> Result<NodeId> {
        let kind = record.kind;
        let id = self.nodes.append(record)? as NodeId;
        match kind {
            NodeKind::Element => self.element_count += 1,
            NodeKind::Text => self.text_count += 1,
        }
        Ok(id)
    }

    pub fn append_attribute(&mut self, record: AttributeRecord<'a>) -> Result<AttrId> {
        Ok(self.attributes.append(record)? as AttrId)
    }

    /// Link a child node as the last child of its parent.
    ///
    /// A text node that becomes a parent's first child is promoted to the
    /// parent's `inner_text`; as soon as a second child arrives the parent's
    /// `inner_text` is cleared again.
    pub fn link_child(&mut self, parent_id: NodeId, child_id: NodeId) {
        let promoted = match self.nodes.get(child_id as usize) {
            Some(child) if child.is_text() => child.inner_text,
            _ => StringView::empty(),
        };

        let previous_last = match self.nodes.get_mut(parent_id as usize) {
            Some(parent) => {
                let previous = parent.last_child;
                if previous.is_none() {
                    parent.first_child = Some(child_id);
                    parent.inner_text = promoted;
                } else {
                    parent.inner_text = StringView::empty();
                }
                parent.last_child = Some(child_id);
                previous
            }
            None => return,
        };

        if let Some(last_id) = previous_last {
            if let Some(last) = self.nodes.get_mut(last_id as usize) {
                last.next_sibling = Some(child_id);
            }
        }
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&NodeRecord<'a>> {
        self.nodes.get(id as usize)
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeRecord<'a>> {
        self.nodes.get_mut(id as usize)
    }

    #[inline]
    pub fn attribute(&self, id: AttrId) -> Option<&AttributeRecord<'a>> {
        self.attributes.get(id as usize)
    }

    /// The attribute run of a node
    pub fn attributes_of(&self, node: &NodeRecord<'a>) -> ArenaIter<'_, AttributeRecord<'a>> {
        self.attributes
            .iterate(node.attr_start as usize, node.attr_count as usize)
    }

    /// Attributes appended since `start`
    pub fn attributes_from(&self, start: AttrId) -> ArenaIter<'_, AttributeRecord<'a>> {
        let start = start as usize;
        self.attributes
            .iterate(start, self.attributes.count().saturating_sub(start))
    }

    pub fn nodes(&self) -> ArenaIter<'_, NodeRecord<'a>> {
        self.nodes.iter()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.count()
    }

    #[inline]
    pub fn attribute_count(&self) -> usize {
        self.attributes.count()
    }

    #[inline]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    #[inline]
    pub fn text_count(&self) -> usize {
        self.text_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> StringView<'_> {
        StringView::from(s)
    }

    #[test]
    fn test_link_children_in_order() {
        let mut store = NodeStore::new();
        let root = store.append_node(NodeRecord::element(v("a"), None, 0, 0)).unwrap();
        let b = store.append_node(NodeRecord::element(v("b"), Some(root), 1, 0)).unwrap();
        store.link_child(root, b);
        let c = store.append_node(NodeRecord::element(v("c"), Some(root), 1, 0)).unwrap();
        store.link_child(root, c);

        let root_rec = store.node(root).unwrap();
        assert_eq!(root_rec.first_child, Some(b));
        assert_eq!(root_rec.last_child, Some(c));
        assert_eq!(store.node(b).unwrap().next_sibling, Some(c));
        assert_eq!(store.node(c).unwrap().next_sibling, None);
        assert_eq!(store.element_count(), 3);
        assert_eq!(store.text_count(), 0);
    }

    #[test]
    fn test_sole_text_child_promoted() {
        let mut store = NodeStore::new();
        let root = store.append_node(NodeRecord::element(v("a"), None, 0, 0)).unwrap();
        let t = store.append_node(NodeRecord::text(v("only"), v("only"), root, 1)).unwrap();
        store.link_child(root, t);
        assert_eq!(store.node(root).unwrap().inner_text, "only");

        let b = store.append_node(NodeRecord::element(v("b"), Some(root), 1, 0)).unwrap();
        store.link_child(root, b);
        assert!(store.node(root).unwrap().inner_text.is_empty());
    }

    #[test]
    fn test_attribute_runs() {
        let mut store = NodeStore::new();
        let root = store.append_node(NodeRecord::element(v("a"), None, 0, 0)).unwrap();
        for (name, value) in [("x", "1"), ("y", "2")] {
            store
                .append_attribute(AttributeRecord { name: v(name), value: v(value), owner: root })
                .unwrap();
        }
        store.node_mut(root).unwrap().attr_count = 2;
        let rec = store.node(root).unwrap().clone();
        let names: Vec<_> = store.attributes_of(&rec).map(|a| a.name).collect();
        assert_eq!(names, vec![v("x"), v("y")]);
        assert_eq!(store.attributes_from(1).count(), 1);
        assert_eq!(store.attribute(1).unwrap().value, "2");
    }
}
