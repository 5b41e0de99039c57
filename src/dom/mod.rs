//! DOM Module - Arena-based XML Document
//!
//! Implements a read-only tree over the input buffer using:
//! - Two arenas (nodes, attributes) with stable indices
//! - NodeId (u32) links for cache-friendly traversal
//! - Zero-copy names, values and spans borrowed from the input
//! - Ancestor-walking namespace alias lookup

pub mod document;
pub mod namespace;
pub mod node;
pub(crate) mod parser;
pub mod store;

pub use document::{Children, Node, ParseOptions, TextPos, XmlDeclaration, XmlDocument};
pub use namespace::NamespaceAlias;
pub use node::{AttrId, AttributeRecord, NodeId, NodeKind, NodeRecord};
pub use store::NodeStore;
