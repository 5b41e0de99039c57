//! spanxml - Zero-copy XML parsing into an arena tree
//!
//! The whole document is parsed in one forward pass over a UTF-8 buffer.
//! Nodes and attributes go into stable-address arenas and every name, value
//! and span is a [`StringView`] borrowed from the input, so parsing performs
//! no per-node allocation and no string copying.
//!
//! ```
//! use spanxml::XmlDocument;
//!
//! let doc = XmlDocument::parse_str("<a><b x=\"1\"/></a>").unwrap();
//! let b = doc.root().child("b").unwrap();
//! assert_eq!(b.attribute("x").unwrap(), "1");
//! ```

pub mod core;
pub mod dom;
pub mod error;

pub use crate::core::arena::Arena;
pub use crate::core::dtd::{DocumentType, ExternalId};
pub use crate::core::entities::{EntityTable, ResolveStatus};
pub use crate::core::view::StringView;
pub use dom::{
    Node, NodeId, NodeKind, NamespaceAlias, ParseOptions, TextPos, XmlDeclaration, XmlDocument,
};
pub use error::{Result, XmlError};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;
