//! Namespace Resolution
//!
//! Ancestor-walking alias lookup. Nothing is cached: each qualified lookup
//! walks from the target node towards the root, so it costs O(depth).

use super::node::NodeId;
use super::store::NodeStore;
use crate::core::view::StringView;

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &[u8] = b"http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &[u8] = b"http://www.w3.org/2000/xmlns/";
}

/// How a namespace URI is spelled at some point in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceAlias<'a> {
    /// Bound by `xmlns="uri"`; names carry no prefix
    Default,
    /// Bound by `xmlns:prefix="uri"`
    Prefix(StringView<'a>),
}

impl NamespaceAlias<'_> {
    /// Does the qualified `name` spell `local` under this alias?
    pub fn matches(&self, name: StringView<'_>, local: &[u8]) -> bool {
        match self {
            NamespaceAlias::Default => name == local,
            NamespaceAlias::Prefix(prefix) => {
                let name = name.as_bytes();
                let prefix = prefix.as_bytes();
                name.len() == prefix.len() + 1 + local.len()
                    && name.starts_with(prefix)
                    && name[prefix.len()] == b':'
                    && name.ends_with(local)
            }
        }
    }
}

/// Find the alias bound to `namespace`, starting at `start` and walking up.
/// The nearest declaring ancestor wins.
pub fn find_alias<'a>(
    store: &NodeStore<'a>,
    start: NodeId,
    namespace: &[u8],
) -> Option<NamespaceAlias<'a>> {
    // Reserved prefixes are bound implicitly
    if namespace == ns::XML {
        return Some(NamespaceAlias::Prefix(StringView::from("xml")));
    }
    if namespace == ns::XMLNS {
        return Some(NamespaceAlias::Prefix(StringView::from("xmlns")));
    }

    let mut current = store.node(start);
    while let Some(node) = current {
        if node.declares_namespace {
            for attr in store.attributes_of(node) {
                if attr.value != namespace {
                    continue;
                }
                if attr.name == "xmlns" {
                    return Some(NamespaceAlias::Default);
                }
                if let Some(prefix) = attr.name.as_bytes().strip_prefix(b"xmlns:") {
                    return Some(NamespaceAlias::Prefix(StringView::new(prefix)));
                }
            }
        }
        current = node.parent.and_then(|parent| store.node(parent));
    }
    None
}
