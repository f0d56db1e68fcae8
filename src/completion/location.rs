//! What the cursor is pointing at: an object key being typed, or a value.

use crate::document::scanner::comment_at;
use crate::document::{Document, NodeId, NodeKind, PathSegment};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CompletionTarget {
    /// Suggest property names for `object`.
    PropertyName {
        object: NodeId,
        /// The property whose key is under the cursor, if any.
        current: Option<NodeId>,
        replace: (usize, usize),
        /// No value follows the key yet, so one is inserted with it.
        add_value: bool,
    },
    /// Suggest a value for the schema reachable at `path`.
    Value {
        path: Vec<PathSegment>,
        /// The existing value's range, or an empty range at the cursor.
        replace: (usize, usize),
    },
}

pub(crate) fn classify(document: &Document, offset: usize) -> Option<CompletionTarget> {
    let text = document.text();
    if comment_at(text, offset) {
        return None;
    }
    let Some(tree) = document.tree() else {
        return Some(CompletionTarget::Value {
            path: vec![],
            replace: (offset, offset),
        });
    };

    let mut id = tree.node_at_offset(offset, true)?;
    let node = tree.node(id);
    if offset == node.end() && offset > 0 {
        let before = text.as_bytes().get(offset - 1).copied();
        let closed = matches!(
            (node.kind, before),
            (NodeKind::Object, Some(b'}')) | (NodeKind::Array, Some(b']'))
        );
        if closed {
            id = tree.parent(id)?;
        }
    }

    let node = tree.node(id);
    if node.kind == NodeKind::String {
        if let Some(property) = tree.parent(id) {
            if tree.property_key_node(property) == Some(id) {
                return Some(CompletionTarget::PropertyName {
                    object: tree.parent(property)?,
                    current: Some(property),
                    replace: (node.offset, node.end()),
                    add_value: tree.property_value(property).is_none(),
                });
            }
        }
    }

    if node.kind == NodeKind::Object {
        // before the opening brace
        if offset == node.offset {
            return None;
        }
        return Some(CompletionTarget::PropertyName {
            object: id,
            current: None,
            replace: (offset, offset),
            add_value: true,
        });
    }

    let scalar = !matches!(
        node.kind,
        NodeKind::Object | NodeKind::Array | NodeKind::Property
    );
    let (value, container) = if scalar {
        (Some(id), tree.parent(id))
    } else {
        (None, Some(id))
    };
    let replace = match value {
        Some(value) => {
            let value = tree.node(value);
            (value.offset, value.end())
        }
        None => (offset, offset),
    };

    let Some(container) = container else {
        return Some(CompletionTarget::Value {
            path: vec![],
            replace,
        });
    };
    let container_node = tree.node(container);
    match container_node.kind {
        NodeKind::Property => {
            let colon = container_node.colon_offset?;
            if offset <= colon {
                return None;
            }
            if let Some(existing) = tree.property_value(container) {
                if offset > tree.node(existing).end() {
                    return None;
                }
            }
            let key = tree.property_key(container)?.to_string();
            let mut path = tree.path_of(container);
            path.push(PathSegment::Key(key));
            Some(CompletionTarget::Value { path, replace })
        }
        NodeKind::Array => {
            if value.is_none() && offset == container_node.offset {
                return None;
            }
            let index = match value {
                Some(value) => tree
                    .children(container)
                    .iter()
                    .position(|&child| child == value)
                    .unwrap_or(0),
                None => tree
                    .children(container)
                    .iter()
                    .filter(|&&child| tree.node(child).offset < offset)
                    .count(),
            };
            let mut path = tree.path_of(container);
            path.push(PathSegment::Index(index));
            Some(CompletionTarget::Value { path, replace })
        }
        _ => None,
    }
}
