//! Arena-backed parse tree.
//!
//! Nodes live in a single vector owned by [`ParsedTree`] and refer to each
//! other through [`NodeId`] indices, so the parent link is a plain index
//! rather than an owning pointer. The tree is immutable once built.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
    Property,
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Object => "object",
            NodeKind::Array => "array",
            NodeKind::String => "string",
            NodeKind::Number => "number",
            NodeKind::Boolean => "boolean",
            NodeKind::Null => "null",
            NodeKind::Property => "property",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    None,
    String(String),
    Number(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNode {
    pub kind: NodeKind,
    pub offset: usize,
    pub length: usize,
    pub value: NodeValue,
    /// Properties: `[key]` or `[key, value]`. Objects: property nodes.
    /// Arrays: element nodes.
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// Byte offset of the `:` for property nodes.
    pub colon_offset: Option<usize>,
}

impl ParsedNode {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn contains(&self, offset: usize, include_right_bound: bool) -> bool {
        (offset >= self.offset && offset < self.end())
            || (include_right_bound && offset == self.end())
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            NodeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            NodeValue::Number(n) => Some(n),
            _ => None,
        }
    }
}

/// One step of a location inside a document or schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{i}"),
            PathSegment::Key(k) => write!(f, "{}", k.replace('~', "~0").replace('/', "~1")),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        PathSegment::Key(value.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        PathSegment::Index(value)
    }
}

/// Render a path as a JSON pointer (`/a/0/b`).
pub fn pointer_string(path: &[PathSegment]) -> String {
    path.iter().map(|seg| format!("/{seg}")).collect()
}

/// A syntax problem found while building the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub offset: usize,
    pub length: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ParsedTree {
    pub(crate) source: Arc<str>,
    pub(crate) nodes: Vec<ParsedNode>,
    pub(crate) root: NodeId,
    pub(crate) syntax_errors: Vec<SyntaxError>,
}

impl ParsedTree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &ParsedNode {
        &self.nodes[id.0]
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn syntax_errors(&self) -> &[SyntaxError] {
        &self.syntax_errors
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Raw source text covered by a node.
    pub fn source_of(&self, id: NodeId) -> &str {
        let node = self.node(id);
        self.source.get(node.offset..node.end()).unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn property_key_node(&self, property: NodeId) -> Option<NodeId> {
        let node = self.node(property);
        (node.kind == NodeKind::Property)
            .then(|| node.children.first().copied())
            .flatten()
    }

    pub fn property_key(&self, property: NodeId) -> Option<&str> {
        self.property_key_node(property)
            .and_then(|key| self.node(key).as_str())
    }

    pub fn property_value(&self, property: NodeId) -> Option<NodeId> {
        let node = self.node(property);
        (node.kind == NodeKind::Property)
            .then(|| node.children.get(1).copied())
            .flatten()
    }

    /// `(key, property node)` pairs of an object node, in document order.
    pub fn properties(&self, object: NodeId) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        let node = self.node(object);
        let children: &[NodeId] = if node.kind == NodeKind::Object {
            &node.children
        } else {
            &[]
        };
        children
            .iter()
            .filter_map(|&prop| self.property_key(prop).map(|key| (key, prop)))
    }

    /// Value node of the named property of an object node.
    pub fn get_property(&self, object: NodeId, key: &str) -> Option<NodeId> {
        self.properties(object)
            .find(|(k, _)| *k == key)
            .and_then(|(_, prop)| self.property_value(prop))
    }

    /// Innermost node containing `offset`.
    pub fn node_at_offset(&self, offset: usize, include_right_bound: bool) -> Option<NodeId> {
        let mut current = self.root;
        if !self.node(current).contains(offset, include_right_bound) {
            return None;
        }
        'descend: loop {
            for &child in self.children(current) {
                let child_node = self.node(child);
                if offset < child_node.offset {
                    break;
                }
                if child_node.contains(offset, include_right_bound) {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }

    /// Location of a node from the root: property names and array indices.
    pub fn path_of(&self, id: NodeId) -> Vec<PathSegment> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            let parent_node = self.node(parent);
            match parent_node.kind {
                NodeKind::Property => {
                    if let Some(key) = self.property_key(parent) {
                        // a key node has no location of its own beyond the property
                        if self.property_key_node(parent) != Some(current) {
                            path.push(PathSegment::Key(key.to_string()));
                        }
                    }
                }
                NodeKind::Array => {
                    if let Some(index) = parent_node.children.iter().position(|&c| c == current) {
                        path.push(PathSegment::Index(index));
                    }
                }
                _ => {}
            }
            current = parent;
        }
        path.reverse();
        path
    }

    /// Follow a path from the root.
    pub fn find_by_path(&self, path: &[PathSegment]) -> Option<NodeId> {
        let mut current = self.root;
        for segment in path {
            current = match (segment, self.node(current).kind) {
                (PathSegment::Key(key), NodeKind::Object) => self.get_property(current, key)?,
                (PathSegment::Index(index), NodeKind::Array) => {
                    *self.children(current).get(*index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Convert a node to a JSON value. Missing property values become `null`.
    pub fn to_value(&self, id: NodeId) -> Value {
        let node = self.node(id);
        match node.kind {
            NodeKind::Object => {
                let mut map = Map::new();
                for (key, prop) in self.properties(id) {
                    let value = self
                        .property_value(prop)
                        .map(|v| self.to_value(v))
                        .unwrap_or(Value::Null);
                    map.insert(key.to_string(), value);
                }
                Value::Object(map)
            }
            NodeKind::Array => {
                Value::Array(node.children.iter().map(|&c| self.to_value(c)).collect())
            }
            NodeKind::String => Value::String(node.as_str().unwrap_or_default().to_string()),
            NodeKind::Number => node
                .as_f64()
                .and_then(number_value)
                .unwrap_or(Value::Null),
            NodeKind::Boolean => Value::Bool(matches!(node.value, NodeValue::Boolean(true))),
            NodeKind::Null => Value::Null,
            NodeKind::Property => self
                .property_value(id)
                .map(|v| self.to_value(v))
                .unwrap_or(Value::Null),
        }
    }
}

/// Integral floats become JSON integers so they compare equal to schema
/// literals written without a fraction.
pub fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Some(Value::Number(Number::from(n as i64)))
    } else {
        Number::from_f64(n).map(Value::Number)
    }
}
