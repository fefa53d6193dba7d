//! Key path extraction
//!
//! Flattens a nested payload into `/`-joined key paths plus a nested lookup
//! tree of the same paths. Mapping keys and sequence indices are segments.
//!
//! ```text
//! {u: {a: [5, 6, 7], b: "Hello"}}
//!
//! expand = true   ->  u/a/0  u/a/1  u/a/2  u/b
//! expand = false  ->  u/a  u/b
//! ```
//!
//! Empty mappings and empty sequences are leaves at their own path, so no
//! part of a payload is invisible to addressing.

use serde_json::Value;
use shared_types::Payload;
use std::collections::HashMap;

/// Separator between key path segments.
pub const SEPARATOR: char = '/';

/// What sits at a leaf path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    Null,
    Bool,
    Number,
    String,
    /// A sequence that was not descended into (or is empty).
    Sequence { len: usize },
    /// An empty mapping.
    EmptyMapping,
}

impl LeafKind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(items) => Self::Sequence { len: items.len() },
            Value::Object(_) => Self::EmptyMapping,
        }
    }
}

/// Nested lookup mirroring the extracted paths, one node per segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyTree {
    Leaf(LeafKind),
    Branch(HashMap<String, KeyTree>),
}

impl KeyTree {
    /// Child node for one segment.
    #[must_use]
    pub fn child(&self, segment: &str) -> Option<&KeyTree> {
        match self {
            Self::Branch(children) => children.get(segment),
            Self::Leaf(_) => None,
        }
    }

    /// All children of a branch (none for a leaf). Order is unspecified.
    pub fn children(&self) -> impl Iterator<Item = (&str, &KeyTree)> {
        let children = match self {
            Self::Branch(children) => Some(children.iter()),
            Self::Leaf(_) => None,
        };
        children
            .into_iter()
            .flatten()
            .map(|(segment, node)| (segment.as_str(), node))
    }

    /// Node at a `/`-joined path. The empty path is the node itself.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&KeyTree> {
        if path.is_empty() {
            return Some(self);
        }
        path.split(SEPARATOR)
            .try_fold(self, |node, segment| node.child(segment))
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    /// Number of leaves below (and including) this node.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Branch(children) => children.values().map(KeyTree::leaf_count).sum(),
        }
    }
}

/// Result of [`extract_key_paths`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    /// Leaf paths in first-encounter order.
    pub ordered: Vec<String>,
    /// The same paths as a nested lookup. The root is always a branch.
    pub tree: KeyTree,
}

/// Walk a payload depth-first and collect its key paths.
///
/// With `expand` false a sequence is one opaque leaf; with `expand` true each
/// element is descended into and addressed by its index.
///
/// Keys are joined with [`SEPARATOR`] as they are, without escaping. A key
/// that itself contains `/` can therefore collide with a nested path:
/// `{"a/b": 1, "a": {"b": 2}}` yields `a/b` twice in `ordered`. Payloads
/// whose keys are free of `/` never produce duplicate paths.
#[must_use]
pub fn extract_key_paths(payload: &Payload, expand: bool) -> KeyPaths {
    let mut ordered = Vec::new();
    let mut path = String::new();
    let children = walk_entries(
        payload.iter().map(|(key, value)| (key.clone(), value)),
        expand,
        &mut path,
        &mut ordered,
    );
    KeyPaths {
        ordered,
        tree: KeyTree::Branch(children),
    }
}

/// Join segments with [`SEPARATOR`].
#[must_use]
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            path.push(SEPARATOR);
        }
        path.push_str(segment.as_ref());
    }
    path
}

fn walk_entries<'a>(
    entries: impl Iterator<Item = (String, &'a Value)>,
    expand: bool,
    path: &mut String,
    ordered: &mut Vec<String>,
) -> HashMap<String, KeyTree> {
    let mut children = HashMap::new();
    for (segment, value) in entries {
        let mark = path.len();
        if mark > 0 {
            path.push(SEPARATOR);
        }
        path.push_str(&segment);
        let node = walk(value, expand, path, ordered);
        path.truncate(mark);
        children.insert(segment, node);
    }
    children
}

fn walk(value: &Value, expand: bool, path: &mut String, ordered: &mut Vec<String>) -> KeyTree {
    match value {
        Value::Object(map) if !map.is_empty() => KeyTree::Branch(walk_entries(
            map.iter().map(|(key, value)| (key.clone(), value)),
            expand,
            path,
            ordered,
        )),
        Value::Array(items) if expand && !items.is_empty() => KeyTree::Branch(walk_entries(
            items.iter().enumerate().map(|(i, value)| (i.to_string(), value)),
            expand,
            path,
            ordered,
        )),
        leaf => {
            ordered.push(path.clone());
            KeyTree::Leaf(LeafKind::of(leaf))
        }
    }
}
