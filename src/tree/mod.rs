//! Labeled tree of goal, obstacle, solution and resource nodes.
//!
//! Nodes are addressed by dotted paths (`root.2.1`): a child's identifier is
//! its parent's identifier plus the smallest positive integer not yet used by
//! a sibling. The persisted form is a nested JSON document keyed by tag:
//!
//! ```text
//! {"root": {"children": [{"obstacle": {"data": {...}}}, ...], "data": "Goal"}}
//! ```
//!
//! `data` is carried verbatim; loading rebuilds the dotted identifiers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::{AppError, AppResult, TreeError, TreeResult};

/// Identifier given to the root of every tree.
pub const ROOT_ID: &str = "root";

/// Pipeline stage a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeTag {
    Root,
    Goal,
    Obstacle,
    Solution,
    Resource,
}

impl NodeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeTag::Root => "root",
            NodeTag::Goal => "goal",
            NodeTag::Obstacle => "obstacle",
            NodeTag::Solution => "solution",
            NodeTag::Resource => "resource",
        }
    }
}

impl std::fmt::Display for NodeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NodeTag {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(NodeTag::Root),
            "goal" => Ok(NodeTag::Goal),
            "obstacle" => Ok(NodeTag::Obstacle),
            "solution" => Ok(NodeTag::Solution),
            "resource" => Ok(NodeTag::Resource),
            other => Err(TreeError::InvalidDocument {
                message: format!("unknown node tag '{}'", other),
            }),
        }
    }
}

/// A single tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub identifier: String,
    pub tag: NodeTag,
    /// Plain text, a `{title, description}` record, or `{id}` for resources.
    pub data: Value,
    pub parent: Option<String>,
}

impl Node {
    /// Text payload, when the data is a plain string.
    pub fn text(&self) -> Option<&str> {
        self.data.as_str()
    }

    /// `(title, description)` when the data is a canonical record.
    pub fn record(&self) -> Option<(&str, &Value)> {
        let obj = self.data.as_object()?;
        let title = obj.get("title")?.as_str()?;
        let description = obj.get("description")?;
        Some((title, description))
    }

    /// Referenced resource id for resource leaves.
    pub fn resource_id(&self) -> Option<u64> {
        self.data.as_object()?.get("id")?.as_u64()
    }

    /// Human-readable label of the node.
    pub fn label(&self) -> String {
        if let Some(text) = self.text() {
            return text.to_string();
        }
        if let Some((title, _)) = self.record() {
            return title.to_string();
        }
        if let Some(id) = self.resource_id() {
            return format!("resource:{}", id);
        }
        self.tag.to_string()
    }

    /// Single-line summary used in prompts and reports: `title: description`
    /// for records, the text itself otherwise.
    pub fn summary(&self) -> String {
        match self.record() {
            Some((title, description)) => {
                format!("{}: {}", title, description_text(description))
            }
            None => self.label(),
        }
    }
}

/// Render a record description (string or object) as text.
pub fn description_text(description: &Value) -> String {
    match description {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// In-memory tree store.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: HashMap<String, Node>,
    children: HashMap<String, Vec<String>>,
    root: Option<String>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.nodes.contains_key(identifier)
    }

    /// Create the root node.
    pub fn create_root(
        &mut self,
        identifier: &str,
        tag: NodeTag,
        data: impl Into<Value>,
    ) -> TreeResult<String> {
        if let Some(existing) = &self.root {
            return Err(TreeError::RootExists {
                identifier: existing.clone(),
            });
        }
        self.insert(Node {
            identifier: identifier.to_string(),
            tag,
            data: data.into(),
            parent: None,
        })?;
        self.root = Some(identifier.to_string());
        Ok(identifier.to_string())
    }

    /// Create a child of `parent`.
    ///
    /// Without an explicit identifier the child gets `parent.N`, `N` being the
    /// smallest positive integer not used by a current sibling.
    pub fn create_node(
        &mut self,
        identifier: Option<&str>,
        parent: &str,
        tag: NodeTag,
        data: impl Into<Value>,
    ) -> TreeResult<String> {
        if !self.nodes.contains_key(parent) {
            return Err(TreeError::NodeNotFound {
                identifier: parent.to_string(),
            });
        }
        let identifier = match identifier {
            Some(id) => id.to_string(),
            None => format!("{}.{}", parent, self.next_child_number(parent)),
        };
        self.insert(Node {
            identifier: identifier.clone(),
            tag,
            data: data.into(),
            parent: Some(parent.to_string()),
        })?;
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(identifier.clone());
        Ok(identifier)
    }

    /// Append a child with the next free dotted identifier.
    pub fn add_child(
        &mut self,
        parent: &str,
        tag: NodeTag,
        data: impl Into<Value>,
    ) -> TreeResult<String> {
        self.create_node(None, parent, tag, data)
    }

    fn insert(&mut self, node: Node) -> TreeResult<()> {
        if self.nodes.contains_key(&node.identifier) {
            return Err(TreeError::DuplicateIdentifier {
                identifier: node.identifier,
            });
        }
        self.nodes.insert(node.identifier.clone(), node);
        Ok(())
    }

    /// Smallest positive integer `n` such that `parent.n` is unused.
    pub fn next_child_number(&self, parent: &str) -> usize {
        (1..)
            .find(|n| !self.nodes.contains_key(&format!("{}.{}", parent, n)))
            .unwrap_or(1)
    }

    pub fn get(&self, identifier: &str) -> Option<&Node> {
        self.nodes.get(identifier)
    }

    pub fn get_mut(&mut self, identifier: &str) -> Option<&mut Node> {
        self.nodes.get_mut(identifier)
    }

    /// Look up a node, failing with [`TreeError::NodeNotFound`].
    pub fn node(&self, identifier: &str) -> TreeResult<&Node> {
        self.nodes
            .get(identifier)
            .ok_or_else(|| TreeError::NodeNotFound {
                identifier: identifier.to_string(),
            })
    }

    pub fn set_tag(&mut self, identifier: &str, tag: NodeTag) -> TreeResult<()> {
        let node = self
            .nodes
            .get_mut(identifier)
            .ok_or_else(|| TreeError::NodeNotFound {
                identifier: identifier.to_string(),
            })?;
        node.tag = tag;
        Ok(())
    }

    /// Children of a node, in insertion order.
    pub fn children(&self, identifier: &str) -> Vec<&Node> {
        self.child_ids(identifier)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    fn child_ids(&self, identifier: &str) -> &[String] {
        self.children
            .get(identifier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn parent(&self, identifier: &str) -> Option<&Node> {
        let parent = self.nodes.get(identifier)?.parent.as_deref()?;
        self.nodes.get(parent)
    }

    pub fn is_leaf(&self, identifier: &str) -> bool {
        self.child_ids(identifier).is_empty()
    }

    /// Depth below the root (root is 0).
    pub fn depth(&self, identifier: &str) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(identifier).and_then(|n| n.parent.as_deref());
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes.get(parent).and_then(|n| n.parent.as_deref());
        }
        depth
    }

    /// Identifiers of every node in pre-order.
    pub fn preorder(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<&str> = self.root.as_deref().into_iter().collect();
        while let Some(id) = stack.pop() {
            out.push(id.to_string());
            for child in self.child_ids(id).iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Nodes without children, in pre-order.
    ///
    /// Computed fresh on every call; nodes added afterwards are not included.
    pub fn leaves(&self) -> Vec<String> {
        self.preorder()
            .into_iter()
            .filter(|id| self.is_leaf(id))
            .collect()
    }

    /// Remove a node and everything below it. Siblings keep their identifiers.
    pub fn remove_subtree(&mut self, identifier: &str) -> TreeResult<usize> {
        let node = self.node(identifier)?;
        let parent = node.parent.clone();

        let mut removed = 0;
        let mut stack = vec![identifier.to_string()];
        while let Some(id) = stack.pop() {
            if let Some(kids) = self.children.remove(&id) {
                stack.extend(kids);
            }
            if self.nodes.remove(&id).is_some() {
                removed += 1;
            }
        }

        match parent {
            Some(parent) => {
                if let Some(siblings) = self.children.get_mut(&parent) {
                    siblings.retain(|s| s != identifier);
                }
            }
            None => self.root = None,
        }
        Ok(removed)
    }

    /// Label of a node, see [`Node::label`].
    pub fn label(&self, identifier: &str) -> Option<String> {
        self.nodes.get(identifier).map(Node::label)
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Persisted document: `{tag: {"children": [...], "data": ...}}`.
    pub fn to_json(&self) -> TreeResult<Value> {
        let root = self.root.as_deref().ok_or(TreeError::NoRoot)?;
        Ok(self.node_json(root))
    }

    fn node_json(&self, identifier: &str) -> Value {
        let mut body = Map::new();
        let kids = self.child_ids(identifier);
        if !kids.is_empty() {
            let children = kids.iter().map(|c| self.node_json(c)).collect();
            body.insert("children".to_string(), Value::Array(children));
        }
        let node = &self.nodes[identifier];
        body.insert("data".to_string(), node.data.clone());

        let mut wrapper = Map::new();
        wrapper.insert(node.tag.to_string(), Value::Object(body));
        Value::Object(wrapper)
    }

    /// Rebuild a tree from its persisted document.
    pub fn from_json(document: &Value) -> TreeResult<Self> {
        let (tag, body) = single_entry(document)?;
        let tag: NodeTag = tag.parse()?;
        let data = body.get("data").cloned().unwrap_or(Value::Null);

        let mut tree = Tree::new();
        tree.create_root(ROOT_ID, tag, data)?;
        tree.load_children(ROOT_ID, body)?;
        Ok(tree)
    }

    fn load_children(&mut self, parent: &str, body: &Map<String, Value>) -> TreeResult<()> {
        let Some(children) = body.get("children") else {
            return Ok(());
        };
        let children = children.as_array().ok_or_else(|| TreeError::InvalidDocument {
            message: format!("children of '{}' is not a list", parent),
        })?;

        for child in children {
            match child {
                // Outline exports store leaves as bare strings
                Value::String(text) => {
                    self.add_child(parent, NodeTag::Obstacle, text.trim())?;
                }
                Value::Object(_) => {
                    let (tag, child_body) = single_entry(child)?;
                    let tag: NodeTag = tag.parse()?;
                    let data = child_body.get("data").cloned().unwrap_or(Value::Null);
                    let id = self.add_child(parent, tag, data)?;
                    self.load_children(&id, child_body)?;
                }
                other => {
                    return Err(TreeError::InvalidDocument {
                        message: format!("unexpected child under '{}': {}", parent, other),
                    })
                }
            }
        }
        Ok(())
    }

    /// Label-keyed outline: `{label: {"children": [...]}}`, leaves as bare labels.
    pub fn to_dict(&self) -> TreeResult<Value> {
        let root = self.root.as_deref().ok_or(TreeError::NoRoot)?;
        Ok(self.node_dict(root))
    }

    fn node_dict(&self, identifier: &str) -> Value {
        let label = self.nodes[identifier].label();
        let kids = self.child_ids(identifier);
        if kids.is_empty() {
            return Value::String(label);
        }
        let children = kids.iter().map(|c| self.node_dict(c)).collect();
        let mut body = Map::new();
        body.insert("children".to_string(), Value::Array(children));
        let mut wrapper = Map::new();
        wrapper.insert(label, Value::Object(body));
        Value::Object(wrapper)
    }

    /// Indented text rendering of the subtree at `identifier`.
    pub fn render(&self, identifier: &str) -> String {
        let mut out = String::new();
        let base = self.depth(identifier);
        let mut stack = vec![identifier];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let indent = "  ".repeat(self.depth(id) - base);
            let _ = writeln!(out, "> {}{}. {} {}", indent, node.identifier, node.tag, node.label());
            for child in self.child_ids(id).iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Read a tree document from disk.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let document: Value = serde_json::from_str(&text).map_err(|e| AppError::json(path, e))?;
        Ok(Self::from_json(&document)?)
    }

    /// Write the tree document to disk.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        let document = self.to_json()?;
        let text = serde_json::to_string(&document).map_err(|e| AppError::json(path, e))?;
        std::fs::write(path, text).map_err(|e| AppError::io(path, e))
    }
}

fn single_entry(value: &Value) -> TreeResult<(&str, &Map<String, Value>)> {
    let obj = value.as_object().ok_or_else(|| TreeError::InvalidDocument {
        message: format!("expected an object, found {}", value),
    })?;
    let mut entries = obj.iter();
    match (entries.next(), entries.next()) {
        (Some((tag, Value::Object(body))), None) => Ok((tag.as_str(), body)),
        _ => Err(TreeError::InvalidDocument {
            message: format!("expected a single tagged node, found {}", value),
        }),
    }
}
