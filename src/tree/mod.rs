//! The generic, schema-less document model.
//!
//! A world document is an ordered tree of named nodes carrying typed leaf
//! values. The decoder builds one per load, editing layers mutate it, and the
//! encoder replays it back into bytes. Insertion order of children and leaves
//! is semantically significant: the encoder emits chunks in exactly this
//! order, which is what makes unmodified documents round-trip byte-for-byte.
//!
//! Nodes live in an arena owned by the [`Tree`]; a [`NodeId`] is a plain
//! index. A node's `parent` is a non-owning back-reference used for scope
//! bookkeeping and removal; detaching a node clears it.

use crate::codec::Single;
use crate::error::{Error, Result};

/// Index of a node in its [`Tree`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Typed scalar payload of a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafValue {
    Byte(u8),
    Int32(i32),
    Single(Single),
    Str { value: String, max: Option<u32> },
    /// Opaque blob, used by the object-definition section.
    Bytes(Vec<u8>),
    /// Marker with no payload.
    Void,
}

impl LeafValue {
    pub fn str(value: impl Into<String>) -> Self {
        LeafValue::Str {
            value: value.into(),
            max: None,
        }
    }

    pub fn str_max(value: impl Into<String>, max: u32) -> Self {
        LeafValue::Str {
            value: value.into(),
            max: Some(max),
        }
    }

    pub fn single(v: f32) -> Self {
        LeafValue::Single(Single::from_f32(v))
    }
}

/// A named, typed value attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub name: String,
    pub value: LeafValue,
}

impl Leaf {
    pub fn new(name: impl Into<String>, value: LeafValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn as_byte(&self) -> Option<u8> {
        match self.value {
            LeafValue::Byte(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int32(&self) -> Option<i32> {
        match self.value {
            LeafValue::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_single(&self) -> Option<Single> {
        match self.value {
            LeafValue::Single(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            LeafValue::Str { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            LeafValue::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.value, LeafValue::Void)
    }

    /// Replace a string leaf's value, enforcing its maximum-length
    /// constraint. Never truncates.
    pub fn set_str(&mut self, s: impl Into<String>) -> Result<()> {
        let s = s.into();
        match &mut self.value {
            LeafValue::Str { value, max } => {
                if let Some(max) = *max {
                    if s.len() > max as usize {
                        return Err(Error::StringTooLong {
                            len: s.len(),
                            max: max as usize,
                        });
                    }
                }
                *value = s;
                Ok(())
            }
            _ => Err(Error::WrongLeafType {
                node: String::new(),
                field: self.name.clone(),
                expected: "string",
            }),
        }
    }
}

struct NodeData {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    leaves: Vec<Leaf>,
}

/// Arena-backed ordered tree of named nodes and typed leaves.
pub struct Tree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Tree {
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = NodeData {
            name: root_name.into(),
            parent: None,
            children: Vec::new(),
            leaves: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].name
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Append a new child node, preserving insertion order.
    pub fn add_node(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            name: name.into(),
            parent: Some(parent),
            children: Vec::new(),
            leaves: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// First child with this name, or a freshly appended one. Repeated
    /// logical groups accumulate under a single node this way.
    pub fn get_or_add_node(&mut self, parent: NodeId, name: &str) -> NodeId {
        match self.find_child_node(parent, name) {
            Some(id) => id,
            None => self.add_node(parent, name),
        }
    }

    pub fn add_leaf(&mut self, node: NodeId, name: impl Into<String>, value: LeafValue) {
        self.nodes[node.0].leaves.push(Leaf::new(name, value));
    }

    /// First child node with this name. Duplicate sibling names are legal;
    /// enumerate to see all of them.
    pub fn find_child_node(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c.0].name == name)
    }

    pub fn find_child_leaf(&self, node: NodeId, name: &str) -> Option<&Leaf> {
        self.nodes[node.0].leaves.iter().find(|l| l.name == name)
    }

    /// Like [`find_child_node`](Self::find_child_node) but required.
    pub fn get_child_node(&self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.find_child_node(parent, name)
            .ok_or_else(|| Error::MissingNode { name: name.into() })
    }

    /// Like [`find_child_leaf`](Self::find_child_leaf) but required.
    pub fn get_child_leaf(&self, node: NodeId, name: &str) -> Result<&Leaf> {
        self.find_child_leaf(node, name)
            .ok_or_else(|| Error::MissingField {
                node: self.nodes[node.0].name.clone(),
                field: name.into(),
            })
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn leaves(&self, node: NodeId) -> &[Leaf] {
        &self.nodes[node.0].leaves
    }

    pub fn leaves_mut(&mut self, node: NodeId) -> &mut [Leaf] {
        &mut self.nodes[node.0].leaves
    }

    /// Detach a node from its parent and clear the back-reference. The slot
    /// stays in the arena until the tree is dropped; the id must not be
    /// reused afterwards.
    pub fn remove_node(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    /// Remove the first leaf with this name; returns whether one existed.
    pub fn remove_leaf(&mut self, node: NodeId, name: &str) -> bool {
        let leaves = &mut self.nodes[node.0].leaves;
        match leaves.iter().position(|l| l.name == name) {
            Some(i) => {
                leaves.remove(i);
                true
            }
            None => false,
        }
    }

    /// Depth-first traversal: each node is reported, then its leaves, then
    /// its children in order.
    pub fn walk<N, L>(&self, from: NodeId, on_node: &mut N, on_leaf: &mut L)
    where
        N: FnMut(&Tree, NodeId, usize),
        L: FnMut(&Tree, NodeId, &Leaf, usize),
    {
        self.walk_at(from, 0, on_node, on_leaf);
    }

    fn walk_at<N, L>(&self, node: NodeId, depth: usize, on_node: &mut N, on_leaf: &mut L)
    where
        N: FnMut(&Tree, NodeId, usize),
        L: FnMut(&Tree, NodeId, &Leaf, usize),
    {
        on_node(self, node, depth);
        for leaf in &self.nodes[node.0].leaves {
            on_leaf(self, node, leaf, depth);
        }
        // children may grow during unrelated mutation but not during a walk;
        // clone the id list to keep the borrow local
        let children = self.nodes[node.0].children.clone();
        for child in children {
            self.walk_at(child, depth + 1, on_node, on_leaf);
        }
    }

    /// Structural equality: same names, same order, same leaf values.
    /// Arena indices are irrelevant.
    pub fn structural_eq(&self, other: &Tree) -> bool {
        self.subtree_eq(self.root, other, other.root)
    }

    fn subtree_eq(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        let na = &self.nodes[a.0];
        let nb = &other.nodes[b.0];
        if na.name != nb.name || na.leaves != nb.leaves {
            return false;
        }
        if na.children.len() != nb.children.len() {
            return false;
        }
        na.children
            .iter()
            .zip(&nb.children)
            .all(|(&ca, &cb)| self.subtree_eq(ca, other, cb))
    }

    /// Typed leaf accessors used where a chunk shape guarantees presence.
    pub fn leaf_byte(&self, node: NodeId, name: &str) -> Result<u8> {
        let leaf = self.get_child_leaf(node, name)?;
        leaf.as_byte().ok_or_else(|| self.type_err(node, name, "byte"))
    }

    pub fn leaf_i32(&self, node: NodeId, name: &str) -> Result<i32> {
        let leaf = self.get_child_leaf(node, name)?;
        leaf.as_int32()
            .ok_or_else(|| self.type_err(node, name, "int32"))
    }

    pub fn leaf_single(&self, node: NodeId, name: &str) -> Result<Single> {
        let leaf = self.get_child_leaf(node, name)?;
        leaf.as_single()
            .ok_or_else(|| self.type_err(node, name, "single"))
    }

    pub fn leaf_str(&self, node: NodeId, name: &str) -> Result<&str> {
        let leaf = self.get_child_leaf(node, name)?;
        leaf.as_str()
            .ok_or_else(|| self.type_err(node, name, "string"))
    }

    pub fn leaf_bytes(&self, node: NodeId, name: &str) -> Result<&[u8]> {
        let leaf = self.get_child_leaf(node, name)?;
        leaf.as_bytes()
            .ok_or_else(|| self.type_err(node, name, "bytes"))
    }

    pub fn has_void(&self, node: NodeId, name: &str) -> bool {
        self.find_child_leaf(node, name)
            .map(Leaf::is_void)
            .unwrap_or(false)
    }

    fn type_err(&self, node: NodeId, field: &str, expected: &'static str) -> Error {
        Error::WrongLeafType {
            node: self.nodes[node.0].name.clone(),
            field: field.into(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut tree = Tree::new("World");
        let root = tree.root();
        let a = tree.add_node(root, "Fog");
        let b = tree.add_node(root, "Object");
        let c = tree.add_node(root, "Object");
        assert_eq!(tree.children(root), &[a, b, c]);

        tree.add_leaf(a, "Near", LeafValue::single(1.0));
        tree.add_leaf(a, "Far", LeafValue::single(2.0));
        let names: Vec<_> = tree.leaves(a).iter().map(|l| l.name.clone()).collect();
        assert_eq!(names, ["Near", "Far"]);
    }

    #[test]
    fn test_duplicate_names_first_match() {
        let mut tree = Tree::new("World");
        let root = tree.root();
        let first = tree.add_node(root, "Object");
        let _second = tree.add_node(root, "Object");
        assert_eq!(tree.find_child_node(root, "Object"), Some(first));
        assert_eq!(tree.children(root).len(), 2);
    }

    #[test]
    fn test_get_or_add_idempotent() {
        let mut tree = Tree::new("World");
        let root = tree.root();
        let a = tree.get_or_add_node(root, "Teleports");
        let b = tree.get_or_add_node(root, "Teleports");
        assert_eq!(a, b);
        assert_eq!(tree.children(root).len(), 1);
    }

    #[test]
    fn test_remove_clears_back_reference() {
        let mut tree = Tree::new("World");
        let root = tree.root();
        let a = tree.add_node(root, "Fog");
        assert_eq!(tree.parent(a), Some(root));
        tree.remove_node(a);
        assert_eq!(tree.parent(a), None);
        assert!(tree.children(root).is_empty());
    }

    #[test]
    fn test_remove_leaf() {
        let mut tree = Tree::new("World");
        let root = tree.root();
        tree.add_leaf(root, "Name", LeafValue::str("box01"));
        assert!(tree.remove_leaf(root, "Name"));
        assert!(!tree.remove_leaf(root, "Name"));
    }

    #[test]
    fn test_get_child_leaf_missing() {
        let tree = Tree::new("World");
        let err = tree.get_child_leaf(tree.root(), "Name").unwrap_err();
        assert!(matches!(err, Error::MissingField { .. }));
    }

    #[test]
    fn test_set_str_respects_max() {
        let mut leaf = Leaf::new("Name", LeafValue::str_max("ok", 4));
        assert!(leaf.set_str("four").is_ok());
        assert!(matches!(
            leaf.set_str("five!"),
            Err(Error::StringTooLong { len: 5, max: 4 })
        ));
        assert_eq!(leaf.as_str(), Some("four"));
    }

    #[test]
    fn test_walk_depth_first() {
        let mut tree = Tree::new("World");
        let root = tree.root();
        let a = tree.add_node(root, "A");
        tree.add_node(a, "A1");
        tree.add_node(root, "B");

        let mut seen = Vec::new();
        tree.walk(
            root,
            &mut |t, n, d| seen.push((t.name(n).to_string(), d)),
            &mut |_, _, _, _| {},
        );
        assert_eq!(
            seen,
            [
                ("World".into(), 0),
                ("A".into(), 1),
                ("A1".into(), 2),
                ("B".into(), 1)
            ]
        );
    }

    #[test]
    fn test_structural_eq_ignores_arena_layout() {
        let mut a = Tree::new("World");
        let ra = a.root();
        let tmp = a.add_node(ra, "Scratch");
        a.remove_node(tmp);
        a.add_node(ra, "Fog");

        let mut b = Tree::new("World");
        let rb = b.root();
        b.add_node(rb, "Fog");

        assert!(a.structural_eq(&b));

        b.add_leaf(rb, "Name", LeafValue::str("x"));
        assert!(!a.structural_eq(&b));
    }
}
