//! Arena node tree.
//!
//! All nodes of one document live in a single `Vec` owned by [`Tree`]; parents
//! own their children by index and the parent link is a plain [`NodeId`], so
//! the structure stays acyclic without reference counting.
//!
//! Fragments and containers carry a [`LoadState`] recording how much of them
//! has been read from the stream, plus a [`ResumeCursor`] when reading stopped
//! short of [`LoadState::Full`].

use std::sync::Arc;

use crate::association::{ids, Association};
use crate::error::{Crumb, Error, Result};
use crate::value::Value;

// ============================================================================
// Core Types
// ============================================================================

/// Index into the tree's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn new(index: usize) -> Self {
        NodeId(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// How much of a fragment or container has been materialized.
///
/// Ordered: a node's state only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadState {
    /// Nothing read yet.
    #[default]
    None,
    /// The start marker (and thus the association) has been read.
    IdOnly,
    /// All attributes have been read.
    Attributes,
    /// Attributes and every child have been read.
    Full,
}

/// Opaque stream position saved when materialization stops early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeCursor(u64);

impl ResumeCursor {
    pub(crate) fn new(offset: u64) -> Self {
        ResumeCursor(offset)
    }

    pub fn offset(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    /// Stream offset of the node's first marker, for diagnostics.
    offset: Option<u64>,
    kind: NodeKind,
}

/// The kind of node in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Ordered children without attributes. The document body is one.
    Fragment(Fragment),
    Container(Container),
    Primitive(Primitive),
    Comment(String),
    Padding(u64),
}

/// Ordered child list with its load progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub(crate) children: Vec<NodeId>,
    pub(crate) state: LoadState,
    pub(crate) cursor: Option<ResumeCursor>,
}

impl Fragment {
    fn with_state(state: LoadState) -> Self {
        Fragment {
            state,
            ..Fragment::default()
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn cursor(&self) -> Option<ResumeCursor> {
        self.cursor
    }
}

/// A fragment with an association and an attribute list.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    /// `None` until the start marker has been read.
    pub(crate) association: Option<Arc<Association>>,
    pub(crate) attributes: Vec<NodeId>,
    pub(crate) content: Fragment,
}

impl Container {
    pub fn association(&self) -> Option<&Arc<Association>> {
        self.association.as_ref()
    }

    pub fn state(&self) -> LoadState {
        self.content.state
    }
}

/// A typed value, either an attribute of its container or a child element.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub(crate) association: Arc<Association>,
    pub(crate) value: Value,
    pub(crate) is_attribute: bool,
}

impl Primitive {
    pub fn association(&self) -> &Arc<Association> {
        &self.association
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_attribute(&self) -> bool {
        self.is_attribute
    }
}

// ============================================================================
// Tree
// ============================================================================

/// A node arena with one root.
///
/// Detached nodes stay in the arena but are unreachable from the root.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl Tree {
    /// A tree whose root is an empty, fully loaded fragment.
    pub fn new() -> Self {
        Tree::with_root(NodeKind::Fragment(Fragment::with_state(LoadState::Full)))
    }

    /// A tree whose root fragment has not been read yet.
    pub fn unloaded() -> Self {
        Tree::with_root(NodeKind::Fragment(Fragment::default()))
    }

    /// A tree whose root is a container whose start marker has not been read.
    pub fn unloaded_container() -> Self {
        Tree::with_root(NodeKind::Container(Container {
            association: None,
            attributes: Vec::new(),
            content: Fragment::default(),
        }))
    }

    /// A tree whose root is an empty, fully loaded container.
    pub fn with_root_container(association: impl Into<Arc<Association>>) -> Self {
        Tree::with_root(NodeKind::Container(Container {
            association: Some(association.into()),
            attributes: Vec::new(),
            content: Fragment::with_state(LoadState::Full),
        }))
    }

    fn with_root(kind: NodeKind) -> Self {
        Tree {
            nodes: vec![NodeData {
                parent: None,
                offset: None,
                kind,
            }],
            root: NodeId::new(0),
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// Get the root node.
    pub fn root(&self) -> Node<'_> {
        Node {
            tree: self,
            id: self.root,
        }
    }

    /// Get a node by ID.
    pub fn get(&self, id: NodeId) -> Option<Node<'_>> {
        if id.index() < self.nodes.len() {
            Some(Node { tree: self, id })
        } else {
            None
        }
    }

    /// Get a node by ID, failing on a foreign id.
    pub fn node(&self, id: NodeId) -> Result<Node<'_>> {
        self.get(id)
            .ok_or_else(|| Error::usage(format!("node {} does not belong to this tree", id.0)))
    }

    fn data(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| Error::usage(format!("node {} does not belong to this tree", id.0)))
    }

    fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.nodes
            .get_mut(id.index())
            .ok_or_else(|| Error::usage(format!("node {} does not belong to this tree", id.0)))
    }

    pub fn kind(&self, id: NodeId) -> Result<&NodeKind> {
        Ok(&self.data(id)?.kind)
    }

    pub(crate) fn kind_mut(&mut self, id: NodeId) -> Result<&mut NodeKind> {
        Ok(&mut self.data_mut(id)?.kind)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.data(id)?.parent)
    }

    /// Load state of a fragment or container. Leaf nodes are always full.
    pub fn state(&self, id: NodeId) -> Result<LoadState> {
        Ok(match self.kind(id)? {
            NodeKind::Fragment(f) => f.state,
            NodeKind::Container(c) => c.content.state,
            _ => LoadState::Full,
        })
    }

    /// Pending resume cursor of a fragment or container.
    pub fn cursor(&self, id: NodeId) -> Result<Option<ResumeCursor>> {
        Ok(self.fragment(id)?.and_then(|f| f.cursor))
    }

    pub(crate) fn fragment(&self, id: NodeId) -> Result<Option<&Fragment>> {
        Ok(match self.kind(id)? {
            NodeKind::Fragment(f) => Some(f),
            NodeKind::Container(c) => Some(&c.content),
            _ => None,
        })
    }

    pub(crate) fn fragment_mut(&mut self, id: NodeId) -> Result<&mut Fragment> {
        match self.kind_mut(id)? {
            NodeKind::Fragment(f) => Ok(f),
            NodeKind::Container(c) => Ok(&mut c.content),
            _ => Err(Error::usage("node has no children")),
        }
    }

    pub(crate) fn container_mut(&mut self, id: NodeId) -> Result<&mut Container> {
        match self.kind_mut(id)? {
            NodeKind::Container(c) => Ok(c),
            _ => Err(Error::usage("node is not a container")),
        }
    }

    pub(crate) fn set_state(&mut self, id: NodeId, state: LoadState) -> Result<()> {
        let fragment = self.fragment_mut(id)?;
        debug_assert!(state >= fragment.state, "load state regressed");
        fragment.state = state;
        Ok(())
    }

    pub(crate) fn set_offset(&mut self, id: NodeId, offset: u64) -> Result<()> {
        self.data_mut(id)?.offset = Some(offset);
        Ok(())
    }

    /// Diagnostic location of a node: its association and stream offset.
    pub fn crumb(&self, id: NodeId) -> Crumb {
        let Ok(data) = self.data(id) else {
            return Crumb {
                id: 0,
                name: None,
                offset: None,
            };
        };
        let association = match &data.kind {
            NodeKind::Container(c) => c.association.as_deref(),
            NodeKind::Primitive(p) => Some(&*p.association),
            _ => None,
        };
        Crumb {
            id: association.map_or(0, Association::id),
            name: association.and_then(|a| a.name().map(str::to_string)),
            offset: data.offset,
        }
    }

    fn alloc(&mut self, parent: Option<NodeId>, offset: Option<u64>, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(NodeData {
            parent,
            offset,
            kind,
        });
        id
    }

    /// Append `kind` to the child list of `parent`.
    pub(crate) fn push_child(&mut self, parent: NodeId, kind: NodeKind, offset: Option<u64>) -> Result<NodeId> {
        self.fragment(parent)?
            .ok_or_else(|| Error::usage("node has no children"))?;
        let id = self.alloc(Some(parent), offset, kind);
        self.fragment_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Append an attribute to `container`.
    pub(crate) fn push_attribute(
        &mut self,
        container: NodeId,
        association: Arc<Association>,
        value: Value,
        offset: Option<u64>,
    ) -> Result<NodeId> {
        self.container_mut(container)?;
        let kind = NodeKind::Primitive(Primitive {
            association,
            value,
            is_attribute: true,
        });
        let id = self.alloc(Some(container), offset, kind);
        self.container_mut(container)?.attributes.push(id);
        Ok(id)
    }

    /// Append padding, merging with a trailing padding sibling.
    pub(crate) fn push_padding(&mut self, parent: NodeId, len: u64, offset: Option<u64>) -> Result<NodeId> {
        let last = self.fragment_mut(parent)?.children.last().copied();
        if let Some(last) = last {
            if let NodeKind::Padding(existing) = self.kind_mut(last)? {
                *existing += len;
                return Ok(last);
            }
        }
        self.push_child(parent, NodeKind::Padding(len), offset)
    }

    /// Remove a node from its parent's attribute or child list.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let Some(parent) = self.data(id)?.parent else {
            return Err(Error::usage("cannot detach a root node"));
        };
        match self.kind_mut(parent)? {
            NodeKind::Container(c) => {
                c.attributes.retain(|a| *a != id);
                c.content.children.retain(|c| *c != id);
            }
            NodeKind::Fragment(f) => f.children.retain(|c| *c != id),
            _ => {}
        }
        self.data_mut(id)?.parent = None;
        Ok(())
    }

    /// Deep-copy `node` of `source` into this tree under `parent`.
    ///
    /// Attributes are appended to `parent`'s attribute list, anything else to
    /// its children. Load states and resume cursors are preserved verbatim.
    pub fn import(&mut self, parent: NodeId, source: &Tree, node: NodeId) -> Result<NodeId> {
        let is_attribute = matches!(source.kind(node)?, NodeKind::Primitive(p) if p.is_attribute);
        if is_attribute {
            self.container_mut(parent)?;
        } else {
            self.fragment(parent)?
                .ok_or_else(|| Error::usage("node has no children"))?;
        }
        let copy = self.copy_subtree(source, node, Some(parent))?;
        if is_attribute {
            self.container_mut(parent)?.attributes.push(copy);
        } else {
            self.fragment_mut(parent)?.children.push(copy);
        }
        Ok(copy)
    }

    /// Copy the subtree at `node` into a tree of its own.
    pub fn extract(&self, node: NodeId) -> Result<Tree> {
        let mut tree = Tree {
            nodes: Vec::new(),
            root: NodeId::new(0),
        };
        tree.root = tree.copy_subtree(self, node, None)?;
        Ok(tree)
    }

    fn copy_subtree(&mut self, source: &Tree, node: NodeId, parent: Option<NodeId>) -> Result<NodeId> {
        let data = source.data(node)?;
        let mut kind = data.kind.clone();
        let id = self.alloc(parent, data.offset, NodeKind::Padding(0));

        match &mut kind {
            NodeKind::Fragment(f) => {
                f.children = self.copy_all(source, &f.children, id)?;
            }
            NodeKind::Container(c) => {
                c.attributes = self.copy_all(source, &c.attributes, id)?;
                c.content.children = self.copy_all(source, &c.content.children, id)?;
            }
            _ => {}
        }
        self.data_mut(id)?.kind = kind;
        Ok(id)
    }

    fn copy_all(&mut self, source: &Tree, nodes: &[NodeId], parent: NodeId) -> Result<Vec<NodeId>> {
        nodes
            .iter()
            .map(|&n| self.copy_subtree(source, n, Some(parent)))
            .collect()
    }
}

// ============================================================================
// Node (navigation handle)
// ============================================================================

/// A handle for navigating the tree.
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t Tree,
    id: NodeId,
}

impl<'t> Node<'t> {
    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t Tree {
        self.tree
    }

    /// Get the node's kind.
    pub fn kind(&self) -> &'t NodeKind {
        &self.tree.nodes[self.id.index()].kind
    }

    pub fn state(&self) -> LoadState {
        match self.kind() {
            NodeKind::Fragment(f) => f.state,
            NodeKind::Container(c) => c.content.state,
            _ => LoadState::Full,
        }
    }

    /// Stream offset of the node's first marker, when it was read from one.
    pub fn offset(&self) -> Option<u64> {
        self.tree.nodes[self.id.index()].offset
    }

    /// Association of a container or primitive.
    pub fn association(&self) -> Option<&'t Arc<Association>> {
        match self.kind() {
            NodeKind::Container(c) => c.association.as_ref(),
            NodeKind::Primitive(p) => Some(&p.association),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&'t str> {
        self.association().and_then(|a| a.name())
    }

    /// Numeric id of the node's association.
    pub fn association_id(&self) -> Option<u32> {
        self.association().map(|a| a.id())
    }

    /// Value of a primitive node.
    pub fn value(&self) -> Option<&'t Value> {
        match self.kind() {
            NodeKind::Primitive(p) => Some(&p.value),
            _ => None,
        }
    }

    pub fn comment(&self) -> Option<&'t str> {
        match self.kind() {
            NodeKind::Comment(text) => Some(text),
            _ => None,
        }
    }

    /// Check if this is a container node.
    pub fn is_container(&self) -> bool {
        matches!(self.kind(), NodeKind::Container(_))
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.kind(), NodeKind::Fragment(_))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind(), NodeKind::Primitive(_))
    }

    /// True for primitives held in an attribute list.
    pub fn is_attribute(&self) -> bool {
        matches!(self.kind(), NodeKind::Primitive(p) if p.is_attribute)
    }

    /// Get the parent node, if any.
    pub fn parent(&self) -> Option<Node<'t>> {
        self.tree.nodes[self.id.index()]
            .parent
            .map(|id| Node { tree: self.tree, id })
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = Node<'t>> {
        std::iter::successors(self.parent(), |n| n.parent())
    }

    fn loaded_children(&self) -> &'t [NodeId] {
        match self.kind() {
            NodeKind::Fragment(f) if f.state == LoadState::Full => &f.children,
            NodeKind::Container(c) if c.content.state == LoadState::Full => &c.content.children,
            _ => &[],
        }
    }

    /// Get the first child node. `None` as well when children are not loaded.
    pub fn first_child(&self) -> Option<Node<'t>> {
        self.loaded_children()
            .first()
            .map(|&id| Node { tree: self.tree, id })
    }

    /// Get the last child node.
    pub fn last_child(&self) -> Option<Node<'t>> {
        self.loaded_children()
            .last()
            .map(|&id| Node { tree: self.tree, id })
    }

    fn siblings(&self) -> Option<&'t [NodeId]> {
        let parent = self.parent()?;
        match parent.kind() {
            NodeKind::Container(c) if self.is_attribute() => Some(&c.attributes),
            NodeKind::Container(c) => Some(&c.content.children),
            NodeKind::Fragment(f) => Some(&f.children),
            _ => None,
        }
    }

    /// Get the next sibling node.
    pub fn next_sibling(&self) -> Option<Node<'t>> {
        let siblings = self.siblings()?;
        let pos = siblings.iter().position(|&id| id == self.id)?;
        siblings
            .get(pos + 1)
            .map(|&id| Node { tree: self.tree, id })
    }

    /// Get the previous sibling node.
    pub fn prev_sibling(&self) -> Option<Node<'t>> {
        let siblings = self.siblings()?;
        let pos = siblings.iter().position(|&id| id == self.id)?;
        if pos > 0 {
            Some(Node {
                tree: self.tree,
                id: siblings[pos - 1],
            })
        } else {
            None
        }
    }

    /// Structural and value equality with another node, ignoring load
    /// progress, stream offsets and content-size attributes.
    pub fn same_content(&self, other: &Node<'_>) -> bool {
        match (self.kind(), other.kind()) {
            (NodeKind::Fragment(a), NodeKind::Fragment(b)) => {
                self.same_list(&a.children, other, &b.children)
            }
            (NodeKind::Container(a), NodeKind::Container(b)) => {
                let same_id = a.association.as_ref().map(|x| x.id())
                    == b.association.as_ref().map(|x| x.id());
                let attrs_a = self.without_size(&a.attributes);
                let attrs_b = other.without_size(&b.attributes);
                same_id
                    && self.same_list(&attrs_a, other, &attrs_b)
                    && self.same_list(&a.content.children, other, &b.content.children)
            }
            (NodeKind::Primitive(a), NodeKind::Primitive(b)) => {
                a.association.id() == b.association.id()
                    && a.value == b.value
                    && a.is_attribute == b.is_attribute
            }
            (NodeKind::Comment(a), NodeKind::Comment(b)) => a == b,
            (NodeKind::Padding(a), NodeKind::Padding(b)) => a == b,
            _ => false,
        }
    }

    fn without_size(&self, attributes: &[NodeId]) -> Vec<NodeId> {
        attributes
            .iter()
            .copied()
            .filter(|&id| {
                let node = Node { tree: self.tree, id };
                node.association_id() != Some(ids::CONTENT_SIZE)
            })
            .collect()
    }

    fn same_list(&self, mine: &[NodeId], other: &Node<'_>, theirs: &[NodeId]) -> bool {
        mine.len() == theirs.len()
            && mine.iter().zip(theirs).all(|(&a, &b)| {
                let a = Node { tree: self.tree, id: a };
                let b = Node {
                    tree: other.tree,
                    id: b,
                };
                a.same_content(&b)
            })
    }
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", self.kind())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PrimitiveType;

    fn body() -> Arc<Association> {
        Arc::new(Association::container(11, "Body"))
    }

    fn title() -> Arc<Association> {
        Arc::new(Association::primitive(10, "Title", PrimitiveType::String))
    }

    fn full_container(tree: &mut Tree, parent: NodeId) -> NodeId {
        let kind = NodeKind::Container(Container {
            association: Some(body()),
            attributes: Vec::new(),
            content: Fragment::with_state(LoadState::Full),
        });
        tree.push_child(parent, kind, None).unwrap()
    }

    #[test]
    fn test_load_state_order() {
        assert!(LoadState::None < LoadState::IdOnly);
        assert!(LoadState::IdOnly < LoadState::Attributes);
        assert!(LoadState::Attributes < LoadState::Full);
    }

    #[test]
    fn test_parent_and_siblings() {
        let mut tree = Tree::new();
        let root = tree.root_id();
        let a = full_container(&mut tree, root);
        let b = tree.push_child(root, NodeKind::Comment("x".into()), None).unwrap();

        let a_node = tree.root().first_child().unwrap();
        assert_eq!(a_node.id(), a);
        assert_eq!(a_node.name(), Some("Body"));
        assert_eq!(a_node.next_sibling().unwrap().id(), b);
        assert_eq!(tree.get(b).unwrap().prev_sibling().unwrap().id(), a);
        assert_eq!(a_node.parent().unwrap().id(), root);
        assert!(tree.get(b).unwrap().next_sibling().is_none());
    }

    #[test]
    fn test_attribute_siblings_are_attributes() {
        let mut tree = Tree::new();
        let root = tree.root_id();
        let body = full_container(&mut tree, root);
        let first = tree.push_attribute(body, title(), Value::from("a"), None).unwrap();
        let second = tree.push_attribute(body, title(), Value::from("b"), None).unwrap();
        tree.push_child(body, NodeKind::Comment("c".into()), None).unwrap();

        let node = tree.get(first).unwrap();
        assert!(node.is_attribute());
        assert_eq!(node.next_sibling().unwrap().id(), second);
        assert!(tree.get(second).unwrap().next_sibling().is_none());
    }

    #[test]
    fn test_padding_merges() {
        let mut tree = Tree::new();
        let root = tree.root_id();
        let first = tree.push_padding(root, 3, None).unwrap();
        let second = tree.push_padding(root, 4, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.kind(first).unwrap(), &NodeKind::Padding(7));

        tree.push_child(root, NodeKind::Comment("x".into()), None).unwrap();
        let third = tree.push_padding(root, 1, None).unwrap();
        assert_ne!(first, third);
    }

    #[test]
    fn test_detach() {
        let mut tree = Tree::new();
        let root = tree.root_id();
        let a = full_container(&mut tree, root);
        let attr = tree.push_attribute(a, title(), Value::from("t"), None).unwrap();

        tree.detach(attr).unwrap();
        assert!(tree.get(attr).unwrap().parent().is_none());
        assert!(matches!(tree.kind(a).unwrap(), NodeKind::Container(c) if c.attributes.is_empty()));

        tree.detach(a).unwrap();
        assert!(tree.root().first_child().is_none());
        assert!(tree.detach(root).is_err());
    }

    #[test]
    fn test_import_preserves_state_and_cursor() {
        let mut source = Tree::new();
        let root = source.root_id();
        let kind = NodeKind::Container(Container {
            association: Some(body()),
            attributes: Vec::new(),
            content: Fragment {
                children: Vec::new(),
                state: LoadState::Attributes,
                cursor: Some(ResumeCursor::new(42)),
            },
        });
        let partial = source.push_child(root, kind, Some(7)).unwrap();
        source.push_attribute(partial, title(), Value::from("x"), None).unwrap();

        let mut target = Tree::new();
        let target_root = target.root_id();
        let copy = target.import(target_root, &source, partial).unwrap();

        assert_eq!(target.state(copy).unwrap(), LoadState::Attributes);
        assert_eq!(target.cursor(copy).unwrap(), Some(ResumeCursor::new(42)));
        assert_eq!(target.get(copy).unwrap().offset(), Some(7));
        assert!(target.get(copy).unwrap().same_content(&source.get(partial).unwrap()));
    }

    #[test]
    fn test_extract() {
        let mut tree = Tree::new();
        let root = tree.root_id();
        let a = full_container(&mut tree, root);
        let inner = full_container(&mut tree, a);
        tree.push_child(inner, NodeKind::Comment("deep".into()), None).unwrap();

        let copy = tree.extract(a).unwrap();
        assert!(copy.root().parent().is_none());
        assert!(copy.root().same_content(&tree.get(a).unwrap()));
        let deep = copy.root().first_child().unwrap().first_child().unwrap();
        assert_eq!(deep.comment(), Some("deep"));
    }

    #[test]
    fn test_same_content_ignores_content_size() {
        let size = Arc::new(Association::primitive(
            ids::CONTENT_SIZE,
            "content-size",
            PrimitiveType::UInt,
        ));
        let mut a = Tree::new();
        let ra = a.root_id();
        let ca = full_container(&mut a, ra);
        a.push_attribute(ca, size, Value::UInt(0), None).unwrap();

        let mut b = Tree::new();
        let rb = b.root_id();
        full_container(&mut b, rb);

        assert!(a.root().same_content(&b.root()));
    }

    #[test]
    fn test_unloaded_children_are_hidden() {
        let tree = Tree::unloaded();
        assert_eq!(tree.root().state(), LoadState::None);
        assert!(tree.root().first_child().is_none());
    }
}
