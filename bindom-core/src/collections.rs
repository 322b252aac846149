//! Attribute and child collections.
//!
//! Both are ordered lists of nodes, addressable by position, association id
//! or association name. Reading them before the owning node has reached the
//! needed [`LoadState`] is a usage error rather than an empty answer.
//!
//! Typed getters never coerce: asking for an `i64` from a string attribute is
//! a format error.

use std::sync::Arc;

use crate::association::Association;
use crate::error::{Error, Result};
use crate::tree::{Container, Fragment, LoadState, Node, NodeId, NodeKind, Primitive, Tree};
use crate::value::{FromValue, Value};

/// Lookup key for collection entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'k> {
    Id(u32),
    Name(&'k str),
}

impl From<u32> for Key<'_> {
    fn from(id: u32) -> Self {
        Key::Id(id)
    }
}

impl<'k> From<&'k str> for Key<'k> {
    fn from(name: &'k str) -> Self {
        Key::Name(name)
    }
}

impl std::fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Id(id) => write!(f, "#{id}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl Key<'_> {
    fn matches(&self, association: &Association) -> bool {
        match self {
            Key::Id(id) => association.id() == *id,
            Key::Name(name) => association.name() == Some(*name),
        }
    }
}

/// Read-only view over an attribute or child list.
#[derive(Clone, Copy)]
pub struct NodeList<'t> {
    tree: &'t Tree,
    ids: &'t [NodeId],
}

/// A container's attributes.
pub type Attributes<'t> = NodeList<'t>;

/// A fragment's or container's children.
pub type Children<'t> = NodeList<'t>;

impl<'t> NodeList<'t> {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &'t [NodeId] {
        self.ids
    }

    /// Entry at `index`.
    pub fn at(&self, index: usize) -> Option<Node<'t>> {
        self.ids.get(index).and_then(|&id| self.tree.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        self.ids.iter().filter_map(move |&id| tree.get(id))
    }

    /// First entry whose association matches `key`.
    pub fn get<'k>(&self, key: impl Into<Key<'k>>) -> Option<Node<'t>> {
        let key = key.into();
        self.iter()
            .find(|n| n.association().is_some_and(|a| key.matches(a)))
    }

    /// Raw value of the primitive entry matching `key`.
    pub fn value<'k>(&self, key: impl Into<Key<'k>>) -> Option<&'t Value> {
        self.get(key).and_then(|n| n.value())
    }

    /// Typed value of `key`, `None` when absent. A present entry of another
    /// type is a format error.
    pub fn get_as<'k, T: FromValue>(&self, key: impl Into<Key<'k>>) -> Result<Option<T>> {
        let key = key.into();
        let Some(node) = self.get(key) else {
            return Ok(None);
        };
        let Some(value) = node.value() else {
            return Err(Error::format(format!("{key} is a container, not a {}", T::TYPE_NAME)));
        };
        T::from_value(value).map(Some).ok_or_else(|| {
            Error::format(format!(
                "{key} holds a {} value, not a {}",
                value.primitive_type(),
                T::TYPE_NAME
            ))
        })
    }

    /// Typed value of `key`, or `default` when absent.
    pub fn get_or<'k, T: FromValue>(&self, key: impl Into<Key<'k>>, default: T) -> Result<T> {
        Ok(self.get_as(key)?.unwrap_or(default))
    }

    /// Typed value of `key`, which must be present.
    pub fn require<'k, T: FromValue>(&self, key: impl Into<Key<'k>>) -> Result<T> {
        let key = key.into();
        self.get_as(key)?
            .ok_or_else(|| Error::format(format!("missing required {} {key}", T::TYPE_NAME)))
    }
}

impl std::fmt::Debug for NodeList<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// ============================================================================
// Access checks
// ============================================================================

impl Tree {
    /// Attributes of a container that has reached at least
    /// [`LoadState::Attributes`].
    pub fn attributes(&self, id: NodeId) -> Result<Attributes<'_>> {
        match self.kind(id)? {
            NodeKind::Container(c) if c.state() >= LoadState::Attributes => Ok(NodeList {
                tree: self,
                ids: &c.attributes,
            }),
            NodeKind::Container(c) => Err(Error::usage(format!(
                "attributes of {} are not loaded (state {:?})",
                self.crumb(id),
                c.state()
            ))),
            _ => Err(Error::usage("only containers have attributes")),
        }
    }

    /// Children of a fully loaded fragment or container.
    pub fn children(&self, id: NodeId) -> Result<Children<'_>> {
        let fragment = self
            .fragment(id)?
            .ok_or_else(|| Error::usage("node has no children"))?;
        if fragment.state() < LoadState::Full {
            return Err(Error::usage(format!(
                "children of {} are not loaded (state {:?})",
                self.crumb(id),
                fragment.state()
            )));
        }
        Ok(NodeList {
            tree: self,
            ids: &fragment.children,
        })
    }

    pub fn attributes_mut(&mut self, id: NodeId) -> Result<AttributesMut<'_>> {
        self.attributes(id)?;
        Ok(AttributesMut {
            tree: self,
            container: id,
        })
    }

    pub fn children_mut(&mut self, id: NodeId) -> Result<ChildrenMut<'_>> {
        self.children(id)?;
        Ok(ChildrenMut { tree: self, parent: id })
    }
}

impl<'t> Node<'t> {
    pub fn attributes(&self) -> Result<Attributes<'t>> {
        self.tree().attributes(self.id())
    }

    pub fn children(&self) -> Result<Children<'t>> {
        self.tree().children(self.id())
    }
}

// ============================================================================
// Mutation
// ============================================================================

fn check_value(association: &Association, value: &Value) -> Result<()> {
    match association.primitive_type() {
        Some(ty) if ty == value.primitive_type() => Ok(()),
        Some(ty) => Err(Error::format(format!(
            "{association} is {ty}, cannot hold a {} value",
            value.primitive_type()
        ))),
        None => Err(Error::format(format!("{association} is not a primitive"))),
    }
}

/// Position of the entry sharing `association`'s id or name.
fn find_same_key(tree: &Tree, list: &[NodeId], association: &Association) -> Option<usize> {
    list.iter().position(|&id| {
        tree.get(id)
            .and_then(|n| n.association())
            .is_some_and(|a| {
                a.id() == association.id() || (a.name().is_some() && a.name() == association.name())
            })
    })
}

/// Set-by-key on the attribute or child list of `owner`.
///
/// A same-keyed primitive of the same type is replaced in place; otherwise the
/// old entry is detached and the new one appended at the end.
fn set_by_key(
    tree: &mut Tree,
    owner: NodeId,
    association: Arc<Association>,
    value: Value,
    attribute: bool,
) -> Result<NodeId> {
    check_value(&association, &value)?;
    let list: Vec<NodeId> = if attribute {
        tree.attributes(owner)?.ids().to_vec()
    } else {
        tree.children(owner)?.ids().to_vec()
    };

    if let Some(pos) = find_same_key(tree, &list, &association) {
        let existing = list[pos];
        if let NodeKind::Primitive(p) = tree.kind_mut(existing)? {
            if p.association.primitive_type() == association.primitive_type() {
                p.association = association;
                p.value = value;
                return Ok(existing);
            }
        }
        tree.detach(existing)?;
    }

    if attribute {
        tree.push_attribute(owner, association, value, None)
    } else {
        let kind = NodeKind::Primitive(Primitive {
            association,
            value,
            is_attribute: false,
        });
        tree.push_child(owner, kind, None)
    }
}

fn remove_by_key(tree: &mut Tree, list: &[NodeId], key: Key<'_>) -> Result<Option<NodeId>> {
    let found = list.iter().copied().find(|&id| {
        tree.get(id)
            .and_then(|n| n.association())
            .is_some_and(|a| key.matches(a))
    });
    if let Some(id) = found {
        tree.detach(id)?;
    }
    Ok(found)
}

/// Mutable access to a container's attributes.
pub struct AttributesMut<'t> {
    tree: &'t mut Tree,
    container: NodeId,
}

impl AttributesMut<'_> {
    /// Set an attribute by key. Returns the node now holding the value.
    pub fn set(&mut self, association: impl Into<Arc<Association>>, value: impl Into<Value>) -> Result<NodeId> {
        set_by_key(self.tree, self.container, association.into(), value.into(), true)
    }

    /// Detach the first attribute matching `key`.
    pub fn remove<'k>(&mut self, key: impl Into<Key<'k>>) -> Result<Option<NodeId>> {
        let list = self.tree.attributes(self.container)?.ids().to_vec();
        remove_by_key(self.tree, &list, key.into())
    }

    pub fn view(&self) -> Result<Attributes<'_>> {
        self.tree.attributes(self.container)
    }
}

/// Mutable access to a fragment's or container's children.
pub struct ChildrenMut<'t> {
    tree: &'t mut Tree,
    parent: NodeId,
}

impl ChildrenMut<'_> {
    /// Set a child element by key, with the same reordering rule as
    /// [`AttributesMut::set`].
    pub fn set(&mut self, association: impl Into<Arc<Association>>, value: impl Into<Value>) -> Result<NodeId> {
        set_by_key(self.tree, self.parent, association.into(), value.into(), false)
    }

    /// Append a primitive child element.
    pub fn append_element(
        &mut self,
        association: impl Into<Arc<Association>>,
        value: impl Into<Value>,
    ) -> Result<NodeId> {
        let association = association.into();
        let value = value.into();
        check_value(&association, &value)?;
        let kind = NodeKind::Primitive(Primitive {
            association,
            value,
            is_attribute: false,
        });
        self.tree.push_child(self.parent, kind, None)
    }

    /// Append an empty, fully loaded container.
    pub fn append_container(&mut self, association: impl Into<Arc<Association>>) -> Result<NodeId> {
        let association = association.into();
        if !association.is_container() {
            return Err(Error::format(format!("{association} is not a container")));
        }
        let kind = NodeKind::Container(Container {
            association: Some(association),
            attributes: Vec::new(),
            content: Fragment {
                state: LoadState::Full,
                ..Fragment::default()
            },
        });
        self.tree.push_child(self.parent, kind, None)
    }

    pub fn append_comment(&mut self, text: impl Into<String>) -> Result<NodeId> {
        self.tree
            .push_child(self.parent, NodeKind::Comment(text.into()), None)
    }

    /// Append padding, merging with trailing padding.
    pub fn append_padding(&mut self, len: u64) -> Result<NodeId> {
        self.tree.push_padding(self.parent, len, None)
    }

    /// Detach the first child matching `key`.
    pub fn remove<'k>(&mut self, key: impl Into<Key<'k>>) -> Result<Option<NodeId>> {
        let list = self.tree.children(self.parent)?.ids().to_vec();
        remove_by_key(self.tree, &list, key.into())
    }

    pub fn view(&self) -> Result<Children<'_>> {
        self.tree.children(self.parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::value::PrimitiveType;

    fn title() -> Arc<Association> {
        Arc::new(Association::primitive(10, "Title", PrimitiveType::String))
    }

    fn body_tree() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let root = tree.root_id();
        let body = tree
            .children_mut(root)
            .unwrap()
            .append_container(Association::container(11, "Body"))
            .unwrap();
        (tree, body)
    }

    #[test]
    fn test_lookup_by_id_and_name() {
        let (mut tree, body) = body_tree();
        tree.attributes_mut(body).unwrap().set(title(), "Hello").unwrap();

        let attrs = tree.attributes(body).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("Title").unwrap().value(), Some(&Value::from("Hello")));
        assert_eq!(attrs.get(10u32).unwrap().name(), Some("Title"));
        assert!(attrs.get("Missing").is_none());
    }

    #[test]
    fn test_typed_getter_never_coerces() {
        let (mut tree, body) = body_tree();
        tree.attributes_mut(body).unwrap().set(title(), "Hello").unwrap();
        let attrs = tree.attributes(body).unwrap();

        assert_eq!(attrs.require::<String>("Title").unwrap(), "Hello");
        let err = attrs.get_as::<i64>("Title").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(attrs.get_or::<i64>("Count", 7).unwrap(), 7);
        assert_eq!(attrs.require::<u64>("Count").unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn test_set_same_type_replaces_in_place() {
        let (mut tree, body) = body_tree();
        let other = Arc::new(Association::primitive(12, "Subtitle", PrimitiveType::String));
        let mut attrs = tree.attributes_mut(body).unwrap();
        let first = attrs.set(title(), "a").unwrap();
        attrs.set(other, "b").unwrap();
        let replaced = attrs.set(title(), "c").unwrap();
        assert_eq!(first, replaced);

        let names: Vec<_> = tree.attributes(body).unwrap().iter().filter_map(|n| n.name()).collect();
        assert_eq!(names, ["Title", "Subtitle"]);
        assert_eq!(tree.attributes(body).unwrap().value("Title"), Some(&Value::from("c")));
    }

    #[test]
    fn test_set_other_type_moves_to_end() {
        let (mut tree, body) = body_tree();
        let other = Arc::new(Association::primitive(12, "Subtitle", PrimitiveType::String));
        let numeric = Arc::new(Association::primitive(13, "Title", PrimitiveType::Int));
        let mut attrs = tree.attributes_mut(body).unwrap();
        attrs.set(title(), "a").unwrap();
        attrs.set(other, "b").unwrap();
        attrs.set(numeric, 5i64).unwrap();

        let view = tree.attributes(body).unwrap();
        let names: Vec<_> = view.iter().filter_map(|n| n.name()).collect();
        assert_eq!(names, ["Subtitle", "Title"]);
        assert_eq!(view.require::<i64>("Title").unwrap(), 5);
    }

    #[test]
    fn test_set_rejects_mistyped_value() {
        let (mut tree, body) = body_tree();
        let err = tree.attributes_mut(body).unwrap().set(title(), 1u64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_access_before_load_is_usage_error() {
        let tree = Tree::unloaded();
        assert_eq!(tree.children(tree.root_id()).unwrap_err().kind(), ErrorKind::Usage);

        let container = Tree::unloaded_container();
        let root = container.root_id();
        assert_eq!(container.attributes(root).unwrap_err().kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_children_mutation() {
        let (mut tree, body) = body_tree();
        let mut children = tree.children_mut(body).unwrap();
        children.append_comment("note").unwrap();
        children.append_padding(2).unwrap();
        children.append_padding(3).unwrap();
        children.append_element(title(), "inline").unwrap();
        assert!(children.remove("Title").unwrap().is_some());

        let view = tree.children(body).unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view.at(0).unwrap().comment(), Some("note"));
        assert_eq!(view.at(1).unwrap().kind(), &NodeKind::Padding(5));
    }
}
