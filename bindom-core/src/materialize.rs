//! Lazy materializer.
//!
//! Pulls markers from a [`MarkerReader`] into a [`Tree`], one load state at a
//! time. Each container moves through
//!
//! ```text
//! None --start--> IdOnly --attributes--> Attributes --children--> Full
//!                        \--end-container (no attributes)------> Full
//! ```
//!
//! and a fragment goes from `None` straight to `Full`. A child container whose
//! attributes carry `content-size` is left at `Attributes` with a resume
//! cursor while the reader seeks past its children, so unread subtrees cost a
//! seek rather than a decode.
//!
//! The association table in effect is passed down explicitly: a container's
//! own local table (if its association has one) applies to its attributes and
//! everything below it.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::association::{ids, AssociationTable, CONTENT_SIZE_NAME};
use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::reader::{ByteSource, MarkerReader};
use crate::tree::{Container, Fragment, LoadState, NodeId, NodeKind, Primitive, Tree};

/// Drives nodes of a tree forward against one reader.
pub struct Materializer<'r, S> {
    reader: &'r mut MarkerReader<S>,
}

impl<'r, S: ByteSource> Materializer<'r, S> {
    pub fn new(reader: &'r mut MarkerReader<S>) -> Self {
        Materializer { reader }
    }

    /// Drive `node` up to `target` and no further.
    ///
    /// `scope` is the table the node's own start marker is read under. A
    /// pending resume cursor is consumed first. Any target short of `Full`
    /// needs a seekable stream, since stopping there captures a new cursor.
    /// For a fragment such a target is a no-op.
    pub fn load_partial(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        target: LoadState,
        scope: &AssociationTable,
    ) -> Result<()> {
        if tree.fragment(node)?.is_none() {
            return Err(Error::usage("only fragments and containers can be loaded"));
        }
        if target < LoadState::Full && !self.reader.is_seekable() {
            return Err(Error::usage(format!(
                "partial load of {} to {target:?} needs a seekable stream",
                tree.crumb(node)
            )));
        }
        if tree.node(node)?.is_fragment() && target < LoadState::Full {
            // Fragments have no intermediate states.
            return Ok(());
        }
        if tree.state(node)? >= target {
            return Ok(());
        }

        if let Some(cursor) = tree.fragment_mut(node)?.cursor.take() {
            self.reader.restore(cursor)?;
        }
        self.drive(tree, node, target, scope)?;

        if tree.state(node)? < LoadState::Full {
            let cursor = self.reader.capture()?;
            tree.fragment_mut(node)?.cursor = Some(cursor);
        }
        Ok(())
    }

    /// Load `node` and every fragment or container below it to `Full`.
    pub fn load_content(&mut self, tree: &mut Tree, node: NodeId, scope: &AssociationTable) -> Result<()> {
        self.load_partial(tree, node, LoadState::Full, scope)?;

        let own = local_scope(tree, node);
        let local = own.as_deref().unwrap_or(scope);
        let children = tree.children(node)?.ids().to_vec();
        for child in children {
            if tree.node(child)?.is_container() {
                self.load_content(tree, child, local)?;
            }
        }
        Ok(())
    }

    fn drive(&mut self, tree: &mut Tree, node: NodeId, target: LoadState, scope: &AssociationTable) -> Result<()> {
        loop {
            let state = tree.state(node)?;
            if state >= target {
                return Ok(());
            }
            if let Err(err) = self.step(tree, node, state, scope) {
                return Err(if tree.node(node)?.is_container() {
                    err.within(tree.crumb(node))
                } else {
                    err
                });
            }
            let reached = tree.state(node)?;
            trace!(node = %tree.crumb(node), from = ?state, to = ?reached, "load state advanced");
        }
    }

    /// Perform the single transition out of `state`.
    fn step(&mut self, tree: &mut Tree, node: NodeId, state: LoadState, scope: &AssociationTable) -> Result<()> {
        let is_container = tree.node(node)?.is_container();
        match (is_container, state) {
            (false, _) => self.read_children(tree, node, scope, false),
            (true, LoadState::None) => {
                let offset = self.reader.position();
                match self.reader.next_marker(scope)? {
                    Marker::ContainerStart { association } => {
                        tree.set_offset(node, offset)?;
                        tree.container_mut(node)?.association = Some(association);
                        tree.set_state(node, LoadState::IdOnly)
                    }
                    other => Err(Error::format(format!(
                        "expected container start, found {}",
                        other.name()
                    ))),
                }
            }
            (true, LoadState::IdOnly) => {
                let own = local_scope(tree, node);
                self.read_attributes(tree, node, own.as_deref().unwrap_or(scope))
            }
            (true, _) => {
                let own = local_scope(tree, node);
                self.read_children(tree, node, own.as_deref().unwrap_or(scope), true)
            }
        }
    }

    fn read_attributes(&mut self, tree: &mut Tree, node: NodeId, scope: &AssociationTable) -> Result<()> {
        loop {
            let offset = self.reader.position();
            match self.reader.next_marker(scope)? {
                Marker::Primitive { association, value } => {
                    tree.push_attribute(node, association, value, Some(offset))?;
                }
                Marker::EndAttributes => return tree.set_state(node, LoadState::Attributes),
                Marker::EndContainer => return tree.set_state(node, LoadState::Full),
                other => {
                    return Err(Error::format(format!(
                        "unexpected {} among attributes at offset {offset:#x}",
                        other.name()
                    )))
                }
            }
        }
    }

    /// Read children up to the terminator: end-container for a container,
    /// end of stream for a top-level fragment.
    fn read_children(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        scope: &AssociationTable,
        in_container: bool,
    ) -> Result<()> {
        loop {
            let offset = self.reader.position();
            match self.reader.next_marker(scope)? {
                Marker::EndContainer if in_container => break,
                Marker::EndOfStream if !in_container => break,
                Marker::EndContainer => {
                    return Err(Error::format(format!("unmatched end-container at offset {offset:#x}")))
                }
                Marker::EndOfStream => return Err(Error::format("end of stream inside container")),
                Marker::EndAttributes => {
                    return Err(Error::format(format!(
                        "unexpected end-attributes among children at offset {offset:#x}"
                    )))
                }
                Marker::Padding(len) => {
                    tree.push_padding(node, len, Some(offset))?;
                }
                Marker::Comment(text) => {
                    tree.push_child(node, NodeKind::Comment(text), Some(offset))?;
                }
                Marker::Primitive { association, value } => {
                    let kind = NodeKind::Primitive(Primitive {
                        association,
                        value,
                        is_attribute: false,
                    });
                    tree.push_child(node, kind, Some(offset))?;
                }
                Marker::ContainerStart { association } => {
                    let kind = NodeKind::Container(Container {
                        association: Some(association),
                        attributes: Vec::new(),
                        content: Fragment {
                            state: LoadState::IdOnly,
                            ..Fragment::default()
                        },
                    });
                    let child = tree.push_child(node, kind, Some(offset))?;
                    self.read_child(tree, child, scope)?;
                }
            }
        }
        tree.set_state(node, LoadState::Full)
    }

    /// Bring a freshly started child container to `Attributes`, then either
    /// skip its children by content-size or decode them.
    fn read_child(&mut self, tree: &mut Tree, child: NodeId, scope: &AssociationTable) -> Result<()> {
        self.drive(tree, child, LoadState::Attributes, scope)?;
        if tree.state(child)? >= LoadState::Full {
            return Ok(());
        }

        let Some(size) = content_size(tree, child)? else {
            return self.drive(tree, child, LoadState::Full, scope);
        };
        if !self.reader.is_seekable() {
            debug!(container = %tree.crumb(child), size, "stream not seekable, decoding eagerly");
            return self.drive(tree, child, LoadState::Full, scope);
        }

        let cursor = self.reader.capture()?;
        tree.fragment_mut(child)?.cursor = Some(cursor);
        debug!(container = %tree.crumb(child), size, "skipping unread content");
        self.reader.skip(size)?;
        match self.reader.next_marker(scope)? {
            Marker::EndContainer => Ok(()),
            other => Err(Error::format(format!(
                "content-size {size} does not end on end-container (found {})",
                other.name()
            ))
            .within(tree.crumb(child))),
        }
    }
}

/// The local table a container's association carries, if any.
fn local_scope(tree: &Tree, node: NodeId) -> Option<Arc<AssociationTable>> {
    tree.get(node)?
        .association()
        .and_then(|a| a.scope())
        .cloned()
}

/// Table in effect for reading `node`'s own start marker: the local table of
/// the nearest enclosing container that has one, else `base`.
pub fn ambient_scope(tree: &Tree, node: NodeId, base: &Arc<AssociationTable>) -> Arc<AssociationTable> {
    tree.get(node)
        .and_then(|n| {
            n.ancestors()
                .find_map(|a| a.association().and_then(|assoc| assoc.scope()).cloned())
        })
        .unwrap_or_else(|| Arc::clone(base))
}

/// The content-size hint among a container's attributes.
fn content_size(tree: &Tree, node: NodeId) -> Result<Option<u64>> {
    let attributes = tree.attributes(node)?;
    let hint = attributes
        .get(ids::CONTENT_SIZE)
        .or_else(|| attributes.get(CONTENT_SIZE_NAME));
    Ok(hint.and_then(|n| n.value()).and_then(|v| v.as_uint()))
}
