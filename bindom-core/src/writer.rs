//! Marker writer and tree serialization.

use std::collections::{BTreeSet, HashMap};
use std::io::{self, Write};
use std::sync::Arc;

use tracing::trace;

use crate::association::{ids, Association, AssociationKind, AssociationTable};
use crate::error::{Error, Result};
use crate::tree::{LoadState, NodeId, NodeKind, Tree};
use crate::value::Value;
use crate::wire::{self, tag};

/// Which containers get an auto-computed content-size attribute on write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContentSizePolicy {
    /// Recompute content-size only where the tree already carries one.
    #[default]
    Preserve,
    /// Add content-size to every container.
    All,
    /// Add content-size to containers with these association ids, and keep
    /// existing ones elsewhere.
    Only(BTreeSet<u32>),
}

impl ContentSizePolicy {
    fn applies(&self, id: u32, present: bool) -> bool {
        match self {
            ContentSizePolicy::Preserve => present,
            ContentSizePolicy::All => true,
            ContentSizePolicy::Only(wanted) => present || wanted.contains(&id),
        }
    }
}

/// Options for [`write_tree`] and document saving.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub content_size: ContentSizePolicy,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_size(mut self, policy: ContentSizePolicy) -> Self {
        self.content_size = policy;
        self
    }
}

/// Writes single markers and counts the bytes produced.
#[derive(Debug)]
pub struct MarkerWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> MarkerWriter<W> {
    pub fn new(inner: W) -> Self {
        MarkerWriter { inner, written: 0 }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn write_preamble(&mut self) -> Result<()> {
        self.write_all(wire::MAGIC)?;
        self.write_all(&[wire::FORMAT_VERSION])
    }

    pub fn container_start(&mut self, id: u32) -> Result<()> {
        self.write_all(&[tag::CONTAINER])?;
        wire::write_varint(self, id as u64)
    }

    pub fn end_container(&mut self) -> Result<()> {
        self.write_all(&[tag::END_CONTAINER])
    }

    pub fn end_attributes(&mut self) -> Result<()> {
        self.write_all(&[tag::END_ATTRIBUTES])
    }

    /// Write a primitive; `value` must have `association`'s type.
    pub fn primitive(&mut self, association: &Association, value: &Value) -> Result<()> {
        let ty = match (association.kind(), association.primitive_type()) {
            (AssociationKind::Primitive, Some(ty)) => ty,
            _ => return Err(Error::format(format!("{association} is not a primitive"))),
        };
        // Check before the tag goes out so a mismatch leaves nothing behind.
        if value.primitive_type() != ty {
            return Err(Error::format(format!(
                "{association} is {ty}, cannot write a {} value",
                value.primitive_type()
            )));
        }
        self.write_all(&[tag::PRIMITIVE])?;
        wire::write_varint(self, association.id() as u64)?;
        wire::write_value(self, ty, value)
    }

    pub fn comment(&mut self, text: &str) -> Result<()> {
        self.write_all(&[tag::COMMENT])?;
        wire::write_string(self, text)
    }

    pub fn padding(&mut self, len: u64) -> Result<()> {
        self.write_all(&[tag::PADDING])?;
        wire::write_varint(self, len)?;
        let zeros = [0u8; 256];
        let mut left = len;
        while left > 0 {
            let n = left.min(zeros.len() as u64) as usize;
            self.write_all(&zeros[..n])?;
            left -= n as u64;
        }
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        Write::write_all(self, bytes)?;
        Ok(())
    }
}

impl<W: Write> Write for MarkerWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Serialize the subtree at `node`.
///
/// Every fragment and container in the subtree must be fully loaded.
pub fn write_tree<W: Write>(
    writer: &mut MarkerWriter<W>,
    tree: &Tree,
    node: NodeId,
    options: &WriteOptions,
) -> Result<()> {
    let mut sizes = HashMap::new();
    measure(tree, node, options, &mut sizes)?;
    write_node(writer, tree, node, options, &sizes)
}

/// Write `node` using the content sizes computed by [`measure`].
fn write_node<W: Write>(
    writer: &mut MarkerWriter<W>,
    tree: &Tree,
    node: NodeId,
    options: &WriteOptions,
    sizes: &HashMap<NodeId, u64>,
) -> Result<()> {
    match tree.kind(node)? {
        NodeKind::Fragment(fragment) => {
            require_full(tree, node, fragment.state())?;
            for &child in &fragment.children {
                write_node(writer, tree, child, options, sizes)?;
            }
            Ok(())
        }
        NodeKind::Container(container) => {
            require_full(tree, node, container.state())?;
            let association = container
                .association()
                .ok_or_else(|| Error::usage("container has no association"))?;

            let size_attr = container
                .attributes
                .iter()
                .copied()
                .find(|&a| is_content_size(tree, a));
            let content_size = sizes.get(&node).copied();
            if let Some(size) = content_size {
                trace!(container = %association, size, "computed content-size");
            }

            writer.container_start(association.id())?;
            let mut wrote_size = false;
            for &attr in &container.attributes {
                if Some(attr) == size_attr {
                    if let Some(size) = content_size {
                        writer.primitive(&size_association(tree, attr), &Value::UInt(size))?;
                        wrote_size = true;
                    }
                    continue;
                }
                write_node(writer, tree, attr, options, sizes)?;
            }
            if let (Some(size), false) = (content_size, wrote_size) {
                writer.primitive(&size_association(tree, node), &Value::UInt(size))?;
                wrote_size = true;
            }

            let has_attributes = wrote_size || container.attributes.iter().any(|&a| Some(a) != size_attr);
            if has_attributes || !container.content.children.is_empty() {
                writer.end_attributes()?;
                for &child in &container.content.children {
                    write_node(writer, tree, child, options, sizes)?;
                }
            }
            writer.end_container()
        }
        NodeKind::Primitive(p) => writer.primitive(&p.association, &p.value),
        NodeKind::Comment(text) => writer.comment(text),
        NodeKind::Padding(len) => writer.padding(*len),
    }
}

/// Serialize the subtree at `node` into a fresh buffer.
pub fn tree_to_bytes(tree: &Tree, node: NodeId, options: &WriteOptions) -> Result<Vec<u8>> {
    let mut writer = MarkerWriter::new(Vec::new());
    write_tree(&mut writer, tree, node, options)?;
    Ok(writer.into_inner())
}

fn require_full(tree: &Tree, node: NodeId, state: LoadState) -> Result<()> {
    if state < LoadState::Full {
        return Err(Error::usage(format!(
            "cannot write {} before it is fully loaded (state {state:?})",
            tree.crumb(node)
        )));
    }
    Ok(())
}

fn is_content_size(tree: &Tree, node: NodeId) -> bool {
    tree.get(node).and_then(|n| n.association_id()) == Some(ids::CONTENT_SIZE)
}

/// The association to write content-size under: the node's own if it is a
/// content-size attribute, else the baseline one.
fn size_association(tree: &Tree, node: NodeId) -> Arc<Association> {
    if let Some(existing) = tree
        .get(node)
        .filter(|n| n.association_id() == Some(ids::CONTENT_SIZE))
        .and_then(|n| n.association())
    {
        return Arc::clone(existing);
    }
    match AssociationTable::baseline().get(ids::CONTENT_SIZE) {
        Some(a) => Arc::clone(a),
        None => Arc::new(Association::primitive(
            ids::CONTENT_SIZE,
            crate::association::CONTENT_SIZE_NAME,
            crate::value::PrimitiveType::UInt,
        )),
    }
}

/// Exact encoded length of `node`, computed bottom-up in one visit per node.
///
/// Records the content-size of every container the policy selects.
fn measure(tree: &Tree, node: NodeId, options: &WriteOptions, sizes: &mut HashMap<NodeId, u64>) -> Result<u64> {
    match tree.kind(node)? {
        NodeKind::Fragment(fragment) => {
            require_full(tree, node, fragment.state())?;
            measure_all(tree, &fragment.children, options, sizes)
        }
        NodeKind::Container(container) => {
            require_full(tree, node, container.state())?;
            let association = container
                .association()
                .ok_or_else(|| Error::usage("container has no association"))?;
            let size_attr = container
                .attributes
                .iter()
                .copied()
                .find(|&a| is_content_size(tree, a));

            let content = measure_all(tree, &container.content.children, options, sizes)?;
            let mut attributes = 0;
            for &attr in &container.attributes {
                if Some(attr) != size_attr {
                    attributes += measure(tree, attr, options, sizes)?;
                }
            }
            if options.content_size.applies(association.id(), size_attr.is_some()) {
                sizes.insert(node, content);
                let mut counter = MarkerWriter::new(io::sink());
                counter.primitive(&size_association(tree, size_attr.unwrap_or(node)), &Value::UInt(content))?;
                attributes += counter.bytes_written();
            }

            let start = 1 + wire::varint_len(u64::from(association.id()));
            let body = if attributes > 0 || !container.content.children.is_empty() {
                1 + content
            } else {
                0
            };
            Ok(start + attributes + body + 1)
        }
        _ => {
            let mut counter = MarkerWriter::new(io::sink());
            write_node(&mut counter, tree, node, options, sizes)?;
            Ok(counter.bytes_written())
        }
    }
}

fn measure_all(tree: &Tree, nodes: &[NodeId], options: &WriteOptions, sizes: &mut HashMap<NodeId, u64>) -> Result<u64> {
    nodes
        .iter()
        .try_fold(0, |total, &n| measure(tree, n, options, sizes).map(|len| total + len))
}
