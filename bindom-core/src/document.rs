//! Document loading and saving.
//!
//! A stream is a preamble, one `header` container of schema directives, then
//! the body. Loading resolves the header into the document's association
//! table and then materializes the body under that table, either completely
//! ([`Document::load`]) or lazily ([`Document::load_partial`]).
//!
//! # Example
//!
//! ```
//! use bindom_core::{Document, LoadOptions, NoResolver, SchemaBuilder, WriteOptions};
//!
//! let schema = SchemaBuilder::new().node(10, "Title", "string").container(11, "Body");
//! let mut doc = Document::with_schema(&schema, &mut NoResolver, &LoadOptions::default()).unwrap();
//!
//! let body = doc.association("Body").unwrap().clone();
//! let title = doc.association("Title").unwrap().clone();
//! let root = doc.body_id();
//! let node = doc.tree_mut().children_mut(root).unwrap().append_container(body).unwrap();
//! doc.tree_mut().attributes_mut(node).unwrap().set(title, "Hello").unwrap();
//!
//! let bytes = doc.to_bytes(&WriteOptions::default()).unwrap();
//! let loaded = Document::load(bytes.as_slice(), &mut NoResolver, &LoadOptions::default()).unwrap();
//! let attrs = loaded.body().first_child().unwrap().attributes().unwrap();
//! assert_eq!(attrs.require::<String>("Title").unwrap(), "Hello");
//! ```

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use tracing::debug;

use crate::association::{ids, Association, AssociationTable};
use crate::directive::SchemaBuilder;
use crate::error::{Error, Result};
use crate::materialize::{ambient_scope, Materializer};
use crate::reader::{ByteSource, MarkerReader, Sequential};
use crate::translation::{PrimitiveSetRef, ResolvedTranslation, ResourceResolver, TranslationResolver};
use crate::tree::{LoadState, Node, NodeId, Tree};
use crate::types::TypeExtension;
use crate::writer::{write_tree, MarkerWriter, WriteOptions};

/// Options for loading documents and translations.
#[derive(Clone, Default)]
pub struct LoadOptions {
    type_extensions: Vec<Arc<dyn TypeExtension>>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fallback for type strings the built-in vocabulary lacks.
    /// Extensions are consulted in the order they were added.
    pub fn with_type_extension(mut self, extension: impl TypeExtension + 'static) -> Self {
        self.type_extensions.push(Arc::new(extension));
        self
    }

    pub fn type_extensions(&self) -> &[Arc<dyn TypeExtension>] {
        &self.type_extensions
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("type_extensions", &self.type_extensions.len())
            .finish()
    }
}

/// A header, its resolved translation, and a body tree.
#[derive(Debug, Clone)]
pub struct Document {
    header: Tree,
    translation: ResolvedTranslation,
    table: Arc<AssociationTable>,
    tree: Tree,
}

impl Document {
    /// An empty document whose header is `header`, a fully loaded `header`
    /// container.
    pub fn new(header: Tree, resources: &mut dyn ResourceResolver, options: &LoadOptions) -> Result<Self> {
        check_header(&header)?;
        let translation =
            TranslationResolver::new(resources, options.type_extensions()).resolve_header(&header, header.root_id())?;
        Ok(Document::assemble(header, translation, Tree::new()))
    }

    /// An empty document whose header holds `schema`'s directives.
    pub fn with_schema(
        schema: &SchemaBuilder,
        resources: &mut dyn ResourceResolver,
        options: &LoadOptions,
    ) -> Result<Self> {
        Document::new(schema.header_tree()?, resources, options)
    }

    fn assemble(header: Tree, translation: ResolvedTranslation, tree: Tree) -> Self {
        let table = Arc::new(translation.table().clone());
        Document {
            header,
            translation,
            table,
            tree,
        }
    }

    /// Load and fully materialize a document.
    pub fn load<R: Read>(source: R, resources: &mut dyn ResourceResolver, options: &LoadOptions) -> Result<Self> {
        let mut reader = MarkerReader::new(Sequential::new(source));
        let (header, translation) = open(&mut reader, resources, options)?;
        let mut doc = Document::assemble(header, translation, Tree::unloaded());

        let root = doc.tree.root_id();
        let table = Arc::clone(&doc.table);
        Materializer::new(&mut reader).load_content(&mut doc.tree, root, &table)?;
        Ok(doc)
    }

    /// Load the header and drive the body up to `target`, keeping the reader
    /// for later partial loads. Stopping short of `Full` needs a seekable
    /// source.
    pub fn load_partial<S: ByteSource>(
        source: S,
        target: LoadState,
        resources: &mut dyn ResourceResolver,
        options: &LoadOptions,
    ) -> Result<LazyDocument<S>> {
        let mut reader = MarkerReader::new(source);
        let (header, translation) = open(&mut reader, resources, options)?;
        let mut doc = Document::assemble(header, translation, Tree::unloaded());
        let root = doc.tree.root_id();

        if target < LoadState::Full {
            let cursor = reader.capture()?;
            doc.tree.fragment_mut(root)?.cursor = Some(cursor);
        } else {
            let table = Arc::clone(&doc.table);
            Materializer::new(&mut reader).load_partial(&mut doc.tree, root, LoadState::Full, &table)?;
        }
        Ok(LazyDocument {
            document: doc,
            reader,
        })
    }

    pub fn header(&self) -> &Tree {
        &self.header
    }

    pub fn translation(&self) -> &ResolvedTranslation {
        &self.translation
    }

    /// The table the body is interpreted under.
    pub fn table(&self) -> &Arc<AssociationTable> {
        &self.table
    }

    pub fn primitive_sets(&self) -> &[PrimitiveSetRef] {
        self.translation.primitive_sets()
    }

    /// Look up a top-level association by name.
    pub fn association(&self, name: &str) -> Option<&Arc<Association>> {
        self.table.get_by_name(name)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn body_id(&self) -> NodeId {
        self.tree.root_id()
    }

    /// The body fragment.
    pub fn body(&self) -> Node<'_> {
        self.tree.root()
    }

    /// The table `node`'s own start marker is read under.
    pub fn scope_of(&self, node: NodeId) -> Arc<AssociationTable> {
        ambient_scope(&self.tree, node, &self.table)
    }

    /// Write preamble, header and body.
    pub fn save<W: Write>(&self, writer: W, options: &WriteOptions) -> Result<()> {
        let mut writer = MarkerWriter::new(writer);
        writer.write_preamble()?;
        write_tree(&mut writer, &self.header, self.header.root_id(), options)?;
        write_tree(&mut writer, &self.tree, self.tree.root_id(), options)?;
        writer.flush()?;
        debug!(bytes = writer.bytes_written(), "document saved");
        Ok(())
    }

    pub fn to_bytes(&self, options: &WriteOptions) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.save(&mut buf, options)?;
        Ok(buf)
    }
}

/// A partially loaded document paired with the reader it came from.
#[derive(Debug)]
pub struct LazyDocument<S> {
    document: Document,
    reader: MarkerReader<S>,
}

impl<S: ByteSource> LazyDocument<S> {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn tree(&self) -> &Tree {
        &self.document.tree
    }

    pub fn body_id(&self) -> NodeId {
        self.document.body_id()
    }

    /// Drive `node` up to `target`, resuming from its cursor.
    pub fn load_partial(&mut self, node: NodeId, target: LoadState) -> Result<()> {
        let scope = self.document.scope_of(node);
        Materializer::new(&mut self.reader).load_partial(&mut self.document.tree, node, target, &scope)
    }

    /// Load `node` and everything below it.
    pub fn load_content(&mut self, node: NodeId) -> Result<()> {
        let scope = self.document.scope_of(node);
        Materializer::new(&mut self.reader).load_content(&mut self.document.tree, node, &scope)
    }

    /// Load whatever is still unread, then write the document out.
    pub fn save<W: Write>(&mut self, writer: W, options: &WriteOptions) -> Result<()> {
        let root = self.document.body_id();
        self.load_content(root)?;
        self.document.save(writer, options)
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn into_parts(self) -> (Document, MarkerReader<S>) {
        (self.document, self.reader)
    }
}

/// Read the preamble and header, and resolve the header.
fn open<S: ByteSource>(
    reader: &mut MarkerReader<S>,
    resources: &mut dyn ResourceResolver,
    options: &LoadOptions,
) -> Result<(Tree, ResolvedTranslation)> {
    reader.read_preamble()?;

    let baseline = AssociationTable::baseline();
    let mut header = Tree::unloaded_container();
    let root = header.root_id();
    Materializer::new(&mut *reader).load_partial(&mut header, root, LoadState::Full, &baseline)?;
    // Skipped directive bodies are read below; come back here afterwards.
    let body_start = if reader.is_seekable() {
        Some(reader.capture()?)
    } else {
        None
    };
    Materializer::new(&mut *reader).load_content(&mut header, root, &baseline)?;
    if let Some(cursor) = body_start {
        reader.restore(cursor)?;
    }
    check_header(&header)?;

    let translation =
        TranslationResolver::new(resources, options.type_extensions()).resolve_header(&header, root)?;
    reader.register_primitive_sets(translation.primitive_sets().iter().cloned());
    Ok((header, translation))
}

fn check_header(header: &Tree) -> Result<()> {
    if header.root().association_id() != Some(ids::HEADER) {
        return Err(Error::format(format!(
            "stream starts with {} instead of a header",
            header.crumb(header.root_id())
        )));
    }
    Ok(())
}
