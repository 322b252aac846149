//! Translation resolver.
//!
//! Turns schema directives into a [`ResolvedTranslation`]: a flat
//! [`AssociationTable`] plus the external primitive sets it requires.
//! Directives are applied in document order against an accumulator.
//! Included translations are fetched through a caller-supplied
//! [`ResourceResolver`] and merged without reduction; the final result
//! keeps only the last primitive-set reference of each name.
//!
//! Include chains are not checked for cycles and repeated URIs are
//! resolved again each time.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;

use tracing::debug;

use crate::association::{ids, is_valid_name, Association, AssociationTable};
use crate::directive::{parse_directives, Directive};
use crate::document::LoadOptions;
use crate::error::{Error, Result};
use crate::materialize::Materializer;
use crate::reader::{MarkerReader, Sequential};
use crate::tree::{NodeId, Tree};
use crate::types::{parse_type, TypeExtension};

/// A required external primitive-type set.
#[derive(Debug, Clone)]
pub struct PrimitiveSetRef {
    pub name: String,
    pub codec: Option<String>,
    pub codec_uri: Option<String>,
    /// Inline configuration subtree, if the directive carried one.
    pub configuration: Option<Tree>,
}

/// One applied renumbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renumbering {
    pub from: u32,
    pub to: u32,
}

/// A resolved schema: association table and required primitive sets.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTranslation {
    table: AssociationTable,
    primitive_sets: Vec<PrimitiveSetRef>,
    renumberings: Vec<Renumbering>,
}

impl ResolvedTranslation {
    pub fn new(table: AssociationTable) -> Self {
        ResolvedTranslation {
            table,
            ..Self::default()
        }
    }

    pub fn table(&self) -> &AssociationTable {
        &self.table
    }

    pub fn into_table(self) -> AssociationTable {
        self.table
    }

    pub fn primitive_sets(&self) -> &[PrimitiveSetRef] {
        &self.primitive_sets
    }

    /// Every renumbering applied, in order.
    pub fn renumberings(&self) -> &[Renumbering] {
        &self.renumberings
    }

    /// Unreduced union; entries of `other` win on id collisions.
    pub fn merge(&mut self, other: ResolvedTranslation) {
        self.table.merge(&other.table);
        self.primitive_sets.extend(other.primitive_sets);
        self.renumberings.extend(other.renumberings);
    }

    /// Collapse primitive-set references sharing a name (case-insensitive)
    /// to the last one, keeping the order of those survivors.
    pub fn reduce(&mut self) {
        let mut seen = HashSet::new();
        let mut kept: Vec<PrimitiveSetRef> = self
            .primitive_sets
            .drain(..)
            .rev()
            .filter(|set| seen.insert(set.name.to_lowercase()))
            .collect();
        kept.reverse();
        self.primitive_sets = kept;
    }
}

/// What a [`ResourceResolver`] hands back for a URI.
pub enum Resolved {
    /// Raw bytes of a standalone translation document.
    Stream(Box<dyn Read + Send>),
    /// A translation resolved elsewhere.
    Translation(ResolvedTranslation),
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Stream(_) => f.write_str("Resolved::Stream(..)"),
            Resolved::Translation(t) => f.debug_tuple("Resolved::Translation").field(t).finish(),
        }
    }
}

/// Fetches translations named by include-translation directives.
pub trait ResourceResolver {
    fn resolve(&mut self, uri: &str, urn: Option<&str>) -> Result<Resolved>;
}

impl<F> ResourceResolver for F
where
    F: FnMut(&str, Option<&str>) -> Result<Resolved>,
{
    fn resolve(&mut self, uri: &str, urn: Option<&str>) -> Result<Resolved> {
        self(uri, urn)
    }
}

/// Resolver for streams that include nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl ResourceResolver for NoResolver {
    fn resolve(&mut self, uri: &str, _urn: Option<&str>) -> Result<Resolved> {
        Err(Error::resolution(format!("no resolver configured for {uri}")))
    }
}

/// Resolver over documents and translations registered by URI or URN.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResolver {
    documents: HashMap<String, Arc<[u8]>>,
    translations: HashMap<String, ResolvedTranslation>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register standalone translation document bytes under `key`.
    pub fn with_document(mut self, key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.documents.insert(key.into(), bytes.into());
        self
    }

    pub fn with_translation(mut self, key: impl Into<String>, translation: ResolvedTranslation) -> Self {
        self.translations.insert(key.into(), translation);
        self
    }

    fn lookup(&self, key: &str) -> Option<Resolved> {
        if let Some(bytes) = self.documents.get(key) {
            return Some(Resolved::Stream(Box::new(Cursor::new(Arc::clone(bytes)))));
        }
        self.translations
            .get(key)
            .map(|t| Resolved::Translation(t.clone()))
    }
}

impl ResourceResolver for InMemoryResolver {
    fn resolve(&mut self, uri: &str, urn: Option<&str>) -> Result<Resolved> {
        self.lookup(uri)
            .or_else(|| urn.and_then(|urn| self.lookup(urn)))
            .ok_or_else(|| Error::resolution(format!("no resource registered for {uri}")))
    }
}

/// Applies directives against an accumulator.
pub struct TranslationResolver<'a> {
    resources: &'a mut dyn ResourceResolver,
    extensions: &'a [Arc<dyn TypeExtension>],
}

impl<'a> TranslationResolver<'a> {
    pub fn new(resources: &'a mut dyn ResourceResolver, extensions: &'a [Arc<dyn TypeExtension>]) -> Self {
        TranslationResolver {
            resources,
            extensions,
        }
    }

    /// Resolve an embedded header, seeded from the baseline table.
    pub fn resolve_header(&mut self, tree: &Tree, header: NodeId) -> Result<ResolvedTranslation> {
        let mut resolved = self.resolve_node(tree, header, AssociationTable::baseline())?;
        resolved.reduce();
        debug!(
            associations = resolved.table.len(),
            primitive_sets = resolved.primitive_sets.len(),
            "header resolved"
        );
        Ok(resolved)
    }

    /// Resolve the directive children of `node` against a fresh accumulator
    /// seeded with `seed`. The result is not reduced.
    pub fn resolve_node(&mut self, tree: &Tree, node: NodeId, seed: AssociationTable) -> Result<ResolvedTranslation> {
        let directives = parse_directives(tree, node)?;
        let mut acc = ResolvedTranslation::new(seed);
        self.apply_all(&directives, &mut acc)?;
        Ok(acc)
    }

    /// Load and resolve a standalone translation document. Top-level
    /// documents are seeded with the baseline, included ones start empty.
    pub fn resolve_document<R: Read>(&mut self, source: R, top_level: bool) -> Result<ResolvedTranslation> {
        let mut reader = MarkerReader::new(Sequential::new(source));
        reader.read_preamble()?;

        let baseline = AssociationTable::baseline();
        let mut tree = Tree::unloaded_container();
        let root = tree.root_id();
        Materializer::new(&mut reader).load_content(&mut tree, root, &baseline)?;
        if tree.root().association_id() != Some(ids::TRANSLATION) {
            return Err(Error::format(format!(
                "translation document starts with {} instead of a translation container",
                tree.crumb(root)
            )));
        }

        let seed = if top_level {
            baseline
        } else {
            AssociationTable::new()
        };
        self.resolve_node(&tree, root, seed)
    }

    pub fn apply_all(&mut self, directives: &[Directive], acc: &mut ResolvedTranslation) -> Result<()> {
        directives.iter().try_for_each(|d| self.apply(d, acc))
    }

    pub fn apply(&mut self, directive: &Directive, acc: &mut ResolvedTranslation) -> Result<()> {
        match directive {
            Directive::IncludeTranslation { uri, urn } => {
                debug!(%uri, urn = ?urn, "including translation");
                let included = match self.resources.resolve(uri, urn.as_deref())? {
                    Resolved::Stream(stream) => self.resolve_document(stream, false)?,
                    Resolved::Translation(translation) => translation,
                };
                acc.merge(included);
            }
            Directive::IncludePrimitives {
                name,
                codec,
                codec_uri,
                configuration,
            } => {
                acc.primitive_sets.push(PrimitiveSetRef {
                    name: name.clone(),
                    codec: codec.clone(),
                    codec_uri: codec_uri.clone(),
                    configuration: configuration.clone(),
                });
            }
            Directive::Renumber { from, to } => {
                acc.table.renumber(*from, *to)?;
                debug!(from, to, "renumbered");
                acc.renumberings.push(Renumbering {
                    from: *from,
                    to: *to,
                });
            }
            Directive::ContainerDefinition {
                id,
                name,
                directives,
            } => {
                check_name(name)?;
                let association = if directives.is_empty() {
                    Association::container(*id, name.as_str())
                } else {
                    let mut child = ResolvedTranslation::new(acc.table.clone());
                    self.apply_all(directives, &mut child)?;
                    acc.primitive_sets.append(&mut child.primitive_sets);
                    acc.renumberings.append(&mut child.renumberings);
                    Association::scoped_container(*id, name.as_str(), Arc::new(child.table))
                };
                acc.table.insert(association);
            }
            Directive::NodeDefinition {
                id,
                name,
                type_name,
            } => {
                check_name(name)?;
                let ty = parse_type(type_name, self.extensions)?;
                acc.table.insert(Association::primitive(*id, name.as_str(), ty));
            }
        }
        Ok(())
    }
}

fn check_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::format(format!("invalid definition name {name:?}")))
    }
}

/// Resolve a top-level standalone translation document.
pub fn load_translation<R: Read>(
    source: R,
    resources: &mut dyn ResourceResolver,
    options: &LoadOptions,
) -> Result<ResolvedTranslation> {
    let mut resolver = TranslationResolver::new(resources, options.type_extensions());
    let mut resolved = resolver.resolve_document(source, true)?;
    resolved.reduce();
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::SchemaBuilder;
    use crate::error::ErrorKind;
    use crate::value::PrimitiveType;

    fn resolve(builder: SchemaBuilder, resources: &mut dyn ResourceResolver) -> Result<ResolvedTranslation> {
        let header = builder.header_tree()?;
        TranslationResolver::new(resources, &[]).resolve_header(&header, header.root_id())
    }

    #[test]
    fn test_definitions() {
        let resolved = resolve(
            SchemaBuilder::new().node(10, "Title", "string").container(11, "Body"),
            &mut NoResolver,
        )
        .unwrap();
        let table = resolved.table();
        assert_eq!(table.get(10).unwrap().primitive_type(), Some(PrimitiveType::String));
        assert!(table.get(11).unwrap().is_container());
        assert!(table.get(11).unwrap().scope().is_none());
        assert!(table.contains(ids::HEADER));
    }

    #[test]
    fn test_primitive_set_reduction_keeps_last() {
        let resolved = resolve(
            SchemaBuilder::new()
                .include_primitives("Geo", None, None)
                .include_primitives("other", None, None)
                .include_primitives("geo", Some("wkb"), None),
            &mut NoResolver,
        )
        .unwrap();
        let sets: Vec<_> = resolved
            .primitive_sets()
            .iter()
            .map(|s| (s.name.as_str(), s.codec.as_deref()))
            .collect();
        assert_eq!(sets, [("other", None), ("geo", Some("wkb"))]);
    }

    #[test]
    fn test_renumber_is_audited() {
        let resolved = resolve(
            SchemaBuilder::new().node(10, "Title", "string").renumber(10, 20),
            &mut NoResolver,
        )
        .unwrap();
        assert!(resolved.table().get(10).is_none());
        assert_eq!(resolved.table().get(20).unwrap().name(), Some("Title"));
        assert_eq!(resolved.renumberings(), [Renumbering { from: 10, to: 20 }]);
    }

    #[test]
    fn test_renumber_collision() {
        let err = resolve(
            SchemaBuilder::new()
                .node(10, "Title", "string")
                .node(11, "Subtitle", "string")
                .renumber(10, 11),
            &mut NoResolver,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
    }

    #[test]
    fn test_scoped_container_inherits_and_overrides() {
        let nested = SchemaBuilder::new()
            .node(10, "Count", "uint")
            .include_primitives("inner", None, None);
        let resolved = resolve(
            SchemaBuilder::new()
                .node(10, "Title", "string")
                .node(12, "Note", "string")
                .scoped_container(11, "Stats", nested),
            &mut NoResolver,
        )
        .unwrap();

        let stats = resolved.table().get(11).unwrap();
        let local = stats.scope().unwrap();
        assert_eq!(local.get(10).unwrap().name(), Some("Count"));
        assert_eq!(local.get(12).unwrap().name(), Some("Note"));
        // The outer table is untouched by the nested definitions.
        assert_eq!(resolved.table().get(10).unwrap().name(), Some("Title"));
        assert_eq!(resolved.primitive_sets()[0].name, "inner");
    }

    #[test]
    fn test_include_stream_starts_empty() {
        let base = SchemaBuilder::new()
            .node(10, "Title", "string")
            .include_primitives("geo", None, None)
            .to_schema_bytes()
            .unwrap();
        let mut resources = InMemoryResolver::new().with_document("mem:base", base);
        let resolved = resolve(
            SchemaBuilder::new().include_translation("mem:base", None).container(11, "Body"),
            &mut resources,
        )
        .unwrap();

        assert_eq!(resolved.table().get(10).unwrap().name(), Some("Title"));
        assert!(resolved.table().contains(11));
        assert_eq!(resolved.primitive_sets().len(), 1);
    }

    #[test]
    fn test_include_by_urn_and_closure() {
        let translation = ResolvedTranslation::new(
            [Association::container(30, "Extra")].into_iter().collect(),
        );
        let mut resources = InMemoryResolver::new().with_translation("urn:extra", translation);
        let resolved = resolve(
            SchemaBuilder::new().include_translation("http://unreachable", Some("urn:extra")),
            &mut resources,
        )
        .unwrap();
        assert!(resolved.table().contains(30));

        let mut calls = 0;
        let mut closure = |uri: &str, _urn: Option<&str>| -> Result<Resolved> {
            calls += 1;
            Err(Error::resolution(format!("offline: {uri}")))
        };
        let err = resolve(SchemaBuilder::new().include_translation("x", None), &mut closure).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_invalid_name_and_type() {
        let err = resolve(SchemaBuilder::new().node(1, "bad name", "string"), &mut NoResolver).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = resolve(SchemaBuilder::new().node(1, "ok", "quaternion"), &mut NoResolver).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}
