//! Schema directives.
//!
//! A header (or standalone translation document) is a container whose
//! children are directive containers from the baseline table. They are parsed
//! into [`Directive`] values before resolution; [`SchemaBuilder`] goes the
//! other way and writes directives back out as a node tree.

use std::sync::Arc;

use crate::association::{ids, Association, AssociationTable};
use crate::collections::Attributes;
use crate::error::{Error, Result};
use crate::tree::{Node, NodeId, NodeKind, Tree};
use crate::value::Value;
use crate::writer::{write_tree, MarkerWriter, WriteOptions};

/// One schema instruction.
#[derive(Debug, Clone)]
pub enum Directive {
    /// Pull in another translation by URI (and optionally URN).
    IncludeTranslation { uri: String, urn: Option<String> },

    /// Require an external primitive-type set.
    IncludePrimitives {
        name: String,
        codec: Option<String>,
        codec_uri: Option<String>,
        /// Inline `configuration` subtree, extracted into a tree of its own.
        configuration: Option<Tree>,
    },

    /// Move the definition at `from` to `to`.
    Renumber { from: u32, to: u32 },

    /// Define a container. Nested directives give it a local table.
    ContainerDefinition {
        id: u32,
        name: String,
        directives: Vec<Directive>,
    },

    /// Define a primitive with a type string such as `string` or `float32[]`.
    NodeDefinition {
        id: u32,
        name: String,
        type_name: String,
    },
}

impl Directive {
    /// Baseline id of the container this directive is written as.
    pub fn association_id(&self) -> u32 {
        match self {
            Directive::IncludeTranslation { .. } => ids::INCLUDE_TRANSLATION,
            Directive::IncludePrimitives { .. } => ids::INCLUDE_PRIMITIVES,
            Directive::Renumber { .. } => ids::RENUMBER,
            Directive::ContainerDefinition { .. } => ids::CONTAINER_DEFINITION,
            Directive::NodeDefinition { .. } => ids::NODE_DEFINITION,
        }
    }

    /// Parse one directive container.
    pub fn from_node(node: Node<'_>) -> Result<Directive> {
        parse_directive(node).map_err(|e| e.within(node.tree().crumb(node.id())))
    }

    /// Append this directive as a child container of `parent`.
    pub fn append_to(&self, tree: &mut Tree, parent: NodeId) -> Result<NodeId> {
        let vocab = AssociationTable::baseline();
        let node = tree
            .children_mut(parent)?
            .append_container(lookup(&vocab, self.association_id())?)?;
        let mut attrs = tree.attributes_mut(node)?;
        match self {
            Directive::IncludeTranslation { uri, urn } => {
                attrs.set(lookup(&vocab, ids::ATTR_URI)?, uri.as_str())?;
                if let Some(urn) = urn {
                    attrs.set(lookup(&vocab, ids::ATTR_URN)?, urn.as_str())?;
                }
            }
            Directive::IncludePrimitives {
                name,
                codec,
                codec_uri,
                configuration,
            } => {
                attrs.set(lookup(&vocab, ids::ATTR_NAME)?, name.as_str())?;
                if let Some(codec) = codec {
                    attrs.set(lookup(&vocab, ids::ATTR_CODEC)?, codec.as_str())?;
                }
                if let Some(codec_uri) = codec_uri {
                    attrs.set(lookup(&vocab, ids::ATTR_CODEC_URI)?, codec_uri.as_str())?;
                }
                if let Some(config) = configuration {
                    tree.import(node, config, config.root_id())?;
                }
            }
            Directive::Renumber { from, to } => {
                attrs.set(lookup(&vocab, ids::ATTR_FROM)?, *from as u64)?;
                attrs.set(lookup(&vocab, ids::ATTR_TO)?, *to as u64)?;
            }
            Directive::ContainerDefinition {
                id,
                name,
                directives,
            } => {
                attrs.set(lookup(&vocab, ids::ATTR_ID)?, *id as u64)?;
                attrs.set(lookup(&vocab, ids::ATTR_NAME)?, name.as_str())?;
                for nested in directives {
                    nested.append_to(tree, node)?;
                }
            }
            Directive::NodeDefinition {
                id,
                name,
                type_name,
            } => {
                attrs.set(lookup(&vocab, ids::ATTR_ID)?, *id as u64)?;
                attrs.set(lookup(&vocab, ids::ATTR_NAME)?, name.as_str())?;
                attrs.set(lookup(&vocab, ids::ATTR_TYPE)?, type_name.as_str())?;
            }
        }
        Ok(node)
    }
}

/// Parse every directive child of a fully loaded header, translation or
/// container-definition node. Comments and padding are skipped.
pub fn parse_directives(tree: &Tree, parent: NodeId) -> Result<Vec<Directive>> {
    let mut directives = Vec::new();
    for child in tree.children(parent)?.iter() {
        match child.kind() {
            NodeKind::Container(_) => directives.push(Directive::from_node(child)?),
            NodeKind::Comment(_) | NodeKind::Padding(_) => {}
            NodeKind::Primitive(_) | NodeKind::Fragment(_) => {
                return Err(Error::format(format!(
                    "unexpected {} among directives",
                    child
                        .association()
                        .map_or_else(|| "node".to_string(), |a| a.to_string())
                ))
                .within(tree.crumb(parent)));
            }
        }
    }
    Ok(directives)
}

fn parse_directive(node: Node<'_>) -> Result<Directive> {
    let association_id = node
        .association_id()
        .ok_or_else(|| Error::format("directive container has no association"))?;
    let attrs = node.attributes()?;

    Ok(match association_id {
        ids::INCLUDE_TRANSLATION => Directive::IncludeTranslation {
            uri: attrs.require("uri")?,
            urn: attrs.get_as("urn")?,
        },
        ids::INCLUDE_PRIMITIVES => Directive::IncludePrimitives {
            name: attrs.require("name")?,
            codec: attrs.get_as("codec")?,
            codec_uri: attrs.get_as("codec-uri")?,
            configuration: configuration_of(node)?,
        },
        ids::RENUMBER => Directive::Renumber {
            from: require_id(&attrs, "from")?,
            to: require_id(&attrs, "to")?,
        },
        ids::CONTAINER_DEFINITION => Directive::ContainerDefinition {
            id: require_id(&attrs, "id")?,
            name: attrs.require("name")?,
            directives: parse_directives(node.tree(), node.id())?,
        },
        ids::NODE_DEFINITION => Directive::NodeDefinition {
            id: require_id(&attrs, "id")?,
            name: attrs.require("name")?,
            type_name: attrs.require("type")?,
        },
        _ => {
            let label = node
                .association()
                .map_or_else(|| format!("#{association_id}"), |a| a.to_string());
            return Err(Error::format(format!("unknown directive {label}")));
        }
    })
}

fn require_id(attrs: &Attributes<'_>, key: &str) -> Result<u32> {
    let raw: u64 = attrs.require(key)?;
    u32::try_from(raw).map_err(|_| Error::format(format!("{key} {raw} exceeds 32 bits")))
}

/// The `configuration` child of an include-primitives directive.
fn configuration_of(node: Node<'_>) -> Result<Option<Tree>> {
    let children = node.children()?;
    let Some(config) = children
        .iter()
        .find(|c| c.association_id() == Some(ids::CONFIGURATION))
    else {
        return Ok(None);
    };
    node.tree().extract(config.id()).map(Some)
}

fn lookup(table: &AssociationTable, id: u32) -> Result<Arc<Association>> {
    table
        .get(id)
        .cloned()
        .ok_or_else(|| Error::resolution(format!("baseline has no association {id}")))
}

/// Builds header and translation trees from directives.
///
/// ```
/// use bindom_core::directive::SchemaBuilder;
///
/// let header = SchemaBuilder::new()
///     .node(10, "Title", "string")
///     .container(11, "Body")
///     .header_tree()
///     .unwrap();
/// assert_eq!(header.root().children().unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    directives: Vec<Directive>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn include_translation(self, uri: impl Into<String>, urn: Option<&str>) -> Self {
        self.directive(Directive::IncludeTranslation {
            uri: uri.into(),
            urn: urn.map(str::to_string),
        })
    }

    pub fn include_primitives(self, name: impl Into<String>, codec: Option<&str>, codec_uri: Option<&str>) -> Self {
        self.directive(Directive::IncludePrimitives {
            name: name.into(),
            codec: codec.map(str::to_string),
            codec_uri: codec_uri.map(str::to_string),
            configuration: None,
        })
    }

    pub fn renumber(self, from: u32, to: u32) -> Self {
        self.directive(Directive::Renumber { from, to })
    }

    /// Define a container without a local table.
    pub fn container(self, id: u32, name: impl Into<String>) -> Self {
        self.directive(Directive::ContainerDefinition {
            id,
            name: name.into(),
            directives: Vec::new(),
        })
    }

    /// Define a container whose descendants are read under `nested`.
    pub fn scoped_container(self, id: u32, name: impl Into<String>, nested: SchemaBuilder) -> Self {
        self.directive(Directive::ContainerDefinition {
            id,
            name: name.into(),
            directives: nested.directives,
        })
    }

    pub fn node(self, id: u32, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.directive(Directive::NodeDefinition {
            id,
            name: name.into(),
            type_name: type_name.into(),
        })
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// A `header` container holding the directives.
    pub fn header_tree(&self) -> Result<Tree> {
        self.tree_rooted_at(ids::HEADER)
    }

    /// A `translation` container holding the directives.
    pub fn schema_tree(&self) -> Result<Tree> {
        self.tree_rooted_at(ids::TRANSLATION)
    }

    /// A standalone translation document: preamble plus translation container.
    pub fn to_schema_bytes(&self) -> Result<Vec<u8>> {
        let tree = self.schema_tree()?;
        let mut writer = MarkerWriter::new(Vec::new());
        writer.write_preamble()?;
        write_tree(&mut writer, &tree, tree.root_id(), &WriteOptions::default())?;
        Ok(writer.into_inner())
    }

    fn tree_rooted_at(&self, id: u32) -> Result<Tree> {
        let vocab = AssociationTable::baseline();
        let mut tree = Tree::with_root_container(lookup(&vocab, id)?);
        let root = tree.root_id();
        for directive in &self.directives {
            directive.append_to(&mut tree, root)?;
        }
        Ok(tree)
    }
}

/// A `configuration` tree of `parameter` entries with `name` and `value`.
pub fn configuration<'a>(parameters: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Tree> {
    let vocab = AssociationTable::baseline();
    let mut tree = Tree::with_root_container(lookup(&vocab, ids::CONFIGURATION)?);
    let root = tree.root_id();
    for (name, value) in parameters {
        let param = tree
            .children_mut(root)?
            .append_container(lookup(&vocab, ids::PARAMETER)?)?;
        let mut attrs = tree.attributes_mut(param)?;
        attrs.set(lookup(&vocab, ids::ATTR_NAME)?, name)?;
        attrs.set(lookup(&vocab, ids::ATTR_VALUE)?, Value::from(value))?;
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_builder_round_trips_through_tree() {
        let nested = SchemaBuilder::new().node(1, "Inner", "int");
        let tree = SchemaBuilder::new()
            .include_translation("mem:base", Some("urn:base"))
            .include_primitives("geo", Some("wkb"), None)
            .renumber(5, 6)
            .scoped_container(11, "Body", nested)
            .node(10, "Title", "string")
            .header_tree()
            .unwrap();

        let directives = parse_directives(&tree, tree.root_id()).unwrap();
        assert_eq!(directives.len(), 5);
        match &directives[0] {
            Directive::IncludeTranslation { uri, urn } => {
                assert_eq!(uri, "mem:base");
                assert_eq!(urn.as_deref(), Some("urn:base"));
            }
            other => panic!("Expected include-translation, got {other:?}"),
        }
        match &directives[3] {
            Directive::ContainerDefinition { id, directives, .. } => {
                assert_eq!(*id, 11);
                assert_eq!(directives.len(), 1);
            }
            other => panic!("Expected container-definition, got {other:?}"),
        }
        assert!(matches!(directives[2], Directive::Renumber { from: 5, to: 6 }));
    }

    #[test]
    fn test_configuration_subtree_is_extracted() {
        let config = configuration([("level", "9")]).unwrap();
        let tree = SchemaBuilder::new()
            .directive(Directive::IncludePrimitives {
                name: "zip".into(),
                codec: None,
                codec_uri: None,
                configuration: Some(config),
            })
            .schema_tree()
            .unwrap();

        let directives = parse_directives(&tree, tree.root_id()).unwrap();
        let Directive::IncludePrimitives {
            configuration: Some(config),
            ..
        } = &directives[0]
        else {
            panic!("Expected include-primitives with configuration");
        };
        let param = config.root().first_child().unwrap();
        let attrs = param.attributes().unwrap();
        assert_eq!(attrs.require::<String>("name").unwrap(), "level");
        assert_eq!(attrs.require::<String>("value").unwrap(), "9");
    }

    #[test]
    fn test_unknown_directive_is_format_error() {
        let vocab = AssociationTable::baseline();
        let mut tree = Tree::with_root_container(lookup(&vocab, ids::HEADER).unwrap());
        let root = tree.root_id();
        tree.children_mut(root)
            .unwrap()
            .append_container(Association::unknown(77))
            .unwrap();

        let err = parse_directives(&tree, root).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_missing_attribute_is_format_error() {
        let vocab = AssociationTable::baseline();
        let mut tree = Tree::with_root_container(lookup(&vocab, ids::HEADER).unwrap());
        let root = tree.root_id();
        tree.children_mut(root)
            .unwrap()
            .append_container(lookup(&vocab, ids::NODE_DEFINITION).unwrap())
            .unwrap();

        let err = parse_directives(&tree, root).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(err.trail().unwrap().crumbs()[0].name.as_deref(), Some("node-definition"));
    }
}
