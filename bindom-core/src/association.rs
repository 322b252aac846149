//! Associations: what a numeric id means.
//!
//! An [`AssociationTable`] maps ids to [`Association`]s. Associations are
//! immutable and shared through `Arc`; every change (renumbering, attaching
//! a local scope) produces a fresh clone.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use unicode_xid::UnicodeXID;

use crate::error::{Error, Result};
use crate::value::PrimitiveType;

/// Reserved ids of the baseline translation.
pub mod ids {
    /// First id of the reserved range.
    pub const RESERVED_BASE: u32 = 0xFFFF_0000;

    pub const HEADER: u32 = RESERVED_BASE + 1;
    pub const TRANSLATION: u32 = RESERVED_BASE + 2;
    pub const INCLUDE_TRANSLATION: u32 = RESERVED_BASE + 3;
    pub const INCLUDE_PRIMITIVES: u32 = RESERVED_BASE + 4;
    pub const RENUMBER: u32 = RESERVED_BASE + 5;
    pub const CONTAINER_DEFINITION: u32 = RESERVED_BASE + 6;
    pub const NODE_DEFINITION: u32 = RESERVED_BASE + 7;
    pub const CONFIGURATION: u32 = RESERVED_BASE + 8;
    pub const PARAMETER: u32 = RESERVED_BASE + 9;

    pub const CONTENT_SIZE: u32 = RESERVED_BASE + 16;
    pub const ATTR_ID: u32 = RESERVED_BASE + 17;
    pub const ATTR_NAME: u32 = RESERVED_BASE + 18;
    pub const ATTR_TYPE: u32 = RESERVED_BASE + 19;
    pub const ATTR_URI: u32 = RESERVED_BASE + 20;
    pub const ATTR_URN: u32 = RESERVED_BASE + 21;
    pub const ATTR_CODEC: u32 = RESERVED_BASE + 22;
    pub const ATTR_CODEC_URI: u32 = RESERVED_BASE + 23;
    pub const ATTR_FROM: u32 = RESERVED_BASE + 24;
    pub const ATTR_TO: u32 = RESERVED_BASE + 25;
    pub const ATTR_VALUE: u32 = RESERVED_BASE + 26;
}

/// Well-known name of the content-size attribute.
pub const CONTENT_SIZE_NAME: &str = "content-size";

/// What kind of node an id introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    Container,
    Primitive,
    EndContainer,
    Comment,
    /// Placeholder for a container id missing from the ambient table.
    Unknown,
}

/// Definition giving a numeric id its meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    id: u32,
    name: Option<String>,
    kind: AssociationKind,
    primitive_type: Option<PrimitiveType>,
    scope: Option<Arc<AssociationTable>>,
}

impl Association {
    pub fn container(id: u32, name: impl Into<String>) -> Self {
        Association {
            id,
            name: Some(name.into()),
            kind: AssociationKind::Container,
            primitive_type: None,
            scope: None,
        }
    }

    /// A container whose attributes and descendants are read under `scope`.
    pub fn scoped_container(id: u32, name: impl Into<String>, scope: Arc<AssociationTable>) -> Self {
        Association {
            scope: Some(scope),
            ..Association::container(id, name)
        }
    }

    pub fn primitive(id: u32, name: impl Into<String>, ty: PrimitiveType) -> Self {
        Association {
            id,
            name: Some(name.into()),
            kind: AssociationKind::Primitive,
            primitive_type: Some(ty),
            scope: None,
        }
    }

    pub fn unknown(id: u32) -> Self {
        Association {
            id,
            name: None,
            kind: AssociationKind::Unknown,
            primitive_type: None,
            scope: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        self.primitive_type
    }

    /// Local table scoping this container's attributes and descendants.
    pub fn scope(&self) -> Option<&Arc<AssociationTable>> {
        self.scope.as_ref()
    }

    /// True for kinds that open a container on the wire.
    pub fn is_container(&self) -> bool {
        matches!(self.kind, AssociationKind::Container | AssociationKind::Unknown)
    }

    /// Clone under a new id.
    pub fn with_id(&self, id: u32) -> Association {
        Association { id, ..self.clone() }
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}#{}", self.id),
            None => write!(f, "#{}", self.id),
        }
    }
}

/// Check a definition name: an identifier start (or `_`) followed by
/// identifier characters, `-`, `.` or `:`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || UnicodeXID::is_xid_start(c) => {}
        _ => return false,
    }
    chars.all(|c| UnicodeXID::is_xid_continue(c) || matches!(c, '-' | '.' | ':'))
}

/// Id-keyed set of associations. Ids are unique within one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssociationTable {
    entries: BTreeMap<u32, Arc<Association>>,
}

impl AssociationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table every embedded header is resolved against.
    pub fn baseline() -> AssociationTable {
        static BASELINE: OnceLock<AssociationTable> = OnceLock::new();
        BASELINE.get_or_init(build_baseline).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Arc<Association>> {
        self.entries.get(&id)
    }

    /// First association (in id order) carrying `name`.
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<Association>> {
        self.entries.values().find(|a| a.name() == Some(name))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Register an association, returning the one it replaced.
    pub fn insert(&mut self, association: impl Into<Arc<Association>>) -> Option<Arc<Association>> {
        let association = association.into();
        self.entries.insert(association.id(), association)
    }

    pub fn remove(&mut self, id: u32) -> Option<Arc<Association>> {
        self.entries.remove(&id)
    }

    /// Move the association at `from` to `to`.
    ///
    /// `from` must be registered and `to` must be free.
    pub fn renumber(&mut self, from: u32, to: u32) -> Result<()> {
        if self.entries.contains_key(&to) {
            return Err(Error::resolution(format!(
                "cannot renumber {from} to {to}: id {to} is already registered"
            )));
        }
        let existing = self.entries.remove(&from).ok_or_else(|| {
            Error::resolution(format!("cannot renumber {from}: id is not registered"))
        })?;
        self.entries.insert(to, Arc::new(existing.with_id(to)));
        Ok(())
    }

    /// Union with `other`; entries of `other` win on id collisions.
    pub fn merge(&mut self, other: &AssociationTable) {
        for (id, association) in &other.entries {
            self.entries.insert(*id, Arc::clone(association));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Association>> {
        self.entries.values()
    }
}

impl FromIterator<Association> for AssociationTable {
    fn from_iter<I: IntoIterator<Item = Association>>(iter: I) -> Self {
        let mut table = AssociationTable::new();
        for association in iter {
            table.insert(association);
        }
        table
    }
}

fn build_baseline() -> AssociationTable {
    use crate::value::PrimitiveType::{String as Str, UInt};

    [
        Association::container(ids::HEADER, "header"),
        Association::container(ids::TRANSLATION, "translation"),
        Association::container(ids::INCLUDE_TRANSLATION, "include-translation"),
        Association::container(ids::INCLUDE_PRIMITIVES, "include-primitives"),
        Association::container(ids::RENUMBER, "renumber"),
        Association::container(ids::CONTAINER_DEFINITION, "container-definition"),
        Association::container(ids::NODE_DEFINITION, "node-definition"),
        Association::container(ids::CONFIGURATION, "configuration"),
        Association::container(ids::PARAMETER, "parameter"),
        Association::primitive(ids::CONTENT_SIZE, CONTENT_SIZE_NAME, UInt),
        Association::primitive(ids::ATTR_ID, "id", UInt),
        Association::primitive(ids::ATTR_NAME, "name", Str),
        Association::primitive(ids::ATTR_TYPE, "type", Str),
        Association::primitive(ids::ATTR_URI, "uri", Str),
        Association::primitive(ids::ATTR_URN, "urn", Str),
        Association::primitive(ids::ATTR_CODEC, "codec", Str),
        Association::primitive(ids::ATTR_CODEC_URI, "codec-uri", Str),
        Association::primitive(ids::ATTR_FROM, "from", UInt),
        Association::primitive(ids::ATTR_TO, "to", UInt),
        Association::primitive(ids::ATTR_VALUE, "value", Str),
    ]
    .into_iter()
    .collect()
}
