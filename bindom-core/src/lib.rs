//! BinDOM Core
//!
//! Lazily materialized binary DOM. A document stream is a header of schema
//! directives followed by a body of containers and typed primitives, all
//! addressed by numeric association ids.
//!
//! # Architecture
//!
//! - **wire.rs** / **marker.rs** / **reader.rs** - Byte format, structural markers, marker reader
//! - **tree.rs** / **collections.rs** - Arena tree with per-node load state, keyed attribute/child lists
//! - **materialize.rs** - Drives nodes through None, IdOnly, Attributes, Full
//! - **association.rs** / **types.rs** / **value.rs** - Association tables, type strings, primitive values
//! - **directive.rs** / **translation.rs** - Schema directives and their resolution into a table
//! - **writer.rs** / **document.rs** - Serialization and the load/save entry points

pub mod association;
pub mod collections;
pub mod directive;
pub mod document;
pub mod error;
pub mod marker;
pub mod materialize;
pub mod reader;
pub mod translation;
pub mod tree;
pub mod types;
pub mod value;
pub mod wire;
pub mod writer;

pub use association::{Association, AssociationKind, AssociationTable};
pub use collections::{Attributes, AttributesMut, Children, ChildrenMut, Key, NodeList};
pub use directive::{Directive, SchemaBuilder};
pub use document::{Document, LazyDocument, LoadOptions};
pub use error::{Breadcrumb, Crumb, Error, ErrorKind, Result};
pub use marker::Marker;
pub use materialize::Materializer;
pub use reader::{ByteSource, MarkerReader, Seekable, Sequential};
pub use translation::{
    load_translation, InMemoryResolver, NoResolver, PrimitiveSetRef, Resolved, ResolvedTranslation,
    ResourceResolver, TranslationResolver,
};
pub use tree::{LoadState, Node, NodeId, NodeKind, ResumeCursor, Tree};
pub use types::{TypeAlias, TypeExtension};
pub use value::{DateTime, ElementType, FromValue, Matrix, NumericArray, PrimitiveType, Value};
pub use writer::{ContentSizePolicy, MarkerWriter, WriteOptions};
