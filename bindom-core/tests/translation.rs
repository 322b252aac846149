//! Header resolution through includes, renumbering and scoped definitions.

mod common;

use std::sync::Arc;

use bindom_core::association::ids;
use bindom_core::{
    load_translation, wire, Document, ErrorKind, InMemoryResolver, LoadOptions, NoResolver, PrimitiveType, Resolved,
    ResourceResolver, SchemaBuilder, WriteOptions,
};
use pretty_assertions::assert_eq;

fn base_schema() -> SchemaBuilder {
    SchemaBuilder::new()
        .node(10, "Title", "string")
        .container(11, "Body")
}

fn resources() -> InMemoryResolver {
    InMemoryResolver::new().with_document("mem:base", base_schema().to_schema_bytes().unwrap())
}

fn document(schema: SchemaBuilder, resources: &mut dyn ResourceResolver) -> bindom_core::Result<Document> {
    Document::with_schema(&schema, resources, &LoadOptions::default())
}

#[test]
fn test_include_merges_definitions() {
    let schema = SchemaBuilder::new()
        .include_translation("mem:base", None)
        .node(12, "Count", "uint");
    let doc = document(schema, &mut resources()).unwrap();

    assert_eq!(doc.association("Title").unwrap().id(), 10);
    assert!(doc.association("Body").unwrap().is_container());
    assert_eq!(doc.association("Count").unwrap().primitive_type(), Some(PrimitiveType::UInt));
    assert!(doc.table().contains(ids::CONTENT_SIZE));
}

#[test]
fn test_include_falls_back_to_urn() {
    let mut resources = InMemoryResolver::new().with_document("urn:base", base_schema().to_schema_bytes().unwrap());
    let schema = SchemaBuilder::new().include_translation("mem:nowhere", Some("urn:base"));
    let doc = document(schema, &mut resources).unwrap();
    assert!(doc.association("Title").is_some());
}

#[test]
fn test_nested_includes() {
    let middle = SchemaBuilder::new()
        .include_translation("mem:base", None)
        .node(12, "Count", "uint");
    let mut resources = resources().with_document("mem:middle", middle.to_schema_bytes().unwrap());

    let schema = SchemaBuilder::new().include_translation("mem:middle", None);
    let doc = document(schema, &mut resources).unwrap();
    assert!(doc.association("Title").is_some());
    assert!(doc.association("Count").is_some());
}

#[test]
fn test_later_definition_wins() {
    let schema = SchemaBuilder::new()
        .include_translation("mem:base", None)
        .node(10, "Heading", "string");
    let doc = document(schema, &mut resources()).unwrap();
    assert_eq!(doc.table().get(10).unwrap().name(), Some("Heading"));
    assert!(doc.association("Title").is_none());
}

#[test]
fn test_renumber_moves_association() {
    let schema = SchemaBuilder::new()
        .include_translation("mem:base", None)
        .renumber(10, 20);
    let doc = document(schema, &mut resources()).unwrap();

    assert_eq!(doc.association("Title").unwrap().id(), 20);
    assert!(doc.table().get(10).is_none());
    let moves: Vec<_> = doc.translation().renumberings().iter().map(|r| (r.from, r.to)).collect();
    assert_eq!(moves, vec![(10, 20)]);
}

#[test]
fn test_renumber_onto_taken_id_fails() {
    let schema = SchemaBuilder::new()
        .include_translation("mem:base", None)
        .renumber(10, 11);
    let err = document(schema, &mut resources()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn test_renumber_absent_id_fails() {
    let schema = SchemaBuilder::new().renumber(10, 20);
    let err = document(schema, &mut NoResolver).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn test_double_renumber() {
    let schema = SchemaBuilder::new()
        .include_translation("mem:base", None)
        .renumber(10, 20)
        .renumber(20, 30);
    let doc = document(schema, &mut resources()).unwrap();

    assert!(doc.table().get(10).is_none());
    assert!(doc.table().get(20).is_none());
    assert_eq!(doc.table().get(30).unwrap().name(), Some("Title"));
    assert_eq!(doc.translation().renumberings().len(), 2);
}

#[test]
fn test_renumbered_ids_are_used_on_the_wire() {
    let schema = SchemaBuilder::new()
        .include_translation("mem:base", None)
        .renumber(11, 300);
    let mut doc = document(schema, &mut resources()).unwrap();
    let body = Arc::clone(doc.association("Body").unwrap());
    let root = doc.body_id();
    doc.tree_mut().children_mut(root).unwrap().append_container(body).unwrap();

    let bytes = doc.to_bytes(&WriteOptions::default()).unwrap();
    let mut tail = vec![wire::tag::CONTAINER];
    wire::write_varint(&mut tail, 300).unwrap();
    tail.push(wire::tag::END_CONTAINER);
    assert!(bytes.ends_with(&tail));

    let loaded = Document::load(bytes.as_slice(), &mut resources(), &LoadOptions::default()).unwrap();
    assert_eq!(loaded.body().first_child().unwrap().name(), Some("Body"));
}

#[test]
fn test_primitive_sets_reduce_by_name() {
    let schema = SchemaBuilder::new()
        .include_primitives("Audio", Some("pcm"), None)
        .include_primitives("Video", None, None)
        .include_primitives("audio", Some("flac"), Some("urn:codec:flac"));
    let doc = document(schema, &mut NoResolver).unwrap();

    let sets: Vec<_> = doc
        .primitive_sets()
        .iter()
        .map(|s| (s.name.as_str(), s.codec.as_deref()))
        .collect();
    assert_eq!(sets, vec![("Video", None), ("audio", Some("flac"))]);
}

#[test]
fn test_scoped_container_reads_children_locally() {
    let schema = SchemaBuilder::new()
        .node(10, "Title", "string")
        .scoped_container(11, "Body", SchemaBuilder::new().node(30, "Local", "int"));
    let mut doc = document(schema, &mut NoResolver).unwrap();
    assert!(doc.association("Local").is_none());

    let body = Arc::clone(doc.association("Body").unwrap());
    let local = Arc::clone(body.scope().unwrap().get_by_name("Local").unwrap());
    assert!(body.scope().unwrap().get_by_name("Title").is_some());

    let root = doc.body_id();
    let node = doc.tree_mut().children_mut(root).unwrap().append_container(body).unwrap();
    doc.tree_mut().children_mut(node).unwrap().append_element(local, -5i64).unwrap();
    let bytes = doc.to_bytes(&WriteOptions::default()).unwrap();

    let loaded = Document::load(bytes.as_slice(), &mut NoResolver, &LoadOptions::default()).unwrap();
    let node = loaded.body().first_child().unwrap();
    assert_eq!(node.children().unwrap().require::<i64>("Local").unwrap(), -5);

    // Outside the container the local id means nothing.
    let mut stray = doc.clone();
    let local = Arc::clone(
        doc.association("Body")
            .unwrap()
            .scope()
            .unwrap()
            .get(30)
            .unwrap(),
    );
    let root = stray.body_id();
    stray.tree_mut().children_mut(root).unwrap().append_element(local, 1i64).unwrap();
    let bytes = stray.to_bytes(&WriteOptions::default()).unwrap();
    let err = Document::load(bytes.as_slice(), &mut NoResolver, &LoadOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_closure_resolver() {
    let base = base_schema().to_schema_bytes().unwrap();
    let mut requested = Vec::new();
    let mut resolver = |uri: &str, _urn: Option<&str>| -> bindom_core::Result<Resolved> {
        requested.push(uri.to_string());
        Ok(Resolved::Stream(Box::new(std::io::Cursor::new(base.clone()))))
    };

    let schema = SchemaBuilder::new()
        .include_translation("mem:a", None)
        .include_translation("mem:a", None);
    let doc = document(schema, &mut resolver).unwrap();
    assert!(doc.association("Title").is_some());
    assert_eq!(requested, vec!["mem:a", "mem:a"]);
}

#[test]
fn test_pre_resolved_translation() {
    let base = load_translation(
        base_schema().to_schema_bytes().unwrap().as_slice(),
        &mut NoResolver,
        &LoadOptions::default(),
    )
    .unwrap();
    let mut resources = InMemoryResolver::new().with_translation("mem:base", base);

    let schema = SchemaBuilder::new().include_translation("mem:base", None);
    let doc = document(schema, &mut resources).unwrap();
    assert!(doc.association("Body").is_some());
}

#[test]
fn test_standalone_translation_is_seeded_with_baseline() {
    let resolved = load_translation(
        base_schema().to_schema_bytes().unwrap().as_slice(),
        &mut NoResolver,
        &LoadOptions::default(),
    )
    .unwrap();
    assert!(resolved.table().contains(ids::CONTENT_SIZE));
    assert!(resolved.table().get_by_name("Title").is_some());
}

#[test]
fn test_include_must_be_translation_document() {
    let not_a_translation = common::empty_document().to_bytes(&WriteOptions::default()).unwrap();
    let mut resources = InMemoryResolver::new().with_document("mem:doc", not_a_translation);
    let schema = SchemaBuilder::new().include_translation("mem:doc", None);
    let err = document(schema, &mut resources).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_unknown_type_string() {
    let schema = SchemaBuilder::new().node(10, "Title", "no-such-type");
    let err = document(schema, &mut NoResolver).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_invalid_definition_name() {
    let schema = SchemaBuilder::new().container(11, "has space");
    let err = document(schema, &mut NoResolver).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}
