//! Shared fixtures for the integration tests.
//!
//! The sample schema:
//!
//! ```text
//! 10 Title    string
//! 11 Body     container
//! 12 Count    uint
//! 13 Section  container
//! ```
//!
//! The sample body holds two `Body` containers. The first has a `Title`, a
//! comment and two `Section`s with a `Count` each; the second is empty apart
//! from its `Title`.

#![allow(dead_code)]

use std::sync::Arc;

use bindom_core::{
    Association, ContentSizePolicy, Document, LoadOptions, NoResolver, NodeId, SchemaBuilder, WriteOptions,
};

pub const TITLE: u32 = 10;
pub const BODY: u32 = 11;
pub const COUNT: u32 = 12;
pub const SECTION: u32 = 13;

pub fn schema() -> SchemaBuilder {
    SchemaBuilder::new()
        .node(TITLE, "Title", "string")
        .container(BODY, "Body")
        .node(COUNT, "Count", "uint")
        .container(SECTION, "Section")
}

pub fn empty_document() -> Document {
    Document::with_schema(&schema(), &mut NoResolver, &LoadOptions::default()).unwrap()
}

pub fn association(doc: &Document, name: &str) -> Arc<Association> {
    Arc::clone(doc.association(name).unwrap())
}

/// Append a `Body` with the given title to the document body.
pub fn add_body(doc: &mut Document, title: &str) -> NodeId {
    let body = association(doc, "Body");
    let title_assoc = association(doc, "Title");
    let root = doc.body_id();
    let tree = doc.tree_mut();
    let node = tree.children_mut(root).unwrap().append_container(body).unwrap();
    tree.attributes_mut(node).unwrap().set(title_assoc, title).unwrap();
    node
}

/// Append a `Section` holding a `Count` child to `parent`.
pub fn add_section(doc: &mut Document, parent: NodeId, count: u64) -> NodeId {
    let section = association(doc, "Section");
    let count_assoc = association(doc, "Count");
    let tree = doc.tree_mut();
    let node = tree.children_mut(parent).unwrap().append_container(section).unwrap();
    tree.children_mut(node).unwrap().append_element(count_assoc, count).unwrap();
    node
}

pub fn sample_document() -> Document {
    let mut doc = empty_document();
    let first = add_body(&mut doc, "First");
    doc.tree_mut()
        .children_mut(first)
        .unwrap()
        .append_comment("sections follow")
        .unwrap();
    add_section(&mut doc, first, 1);
    add_section(&mut doc, first, 2);
    add_body(&mut doc, "Second");
    doc
}

/// The sample document encoded with `policy`.
pub fn sample_bytes(policy: ContentSizePolicy) -> Vec<u8> {
    sample_document()
        .to_bytes(&WriteOptions::new().with_content_size(policy))
        .unwrap()
}
