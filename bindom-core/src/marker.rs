//! Structural markers - the unit the reader hands to the materializer.
//!
//! Structure is represented by start/end pairs, like a SAX event stream:
//!
//! ```text
//! ContainerStart { Body }
//! Primitive { Title, "Hello" }     // attribute
//! EndAttributes
//! Comment("note")                  // child
//! ContainerStart { Section }       // child container
//! EndContainer
//! EndContainer
//! ```
//!
//! A container with neither attributes nor children is just
//! `ContainerStart, EndContainer`.

use std::sync::Arc;

use crate::association::Association;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// Opens a container. Attributes follow until `EndAttributes`.
    ContainerStart { association: Arc<Association> },

    /// Closes the innermost open container.
    EndContainer,

    /// Separates a container's attributes from its children.
    EndAttributes,

    /// A typed value; an attribute or a child element depending on position.
    Primitive {
        association: Arc<Association>,
        value: Value,
    },

    Comment(String),

    /// Placeholder bytes of the given length.
    Padding(u64),

    /// Clean end of input at a marker boundary.
    EndOfStream,
}

impl Marker {
    /// Short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Marker::ContainerStart { .. } => "container start",
            Marker::EndContainer => "end-container",
            Marker::EndAttributes => "end-attributes",
            Marker::Primitive { .. } => "primitive",
            Marker::Comment(_) => "comment",
            Marker::Padding(_) => "padding",
            Marker::EndOfStream => "end of stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PrimitiveType;

    #[test]
    fn test_names() {
        let title = Arc::new(Association::primitive(10, "Title", PrimitiveType::String));
        let marker = Marker::Primitive {
            association: title,
            value: Value::from("Hello"),
        };
        assert_eq!(marker.name(), "primitive");
        assert_eq!(Marker::EndAttributes.name(), "end-attributes");
        assert_eq!(Marker::Padding(3).name(), "padding");
    }
}
