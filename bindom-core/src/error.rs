//! Error types for loading, resolving and writing BinDOM trees.

use std::fmt;

/// One enclosing container on the path from a failure to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub id: u32,
    pub name: Option<String>,
    /// Stream offset of the container's start marker, when known.
    pub offset: Option<u64>,
}

impl fmt::Display for Crumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}#{}", self.id)?,
            None => write!(f, "#{}", self.id)?,
        }
        if let Some(offset) = self.offset {
            write!(f, "@{offset:#x}")?;
        }
        Ok(())
    }
}

/// Chain of containers enclosing a format failure, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breadcrumb(Vec<Crumb>);

impl Breadcrumb {
    /// Crumbs ordered from the failure point outwards to the root.
    pub fn crumbs(&self) -> &[Crumb] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn push(&mut self, crumb: Crumb) {
        self.0.push(crumb);
    }
}

impl fmt::Display for Breadcrumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        f.write_str(" (in ")?;
        for (i, crumb) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" < ")?;
            }
            write!(f, "{crumb}")?;
        }
        f.write_str(")")
    }
}

/// Error type for BinDOM operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed marker sequence, type mismatch, unknown directive or type string.
    #[error("format error: {message}{trail}")]
    Format { message: String, trail: Breadcrumb },

    /// The caller asked for something the node or stream cannot provide yet.
    #[error("usage error: {0}")]
    Usage(String),

    /// A translation could not be resolved.
    #[error("resolution error: {0}")]
    Resolution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Usage,
    Resolution,
    Io,
}

impl Error {
    pub fn format(message: impl Into<String>) -> Self {
        Error::Format {
            message: message.into(),
            trail: Breadcrumb::default(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage(message.into())
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Error::Resolution(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Format { .. } => ErrorKind::Format,
            Error::Usage(_) => ErrorKind::Usage,
            Error::Resolution(_) => ErrorKind::Resolution,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Record that this error surfaced inside `crumb`. Only format errors
    /// carry a trail; other kinds pass through untouched.
    pub fn within(mut self, crumb: Crumb) -> Self {
        if let Error::Format { trail, .. } = &mut self {
            trail.push(crumb);
        }
        self
    }

    /// The container trail of a format error.
    pub fn trail(&self) -> Option<&Breadcrumb> {
        match self {
            Error::Format { trail, .. } => Some(trail),
            _ => None,
        }
    }

    /// Map a truncated read onto a format error; other I/O errors pass through.
    pub(crate) fn from_read(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::format("unexpected end of data")
        } else {
            Error::Io(err)
        }
    }
}

/// Result type alias for BinDOM operations.
pub type Result<T> = std::result::Result<T, Error>;
