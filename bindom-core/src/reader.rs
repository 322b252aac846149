//! Marker-level reader over a byte source.
//!
//! [`MarkerReader`] turns bytes into [`Marker`]s. It never holds an
//! association table of its own: the caller passes the scope in effect for
//! every read, so a container's local table applies exactly to its subtree.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use tracing::trace;

use crate::association::{Association, AssociationKind, AssociationTable};
use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::translation::PrimitiveSetRef;
use crate::tree::ResumeCursor;
use crate::wire::{self, tag};

/// A byte stream that knows its position and may be able to seek.
pub trait ByteSource: Read {
    /// Bytes consumed since the source was wrapped (or absolute offset once
    /// seeked).
    fn position(&self) -> u64;

    fn is_seekable(&self) -> bool;

    /// Total length of the stream, when known.
    fn stream_len(&self) -> Option<u64> {
        None
    }

    /// Reposition to an absolute offset.
    fn seek_to(&mut self, offset: u64) -> io::Result<()>;
}

/// A seekable source.
#[derive(Debug)]
pub struct Seekable<R> {
    inner: R,
    pos: u64,
    len: u64,
}

impl<R: Read + Seek> Seekable<R> {
    /// Wrap `inner` at its current position. The stream length is taken
    /// once, here.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let pos = inner.stream_position()?;
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        Ok(Seekable { inner, pos, len })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for Seekable<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> ByteSource for Seekable<R> {
    fn position(&self) -> u64 {
        self.pos
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn stream_len(&self) -> Option<u64> {
        Some(self.len)
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.pos = self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}

/// A forward-only source (pipe, socket, decompressor).
#[derive(Debug)]
pub struct Sequential<R> {
    inner: R,
    pos: u64,
}

impl<R: Read> Sequential<R> {
    pub fn new(inner: R) -> Self {
        Sequential { inner, pos: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for Sequential<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read> ByteSource for Sequential<R> {
    fn position(&self) -> u64 {
        self.pos
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn seek_to(&mut self, _offset: u64) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "stream is not seekable"))
    }
}

/// Reads structural markers and their typed payloads.
#[derive(Debug)]
pub struct MarkerReader<S> {
    source: S,
    primitive_sets: Vec<PrimitiveSetRef>,
}

impl<S: ByteSource> MarkerReader<S> {
    pub fn new(source: S) -> Self {
        MarkerReader {
            source,
            primitive_sets: Vec::new(),
        }
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.source.position()
    }

    #[inline]
    pub fn is_seekable(&self) -> bool {
        self.source.is_seekable()
    }

    /// Capture the current position for later resumption.
    pub fn capture(&self) -> Result<ResumeCursor> {
        if !self.is_seekable() {
            return Err(Error::usage("a resume cursor needs a seekable stream"));
        }
        Ok(ResumeCursor::new(self.position()))
    }

    /// Reposition to a previously captured cursor.
    pub fn restore(&mut self, cursor: ResumeCursor) -> Result<()> {
        trace!(offset = cursor.offset(), "restore resume cursor");
        self.source.seek_to(cursor.offset())?;
        Ok(())
    }

    /// Advance `n` bytes: a seek when possible, else read and discard.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        if self.is_seekable() {
            let target = self
                .position()
                .checked_add(n)
                .ok_or_else(|| Error::format(format!("skip of {n} bytes overflows")))?;
            if let Some(len) = self.source.stream_len() {
                if target > len {
                    return Err(Error::format(format!(
                        "unexpected end of data: wanted to skip {n} bytes, got {}",
                        len.saturating_sub(self.position())
                    )));
                }
            }
            self.source.seek_to(target)?;
        } else {
            let copied = io::copy(&mut (&mut self.source).take(n), &mut io::sink())?;
            if copied != n {
                return Err(Error::format(format!(
                    "unexpected end of data: wanted to skip {n} bytes, got {copied}"
                )));
            }
        }
        Ok(())
    }

    /// Check magic and format version. Must be the first read.
    pub fn read_preamble(&mut self) -> Result<()> {
        let magic = wire::read_bytes(&mut self.source, wire::MAGIC.len() as u64)?;
        if magic != wire::MAGIC {
            return Err(Error::format(format!("bad magic bytes {magic:02x?}")));
        }
        let version = wire::read_u8(&mut self.source)?;
        if version != wire::FORMAT_VERSION {
            return Err(Error::resolution(format!(
                "unsupported format version {version} (expected {})",
                wire::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Read the next marker, interpreting ids against `scope`.
    pub fn next_marker(&mut self, scope: &AssociationTable) -> Result<Marker> {
        let offset = self.position();
        let Some(byte) = self.read_tag()? else {
            trace!(offset, "end of stream");
            return Ok(Marker::EndOfStream);
        };
        let marker = match byte {
            tag::CONTAINER => {
                let id = wire::read_id(&mut self.source)?;
                let association = match scope.get(id) {
                    Some(a) if a.is_container() => Arc::clone(a),
                    Some(a) => {
                        return Err(Error::format(format!(
                            "id {a} is a {:?}, not a container",
                            a.kind()
                        )))
                    }
                    None => Arc::new(Association::unknown(id)),
                };
                Marker::ContainerStart { association }
            }
            tag::END_CONTAINER => Marker::EndContainer,
            tag::END_ATTRIBUTES => Marker::EndAttributes,
            tag::PRIMITIVE => {
                let id = wire::read_id(&mut self.source)?;
                let association = scope
                    .get(id)
                    .ok_or_else(|| Error::format(format!("unknown primitive id {id}")))?;
                let ty = match (association.kind(), association.primitive_type()) {
                    (AssociationKind::Primitive, Some(ty)) => ty,
                    (kind, _) => {
                        return Err(Error::format(format!(
                            "id {association} is a {kind:?}, not a primitive"
                        )))
                    }
                };
                let value = wire::read_value(&mut self.source, ty)?;
                Marker::Primitive {
                    association: Arc::clone(association),
                    value,
                }
            }
            tag::COMMENT => Marker::Comment(wire::read_string(&mut self.source)?),
            tag::PADDING => {
                let len = wire::read_varint(&mut self.source)?;
                self.skip(len)?;
                Marker::Padding(len)
            }
            other => {
                return Err(Error::format(format!(
                    "unknown marker tag {other:#04x} at offset {offset:#x}"
                )))
            }
        };
        trace!(offset, marker = marker.name(), "read marker");
        Ok(marker)
    }

    /// One tag byte, or `None` on a clean end of input.
    fn read_tag(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.source.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Record external primitive sets a resolved header requires.
    pub fn register_primitive_sets(&mut self, sets: impl IntoIterator<Item = PrimitiveSetRef>) {
        self.primitive_sets.extend(sets);
    }

    pub fn primitive_sets(&self) -> &[PrimitiveSetRef] {
        &self.primitive_sets
    }
}
