//! Wire encoding shared by the marker reader and writer.
//!
//! ```text
//! Preamble:  "BXDM" (4 bytes) + format version (1 byte)
//! Marker:    tag (1 byte) + tag-specific body
//!   0x01 container start   LEB128 id
//!   0x02 end-container
//!   0x03 end-attributes
//!   0x04 primitive         LEB128 id + payload typed by the id's Association
//!   0x05 comment           LEB128 length + UTF-8
//!   0x06 padding           LEB128 length + that many zero bytes
//! ```
//!
//! Payloads: boolean is one byte, signed integers are zig-zag LEB128,
//! unsigned integers LEB128, floats and datetimes little-endian fixed width,
//! strings length-prefixed UTF-8, arrays a LEB128 count followed by
//! little-endian elements, matrices LEB128 rows and cols then the
//! row-major elements.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::value::{DateTime, ElementType, Matrix, NumericArray, PrimitiveType, Value};

/// Stream magic bytes.
pub const MAGIC: &[u8; 4] = b"BXDM";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// Marker tag bytes.
pub mod tag {
    pub const CONTAINER: u8 = 0x01;
    pub const END_CONTAINER: u8 = 0x02;
    pub const END_ATTRIBUTES: u8 = 0x03;
    pub const PRIMITIVE: u8 = 0x04;
    pub const COMMENT: u8 = 0x05;
    pub const PADDING: u8 = 0x06;
}

const MAX_VARINT_BYTES: usize = 10;

pub fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte).map_err(Error::from_read)?;
    Ok(byte[0])
}

pub fn read_varint<R: Read>(reader: &mut R) -> Result<u64> {
    let mut result: u64 = 0;
    for i in 0..MAX_VARINT_BYTES {
        let byte = read_u8(reader)?;
        let bits = (byte & 0x7F) as u64;
        if i == MAX_VARINT_BYTES - 1 && bits > 1 {
            return Err(Error::format("varint overflows 64 bits"));
        }
        result |= bits << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(Error::format("varint longer than 10 bytes"))
}

pub fn read_id<R: Read>(reader: &mut R) -> Result<u32> {
    let raw = read_varint(reader)?;
    u32::try_from(raw).map_err(|_| Error::format(format!("id {raw} exceeds 32 bits")))
}

/// Read exactly `len` bytes without trusting `len` for preallocation.
pub fn read_bytes<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    (&mut *reader).take(len).read_to_end(&mut buf)?;
    if (buf.len() as u64) != len {
        return Err(Error::format(format!(
            "unexpected end of data: wanted {len} bytes, got {}",
            buf.len()
        )));
    }
    Ok(buf)
}

pub fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_varint(reader)?;
    let bytes = read_bytes(reader, len)?;
    String::from_utf8(bytes).map_err(|e| Error::format(format!("invalid UTF-8 in string: {e}")))
}

/// Number of bytes `value` takes as LEB128.
pub fn varint_len(mut value: u64) -> u64 {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

pub fn write_varint<W: Write>(writer: &mut W, mut value: u64) -> Result<()> {
    let mut buf = [0u8; MAX_VARINT_BYTES];
    let mut n = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[n] = byte;
            n += 1;
            break;
        }
        buf[n] = byte | 0x80;
        n += 1;
    }
    writer.write_all(&buf[..n])?;
    Ok(())
}

pub fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    write_varint(writer, s.len() as u64)?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

#[inline]
fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

#[inline]
fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

fn read_fixed<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(Error::from_read)?;
    Ok(buf)
}

macro_rules! decode_elements {
    ($bytes:expr, $ty:ty) => {
        $bytes
            .chunks_exact(std::mem::size_of::<$ty>())
            .map(|chunk| {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(chunk);
                <$ty>::from_le_bytes(raw)
            })
            .collect()
    };
}

fn read_elements<R: Read>(reader: &mut R, element: ElementType, count: u64) -> Result<NumericArray> {
    let len = count
        .checked_mul(element.width() as u64)
        .ok_or_else(|| Error::format("array length overflows"))?;
    let bytes = read_bytes(reader, len)?;
    Ok(match element {
        ElementType::I8 => NumericArray::I8(bytes.iter().map(|b| *b as i8).collect()),
        ElementType::U8 => NumericArray::U8(bytes),
        ElementType::I16 => NumericArray::I16(decode_elements!(bytes, i16)),
        ElementType::U16 => NumericArray::U16(decode_elements!(bytes, u16)),
        ElementType::I32 => NumericArray::I32(decode_elements!(bytes, i32)),
        ElementType::U32 => NumericArray::U32(decode_elements!(bytes, u32)),
        ElementType::I64 => NumericArray::I64(decode_elements!(bytes, i64)),
        ElementType::U64 => NumericArray::U64(decode_elements!(bytes, u64)),
        ElementType::F32 => NumericArray::F32(decode_elements!(bytes, f32)),
        ElementType::F64 => NumericArray::F64(decode_elements!(bytes, f64)),
    })
}

fn write_elements<W: Write>(writer: &mut W, array: &NumericArray) -> Result<()> {
    match array {
        NumericArray::I8(v) => writer.write_all(&v.iter().map(|x| *x as u8).collect::<Vec<_>>())?,
        NumericArray::U8(v) => writer.write_all(v)?,
        NumericArray::I16(v) => v.iter().try_for_each(|x| writer.write_all(&x.to_le_bytes()))?,
        NumericArray::U16(v) => v.iter().try_for_each(|x| writer.write_all(&x.to_le_bytes()))?,
        NumericArray::I32(v) => v.iter().try_for_each(|x| writer.write_all(&x.to_le_bytes()))?,
        NumericArray::U32(v) => v.iter().try_for_each(|x| writer.write_all(&x.to_le_bytes()))?,
        NumericArray::I64(v) => v.iter().try_for_each(|x| writer.write_all(&x.to_le_bytes()))?,
        NumericArray::U64(v) => v.iter().try_for_each(|x| writer.write_all(&x.to_le_bytes()))?,
        NumericArray::F32(v) => v.iter().try_for_each(|x| writer.write_all(&x.to_le_bytes()))?,
        NumericArray::F64(v) => v.iter().try_for_each(|x| writer.write_all(&x.to_le_bytes()))?,
    }
    Ok(())
}

/// Decode a payload of type `ty`.
pub fn read_value<R: Read>(reader: &mut R, ty: PrimitiveType) -> Result<Value> {
    Ok(match ty {
        PrimitiveType::Boolean => match read_u8(reader)? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => return Err(Error::format(format!("invalid boolean byte {other:#04x}"))),
        },
        PrimitiveType::Int => Value::Int(zigzag_decode(read_varint(reader)?)),
        PrimitiveType::UInt => Value::UInt(read_varint(reader)?),
        PrimitiveType::Float => Value::Float(f32::from_le_bytes(read_fixed::<_, 4>(reader)?)),
        PrimitiveType::Double => Value::Double(f64::from_le_bytes(read_fixed::<_, 8>(reader)?)),
        PrimitiveType::DateTime => Value::DateTime(DateTime::from_unix_nanos(i64::from_le_bytes(
            read_fixed::<_, 8>(reader)?,
        ))),
        PrimitiveType::String => Value::String(read_string(reader)?),
        PrimitiveType::Array(element) => {
            let count = read_varint(reader)?;
            Value::Array(read_elements(reader, element, count)?)
        }
        PrimitiveType::Matrix(element) => {
            let rows = read_varint(reader)?;
            let cols = read_varint(reader)?;
            let (rows, cols) = match (u32::try_from(rows), u32::try_from(cols)) {
                (Ok(r), Ok(c)) => (r, c),
                _ => return Err(Error::format("matrix dimensions exceed 32 bits")),
            };
            let data = read_elements(reader, element, rows as u64 * cols as u64)?;
            Value::Matrix(Matrix::new(rows, cols, data)?)
        }
    })
}

/// Encode `value`, which must be of type `ty`.
pub fn write_value<W: Write>(writer: &mut W, ty: PrimitiveType, value: &Value) -> Result<()> {
    if value.primitive_type() != ty {
        return Err(Error::format(format!(
            "value of type {} cannot be written as {ty}",
            value.primitive_type()
        )));
    }
    match value {
        Value::Bool(b) => writer.write_all(&[*b as u8])?,
        Value::Int(i) => write_varint(writer, zigzag_encode(*i))?,
        Value::UInt(u) => write_varint(writer, *u)?,
        Value::Float(x) => writer.write_all(&x.to_le_bytes())?,
        Value::Double(x) => writer.write_all(&x.to_le_bytes())?,
        Value::DateTime(t) => writer.write_all(&t.unix_nanos().to_le_bytes())?,
        Value::String(s) => write_string(writer, s)?,
        Value::Array(a) => {
            write_varint(writer, a.len() as u64)?;
            write_elements(writer, a)?;
        }
        Value::Matrix(m) => {
            write_varint(writer, m.rows() as u64)?;
            write_varint(writer, m.cols() as u64)?;
            write_elements(writer, m.data())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_boundaries() {
        for value in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, value).unwrap();
            assert_eq!(buf.len() as u64, varint_len(value));
            assert_eq!(read_varint(&mut buf.as_slice()).unwrap(), value);
        }
    }

    #[test]
    fn test_varint_overflow_rejected() {
        let bytes = [0xFFu8; 11];
        assert!(read_varint(&mut bytes.as_slice()).is_err());
    }

    #[test]
    fn test_zigzag() {
        for v in [0i64, -1, 1, i64::MIN, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
        assert_eq!(zigzag_encode(-1), 1);
    }

    #[test]
    fn test_value_type_must_match() {
        let mut buf = Vec::new();
        let err = write_value(&mut buf, PrimitiveType::Int, &Value::from("x")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_truncated_string_is_format_error() {
        // Declares 5 bytes, carries 2.
        let bytes = [5u8, b'h', b'i'];
        let err = read_string(&mut bytes.as_slice()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
    }

    #[test]
    fn test_matrix_payload() {
        let m = Matrix::new(2, 1, NumericArray::I16(vec![-2, 7])).unwrap();
        let ty = PrimitiveType::Matrix(ElementType::I16);
        let mut buf = Vec::new();
        write_value(&mut buf, ty, &Value::Matrix(m.clone())).unwrap();
        assert_eq!(buf, vec![2, 1, 0xFE, 0xFF, 7, 0]);
        assert_eq!(read_value(&mut buf.as_slice(), ty).unwrap(), Value::Matrix(m));
    }
}
