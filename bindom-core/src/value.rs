//! Primitive value types.
//!
//! Unlike a text format, the wire carries no type tags on values: the
//! Association of a primitive decides how its payload is read. These types
//! are what that payload decodes to.

use std::fmt;

use crate::error::{Error, Result};

/// Element type of fixed-width numeric arrays and matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ElementType {
    /// Encoded width of one element in bytes.
    #[inline]
    pub fn width(self) -> usize {
        match self {
            ElementType::I8 | ElementType::U8 => 1,
            ElementType::I16 | ElementType::U16 => 2,
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::U64 | ElementType::F64 => 8,
        }
    }

    /// Canonical type-string name.
    pub fn name(self) -> &'static str {
        match self {
            ElementType::I8 => "int8",
            ElementType::U8 => "uint8",
            ElementType::I16 => "int16",
            ElementType::U16 => "uint16",
            ElementType::I32 => "int32",
            ElementType::U32 => "uint32",
            ElementType::I64 => "int64",
            ElementType::U64 => "uint64",
            ElementType::F32 => "float32",
            ElementType::F64 => "float64",
        }
    }
}

/// The type an Association assigns to its primitive values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Int,
    UInt,
    Float,
    Double,
    DateTime,
    String,
    Array(ElementType),
    Matrix(ElementType),
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveType::Boolean => f.write_str("boolean"),
            PrimitiveType::Int => f.write_str("int"),
            PrimitiveType::UInt => f.write_str("uint"),
            PrimitiveType::Float => f.write_str("float"),
            PrimitiveType::Double => f.write_str("double"),
            PrimitiveType::DateTime => f.write_str("datetime"),
            PrimitiveType::String => f.write_str("string"),
            PrimitiveType::Array(e) => write!(f, "{}[]", e.name()),
            PrimitiveType::Matrix(e) => write!(f, "{}[,]", e.name()),
        }
    }
}

/// Nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(i64);

impl DateTime {
    pub const fn from_unix_nanos(nanos: i64) -> Self {
        DateTime(nanos)
    }

    pub const fn unix_nanos(self) -> i64 {
        self.0
    }
}

/// Homogeneous fixed-width numeric array.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl NumericArray {
    pub fn element_type(&self) -> ElementType {
        match self {
            NumericArray::I8(_) => ElementType::I8,
            NumericArray::U8(_) => ElementType::U8,
            NumericArray::I16(_) => ElementType::I16,
            NumericArray::U16(_) => ElementType::U16,
            NumericArray::I32(_) => ElementType::I32,
            NumericArray::U32(_) => ElementType::U32,
            NumericArray::I64(_) => ElementType::I64,
            NumericArray::U64(_) => ElementType::U64,
            NumericArray::F32(_) => ElementType::F32,
            NumericArray::F64(_) => ElementType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            NumericArray::I8(v) => v.len(),
            NumericArray::U8(v) => v.len(),
            NumericArray::I16(v) => v.len(),
            NumericArray::U16(v) => v.len(),
            NumericArray::I32(v) => v.len(),
            NumericArray::U32(v) => v.len(),
            NumericArray::I64(v) => v.len(),
            NumericArray::U64(v) => v.len(),
            NumericArray::F32(v) => v.len(),
            NumericArray::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Row-major 2-D matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: u32,
    cols: u32,
    data: NumericArray,
}

impl Matrix {
    /// Build a matrix; `data` must hold exactly `rows * cols` elements.
    pub fn new(rows: u32, cols: u32, data: NumericArray) -> Result<Self> {
        let expected = (rows as u64) * (cols as u64);
        if data.len() as u64 != expected {
            return Err(Error::format(format!(
                "matrix {rows}x{cols} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Matrix { rows, cols, data })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn data(&self) -> &NumericArray {
        &self.data
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }
}

/// A decoded primitive value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    DateTime(DateTime),
    String(String),
    Array(NumericArray),
    Matrix(Matrix),
}

impl Value {
    /// The primitive type this value encodes as.
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            Value::Bool(_) => PrimitiveType::Boolean,
            Value::Int(_) => PrimitiveType::Int,
            Value::UInt(_) => PrimitiveType::UInt,
            Value::Float(_) => PrimitiveType::Float,
            Value::Double(_) => PrimitiveType::Double,
            Value::DateTime(_) => PrimitiveType::DateTime,
            Value::String(_) => PrimitiveType::String,
            Value::Array(a) => PrimitiveType::Array(a.element_type()),
            Value::Matrix(m) => PrimitiveType::Matrix(m.element_type()),
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(u) => Some(*u),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    #[inline]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(x) => Some(*x),
            _ => None,
        }
    }

    #[inline]
    pub fn as_datetime(&self) -> Option<DateTime> {
        match self {
            Value::DateTime(t) => Some(*t),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&NumericArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&Matrix> {
        match self {
            Value::Matrix(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<DateTime> for Value {
    fn from(v: DateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<NumericArray> for Value {
    fn from(v: NumericArray) -> Self {
        Value::Array(v)
    }
}

impl From<Matrix> for Value {
    fn from(v: Matrix) -> Self {
        Value::Matrix(v)
    }
}

/// Strict extraction of a Rust type from a [`Value`]; no coercion.
pub trait FromValue: Sized {
    /// Name used in type-mismatch errors.
    const TYPE_NAME: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    const TYPE_NAME: &'static str = "int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for u64 {
    const TYPE_NAME: &'static str = "uint";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_uint()
    }
}

impl FromValue for f32 {
    const TYPE_NAME: &'static str = "float";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }
}

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "double";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_double()
    }
}

impl FromValue for DateTime {
    const TYPE_NAME: &'static str = "datetime";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_datetime()
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for NumericArray {
    const TYPE_NAME: &'static str = "array";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_array().cloned()
    }
}

impl FromValue for Matrix {
    const TYPE_NAME: &'static str = "matrix";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_matrix().cloned()
    }
}
