//! Core data types: element types, byte order and numpy-style dtype descriptors

use crate::error::{PublishError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Element types that can be published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean stored as one byte
    Bool,
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Unsigned 64-bit integer
    U64,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// 32-bit floating point
    F32,
    /// 64-bit floating point
    F64,
    /// Generic object elements (variable-length strings)
    Object,
}

impl DataType {
    /// Size in bytes of this data type (numpy itemsize for objects)
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::Bool | DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 | DataType::Object => 8,
        }
    }

    /// Element kind of this data type
    pub fn kind(&self) -> ElementKind {
        match self {
            DataType::Bool => ElementKind::Bool,
            DataType::U8 | DataType::U16 | DataType::U32 | DataType::U64 => ElementKind::UInt,
            DataType::I8 | DataType::I16 | DataType::I32 | DataType::I64 => ElementKind::Int,
            DataType::F32 | DataType::F64 => ElementKind::Float,
            DataType::Object => ElementKind::Object,
        }
    }

    /// Whether the byte order of this type matters
    pub fn has_byte_order(&self) -> bool {
        !matches!(
            self,
            DataType::Bool | DataType::U8 | DataType::I8 | DataType::Object
        )
    }

    fn from_kind_and_size(kind: char, size: usize) -> Option<Self> {
        match (kind, size) {
            ('b', 1) => Some(DataType::Bool),
            ('u', 1) => Some(DataType::U8),
            ('u', 2) => Some(DataType::U16),
            ('u', 4) => Some(DataType::U32),
            ('u', 8) => Some(DataType::U64),
            ('i', 1) => Some(DataType::I8),
            ('i', 2) => Some(DataType::I16),
            ('i', 4) => Some(DataType::I32),
            ('i', 8) => Some(DataType::I64),
            ('f', 4) => Some(DataType::F32),
            ('f', 8) => Some(DataType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Kind of the elements held by a buffer, mirroring numpy's `dtype.kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Bool,
    Int,
    UInt,
    Float,
    /// Opaque bytes produced by a byte-level filter
    Bytes,
    /// Generic objects; only encodable through an object codec
    Object,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Bool => "bool",
            ElementKind::Int => "signed integer",
            ElementKind::UInt => "unsigned integer",
            ElementKind::Float => "float",
            ElementKind::Bytes => "byte",
            ElementKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// Byte order of multi-byte elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Little,
    Big,
    /// Single-byte and object types
    NotApplicable,
}

impl Endianness {
    /// Byte order of the host
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    fn symbol(&self) -> char {
        match self {
            Endianness::Little => '<',
            Endianness::Big => '>',
            Endianness::NotApplicable => '|',
        }
    }
}

/// A numpy-style dtype descriptor such as `<f8`, `>i4`, `|b1` or `|O`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DType {
    data_type: DataType,
    endianness: Endianness,
}

impl DType {
    /// Create a descriptor. Byte order is dropped for types where it has no meaning.
    pub fn new(data_type: DataType, endianness: Endianness) -> Self {
        let endianness = match (data_type.has_byte_order(), endianness) {
            (false, _) => Endianness::NotApplicable,
            (true, Endianness::NotApplicable) => Endianness::native(),
            (true, e) => e,
        };
        Self {
            data_type,
            endianness,
        }
    }

    /// Descriptor with little-endian byte order
    pub fn little(data_type: DataType) -> Self {
        Self::new(data_type, Endianness::Little)
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn kind(&self) -> ElementKind {
        self.data_type.kind()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.data_type.size_in_bytes()
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.data_type.kind() {
            ElementKind::Bool => 'b',
            ElementKind::Int => 'i',
            ElementKind::UInt => 'u',
            ElementKind::Float => 'f',
            ElementKind::Object | ElementKind::Bytes => 'O',
        };
        if self.data_type == DataType::Object {
            write!(f, "{}{}", self.endianness.symbol(), kind)
        } else {
            write!(
                f,
                "{}{}{}",
                self.endianness.symbol(),
                kind,
                self.data_type.size_in_bytes()
            )
        }
    }
}

impl FromStr for DType {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PublishError::InvalidDataType(s.to_string());
        let mut chars = s.chars();
        let endianness = match chars.next() {
            Some('<') => Endianness::Little,
            Some('>') => Endianness::Big,
            Some('|') => Endianness::NotApplicable,
            Some('=') => Endianness::native(),
            _ => return Err(invalid()),
        };
        let kind = chars.next().ok_or_else(invalid)?;
        let rest = chars.as_str();

        if kind == 'O' {
            return if rest.is_empty() || rest == "8" {
                Ok(Self::new(DataType::Object, Endianness::NotApplicable))
            } else {
                Err(invalid())
            };
        }

        let size: usize = rest.parse().map_err(|_| invalid())?;
        let data_type = DataType::from_kind_and_size(kind, size).ok_or_else(invalid)?;
        Ok(Self::new(data_type, endianness))
    }
}

impl Serialize for DType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
