//! Array data sources
//!
//! A data source describes an N-dimensional array (shape, dtype, dimension
//! names, attributes, native chunking) and hands out slices of it. Slicing is
//! two-phase: [`ArraySource::slice`] returns a [`Materialize`] handle and the
//! data is only produced when [`Materialize::materialize`] is called. That
//! call is allowed to block.

use crate::attrs::{AttributeValue, Attributes};
use crate::codec::ChunkBuffer;
use crate::error::{PublishError, Result};
use crate::types::{DType, DataType, Endianness};
use ndarray::{ArrayD, IxDyn, Slice};
use num_traits::ToBytes;
use std::ops::Range;
use std::sync::Arc;

/// Interface to the engine holding a variable's data
pub trait ArraySource: Send + Sync {
    /// Extent of every dimension
    fn shape(&self) -> Vec<usize>;

    /// Element type and byte order of the published bytes
    fn dtype(&self) -> DType;

    /// Dimension names, one per axis
    fn dims(&self) -> Vec<String>;

    /// Attribute mapping of the array
    fn attrs(&self) -> &Attributes;

    /// Chunking of the backing store, if it has one
    fn native_chunks(&self) -> Option<Vec<usize>>;

    /// Select a block of the array by half-open index ranges, one per axis.
    ///
    /// Ranges extending past the array are truncated to the available
    /// elements.
    fn slice(&self, ranges: &[Range<usize>]) -> Result<Box<dyn Materialize>>;
}

/// A selection that can be turned into concrete data
pub trait Materialize: Send {
    /// Compute the selected data, blocking until it is available
    fn materialize(self: Box<Self>) -> Result<ArrayData>;
}

/// Concrete, typed N-dimensional array data
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(ArrayD<bool>),
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    U32(ArrayD<u32>),
    U64(ArrayD<u64>),
    I8(ArrayD<i8>),
    I16(ArrayD<i16>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    Object(ArrayD<String>),
}

macro_rules! with_array {
    ($data:expr, $arr:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($arr) => $body,
            ArrayData::U8($arr) => $body,
            ArrayData::U16($arr) => $body,
            ArrayData::U32($arr) => $body,
            ArrayData::U64($arr) => $body,
            ArrayData::I8($arr) => $body,
            ArrayData::I16($arr) => $body,
            ArrayData::I32($arr) => $body,
            ArrayData::I64($arr) => $body,
            ArrayData::F32($arr) => $body,
            ArrayData::F64($arr) => $body,
            ArrayData::Object($arr) => $body,
        }
    };
}

macro_rules! map_array {
    ($data:expr, $arr:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($arr) => ArrayData::Bool($body),
            ArrayData::U8($arr) => ArrayData::U8($body),
            ArrayData::U16($arr) => ArrayData::U16($body),
            ArrayData::U32($arr) => ArrayData::U32($body),
            ArrayData::U64($arr) => ArrayData::U64($body),
            ArrayData::I8($arr) => ArrayData::I8($body),
            ArrayData::I16($arr) => ArrayData::I16($body),
            ArrayData::I32($arr) => ArrayData::I32($body),
            ArrayData::I64($arr) => ArrayData::I64($body),
            ArrayData::F32($arr) => ArrayData::F32($body),
            ArrayData::F64($arr) => ArrayData::F64($body),
            ArrayData::Object($arr) => ArrayData::Object($body),
        }
    };
}

macro_rules! impl_from_array {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<ArrayD<$ty>> for ArrayData {
                fn from(array: ArrayD<$ty>) -> Self {
                    ArrayData::$variant(array)
                }
            }
        )*
    };
}

impl_from_array!(
    bool => Bool,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    String => Object,
);

impl ArrayData {
    /// Element type of the data
    pub fn data_type(&self) -> DataType {
        match self {
            ArrayData::Bool(_) => DataType::Bool,
            ArrayData::U8(_) => DataType::U8,
            ArrayData::U16(_) => DataType::U16,
            ArrayData::U32(_) => DataType::U32,
            ArrayData::U64(_) => DataType::U64,
            ArrayData::I8(_) => DataType::I8,
            ArrayData::I16(_) => DataType::I16,
            ArrayData::I32(_) => DataType::I32,
            ArrayData::I64(_) => DataType::I64,
            ArrayData::F32(_) => DataType::F32,
            ArrayData::F64(_) => DataType::F64,
            ArrayData::Object(_) => DataType::Object,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the block selected by `ranges`, truncating each range to the
    /// array's extent along that axis.
    pub fn slice(&self, ranges: &[Range<usize>]) -> Result<ArrayData> {
        if ranges.len() != self.ndim() {
            return Err(PublishError::InvalidDimensions(format!(
                "expected {} index ranges, got {}",
                self.ndim(),
                ranges.len()
            )));
        }
        let clamped = clamp_ranges(ranges, self.shape());
        Ok(map_array!(self, a => a
            .slice_each_axis(|ax| Slice::from(clamped[ax.axis.index()].clone()))
            .to_owned()))
    }

    /// Grow the array to `shape`, filling new elements with the type's default
    /// value (zero, `false` or the empty string).
    pub fn pad_to(&self, shape: &[usize]) -> Result<ArrayData> {
        if shape.len() != self.ndim() {
            return Err(PublishError::InvalidDimensions(format!(
                "cannot pad a {}-dimensional array to {} dimensions",
                self.ndim(),
                shape.len()
            )));
        }
        if shape == self.shape() {
            return Ok(self.clone());
        }
        Ok(map_array!(self, a => {
            let mut padded = ArrayD::default(IxDyn(shape));
            let source = a.slice_each_axis(|ax| Slice::from(0..ax.len.min(shape[ax.axis.index()])));
            padded
                .slice_each_axis_mut(|ax| Slice::from(0..source.shape()[ax.axis.index()]))
                .assign(&source);
            padded
        }))
    }

    /// Flatten to a row-major chunk buffer with the given byte order.
    ///
    /// Object arrays stay as individual strings; an object codec must turn
    /// them into bytes later.
    pub fn to_chunk_buffer(&self, endianness: Endianness) -> ChunkBuffer {
        let kind = self.data_type().kind();
        let bytes = match self {
            ArrayData::Bool(a) => a.iter().map(|&b| u8::from(b)).collect(),
            ArrayData::U8(a) => a.iter().copied().collect(),
            ArrayData::U16(a) => elements_to_bytes(a, endianness),
            ArrayData::U32(a) => elements_to_bytes(a, endianness),
            ArrayData::U64(a) => elements_to_bytes(a, endianness),
            ArrayData::I8(a) => elements_to_bytes(a, endianness),
            ArrayData::I16(a) => elements_to_bytes(a, endianness),
            ArrayData::I32(a) => elements_to_bytes(a, endianness),
            ArrayData::I64(a) => elements_to_bytes(a, endianness),
            ArrayData::F32(a) => elements_to_bytes(a, endianness),
            ArrayData::F64(a) => elements_to_bytes(a, endianness),
            ArrayData::Object(a) => return ChunkBuffer::Object(a.iter().cloned().collect()),
        };
        ChunkBuffer::Raw { kind, bytes }
    }
}

impl Materialize for ArrayData {
    fn materialize(self: Box<Self>) -> Result<ArrayData> {
        Ok(*self)
    }
}

fn clamp_ranges(ranges: &[Range<usize>], shape: &[usize]) -> Vec<Range<usize>> {
    ranges
        .iter()
        .zip(shape)
        .map(|(r, &len)| {
            let start = r.start.min(len);
            let end = r.end.clamp(start, len);
            start..end
        })
        .collect()
}

fn elements_to_bytes<T>(array: &ArrayD<T>, endianness: Endianness) -> Vec<u8>
where
    T: ToBytes,
{
    let mut bytes = Vec::with_capacity(array.len() * std::mem::size_of::<T>());
    for value in array.iter() {
        match endianness {
            Endianness::Little => bytes.extend_from_slice(value.to_le_bytes().as_ref()),
            Endianness::Big => bytes.extend_from_slice(value.to_be_bytes().as_ref()),
            Endianness::NotApplicable => bytes.extend_from_slice(value.to_ne_bytes().as_ref()),
        }
    }
    bytes
}

/// In-memory data source backed by an [`ArrayData`]
#[derive(Debug, Clone)]
pub struct NdArraySource {
    data: Arc<ArrayData>,
    dtype: DType,
    dims: Vec<String>,
    attrs: Attributes,
    native_chunks: Option<Vec<usize>>,
}

impl NdArraySource {
    /// Create a source with little-endian dtype and no attributes
    pub fn new<S: Into<String>>(data: impl Into<ArrayData>, dims: Vec<S>) -> Result<Self> {
        let data = data.into();
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(PublishError::InvalidDimensions(format!(
                "{} dimension names given for a {}-dimensional array",
                dims.len(),
                data.ndim()
            )));
        }
        Ok(Self {
            dtype: DType::little(data.data_type()),
            data: Arc::new(data),
            dims,
            attrs: Attributes::new(),
            native_chunks: None,
        })
    }

    /// Set the byte order of the published bytes
    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.dtype = DType::new(self.dtype.data_type(), endianness);
        self
    }

    /// Add an attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Replace all attributes
    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    /// Declare the chunking of the backing store
    pub fn with_native_chunks(mut self, chunks: Vec<usize>) -> Self {
        self.native_chunks = Some(chunks);
        self
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }
}

impl ArraySource for NdArraySource {
    fn shape(&self) -> Vec<usize> {
        self.data.shape().to_vec()
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn dims(&self) -> Vec<String> {
        self.dims.clone()
    }

    fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    fn native_chunks(&self) -> Option<Vec<usize>> {
        self.native_chunks.clone()
    }

    fn slice(&self, ranges: &[Range<usize>]) -> Result<Box<dyn Materialize>> {
        if ranges.len() != self.data.ndim() {
            return Err(PublishError::InvalidDimensions(format!(
                "expected {} index ranges, got {}",
                self.data.ndim(),
                ranges.len()
            )));
        }
        Ok(Box::new(DeferredSlice {
            data: Arc::clone(&self.data),
            ranges: ranges.to_vec(),
        }))
    }
}

/// A selection over shared data that is copied out on materialization
#[derive(Debug)]
pub struct DeferredSlice {
    data: Arc<ArrayData>,
    ranges: Vec<Range<usize>>,
}

impl Materialize for DeferredSlice {
    fn materialize(self: Box<Self>) -> Result<ArrayData> {
        self.data.slice(&self.ranges)
    }
}
