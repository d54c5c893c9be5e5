//! Chunk filters and compressors
//!
//! Codecs are described by numcodecs-style configuration objects
//! (`{"id": "zlib", "level": 1}`) and built into a [`CodecPipeline`] once per
//! variable. Encoding runs every filter in declared order, rejects buffers
//! still holding object elements, then applies the compressor if one is set.

use crate::error::{PublishError, Result};
use crate::types::{DType, DataType, ElementKind, Endianness};
use flate2::read::{GzEncoder, ZlibEncoder};
use flate2::Compression as FlateCompression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::io::Read;

/// Codec configuration with an `id` and flattened parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    id: String,
    #[serde(flatten)]
    configuration: Map<String, Value>,
}

impl CodecConfig {
    /// Create a configuration with no parameters
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            configuration: Map::new(),
        }
    }

    /// Add a parameter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// All parameters excluding the `id`
    pub fn configuration(&self) -> &Map<String, Value> {
        &self.configuration
    }

    fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.configuration.clone())).map_err(|e| {
            PublishError::InvalidCodecConfig(format!("{}: {}", self.id, e))
        })
    }
}

/// Bytes of one chunk on their way through the codec pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkBuffer {
    /// Fixed-width elements laid out row-major
    Raw { kind: ElementKind, bytes: Vec<u8> },
    /// Generic object elements that still need an object codec
    Object(Vec<String>),
}

impl ChunkBuffer {
    /// Opaque bytes, e.g. the output of a byte-level filter
    pub fn bytes(bytes: Vec<u8>) -> Self {
        ChunkBuffer::Raw {
            kind: ElementKind::Bytes,
            bytes,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            ChunkBuffer::Raw { kind, .. } => *kind,
            ChunkBuffer::Object(_) => ElementKind::Object,
        }
    }

    /// Take the raw bytes; fails for object buffers
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            ChunkBuffer::Raw { bytes, .. } => Ok(bytes),
            ChunkBuffer::Object(_) => Err(PublishError::UnencodableElementKind(ElementKind::Object)),
        }
    }
}

/// A reversible transform applied to chunk data before compression
pub trait Filter: Send + Sync + fmt::Debug {
    /// Encode a buffer
    fn encode(&self, input: ChunkBuffer) -> Result<ChunkBuffer>;

    /// Configuration describing this filter in array metadata
    fn config(&self) -> CodecConfig;
}

/// Final byte-level codec of the chunk pipeline
pub trait Compressor: Send + Sync + fmt::Debug {
    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Configuration describing this compressor in array metadata
    fn config(&self) -> CodecConfig;
}

#[derive(Debug, Deserialize)]
struct LevelConfiguration {
    #[serde(default = "default_level")]
    level: i32,
}

fn default_level() -> i32 {
    1
}

fn flate_level(id: &str, level: i32) -> Result<u32> {
    u32::try_from(level)
        .ok()
        .filter(|l| *l <= 9)
        .ok_or_else(|| {
            PublishError::InvalidCodecConfig(format!("{}: level must be in 0..=9, got {}", id, level))
        })
}

/// zlib compression
#[derive(Debug, Clone, Copy)]
pub struct ZlibCompressor {
    level: u32,
}

impl ZlibCompressor {
    pub const ID: &'static str = "zlib";

    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

impl Compressor for ZlibCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(data, FlateCompression::new(self.level));
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| PublishError::Compression(e.to_string()))?;
        Ok(compressed)
    }

    fn config(&self) -> CodecConfig {
        CodecConfig::new(Self::ID).with("level", self.level)
    }
}

/// gzip compression
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: u32,
}

impl GzipCompressor {
    pub const ID: &'static str = "gzip";

    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

impl Compressor for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(data, FlateCompression::new(self.level));
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| PublishError::Compression(e.to_string()))?;
        Ok(compressed)
    }

    fn config(&self) -> CodecConfig {
        CodecConfig::new(Self::ID).with("level", self.level)
    }
}

/// Zstandard compression
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub const ID: &'static str = "zstd";

    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.level).map_err(|e| PublishError::Compression(e.to_string()))
    }

    fn config(&self) -> CodecConfig {
        CodecConfig::new(Self::ID).with("level", self.level)
    }
}

/// Byte shuffle: groups the n-th byte of every element together
#[derive(Debug, Clone, Copy)]
pub struct ShuffleFilter {
    elementsize: usize,
}

#[derive(Debug, Deserialize)]
struct ShuffleConfiguration {
    #[serde(default = "default_elementsize")]
    elementsize: usize,
}

fn default_elementsize() -> usize {
    4
}

impl ShuffleFilter {
    pub const ID: &'static str = "shuffle";

    pub fn new(elementsize: usize) -> Result<Self> {
        if elementsize == 0 {
            return Err(PublishError::InvalidCodecConfig(
                "shuffle: elementsize must be positive".to_string(),
            ));
        }
        Ok(Self { elementsize })
    }
}

impl Filter for ShuffleFilter {
    fn encode(&self, input: ChunkBuffer) -> Result<ChunkBuffer> {
        let decoded = input.into_bytes()?;
        if decoded.len() % self.elementsize != 0 {
            return Err(PublishError::InvalidCodecConfig(format!(
                "shuffle: buffer of {} bytes is not a multiple of elementsize {}",
                decoded.len(),
                self.elementsize
            )));
        }

        let count = decoded.len() / self.elementsize;
        let mut encoded = vec![0u8; decoded.len()];
        for i in 0..count {
            let offset = i * self.elementsize;
            for byte_index in 0..self.elementsize {
                encoded[byte_index * count + i] = decoded[offset + byte_index];
            }
        }
        Ok(ChunkBuffer::bytes(encoded))
    }

    fn config(&self) -> CodecConfig {
        CodecConfig::new(Self::ID).with("elementsize", self.elementsize)
    }
}

/// Delta encoding: keeps the first element and stores successive differences
#[derive(Debug, Clone, Copy)]
pub struct DeltaFilter {
    dtype: DType,
}

#[derive(Debug, Deserialize)]
struct DeltaConfiguration {
    dtype: DType,
    astype: Option<DType>,
}

macro_rules! delta_encode {
    ($bytes:expr, $endianness:expr, $ty:ty, $sub:expr) => {{
        const N: usize = std::mem::size_of::<$ty>();
        let big = $endianness == Endianness::Big;
        let sub = $sub;
        let mut out = Vec::with_capacity($bytes.len());
        let mut prev: Option<$ty> = None;
        for chunk in $bytes.chunks_exact(N) {
            let mut raw = [0u8; N];
            raw.copy_from_slice(chunk);
            let value = if big {
                <$ty>::from_be_bytes(raw)
            } else {
                <$ty>::from_le_bytes(raw)
            };
            let encoded: $ty = match prev {
                Some(p) => sub(value, p),
                None => value,
            };
            prev = Some(value);
            if big {
                out.extend_from_slice(&encoded.to_be_bytes());
            } else {
                out.extend_from_slice(&encoded.to_le_bytes());
            }
        }
        out
    }};
}

impl DeltaFilter {
    pub const ID: &'static str = "delta";

    pub fn new(dtype: DType) -> Result<Self> {
        if matches!(dtype.data_type(), DataType::Bool | DataType::Object) {
            return Err(PublishError::InvalidCodecConfig(format!(
                "delta: unsupported dtype {}",
                dtype
            )));
        }
        Ok(Self { dtype })
    }
}

impl Filter for DeltaFilter {
    fn encode(&self, input: ChunkBuffer) -> Result<ChunkBuffer> {
        let bytes = input.into_bytes()?;
        let width = self.dtype.size_in_bytes();
        if bytes.len() % width != 0 {
            return Err(PublishError::InvalidCodecConfig(format!(
                "delta: buffer of {} bytes does not hold whole {} elements",
                bytes.len(),
                self.dtype
            )));
        }

        let e = self.dtype.endianness();
        let encoded = match self.dtype.data_type() {
            DataType::U8 => delta_encode!(bytes, e, u8, |a: u8, b: u8| a.wrapping_sub(b)),
            DataType::U16 => delta_encode!(bytes, e, u16, |a: u16, b: u16| a.wrapping_sub(b)),
            DataType::U32 => delta_encode!(bytes, e, u32, |a: u32, b: u32| a.wrapping_sub(b)),
            DataType::U64 => delta_encode!(bytes, e, u64, |a: u64, b: u64| a.wrapping_sub(b)),
            DataType::I8 => delta_encode!(bytes, e, i8, |a: i8, b: i8| a.wrapping_sub(b)),
            DataType::I16 => delta_encode!(bytes, e, i16, |a: i16, b: i16| a.wrapping_sub(b)),
            DataType::I32 => delta_encode!(bytes, e, i32, |a: i32, b: i32| a.wrapping_sub(b)),
            DataType::I64 => delta_encode!(bytes, e, i64, |a: i64, b: i64| a.wrapping_sub(b)),
            DataType::F32 => delta_encode!(bytes, e, f32, |a: f32, b: f32| a - b),
            DataType::F64 => delta_encode!(bytes, e, f64, |a: f64, b: f64| a - b),
            DataType::Bool | DataType::Object => {
                return Err(PublishError::InvalidCodecConfig(format!(
                    "delta: unsupported dtype {}",
                    self.dtype
                )))
            }
        };
        Ok(ChunkBuffer::Raw {
            kind: self.dtype.kind(),
            bytes: encoded,
        })
    }

    fn config(&self) -> CodecConfig {
        let dtype = self.dtype.to_string();
        CodecConfig::new(Self::ID)
            .with("dtype", dtype.clone())
            .with("astype", dtype)
    }
}

/// Object codec encoding strings as length-prefixed UTF-8
///
/// Layout: little-endian u32 item count, then per item a little-endian u32
/// byte length followed by the bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct VLenUtf8Filter;

impl VLenUtf8Filter {
    pub const ID: &'static str = "vlen-utf8";
}

impl Filter for VLenUtf8Filter {
    fn encode(&self, input: ChunkBuffer) -> Result<ChunkBuffer> {
        let items = match input {
            ChunkBuffer::Object(items) => items,
            ChunkBuffer::Raw { kind, .. } => {
                return Err(PublishError::InvalidCodecConfig(format!(
                    "vlen-utf8: expected object elements, got {}",
                    kind
                )))
            }
        };

        let length_prefix = |len: usize| {
            u32::try_from(len).map_err(|_| {
                PublishError::Compression(format!("vlen-utf8: length {} exceeds u32", len))
            })
        };

        let total: usize = items.iter().map(|s| 4 + s.len()).sum();
        let mut out = Vec::with_capacity(4 + total);
        out.extend_from_slice(&length_prefix(items.len())?.to_le_bytes());
        for item in &items {
            out.extend_from_slice(&length_prefix(item.len())?.to_le_bytes());
            out.extend_from_slice(item.as_bytes());
        }
        Ok(ChunkBuffer::bytes(out))
    }

    fn config(&self) -> CodecConfig {
        CodecConfig::new(Self::ID)
    }
}

/// Build a filter from its configuration
pub fn get_filter(config: &CodecConfig) -> Result<Box<dyn Filter>> {
    match config.id() {
        ShuffleFilter::ID => {
            let c: ShuffleConfiguration = config.to_typed()?;
            Ok(Box::new(ShuffleFilter::new(c.elementsize)?))
        }
        DeltaFilter::ID => {
            let c: DeltaConfiguration = config.to_typed()?;
            if let Some(astype) = c.astype {
                if astype != c.dtype {
                    return Err(PublishError::InvalidCodecConfig(format!(
                        "delta: astype {} differs from dtype {}",
                        astype, c.dtype
                    )));
                }
            }
            Ok(Box::new(DeltaFilter::new(c.dtype)?))
        }
        VLenUtf8Filter::ID => Ok(Box::new(VLenUtf8Filter)),
        other => Err(PublishError::UnsupportedCodec(other.to_string())),
    }
}

/// Build a compressor from its configuration
pub fn get_compressor(config: &CodecConfig) -> Result<Box<dyn Compressor>> {
    match config.id() {
        ZlibCompressor::ID => {
            let c: LevelConfiguration = config.to_typed()?;
            Ok(Box::new(ZlibCompressor::new(flate_level(config.id(), c.level)?)))
        }
        GzipCompressor::ID => {
            let c: LevelConfiguration = config.to_typed()?;
            Ok(Box::new(GzipCompressor::new(flate_level(config.id(), c.level)?)))
        }
        ZstdCompressor::ID => {
            let c: LevelConfiguration = config.to_typed()?;
            Ok(Box::new(ZstdCompressor::new(c.level)))
        }
        other => Err(PublishError::UnsupportedCodec(other.to_string())),
    }
}

/// Run filters in order, reject object buffers, then compress.
///
/// Pure: the same input and codecs always produce the same bytes.
pub fn encode_chunk(
    buffer: ChunkBuffer,
    filters: &[Box<dyn Filter>],
    compressor: Option<&dyn Compressor>,
) -> Result<Vec<u8>> {
    let mut buffer = buffer;
    for filter in filters {
        buffer = filter.encode(buffer)?;
    }

    let kind = buffer.kind();
    if kind == ElementKind::Object {
        return Err(PublishError::UnencodableElementKind(kind));
    }
    let bytes = buffer.into_bytes()?;

    match compressor {
        Some(compressor) => compressor.compress(&bytes),
        None => Ok(bytes),
    }
}

/// The filters and compressor of one variable
#[derive(Debug, Default)]
pub struct CodecPipeline {
    filters: Vec<Box<dyn Filter>>,
    compressor: Option<Box<dyn Compressor>>,
}

impl CodecPipeline {
    /// Build a pipeline from metadata configurations
    pub fn from_configs(
        filters: Option<&[CodecConfig]>,
        compressor: Option<&CodecConfig>,
    ) -> Result<Self> {
        let filters = filters
            .unwrap_or_default()
            .iter()
            .map(get_filter)
            .collect::<Result<Vec<_>>>()?;
        let compressor = compressor.map(get_compressor).transpose()?;
        Ok(Self {
            filters,
            compressor,
        })
    }

    pub fn filters(&self) -> &[Box<dyn Filter>] {
        &self.filters
    }

    pub fn compressor(&self) -> Option<&dyn Compressor> {
        self.compressor.as_deref()
    }

    /// Encode one chunk
    pub fn encode(&self, buffer: ChunkBuffer) -> Result<Vec<u8>> {
        encode_chunk(buffer, &self.filters, self.compressor())
    }
}
