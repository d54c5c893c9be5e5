//! zarrpublish - serve N-dimensional datasets as a read-only Zarr v2 store
//!
//! A [`Dataset`] of named variables is registered once. Registration derives
//! every `.zarray`/`.zattrs` record plus the consolidated `.zmetadata`
//! document, and builds each variable's codec pipeline. Afterwards clients
//! fetch individual chunks by their dot-delimited key, e.g. `temperature/0.1`,
//! and receive the filtered and compressed chunk bytes.
//!
//! # Features
//!
//! - Zarr v2 metadata with consolidated metadata
//! - Compressors: zlib, gzip, zstd
//! - Filters: shuffle, delta, and the `vlen-utf8` object codec
//! - Pluggable data sources with explicit, blocking materialization
//! - HTTP routes built on axum
//!
//! # Example
//!
//! ```rust,ignore
//! use zarrpublish::{Dataset, DatasetAccess, EncodingOverrides, NdArraySource, Variable};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = NdArraySource::new(ndarray::ArrayD::<f64>::zeros(ndarray::IxDyn(&[4, 4])), vec!["y", "x"])?
//!     .with_attr("units", "m");
//! let dataset = Dataset::new().with_variable("depth", Variable::new(source));
//! let access = DatasetAccess::register(dataset, &EncodingOverrides::new())?;
//!
//! let chunk = access.get_chunk("depth", "0.0")?;
//! assert_eq!(chunk.len(), 4 * 4 * 8);
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod app;
pub mod attrs;
pub mod chunk;
pub mod codec;
pub mod config;
pub mod consolidated;
pub mod dataset;
pub mod error;
pub mod layout;
pub mod logging;
pub mod metadata;
pub mod source;
pub mod types;
pub mod utils;

// Re-exports
pub use access::DatasetAccess;
pub use app::{router, serve};
pub use attrs::{AttributeValue, Attributes};
pub use codec::{CodecConfig, CodecPipeline, Compressor, Filter};
pub use config::{EdgeChunkPolicy, EncodingOverrides, ServeConfig};
pub use consolidated::ConsolidatedMetadata;
pub use dataset::{Dataset, Variable, VariableEncoding};
pub use error::{PublishError, Result};
pub use layout::{resolve, ChunkCoord, ChunkLayout};
pub use metadata::{ArrayMetadata, GroupMetadata};
pub use source::{ArrayData, ArraySource, Materialize, NdArraySource};
pub use types::{DType, DataType, ElementKind, Endianness};

/// Version of this crate
pub const ZARRPUBLISH_VERSION: &str = env!("CARGO_PKG_VERSION");
