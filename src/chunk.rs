//! Chunk serving: chunk key to encoded bytes for one array

use crate::codec::CodecPipeline;
use crate::config::EdgeChunkPolicy;
use crate::dataset::Variable;
use crate::error::{PublishError, Result};
use crate::layout::{resolve, ChunkLayout};
use crate::metadata::ArrayMetadata;
use crate::utils::format_bytes;
use std::fmt;
use tracing::debug;

/// A published array: its variable, cached metadata and codec pipeline
pub struct ArrayEndpoint {
    name: String,
    variable: Variable,
    metadata: ArrayMetadata,
    layout: ChunkLayout,
    pipeline: CodecPipeline,
}

impl ArrayEndpoint {
    /// Validate the metadata and build the codec pipeline
    pub fn new(name: impl Into<String>, variable: Variable, metadata: ArrayMetadata) -> Result<Self> {
        let layout = metadata.layout()?;
        let pipeline =
            CodecPipeline::from_configs(metadata.filters.as_deref(), metadata.compressor.as_ref())?;
        let name = name.into();
        debug!(variable = %name, layout = %layout.summary(), "built array endpoint");
        Ok(Self {
            name,
            variable,
            metadata,
            layout,
            pipeline,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Encoded bytes of the chunk at `key`.
    ///
    /// The chunk's index ranges are not checked against the array's shape: a
    /// chunk past the end yields a short or empty buffer under
    /// [`EdgeChunkPolicy::Truncate`], or a default-filled full chunk under
    /// [`EdgeChunkPolicy::Pad`]. Materializing the slice may block.
    pub fn get_chunk(&self, key: &str, policy: EdgeChunkPolicy) -> Result<Vec<u8>> {
        let ranges = resolve(key, self.layout.chunks())?;
        debug!(variable = %self.name, chunk = key, index = ?ranges, "resolved chunk");

        let data = self.variable.source().slice(&ranges)?.materialize()?;
        debug!(
            variable = %self.name,
            shape = ?data.shape(),
            size = data.len(),
            "materialized chunk"
        );

        if data.data_type() != self.metadata.dtype.data_type() {
            return Err(PublishError::DataSource(format!(
                "{}: source produced {} data for dtype {}",
                self.name,
                data.data_type(),
                self.metadata.dtype
            )));
        }

        let data = match policy {
            EdgeChunkPolicy::Truncate => data,
            EdgeChunkPolicy::Pad => data.pad_to(self.layout.chunks())?,
        };

        let buffer = data.to_chunk_buffer(self.metadata.dtype.endianness());
        let encoded = self.pipeline.encode(buffer)?;
        debug!(variable = %self.name, chunk = key, bytes = %format_bytes(encoded.len()), "encoded chunk");
        Ok(encoded)
    }
}

impl fmt::Debug for ArrayEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayEndpoint")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .finish()
    }
}
