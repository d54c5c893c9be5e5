//! Zarr v2 metadata records derived from datasets and variables

use crate::attrs::canonicalize_attrs;
use crate::codec::CodecConfig;
use crate::dataset::{Dataset, Variable, VariableEncoding};
use crate::error::{PublishError, Result};
use crate::layout::ChunkLayout;
use crate::types::DType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Zarr storage format version written to every record
pub const ZARR_FORMAT: u32 = 2;

/// Attribute listing a variable's dimension names
pub const DIMENSION_KEY: &str = "_ARRAY_DIMENSIONS";

/// Memory layout of chunk data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArrayOrder {
    /// Row-major
    #[default]
    C,
    /// Column-major
    F,
}

/// Contents of a `.zarray` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    pub chunks: Vec<usize>,
    pub compressor: Option<CodecConfig>,
    pub dtype: DType,
    /// Always null: no fill value is declared
    pub fill_value: Option<Value>,
    pub filters: Option<Vec<CodecConfig>>,
    pub order: ArrayOrder,
    pub shape: Vec<usize>,
    pub zarr_format: u32,
}

impl ArrayMetadata {
    /// Shape and chunking as a validated layout
    pub fn layout(&self) -> Result<ChunkLayout> {
        ChunkLayout::new(self.shape.clone(), self.chunks.clone())
    }
}

/// Contents of a `.zgroup` record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub zarr_format: u32,
}

impl Default for GroupMetadata {
    fn default() -> Self {
        Self {
            zarr_format: ZARR_FORMAT,
        }
    }
}

/// Chunking used when neither an encoding nor the source declares one:
/// one chunk spanning each dimension. Empty dimensions get chunk size 1.
pub fn default_chunks(shape: &[usize]) -> Vec<usize> {
    shape.iter().map(|&len| len.max(1)).collect()
}

/// Build the `.zattrs` record of a variable: its canonicalized attributes plus
/// the dimension names under [`DIMENSION_KEY`].
pub fn extract_zattrs(variable: &Variable) -> Result<Map<String, Value>> {
    let source = variable.source();
    let mut zattrs = canonicalize_attrs(source.attrs())?;
    let dims = source.dims().into_iter().map(Value::String).collect();
    zattrs.insert(DIMENSION_KEY.to_string(), Value::Array(dims));
    Ok(zattrs)
}

/// Build the `.zarray` record of a variable.
///
/// Each encoding field is taken from `overrides` first, then from the
/// variable's own encoding. An explicit `null` compressor in either one
/// stops the lookup and publishes the variable uncompressed. Chunks further fall back to the source's native
/// chunking and finally to the full shape.
pub fn extract_zarray(
    variable: &Variable,
    overrides: Option<&VariableEncoding>,
) -> Result<ArrayMetadata> {
    let source = variable.source();
    let own = variable.encoding();
    let shape = source.shape();
    let dims = source.dims();

    if dims.len() != shape.len() {
        return Err(PublishError::InvalidDimensions(format!(
            "{} dimension names for shape {:?}",
            dims.len(),
            shape
        )));
    }

    let chunks = overrides
        .and_then(|o| o.chunks.clone())
        .or_else(|| own.chunks.clone())
        .or_else(|| source.native_chunks())
        .unwrap_or_else(|| default_chunks(&shape));
    let layout = ChunkLayout::new(shape, chunks)?;

    let compressor = overrides
        .and_then(|o| o.compressor.clone())
        .or_else(|| own.compressor.clone())
        .flatten();
    let filters = overrides
        .and_then(|o| o.filters.clone())
        .or_else(|| own.filters.clone())
        .filter(|f| !f.is_empty());

    Ok(ArrayMetadata {
        chunks: layout.chunks().to_vec(),
        compressor,
        dtype: source.dtype(),
        fill_value: None,
        filters,
        order: ArrayOrder::C,
        shape: layout.shape().to_vec(),
        zarr_format: ZARR_FORMAT,
    })
}

/// Build the dataset-level `.zattrs` record
pub fn extract_dataset_attrs(dataset: &Dataset) -> Result<Map<String, Value>> {
    canonicalize_attrs(dataset.attrs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttributeValue;
    use crate::config::EncodingOverrides;
    use crate::source::NdArraySource;
    use ndarray::{ArrayD, IxDyn};
    use serde_json::json;

    fn variable_4x4() -> Variable {
        let source = NdArraySource::new(ArrayD::<f64>::zeros(IxDyn(&[4, 4])), vec!["y", "x"])
            .unwrap()
            .with_attr("units", "m");
        Variable::new(source)
    }

    #[test]
    fn test_zattrs() {
        let zattrs = extract_zattrs(&variable_4x4()).unwrap();
        assert_eq!(
            Value::Object(zattrs),
            json!({"units": "m", "_ARRAY_DIMENSIONS": ["y", "x"]})
        );
    }

    #[test]
    fn test_zattrs_rejects_bytes() {
        let source = NdArraySource::new(ArrayD::<u8>::zeros(IxDyn(&[2])), vec!["x"])
            .unwrap()
            .with_attr("blob", AttributeValue::Bytes(vec![1]));
        assert!(matches!(
            extract_zattrs(&Variable::new(source)),
            Err(PublishError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_zarray_single_chunk_fallback() {
        let meta = extract_zarray(&variable_4x4(), None).unwrap();
        assert_eq!(meta.chunks, vec![4, 4]);
        assert_eq!(meta.chunks, meta.shape);
        assert_eq!(
            serde_json::to_value(&meta).unwrap(),
            json!({
                "chunks": [4, 4],
                "compressor": null,
                "dtype": "<f8",
                "fill_value": null,
                "filters": null,
                "order": "C",
                "shape": [4, 4],
                "zarr_format": 2
            })
        );
    }

    #[test]
    fn test_zarray_chunk_precedence() {
        let source = NdArraySource::new(ArrayD::<f64>::zeros(IxDyn(&[8, 8])), vec!["y", "x"])
            .unwrap()
            .with_native_chunks(vec![4, 4]);
        let native = Variable::new(source);
        assert_eq!(extract_zarray(&native, None).unwrap().chunks, vec![4, 4]);

        let own = native
            .clone()
            .with_encoding(VariableEncoding::default().with_chunks(vec![2, 8]));
        assert_eq!(extract_zarray(&own, None).unwrap().chunks, vec![2, 8]);

        let overrides = VariableEncoding::default().with_chunks(vec![1, 1]);
        assert_eq!(
            extract_zarray(&own, Some(&overrides)).unwrap().chunks,
            vec![1, 1]
        );
    }

    #[test]
    fn test_zarray_codec_precedence() {
        let variable = variable_4x4().with_encoding(
            VariableEncoding::default()
                .with_compressor(CodecConfig::new("zlib"))
                .with_filter(CodecConfig::new("shuffle")),
        );
        let meta = extract_zarray(&variable, None).unwrap();
        assert_eq!(meta.compressor, Some(CodecConfig::new("zlib")));
        assert_eq!(meta.filters.as_ref().map(Vec::len), Some(1));

        let overrides = VariableEncoding::default().with_compressor(CodecConfig::new("zstd"));
        let meta = extract_zarray(&variable, Some(&overrides)).unwrap();
        assert_eq!(meta.compressor, Some(CodecConfig::new("zstd")));
        assert_eq!(meta.filters.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_zarray_null_compressor_override() {
        let variable = variable_4x4()
            .with_encoding(VariableEncoding::default().with_compressor(CodecConfig::new("zlib")));
        let overrides: EncodingOverrides =
            serde_json::from_value(json!({"v": {"compressor": null}})).unwrap();
        let meta = extract_zarray(&variable, overrides.get("v")).unwrap();
        assert!(meta.compressor.is_none());

        // an override without the field still defers
        let meta = extract_zarray(&variable, Some(&VariableEncoding::default())).unwrap();
        assert_eq!(meta.compressor, Some(CodecConfig::new("zlib")));
    }

    #[test]
    fn test_zarray_rejects_bad_chunks() {
        let wrong_rank = VariableEncoding::default().with_chunks(vec![2]);
        assert!(matches!(
            extract_zarray(&variable_4x4(), Some(&wrong_rank)),
            Err(PublishError::InvalidDimensions(_))
        ));

        let zero = VariableEncoding::default().with_chunks(vec![2, 0]);
        assert!(extract_zarray(&variable_4x4(), Some(&zero)).is_err());
    }

    #[test]
    fn test_zarray_empty_dimension() {
        let source = NdArraySource::new(ArrayD::<i32>::zeros(IxDyn(&[0, 3])), vec!["t", "x"]).unwrap();
        let meta = extract_zarray(&Variable::new(source), None).unwrap();
        assert_eq!(meta.shape, vec![0, 3]);
        assert_eq!(meta.chunks, vec![1, 3]);
        assert_eq!(meta.dtype.to_string(), "<i4");
    }

    #[test]
    fn test_group_metadata() {
        assert_eq!(
            serde_json::to_value(GroupMetadata::default()).unwrap(),
            json!({"zarr_format": 2})
        );
    }
}
