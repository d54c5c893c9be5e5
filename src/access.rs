//! Dataset access - main API for publishing a dataset as a Zarr store

use crate::chunk::ArrayEndpoint;
use crate::config::{EdgeChunkPolicy, EncodingOverrides};
use crate::consolidated::{extract_variables, ConsolidatedMetadata};
use crate::dataset::Dataset;
use crate::error::{PublishError, Result};
use crate::metadata::{extract_dataset_attrs, ArrayMetadata, GroupMetadata};
use crate::utils::json_dumps;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::info;

/// Cached records of one published variable
#[derive(Debug)]
struct PublishedArray {
    endpoint: ArrayEndpoint,
    zattrs: Map<String, Value>,
    zarray_json: Bytes,
    zattrs_json: Bytes,
}

/// A registered dataset.
///
/// All metadata is extracted and serialized once by [`DatasetAccess::register`]
/// and served unchanged afterwards. The handle is immutable, so it can be
/// shared between concurrent requests without locking.
#[derive(Debug)]
pub struct DatasetAccess {
    attrs: Map<String, Value>,
    document: ConsolidatedMetadata,
    document_json: Bytes,
    group_json: Bytes,
    attrs_json: Bytes,
    arrays: BTreeMap<String, PublishedArray>,
    edge_chunks: EdgeChunkPolicy,
}

impl DatasetAccess {
    /// Register a dataset, applying per-variable encoding overrides.
    ///
    /// Fails if any variable's metadata cannot be extracted or any codec
    /// cannot be built; nothing is published in that case.
    pub fn register(dataset: Dataset, overrides: &EncodingOverrides) -> Result<Self> {
        let variables = extract_variables(&dataset, overrides)?;
        let attrs = extract_dataset_attrs(&dataset)?;
        let document = ConsolidatedMetadata::from_parts(attrs.clone(), &variables)?;

        let mut arrays = BTreeMap::new();
        for (name, records) in variables {
            let variable = dataset
                .variable(&name)
                .cloned()
                .ok_or_else(|| PublishError::UnknownVariable(name.clone()))?;
            let endpoint = ArrayEndpoint::new(name.clone(), variable, records.zarray)?;
            let published = PublishedArray {
                zarray_json: Bytes::from(json_dumps(endpoint.metadata())?),
                zattrs_json: Bytes::from(json_dumps(&records.zattrs)?),
                zattrs: records.zattrs,
                endpoint,
            };
            arrays.insert(name, published);
        }

        let access = Self {
            document_json: Bytes::from(document.to_json_bytes()?),
            group_json: Bytes::from(json_dumps(&GroupMetadata::default())?),
            attrs_json: Bytes::from(json_dumps(&attrs)?),
            attrs,
            document,
            arrays,
            edge_chunks: EdgeChunkPolicy::default(),
        };
        info!(
            variables = access.arrays.len(),
            metadata_bytes = access.document_json.len(),
            "registered dataset"
        );
        Ok(access)
    }

    /// Set how chunks past the end of an array are returned
    pub fn with_edge_chunk_policy(mut self, policy: EdgeChunkPolicy) -> Self {
        self.edge_chunks = policy;
        self
    }

    pub fn edge_chunk_policy(&self) -> EdgeChunkPolicy {
        self.edge_chunks
    }

    /// The `.zgroup` record
    pub fn get_group_record(&self) -> GroupMetadata {
        GroupMetadata::default()
    }

    /// The `.zgroup` record as JSON
    pub fn group_json(&self) -> Bytes {
        self.group_json.clone()
    }

    /// The dataset-level `.zattrs` record
    pub fn get_attrs_record(&self) -> &Map<String, Value> {
        &self.attrs
    }

    /// The dataset-level `.zattrs` record as JSON
    pub fn attrs_json(&self) -> Bytes {
        self.attrs_json.clone()
    }

    /// The consolidated `.zmetadata` document
    pub fn get_metadata_document(&self) -> &ConsolidatedMetadata {
        &self.document
    }

    /// The consolidated document as JSON, identical on every call
    pub fn metadata_document_json(&self) -> Bytes {
        self.document_json.clone()
    }

    /// Names of all published variables, sorted
    pub fn list_variable_names(&self) -> Vec<String> {
        self.arrays.keys().cloned().collect()
    }

    fn array(&self, name: &str) -> Result<&PublishedArray> {
        self.arrays
            .get(name)
            .ok_or_else(|| PublishError::UnknownVariable(name.to_string()))
    }

    /// The `.zarray` record of a variable
    pub fn variable_metadata(&self, name: &str) -> Result<&ArrayMetadata> {
        Ok(self.array(name)?.endpoint.metadata())
    }

    /// The `.zarray` record of a variable as JSON
    pub fn variable_metadata_json(&self, name: &str) -> Result<Bytes> {
        Ok(self.array(name)?.zarray_json.clone())
    }

    /// The `.zattrs` record of a variable
    pub fn variable_attrs(&self, name: &str) -> Result<&Map<String, Value>> {
        Ok(&self.array(name)?.zattrs)
    }

    /// The `.zattrs` record of a variable as JSON
    pub fn variable_attrs_json(&self, name: &str) -> Result<Bytes> {
        Ok(self.array(name)?.zattrs_json.clone())
    }

    /// Number of chunks along each dimension of a variable
    pub fn chunk_grid(&self, name: &str) -> Result<Vec<usize>> {
        Ok(self.array(name)?.endpoint.layout().chunk_grid_shape())
    }

    /// Encoded bytes of one chunk of a variable. May block while the data
    /// source materializes the chunk.
    pub fn get_chunk(&self, name: &str, key: &str) -> Result<Vec<u8>> {
        self.array(name)?.endpoint.get_chunk(key, self.edge_chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttributeValue;
    use crate::codec::CodecConfig;
    use crate::dataset::{Variable, VariableEncoding};
    use crate::source::NdArraySource;
    use ndarray::{Array, ArrayD, IxDyn};
    use serde_json::json;

    fn dataset() -> Dataset {
        let data: ArrayD<f64> =
            Array::from_shape_vec(IxDyn(&[4, 4]), (0..16).map(f64::from).collect()).unwrap();
        let source = NdArraySource::new(data, vec!["y", "x"])
            .unwrap()
            .with_attr("units", "m");
        Dataset::new().with_attr("title", "grid").with_variable(
            "grid",
            Variable::new(source).with_encoding(VariableEncoding::default().with_chunks(vec![2, 2])),
        )
    }

    #[test]
    fn test_register_and_read_records() {
        let access = DatasetAccess::register(dataset(), &EncodingOverrides::new()).unwrap();
        assert_eq!(access.list_variable_names(), vec!["grid".to_string()]);
        assert_eq!(access.get_group_record().zarr_format, 2);
        assert_eq!(access.get_attrs_record().get("title"), Some(&json!("grid")));
        assert_eq!(access.variable_metadata("grid").unwrap().chunks, vec![2, 2]);
        assert_eq!(
            access.variable_attrs("grid").unwrap().get("_ARRAY_DIMENSIONS"),
            Some(&json!(["y", "x"]))
        );
        assert_eq!(access.chunk_grid("grid").unwrap(), vec![2, 2]);
    }

    #[test]
    fn test_json_matches_document() {
        let access = DatasetAccess::register(dataset(), &EncodingOverrides::new()).unwrap();
        let doc: Value = serde_json::from_slice(&access.metadata_document_json()).unwrap();
        let zarray: Value = serde_json::from_slice(&access.variable_metadata_json("grid").unwrap()).unwrap();
        assert_eq!(doc["metadata"]["grid/.zarray"], zarray);
        assert_eq!(access.metadata_document_json(), access.metadata_document_json());
    }

    #[test]
    fn test_unknown_variable() {
        let access = DatasetAccess::register(dataset(), &EncodingOverrides::new()).unwrap();
        assert!(matches!(
            access.get_chunk("nonexistent", "0.0"),
            Err(PublishError::UnknownVariable(_))
        ));
        assert!(access.variable_metadata("nonexistent").is_err());
    }

    #[test]
    fn test_overrides_reach_chunks() {
        let mut overrides = EncodingOverrides::new();
        overrides.insert("grid".into(), VariableEncoding::default().with_chunks(vec![4, 1]));
        let access = DatasetAccess::register(dataset(), &overrides).unwrap();
        let bytes = access.get_chunk("grid", "0.3").unwrap();
        let expected: Vec<u8> = [3.0f64, 7.0, 11.0, 15.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_null_compressor_override_serves_raw_chunks() {
        let dataset = Dataset::new().with_variable(
            "v",
            Variable::new(
                NdArraySource::new(ArrayD::<f64>::zeros(IxDyn(&[4, 4])), vec!["y", "x"]).unwrap(),
            )
            .with_encoding(VariableEncoding::default().with_compressor(CodecConfig::new("zlib"))),
        );
        let overrides: EncodingOverrides =
            serde_json::from_value(json!({"v": {"compressor": null}})).unwrap();
        let access = DatasetAccess::register(dataset, &overrides).unwrap();
        assert!(access.variable_metadata("v").unwrap().compressor.is_none());
        assert_eq!(access.get_chunk("v", "0.0").unwrap(), vec![0u8; 128]);
    }

    #[test]
    fn test_register_fails_on_bad_codec() {
        let mut overrides = EncodingOverrides::new();
        overrides.insert(
            "grid".into(),
            VariableEncoding::default().with_compressor(CodecConfig::new("blosc")),
        );
        assert!(matches!(
            DatasetAccess::register(dataset(), &overrides),
            Err(PublishError::UnsupportedCodec(_))
        ));
    }

    #[test]
    fn test_register_fails_on_bad_dataset_attr() {
        let dataset = dataset().with_attr("raw", AttributeValue::Bytes(vec![1, 2]));
        assert!(DatasetAccess::register(dataset, &EncodingOverrides::new()).is_err());
    }

    #[test]
    fn test_edge_policy() {
        let access = DatasetAccess::register(dataset(), &EncodingOverrides::new())
            .unwrap()
            .with_edge_chunk_policy(EdgeChunkPolicy::Pad);
        assert_eq!(access.get_chunk("grid", "5.5").unwrap(), vec![0u8; 32]);
    }
}
