//! Consolidated metadata: every record of a dataset in one document

use crate::config::EncodingOverrides;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::metadata::{
    extract_dataset_attrs, extract_zarray, extract_zattrs, ArrayMetadata, GroupMetadata,
};
use crate::utils::{json_dumps, metadata_key, ZARRAY_KEY, ZATTRS_KEY, ZGROUP_KEY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Version of the consolidated metadata format
pub const ZARR_CONSOLIDATED_FORMAT: u32 = 1;

/// Metadata records of one variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableMetadata {
    pub zarray: ArrayMetadata,
    pub zattrs: Map<String, Value>,
}

/// Extract the records of every variable. Any failure aborts the whole extraction.
pub fn extract_variables(
    dataset: &Dataset,
    overrides: &EncodingOverrides,
) -> Result<BTreeMap<String, VariableMetadata>> {
    for name in overrides.keys() {
        if dataset.variable(name).is_none() {
            warn!(variable = %name, "encoding override for unknown variable ignored");
        }
    }

    dataset
        .variables()
        .map(|(name, variable)| {
            let zarray = extract_zarray(variable, overrides.get(name))?;
            let zattrs = extract_zattrs(variable)?;
            debug!(variable = %name, shape = ?zarray.shape, chunks = ?zarray.chunks, dtype = %zarray.dtype, "extracted array metadata");
            Ok((name.to_string(), VariableMetadata { zarray, zattrs }))
        })
        .collect()
}

/// The `.zmetadata` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedMetadata {
    pub zarr_consolidated_format: u32,
    pub metadata: BTreeMap<String, Value>,
}

impl ConsolidatedMetadata {
    /// Extract and consolidate all records of a dataset
    pub fn build(dataset: &Dataset, overrides: &EncodingOverrides) -> Result<Self> {
        let variables = extract_variables(dataset, overrides)?;
        Self::from_parts(extract_dataset_attrs(dataset)?, &variables)
    }

    /// Assemble the document from already extracted records
    pub fn from_parts(
        dataset_attrs: Map<String, Value>,
        variables: &BTreeMap<String, VariableMetadata>,
    ) -> Result<Self> {
        let mut metadata = BTreeMap::new();
        metadata.insert(ZATTRS_KEY.to_string(), Value::Object(dataset_attrs));
        metadata.insert(
            ZGROUP_KEY.to_string(),
            serde_json::to_value(GroupMetadata::default())?,
        );

        for (name, records) in variables {
            metadata.insert(
                metadata_key(name, ZATTRS_KEY),
                Value::Object(records.zattrs.clone()),
            );
            metadata.insert(
                metadata_key(name, ZARRAY_KEY),
                serde_json::to_value(&records.zarray)?,
            );
        }

        Ok(Self {
            zarr_consolidated_format: ZARR_CONSOLIDATED_FORMAT,
            metadata,
        })
    }

    /// Look up one record by its key, e.g. `temperature/.zarray`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Serialized form of the document
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        json_dumps(self)
    }
}
