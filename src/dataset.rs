//! Datasets: named variables plus dataset-level attributes

use crate::attrs::{AttributeValue, Attributes};
use crate::codec::CodecConfig;
use crate::source::ArraySource;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Storage encoding of a variable: chunking, compressor and filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableEncoding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<usize>>,
    /// `None` defers to the next encoding in line; `Some(None)` means no compressor
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub compressor: Option<Option<CodecConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<CodecConfig>>,
}

impl VariableEncoding {
    pub fn with_chunks(mut self, chunks: Vec<usize>) -> Self {
        self.chunks = Some(chunks);
        self
    }

    pub fn with_compressor(mut self, compressor: CodecConfig) -> Self {
        self.compressor = Some(Some(compressor));
        self
    }

    /// Publish the variable uncompressed, whatever other encodings declare
    pub fn with_no_compressor(mut self) -> Self {
        self.compressor = Some(None);
        self
    }

    /// Append a filter to the filter list
    pub fn with_filter(mut self, filter: CodecConfig) -> Self {
        self.filters.get_or_insert_with(Vec::new).push(filter);
        self
    }
}

// A field present in the JSON, even as `null`, deserializes to `Some`
fn deserialize_present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A named N-dimensional array published by a dataset
#[derive(Clone)]
pub struct Variable {
    source: Arc<dyn ArraySource>,
    encoding: VariableEncoding,
}

impl Variable {
    pub fn new(source: impl ArraySource + 'static) -> Self {
        Self::from_arc(Arc::new(source))
    }

    pub fn from_arc(source: Arc<dyn ArraySource>) -> Self {
        Self {
            source,
            encoding: VariableEncoding::default(),
        }
    }

    /// Set the variable's own encoding
    pub fn with_encoding(mut self, encoding: VariableEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn source(&self) -> &dyn ArraySource {
        self.source.as_ref()
    }

    pub fn encoding(&self) -> &VariableEncoding {
        &self.encoding
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("shape", &self.source.shape())
            .field("dtype", &self.source.dtype())
            .field("dims", &self.source.dims())
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// A collection of variables and dataset attributes
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    attrs: Attributes,
    variables: BTreeMap<String, Variable>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Add or replace a variable
    pub fn with_variable(mut self, name: impl Into<String>, variable: Variable) -> Self {
        self.variables.insert(name.into(), variable);
        self
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Variables ordered by name
    pub fn variables(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
