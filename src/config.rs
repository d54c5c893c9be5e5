//! Serving configuration and per-variable encoding overrides

use crate::dataset::VariableEncoding;
use crate::error::{PublishError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;

/// Encoding overrides keyed by variable name
pub type EncodingOverrides = BTreeMap<String, VariableEncoding>;

/// Load encoding overrides from a JSON file
pub fn load_encoding_overrides(path: impl AsRef<Path>) -> Result<EncodingOverrides> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// What to return for chunks that extend past the end of the array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeChunkPolicy {
    /// Return only the elements that exist; the buffer may be short or empty
    #[default]
    Truncate,
    /// Fill up to the nominal chunk shape with zero/default elements
    Pad,
}

/// Settings for the HTTP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub edge_chunks: EdgeChunkPolicy,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            log_level: "debug".to_string(),
            edge_chunks: EdgeChunkPolicy::default(),
        }
    }
}

impl ServeConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_edge_chunks(mut self, policy: EdgeChunkPolicy) -> Self {
        self.edge_chunks = policy;
        self
    }

    /// Socket address to bind
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| {
                PublishError::Configuration(format!(
                    "invalid address {}:{}: {}",
                    self.host, self.port, e
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ServeConfig::default();
        assert_eq!(config.port, 9000);
        assert_eq!(config.edge_chunks, EdgeChunkPolicy::Truncate);
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:9000");
    }

    #[test]
    fn test_invalid_host() {
        let config = ServeConfig::default().with_host("not a host");
        assert!(matches!(
            config.socket_addr(),
            Err(PublishError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 8080, "edge_chunks": "pad"}}"#).unwrap();

        let config = ServeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.edge_chunks, EdgeChunkPolicy::Pad);
    }

    #[test]
    fn test_load_encoding_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"temp": {{"chunks": [2, 2], "compressor": {{"id": "zstd", "level": 3}}}}}}"#
        )
        .unwrap();

        let overrides = load_encoding_overrides(file.path()).unwrap();
        let temp = &overrides["temp"];
        assert_eq!(temp.chunks, Some(vec![2, 2]));
        assert_eq!(
            temp.compressor.as_ref().and_then(|c| c.as_ref()).map(|c| c.id()),
            Some("zstd")
        );
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ServeConfig::from_json_file("/nonexistent/zarrpublish.json"),
            Err(PublishError::Io(_))
        ));
    }
}
