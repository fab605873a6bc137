//! Measurement content: the JSON document describing where a chart series comes
//! from (`connection`) and how it is drawn (`series`).
//!
//! Content is checked against this shape and serialized to its storage encoding
//! before any row is written, both by the cascading template create and by
//! measurement updates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper bound used when no explicit limit is configured
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementContent {
    /// Data source description (driver, query, credentials reference, ...)
    pub connection: Map<String, Value>,
    #[serde(default)]
    pub series: Vec<Map<String, Value>>,
    /// Anything else the front-end keeps alongside the measurement
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("content must be a JSON object")]
    NotAnObject,
    #[error("content is missing required key 'connection'")]
    MissingConnection,
    #[error("content does not match the measurement schema: {0}")]
    Schema(String),
    #[error("serialized content is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

impl MeasurementContent {
    /// Check a raw JSON value against the measurement schema
    pub fn parse(raw: &Value) -> Result<Self, ContentError> {
        let object = raw.as_object().ok_or(ContentError::NotAnObject)?;
        if !object.contains_key("connection") {
            return Err(ContentError::MissingConnection);
        }
        Self::deserialize(raw).map_err(|e| ContentError::Schema(e.to_string()))
    }

    /// Storage encoding (JSONB) of the content, bounded by `limit` bytes
    pub fn encode(&self, limit: usize) -> Result<Value, ContentError> {
        let text = serde_json::to_string(self).map_err(|e| ContentError::Schema(e.to_string()))?;
        if text.len() > limit {
            return Err(ContentError::TooLarge { size: text.len(), limit });
        }
        serde_json::to_value(self).map_err(|e| ContentError::Schema(e.to_string()))
    }
}

/// Validate and encode in one step
pub fn prepare_content(raw: &Value, limit: usize) -> Result<Value, ContentError> {
    MeasurementContent::parse(raw)?.encode(limit)
}

/// Validator hook used by the measurement `FieldSet`.
///
/// Shape only; the size limit is configured per store and checked by `prepare_content`.
pub fn validate_content(raw: &Value) -> Result<(), String> {
    MeasurementContent::parse(raw)
        .map(|_| ())
        .map_err(|e| e.to_string())
}
