//! Query request envelope (canonical JSON mapping).
//!
//! The envelope is received whole and never mutated. Payload, response type
//! and metadata stay encoded here; decoding belongs to `LazyQueryMessage`.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Deserializer};

use crate::error::{QwireError, Result};

/// Encoded object: bytes plus the declared type name and revision.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializedObject {
    /// Declared (logical) type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Revision tag. Empty on the wire means no revision.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub revision: Option<String>,
    /// Encoded bytes (base64 in JSON).
    #[serde(default, deserialize_with = "base64_bytes")]
    pub data: Bytes,
}

impl SerializedObject {
    pub fn new(
        data: impl Into<Bytes>,
        type_name: impl Into<String>,
        revision: Option<&str>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            revision: revision.filter(|r| !r.is_empty()).map(str::to_owned),
            data: data.into(),
        }
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }
}

/// One metadata value; exactly one kind, or unset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawMetadataValue")]
pub enum MetadataValue {
    Text(String),
    Bytes(SerializedObject),
    Double(f64),
    Number(i64),
    Boolean(bool),
    Unset,
}

/// Oneof wire form: at most one field set.
#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawMetadataValue {
    text_value: Option<String>,
    bytes_value: Option<SerializedObject>,
    double_value: Option<f64>,
    number_value: Option<i64>,
    boolean_value: Option<bool>,
}

impl TryFrom<RawMetadataValue> for MetadataValue {
    type Error = String;

    fn try_from(raw: RawMetadataValue) -> std::result::Result<Self, Self::Error> {
        let mut set = Vec::with_capacity(1);
        if let Some(v) = raw.text_value {
            set.push(MetadataValue::Text(v));
        }
        if let Some(v) = raw.bytes_value {
            set.push(MetadataValue::Bytes(v));
        }
        if let Some(v) = raw.double_value {
            set.push(MetadataValue::Double(v));
        }
        if let Some(v) = raw.number_value {
            set.push(MetadataValue::Number(v));
        }
        if let Some(v) = raw.boolean_value {
            set.push(MetadataValue::Boolean(v));
        }
        match set.len() {
            0 => Ok(MetadataValue::Unset),
            1 => Ok(set.remove(0)),
            n => Err(format!("metadata value has {n} fields set, expected at most one")),
        }
    }
}

/// Received query request.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct QueryEnvelope {
    /// Logical query name.
    pub query: String,
    /// Unique message identifier.
    pub message_identifier: String,
    /// Encoded query payload.
    pub payload: SerializedObject,
    /// Encoded response shape.
    pub response_type: SerializedObject,
    #[serde(default)]
    pub meta_data: HashMap<String, MetadataValue>,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub component_name: String,
    /// Creation time, epoch millis.
    #[serde(default)]
    pub timestamp: i64,
    /// 0 = unspecified.
    #[serde(default)]
    pub number_of_results: i32,
}

/// Parse a JSON query envelope.
pub fn parse_envelope(buf: &[u8]) -> Result<QueryEnvelope> {
    serde_json::from_slice(buf)
        .map_err(|e| QwireError::BadRequest(format!("invalid envelope json: {e}")))
}

fn empty_as_none<'de, D>(d: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(d)?;
    Ok(s.filter(|s| !s.is_empty()))
}

fn base64_bytes<'de, D>(d: D) -> std::result::Result<Bytes, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    STANDARD
        .decode(s.as_bytes())
        .map(Bytes::from)
        .map_err(serde::de::Error::custom)
}
