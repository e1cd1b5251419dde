//! Response shapes: what result a query's caller expects back.

use serde::Deserialize;

/// Declared type name shape codecs register `ResponseShape` under.
pub const RESPONSE_SHAPE_TYPE: &str = "qwire.ResponseShape";

/// Expected result shape of a query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseShape {
    /// Exactly one instance of the type.
    Instance {
        #[serde(rename = "type")]
        type_name: String,
    },
    /// A collection of instances.
    Multiple {
        #[serde(rename = "type")]
        type_name: String,
    },
    /// Zero or one instance.
    Optional {
        #[serde(rename = "type")]
        type_name: String,
    },
}

impl ResponseShape {
    /// Element type the shape is expressed over.
    pub fn expected_type(&self) -> &str {
        match self {
            ResponseShape::Instance { type_name }
            | ResponseShape::Multiple { type_name }
            | ResponseShape::Optional { type_name } => type_name,
        }
    }

    /// True when a handler producing `type_name` can answer this shape.
    pub fn matches(&self, type_name: &str) -> bool {
        self.expected_type() == type_name
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, ResponseShape::Multiple { .. })
    }
}
