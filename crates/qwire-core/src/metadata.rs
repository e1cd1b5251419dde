//! Metadata value conversion.
//!
//! Wire metadata values are converted one-to-one into `DomainValue`s. Only the
//! binary kind needs a codec; every other kind is a direct projection.

use std::collections::btree_map;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use crate::codec::{Codec, DomainObject};
use crate::error::DecodeError;
use crate::protocol::MetadataValue;

/// Fully converted metadata value.
#[derive(Debug, Clone)]
pub enum DomainValue {
    Text(String),
    /// Binary value decoded by the payload codec.
    Object(DomainObject),
    Double(f64),
    Integer(i64),
    Boolean(bool),
    Null,
}

impl DomainValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DomainValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&DomainObject> {
        match self {
            DomainValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DomainValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DomainValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DomainValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DomainValue::Null)
    }
}

/// Objects compare by identity; decoded values are not required to be `PartialEq`.
/// Doubles compare bitwise so a map holding NaN still equals itself.
impl PartialEq for DomainValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DomainValue::Text(a), DomainValue::Text(b)) => a == b,
            (DomainValue::Object(a), DomainValue::Object(b)) => a.ptr_eq(b),
            (DomainValue::Double(a), DomainValue::Double(b)) => a.to_bits() == b.to_bits(),
            (DomainValue::Integer(a), DomainValue::Integer(b)) => a == b,
            (DomainValue::Boolean(a), DomainValue::Boolean(b)) => a == b,
            (DomainValue::Null, DomainValue::Null) => true,
            _ => false,
        }
    }
}

/// Converted, read-only metadata map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaData {
    entries: BTreeMap<String, DomainValue>,
}

impl MetaData {
    /// Shared empty instance.
    pub fn empty() -> Arc<MetaData> {
        static EMPTY: OnceLock<Arc<MetaData>> = OnceLock::new();
        Arc::clone(EMPTY.get_or_init(|| Arc::new(MetaData::default())))
    }

    pub fn get(&self, key: &str) -> Option<&DomainValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, DomainValue> {
        self.entries.iter()
    }
}

impl FromIterator<(String, DomainValue)> for MetaData {
    fn from_iter<I: IntoIterator<Item = (String, DomainValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MetaData {
    type Item = (&'a String, &'a DomainValue);
    type IntoIter = btree_map::Iter<'a, String, DomainValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Convert one wire metadata value.
pub fn convert(value: &MetadataValue, codec: &dyn Codec) -> Result<DomainValue, DecodeError> {
    Ok(match value {
        MetadataValue::Text(s) => DomainValue::Text(s.clone()),
        MetadataValue::Bytes(obj) => DomainValue::Object(codec.decode(obj)?),
        MetadataValue::Double(v) => DomainValue::Double(*v),
        MetadataValue::Number(v) => DomainValue::Integer(*v),
        MetadataValue::Boolean(v) => DomainValue::Boolean(*v),
        MetadataValue::Unset => DomainValue::Null,
    })
}

/// Convert a whole wire map. Any failing entry fails the whole map.
///
/// Entries convert in key order, so the first failing key is the one reported.
///
/// An empty wire map yields the shared empty instance without touching the codec.
pub fn convert_all(
    map: &HashMap<String, MetadataValue>,
    codec: &dyn Codec,
) -> Result<Arc<MetaData>, DecodeError> {
    if map.is_empty() {
        return Ok(MetaData::empty());
    }
    let ordered: BTreeMap<&String, &MetadataValue> = map.iter().collect();
    let entries = ordered
        .into_iter()
        .map(|(k, v)| convert(v, codec).map(|dv| (k.clone(), dv)))
        .collect::<Result<MetaData, DecodeError>>()?;
    Ok(Arc::new(entries))
}
