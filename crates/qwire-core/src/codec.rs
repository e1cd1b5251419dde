//! Codec contract and the serde-backed registry codecs.
//!
//! A codec turns a `SerializedObject` (bytes + declared type name + revision)
//! into a type-erased `DomainObject`. `SerdeCodec` resolves declared names
//! through a registry filled at startup, then hands the bytes to a wire
//! `Format` (JSON or YAML).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::DecodeError;
use crate::protocol::SerializedObject;

/// Decoded value, shared and type-erased.
#[derive(Clone)]
pub struct DomainObject {
    value: Arc<dyn Any + Send + Sync>,
    rust_name: &'static str,
}

impl DomainObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            rust_name: std::any::type_name::<T>(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.value).downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        (*self.value).is::<T>()
    }

    /// Rust type name of the held value.
    pub fn rust_type_name(&self) -> &'static str {
        self.rust_name
    }

    /// True when both handles point at the same decoded value.
    pub fn ptr_eq(&self, other: &DomainObject) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for DomainObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainObject")
            .field("type", &self.rust_name)
            .finish_non_exhaustive()
    }
}

/// Runtime type a declared type name resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: String,
    revision: Option<String>,
    type_id: TypeId,
    rust_name: &'static str,
}

impl TypeDescriptor {
    pub fn of<T: Any>(name: impl Into<String>, revision: Option<&str>) -> Self {
        Self {
            name: name.into(),
            revision: revision.map(str::to_owned),
            type_id: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
        }
    }

    /// Declared type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    /// True when this descriptor resolved to `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

/// Decodes encoded objects into domain values.
///
/// Implementations must be deterministic and free of side effects visible to
/// callers; lazy fields may call them from any thread.
pub trait Codec: Send + Sync {
    /// Short name for logs and metrics.
    fn name(&self) -> &str;

    /// Resolve a declared type name (and revision) to a runtime type.
    fn resolve_type(
        &self,
        type_name: &str,
        revision: Option<&str>,
    ) -> Result<TypeDescriptor, DecodeError>;

    /// Decode an encoded object.
    fn decode(&self, obj: &SerializedObject) -> Result<DomainObject, DecodeError>;

    /// Decode and also return the resolved runtime type.
    fn decode_typed(
        &self,
        obj: &SerializedObject,
    ) -> Result<(DomainObject, TypeDescriptor), DecodeError> {
        let ty = self.resolve_type(&obj.type_name, obj.revision())?;
        let value = self.decode(obj)?;
        Ok((value, ty))
    }
}

/// Wire format behind a `SerdeCodec`.
pub trait Format: Send + Sync + 'static {
    /// Format name (`json`, `yaml`).
    const NAME: &'static str;

    /// Schema-less value produced when dynamic fallback is enabled.
    type Dynamic: DeserializeOwned + Send + Sync + 'static;

    fn from_slice<T: DeserializeOwned>(buf: &[u8], type_name: &str) -> Result<T, DecodeError>;
}

/// JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Format for Json {
    const NAME: &'static str = "json";
    type Dynamic = serde_json::Value;

    fn from_slice<T: DeserializeOwned>(buf: &[u8], type_name: &str) -> Result<T, DecodeError> {
        serde_json::from_slice(buf).map_err(|e| DecodeError::malformed(type_name, e))
    }
}

/// YAML via `serde_yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Yaml;

impl Format for Yaml {
    const NAME: &'static str = "yaml";
    type Dynamic = serde_yaml::Value;

    fn from_slice<T: DeserializeOwned>(buf: &[u8], type_name: &str) -> Result<T, DecodeError> {
        serde_yaml::from_slice(buf).map_err(|e| DecodeError::malformed(type_name, e))
    }
}

type DecodeFn = fn(&[u8], &str) -> Result<DomainObject, DecodeError>;

fn decode_as<F: Format, T: DeserializeOwned + Send + Sync + 'static>(
    buf: &[u8],
    type_name: &str,
) -> Result<DomainObject, DecodeError> {
    F::from_slice::<T>(buf, type_name).map(DomainObject::new)
}

struct Registration {
    pinned_revision: Option<String>,
    type_id: TypeId,
    rust_name: &'static str,
    decode: DecodeFn,
}

/// Registry-driven codec over a wire format.
pub struct SerdeCodec<F: Format> {
    types: HashMap<String, Registration>,
    dynamic_fallback: bool,
    _format: PhantomData<F>,
}

pub type JsonCodec = SerdeCodec<Json>;
pub type YamlCodec = SerdeCodec<Yaml>;

impl<F: Format> Default for SerdeCodec<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Format> SerdeCodec<F> {
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
            dynamic_fallback: false,
            _format: PhantomData,
        }
    }

    /// Register `T` under a declared type name, accepting any revision.
    pub fn register<T>(&mut self, type_name: impl Into<String>)
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.insert::<T>(type_name.into(), None);
    }

    /// Register `T` under a declared type name, accepting only `revision`.
    pub fn register_revision<T>(&mut self, type_name: impl Into<String>, revision: &str)
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.insert::<T>(type_name.into(), Some(revision.to_owned()));
    }

    /// Builder form of `register`.
    pub fn with_type<T>(mut self, type_name: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.register::<T>(type_name);
        self
    }

    /// Decode unregistered names into `F::Dynamic` instead of failing.
    pub fn with_dynamic_fallback(mut self, enabled: bool) -> Self {
        self.dynamic_fallback = enabled;
        self
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    fn insert<T>(&mut self, type_name: String, pinned_revision: Option<String>)
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.types.insert(
            type_name,
            Registration {
                pinned_revision,
                type_id: TypeId::of::<T>(),
                rust_name: std::any::type_name::<T>(),
                decode: decode_as::<F, T>,
            },
        );
    }

    fn lookup(
        &self,
        type_name: &str,
        revision: Option<&str>,
    ) -> Result<(TypeDescriptor, DecodeFn), DecodeError> {
        let Some(reg) = self.types.get(type_name) else {
            if self.dynamic_fallback {
                return Ok((
                    TypeDescriptor::of::<F::Dynamic>(type_name, revision),
                    decode_as::<F, F::Dynamic> as DecodeFn,
                ));
            }
            return Err(DecodeError::UnknownType {
                type_name: type_name.to_owned(),
            });
        };

        if let Some(pinned) = reg.pinned_revision.as_deref() {
            if revision != Some(pinned) {
                return Err(DecodeError::RevisionMismatch {
                    type_name: type_name.to_owned(),
                    expected: pinned.to_owned(),
                    actual: revision.unwrap_or("<none>").to_owned(),
                });
            }
        }

        let ty = TypeDescriptor {
            name: type_name.to_owned(),
            revision: revision.map(str::to_owned),
            type_id: reg.type_id,
            rust_name: reg.rust_name,
        };
        Ok((ty, reg.decode))
    }
}

impl<F: Format> Codec for SerdeCodec<F> {
    fn name(&self) -> &str {
        F::NAME
    }

    fn resolve_type(
        &self,
        type_name: &str,
        revision: Option<&str>,
    ) -> Result<TypeDescriptor, DecodeError> {
        self.lookup(type_name, revision).map(|(ty, _)| ty)
    }

    fn decode(&self, obj: &SerializedObject) -> Result<DomainObject, DecodeError> {
        let (_, decode) = self.lookup(&obj.type_name, obj.revision())?;
        decode(&obj.data, &obj.type_name)
    }

    fn decode_typed(
        &self,
        obj: &SerializedObject,
    ) -> Result<(DomainObject, TypeDescriptor), DecodeError> {
        let (ty, decode) = self.lookup(&obj.type_name, obj.revision())?;
        let value = decode(&obj.data, &obj.type_name)?;
        Ok((value, ty))
    }
}
