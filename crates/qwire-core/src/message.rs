//! Lazily decoded query message.
//!
//! `LazyQueryMessage` wraps a received `QueryEnvelope` and decodes nothing at
//! construction. Payload, response shape and metadata are each decoded on
//! first access, cached, and returned from the cache afterwards. Decode
//! failures surface from the accessor that hit them and are not cached.

use std::fmt;
use std::sync::Arc;

use crate::codec::{Codec, DomainObject, TypeDescriptor};
use crate::error::{DecodeError, QwireError, Result};
use crate::lazy::LazyCell;
use crate::metadata::{convert_all, MetaData};
use crate::protocol::QueryEnvelope;
use crate::shape::ResponseShape;

/// Read-only capabilities of a decoded query.
pub trait QueryMessage: Send + Sync {
    /// Logical query name. Never decodes.
    fn query_name(&self) -> &str;

    /// Message identifier. Never decodes.
    fn identifier(&self) -> &str;

    fn payload(&self) -> std::result::Result<&DomainObject, DecodeError>;

    fn payload_type(&self) -> std::result::Result<&TypeDescriptor, DecodeError>;

    fn response_shape(&self) -> std::result::Result<&ResponseShape, DecodeError>;

    /// Converted metadata. Repeated calls return the same instance.
    fn meta_data(&self) -> std::result::Result<Arc<MetaData>, DecodeError>;
}

pub struct LazyQueryMessage {
    envelope: Arc<QueryEnvelope>,
    payload_codec: Arc<dyn Codec>,
    shape_codec: Arc<dyn Codec>,
    payload: LazyCell<(DomainObject, TypeDescriptor)>,
    response_shape: LazyCell<ResponseShape>,
    meta_data: LazyCell<Arc<MetaData>>,
}

impl LazyQueryMessage {
    /// Wrap an envelope. `payload_codec` also decodes binary metadata values.
    pub fn new(
        envelope: impl Into<Arc<QueryEnvelope>>,
        payload_codec: Arc<dyn Codec>,
        shape_codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            envelope: envelope.into(),
            payload_codec,
            shape_codec,
            payload: LazyCell::new(),
            response_shape: LazyCell::new(),
            meta_data: LazyCell::new(),
        }
    }

    /// The wrapped wire envelope.
    pub fn envelope(&self) -> &QueryEnvelope {
        &self.envelope
    }

    /// Payload downcast to `T`.
    pub fn payload_as<T: std::any::Any>(&self) -> std::result::Result<&T, DecodeError> {
        let payload = self.payload()?;
        payload
            .downcast_ref::<T>()
            .ok_or_else(|| DecodeError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: payload.rust_type_name().to_owned(),
            })
    }

    pub fn is_payload_decoded(&self) -> bool {
        self.payload.is_filled()
    }

    pub fn is_response_shape_decoded(&self) -> bool {
        self.response_shape.is_filled()
    }

    pub fn is_meta_data_converted(&self) -> bool {
        self.meta_data.is_filled()
    }

    /// Not provided: merge semantics for replaced metadata are undecided, so
    /// this fails instead of producing a half-built message.
    pub fn with_meta_data(&self, _meta_data: MetaData) -> Result<LazyQueryMessage> {
        Err(QwireError::Unsupported("with_meta_data"))
    }

    /// Not provided; see `with_meta_data`.
    pub fn and_meta_data(&self, _meta_data: MetaData) -> Result<LazyQueryMessage> {
        Err(QwireError::Unsupported("and_meta_data"))
    }

    fn decoded_payload(&self) -> std::result::Result<&(DomainObject, TypeDescriptor), DecodeError> {
        self.payload.get_or_try_init(|| {
            let obj = &self.envelope.payload;
            let decoded = self.payload_codec.decode_typed(obj)?;
            tracing::debug!(
                query = %self.envelope.query,
                type_name = %obj.type_name,
                codec = self.payload_codec.name(),
                "payload decoded"
            );
            Ok(decoded)
        })
    }
}

impl QueryMessage for LazyQueryMessage {
    fn query_name(&self) -> &str {
        &self.envelope.query
    }

    fn identifier(&self) -> &str {
        &self.envelope.message_identifier
    }

    fn payload(&self) -> std::result::Result<&DomainObject, DecodeError> {
        self.decoded_payload().map(|(value, _)| value)
    }

    fn payload_type(&self) -> std::result::Result<&TypeDescriptor, DecodeError> {
        self.decoded_payload().map(|(_, ty)| ty)
    }

    fn response_shape(&self) -> std::result::Result<&ResponseShape, DecodeError> {
        self.response_shape.get_or_try_init(|| {
            let obj = &self.envelope.response_type;
            let decoded = self.shape_codec.decode(obj)?;
            let shape = decoded
                .downcast_ref::<ResponseShape>()
                .cloned()
                .ok_or_else(|| DecodeError::TypeMismatch {
                    expected: std::any::type_name::<ResponseShape>(),
                    found: decoded.rust_type_name().to_owned(),
                })?;
            tracing::debug!(
                query = %self.envelope.query,
                expected = shape.expected_type(),
                codec = self.shape_codec.name(),
                "response shape decoded"
            );
            Ok(shape)
        })
    }

    fn meta_data(&self) -> std::result::Result<Arc<MetaData>, DecodeError> {
        self.meta_data
            .get_or_try_init(|| {
                let converted =
                    convert_all(&self.envelope.meta_data, self.payload_codec.as_ref()).map_err(
                        |e| {
                            tracing::debug!(
                                query = %self.envelope.query,
                                entries = self.envelope.meta_data.len(),
                                error = %e,
                                "metadata conversion failed"
                            );
                            e
                        },
                    )?;
                tracing::debug!(
                    query = %self.envelope.query,
                    entries = converted.len(),
                    "metadata converted"
                );
                Ok::<_, DecodeError>(converted)
            })
            .map(Arc::clone)
    }
}

impl fmt::Debug for LazyQueryMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyQueryMessage")
            .field("query", &self.envelope.query)
            .field("identifier", &self.envelope.message_identifier)
            .field("payload_decoded", &self.is_payload_decoded())
            .field("response_shape_decoded", &self.is_response_shape_decoded())
            .field("meta_data_converted", &self.is_meta_data_converted())
            .finish()
    }
}
