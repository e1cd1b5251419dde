//! Codec construction from config.
//!
//! The payload codec also decodes binary metadata values. The shape codec
//! always knows `ResponseShape`; callers register their own payload types on
//! the builders before the set is frozen.

use std::sync::Arc;

use qwire_core::codec::{Codec, JsonCodec, YamlCodec};
use qwire_core::protocol::QueryEnvelope;
use qwire_core::shape::{ResponseShape, RESPONSE_SHAPE_TYPE};
use qwire_core::LazyQueryMessage;

use crate::config::{CodecConfig, CodecFormat, CodecsSection};
use crate::obs::metrics::{DecodeMetrics, MeteredCodec};

/// Unfrozen codec for one field; register types, then `build`.
pub enum CodecBuilder {
    Json(JsonCodec),
    Yaml(YamlCodec),
}

impl CodecBuilder {
    pub fn from_config(cfg: &CodecConfig) -> Self {
        match cfg.format {
            CodecFormat::Json => {
                CodecBuilder::Json(JsonCodec::new().with_dynamic_fallback(cfg.dynamic_fallback))
            }
            CodecFormat::Yaml => {
                CodecBuilder::Yaml(YamlCodec::new().with_dynamic_fallback(cfg.dynamic_fallback))
            }
        }
    }

    /// Register `T` under a declared type name.
    pub fn register<T>(&mut self, type_name: &str)
    where
        T: serde::de::DeserializeOwned + Send + Sync + 'static,
    {
        match self {
            CodecBuilder::Json(c) => c.register::<T>(type_name),
            CodecBuilder::Yaml(c) => c.register::<T>(type_name),
        }
    }

    pub fn build(self) -> Arc<dyn Codec> {
        match self {
            CodecBuilder::Json(c) => Arc::new(c),
            CodecBuilder::Yaml(c) => Arc::new(c),
        }
    }
}

/// Payload and shape codecs, shared by every message built from them.
#[derive(Clone)]
pub struct CodecSet {
    payload: Arc<dyn Codec>,
    shape: Arc<dyn Codec>,
}

impl CodecSet {
    /// Builders for both fields; the shape builder has `ResponseShape` registered.
    pub fn builders(cfg: &CodecsSection) -> (CodecBuilder, CodecBuilder) {
        let payload = CodecBuilder::from_config(&cfg.payload);
        let mut shape = CodecBuilder::from_config(&cfg.shape);
        shape.register::<ResponseShape>(RESPONSE_SHAPE_TYPE);
        (payload, shape)
    }

    pub fn from_config(cfg: &CodecsSection) -> Self {
        let (payload, shape) = Self::builders(cfg);
        Self::new(payload.build(), shape.build())
    }

    pub fn new(payload: Arc<dyn Codec>, shape: Arc<dyn Codec>) -> Self {
        Self { payload, shape }
    }

    /// Wrap both codecs so every decode is recorded in `metrics`.
    pub fn metered(self, metrics: Arc<DecodeMetrics>) -> Self {
        Self {
            payload: Arc::new(MeteredCodec::new(self.payload, Arc::clone(&metrics))),
            shape: Arc::new(MeteredCodec::new(self.shape, metrics)),
        }
    }

    pub fn payload(&self) -> Arc<dyn Codec> {
        Arc::clone(&self.payload)
    }

    pub fn shape(&self) -> Arc<dyn Codec> {
        Arc::clone(&self.shape)
    }

    /// Wrap a received envelope. Decodes nothing.
    pub fn wrap(&self, envelope: impl Into<Arc<QueryEnvelope>>) -> LazyQueryMessage {
        LazyQueryMessage::new(envelope, self.payload(), self.shape())
    }
}
