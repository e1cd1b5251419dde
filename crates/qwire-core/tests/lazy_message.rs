//! LazyQueryMessage behaviour: deferred decoding, memoization, failure policy.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;

use qwire_core::codec::{Codec, DomainObject, JsonCodec, TypeDescriptor, YamlCodec};
use qwire_core::error::{DecodeError, QwireError};
use qwire_core::metadata::{DomainValue, MetaData};
use qwire_core::protocol::{parse_envelope, MetadataValue, QueryEnvelope, SerializedObject};
use qwire_core::shape::{ResponseShape, RESPONSE_SHAPE_TYPE};
use qwire_core::{LazyQueryMessage, QueryMessage};

use vector_loader::load;

#[derive(Debug, PartialEq, Deserialize)]
struct FindUser {
    id: u64,
    name: String,
}

#[derive(Debug, PartialEq, Deserialize)]
struct ListUsers {}

#[derive(Debug, PartialEq, Deserialize)]
struct Trace {
    span: String,
}

/// Counts calls and forwards to an inner codec.
struct CountingCodec<C> {
    inner: C,
    decodes: AtomicUsize,
}

impl<C: Codec> CountingCodec<C> {
    fn new(inner: C) -> Arc<Self> {
        Arc::new(Self {
            inner,
            decodes: AtomicUsize::new(0),
        })
    }

    fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl<C: Codec> Codec for CountingCodec<C> {
    fn name(&self) -> &str {
        "counting"
    }

    fn resolve_type(
        &self,
        type_name: &str,
        revision: Option<&str>,
    ) -> Result<TypeDescriptor, DecodeError> {
        self.inner.resolve_type(type_name, revision)
    }

    fn decode(&self, obj: &SerializedObject) -> Result<DomainObject, DecodeError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        std::thread::yield_now();
        self.inner.decode(obj)
    }

    fn decode_typed(
        &self,
        obj: &SerializedObject,
    ) -> Result<(DomainObject, TypeDescriptor), DecodeError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        std::thread::yield_now();
        self.inner.decode_typed(obj)
    }
}

/// Fails the test if any decode path is reached.
struct ForbiddenCodec;

impl Codec for ForbiddenCodec {
    fn name(&self) -> &str {
        "forbidden"
    }

    fn resolve_type(&self, type_name: &str, _: Option<&str>) -> Result<TypeDescriptor, DecodeError> {
        panic!("resolve_type({type_name}) must not be called")
    }

    fn decode(&self, obj: &SerializedObject) -> Result<DomainObject, DecodeError> {
        panic!("decode({}) must not be called", obj.type_name)
    }
}

fn payload_codec() -> JsonCodec {
    JsonCodec::new()
        .with_type::<FindUser>("app.FindUser")
        .with_type::<ListUsers>("app.ListUsers")
        .with_type::<Trace>("app.Trace")
}

fn shape_codec() -> JsonCodec {
    JsonCodec::new().with_type::<ResponseShape>(RESPONSE_SHAPE_TYPE)
}

fn envelope(name: &str) -> QueryEnvelope {
    parse_envelope(&load(name).envelope_bytes()).unwrap()
}

fn message(name: &str) -> LazyQueryMessage {
    LazyQueryMessage::new(
        envelope(name),
        Arc::new(payload_codec()),
        Arc::new(shape_codec()),
    )
}

#[test]
fn name_and_identifier_never_decode() {
    let msg = LazyQueryMessage::new(
        envelope("envelope_full.json"),
        Arc::new(ForbiddenCodec),
        Arc::new(ForbiddenCodec),
    );
    assert_eq!(msg.query_name(), "findUser");
    assert_eq!(msg.identifier(), "msg-0001");
    assert!(!msg.is_payload_decoded());
    assert!(!msg.is_response_shape_decoded());
    assert!(!msg.is_meta_data_converted());
}

#[test]
fn payload_round_trip() {
    let msg = message("envelope_full.json");
    let user = msg.payload_as::<FindUser>().unwrap();
    assert_eq!(
        user,
        &FindUser {
            id: 42,
            name: "ada".into()
        }
    );
    let ty = msg.payload_type().unwrap();
    assert_eq!(ty.name(), "app.FindUser");
    assert_eq!(ty.revision(), Some("1"));
    assert!(ty.is::<FindUser>());
}

#[test]
fn payload_decodes_once() {
    let codec = CountingCodec::new(payload_codec());
    let msg = LazyQueryMessage::new(
        envelope("envelope_full.json"),
        codec.clone(),
        Arc::new(shape_codec()),
    );
    let first = msg.payload().unwrap().clone();
    for _ in 0..5 {
        assert!(msg.payload().unwrap().ptr_eq(&first));
        msg.payload_type().unwrap();
    }
    assert_eq!(codec.decodes(), 1);
}

#[test]
fn payload_decodes_once_under_concurrent_first_access() {
    let codec = CountingCodec::new(payload_codec());
    let msg = LazyQueryMessage::new(
        envelope("envelope_full.json"),
        codec.clone(),
        Arc::new(shape_codec()),
    );
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                assert_eq!(msg.payload_as::<FindUser>().unwrap().id, 42);
            });
        }
    });
    assert_eq!(codec.decodes(), 1);
}

#[test]
fn response_shape_decodes_once() {
    let shapes = CountingCodec::new(shape_codec());
    let msg = LazyQueryMessage::new(
        envelope("envelope_full.json"),
        Arc::new(payload_codec()),
        shapes.clone(),
    );
    let expected = ResponseShape::Instance {
        type_name: "app.User".into(),
    };
    assert_eq!(msg.response_shape().unwrap(), &expected);
    assert_eq!(msg.response_shape().unwrap(), &expected);
    assert_eq!(shapes.decodes(), 1);
    assert!(!msg.is_payload_decoded());
}

#[test]
fn shape_codec_can_use_another_format() {
    let mut env = envelope("envelope_min.json");
    env.response_type =
        SerializedObject::new(&b"kind: optional\ntype: app.User\n"[..], RESPONSE_SHAPE_TYPE, None);
    let yaml = YamlCodec::new().with_type::<ResponseShape>(RESPONSE_SHAPE_TYPE);
    let msg = LazyQueryMessage::new(env, Arc::new(payload_codec()), Arc::new(yaml));
    assert!(msg.response_shape().unwrap().matches("app.User"));
    assert!(msg.payload_as::<ListUsers>().is_ok());
}

#[test]
fn shape_of_wrong_type_is_type_mismatch() {
    let dynamic = JsonCodec::new().with_dynamic_fallback(true);
    let msg = LazyQueryMessage::new(
        envelope("envelope_full.json"),
        Arc::new(payload_codec()),
        Arc::new(dynamic),
    );
    assert!(matches!(
        msg.response_shape(),
        Err(DecodeError::TypeMismatch { .. })
    ));
    assert!(!msg.is_response_shape_decoded());
}

#[test]
fn metadata_converts_every_kind() {
    let msg = message("envelope_full.json");
    let md = msg.meta_data().unwrap();
    assert_eq!(md.len(), 6);
    assert_eq!(md.get("tenant").and_then(DomainValue::as_str), Some("acme"));
    assert_eq!(md.get("weight").and_then(DomainValue::as_f64), Some(0.25));
    assert_eq!(md.get("attempt").and_then(DomainValue::as_i64), Some(3));
    assert_eq!(md.get("replay").and_then(DomainValue::as_bool), Some(false));
    assert!(md.get("blank").unwrap().is_null());
    let trace = md
        .get("trace")
        .and_then(DomainValue::as_object)
        .and_then(|o| o.downcast_ref::<Trace>());
    assert_eq!(trace, Some(&Trace { span: "s-1".into() }));
}

#[test]
fn metadata_is_identity_stable() {
    let codec = CountingCodec::new(payload_codec());
    let msg = LazyQueryMessage::new(
        envelope("envelope_full.json"),
        codec.clone(),
        Arc::new(shape_codec()),
    );
    let a = msg.meta_data().unwrap();
    let b = msg.meta_data().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a, b);
    // one binary entry, converted once
    assert_eq!(codec.decodes(), 1);
}

#[test]
fn empty_metadata_never_touches_codec() {
    let msg = LazyQueryMessage::new(
        envelope("envelope_min.json"),
        Arc::new(ForbiddenCodec),
        Arc::new(ForbiddenCodec),
    );
    let md = msg.meta_data().unwrap();
    assert!(md.is_empty());
    assert!(Arc::ptr_eq(&md, &MetaData::empty()));
}

#[test]
fn bad_binary_metadata_fails_whole_map_and_is_retried() {
    let mut env = envelope("envelope_full.json");
    env.meta_data.insert(
        "broken".into(),
        MetadataValue::Bytes(SerializedObject::new(&b"{oops"[..], "app.Trace", None)),
    );
    let codec = CountingCodec::new(payload_codec());
    let msg = LazyQueryMessage::new(env, codec.clone(), Arc::new(shape_codec()));

    let err = msg.meta_data().expect_err("must fail");
    assert!(matches!(err, DecodeError::Malformed { .. }));
    assert!(!msg.is_meta_data_converted());

    let before = codec.decodes();
    assert!(msg.meta_data().is_err());
    assert!(codec.decodes() > before, "failed conversion must not be cached");
}

#[test]
fn payload_failure_is_deferred_to_accessor() {
    let msg = message("envelope_bad_payload.json");
    assert_eq!(msg.query_name(), "findUser");
    assert_eq!(msg.meta_data().unwrap().len(), 1);
    assert!(msg.response_shape().is_ok());

    let err = QwireError::from(msg.payload().expect_err("must fail"));
    assert_eq!(err.code().as_str(), "DECODE_FAILED");
    assert!(!msg.is_payload_decoded());
}

#[test]
fn unknown_payload_type_fails_on_access() {
    let msg = LazyQueryMessage::new(
        envelope("envelope_full.json"),
        Arc::new(JsonCodec::new()),
        Arc::new(shape_codec()),
    );
    assert!(matches!(msg.payload(), Err(DecodeError::UnknownType { .. })));
    assert!(matches!(msg.payload_type(), Err(DecodeError::UnknownType { .. })));
}

#[test]
fn payload_as_wrong_type_is_type_mismatch() {
    let msg = message("envelope_full.json");
    assert!(matches!(
        msg.payload_as::<ListUsers>(),
        Err(DecodeError::TypeMismatch { .. })
    ));
    // the decoded payload stays cached
    assert!(msg.is_payload_decoded());
}

// Metadata mutation has no agreed merge semantics (replace vs. merge, and
// whether decoded state carries over), so the adapter refuses both forms.
#[test]
fn metadata_mutation_is_unsupported() {
    let msg = message("envelope_full.json");
    let replacement: MetaData = [("k".to_owned(), DomainValue::Boolean(true))]
        .into_iter()
        .collect();

    let err = msg.with_meta_data(replacement.clone()).expect_err("unsupported");
    assert_eq!(err.code().as_str(), "UNSUPPORTED");
    let err = msg.and_meta_data(replacement).expect_err("unsupported");
    assert_eq!(err.code().as_str(), "UNSUPPORTED");

    // message left as it was
    assert_eq!(msg.meta_data().unwrap().len(), 6);
}

#[test]
fn usable_as_trait_object() {
    let msgs: Vec<Box<dyn QueryMessage>> = vec![
        Box::new(message("envelope_full.json")),
        Box::new(message("envelope_min.json")),
    ];
    let names: Vec<&str> = msgs.iter().map(|m| m.query_name()).collect();
    assert_eq!(names, ["findUser", "listUsers"]);
    let counts: HashMap<&str, usize> = msgs
        .iter()
        .map(|m| (m.identifier(), m.meta_data().unwrap().len()))
        .collect();
    assert_eq!(counts["msg-0001"], 6);
    assert_eq!(counts["msg-0002"], 0);
}

#[test]
fn nan_metadata_stays_equal_across_reads() {
    let mut env = envelope("envelope_min.json");
    env.meta_data.insert("w".into(), MetadataValue::Double(f64::NAN));
    let msg = LazyQueryMessage::new(env, Arc::new(ForbiddenCodec), Arc::new(ForbiddenCodec));

    let a = msg.meta_data().unwrap();
    let b = msg.meta_data().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a, b);
    assert!(a.get("w").and_then(DomainValue::as_f64).unwrap().is_nan());
}

/// In-memory log sink for the fmt subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn metadata_conversion_is_logged_once() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();

    let msg = message("envelope_full.json");
    tracing::subscriber::with_default(subscriber, || {
        msg.meta_data().unwrap();
        msg.meta_data().unwrap();
    });

    let text = logs.text();
    assert_eq!(text.matches("metadata converted").count(), 1, "logs: {text}");
    assert!(text.contains("entries=6"), "logs: {text}");
    assert!(text.contains("query=findUser"), "logs: {text}");
}
