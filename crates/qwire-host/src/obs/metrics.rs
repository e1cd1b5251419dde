//! Decode metrics.
//!
//! Counters and histograms carry dynamic labels backed by `DashMap`. Labels
//! are flattened into sorted key vectors for deterministic ordering. Histogram
//! buckets are fixed in microseconds to avoid floating point math.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use qwire_core::codec::{Codec, DomainObject, TypeDescriptor};
use qwire_core::error::DecodeError;
use qwire_core::protocol::SerializedObject;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn label_str(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum across all label sets.
    pub fn total(&self) -> u64 {
        self.map.iter().map(|r| r.value().load(Ordering::Relaxed)).sum()
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str(r.key()), val);
        }
    }
}

// 10us, 50us, 100us, 500us, 1ms, 5ms, 10ms, 50ms, 100ms
const BUCKETS_MICROS: [u64; 9] = [10, 50, 100, 500, 1_000, 5_000, 10_000, 50_000, 100_000];

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 9],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    /// Observe a duration into cumulative buckets (microsecond scale).
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self
            .map
            .entry(label_key(labels))
            .or_insert_with(AtomicHistogram::default);
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(micros, Ordering::Relaxed);

        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Observation count for an exact label set.
    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for r in self.map.iter() {
            let hist = r.value();
            let labels = label_str(r.key());
            let prefix = if labels.is_empty() {
                String::new()
            } else {
                format!("{},", labels)
            };

            for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);

            let sum = hist.sum.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, count);
        }
    }
}

#[derive(Default)]
pub struct DecodeMetrics {
    /// Labels: codec, type, outcome (`ok` / `error`).
    pub decodes: CounterVec,
    /// Labels: codec.
    pub decode_duration: HistogramVec, // microseconds
}

impl DecodeMetrics {
    pub fn record(&self, codec: &str, type_name: &str, ok: bool, elapsed: Duration) {
        let outcome = if ok { "ok" } else { "error" };
        self.decodes
            .inc(&[("codec", codec), ("type", type_name), ("outcome", outcome)]);
        self.decode_duration.observe(&[("codec", codec)], elapsed);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.decodes.render("qwire_decode_total", &mut out);
        self.decode_duration
            .render("qwire_decode_duration_micros", &mut out);
        out
    }
}

/// Forwards to an inner codec and records every decode.
pub struct MeteredCodec {
    inner: Arc<dyn Codec>,
    metrics: Arc<DecodeMetrics>,
}

impl MeteredCodec {
    pub fn new(inner: Arc<dyn Codec>, metrics: Arc<DecodeMetrics>) -> Self {
        Self { inner, metrics }
    }

    fn timed<T>(
        &self,
        obj: &SerializedObject,
        f: impl FnOnce() -> Result<T, DecodeError>,
    ) -> Result<T, DecodeError> {
        let start = Instant::now();
        let res = f();
        self.metrics
            .record(self.inner.name(), &obj.type_name, res.is_ok(), start.elapsed());
        res
    }
}

impl Codec for MeteredCodec {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn resolve_type(
        &self,
        type_name: &str,
        revision: Option<&str>,
    ) -> Result<TypeDescriptor, DecodeError> {
        self.inner.resolve_type(type_name, revision)
    }

    fn decode(&self, obj: &SerializedObject) -> Result<DomainObject, DecodeError> {
        self.timed(obj, || self.inner.decode(obj))
    }

    fn decode_typed(
        &self,
        obj: &SerializedObject,
    ) -> Result<(DomainObject, TypeDescriptor), DecodeError> {
        self.timed(obj, || self.inner.decode_typed(obj))
    }
}
