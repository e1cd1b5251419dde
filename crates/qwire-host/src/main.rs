//! qwire-inspect
//!
//! Usage: qwire-inspect <config.yaml> <envelope.json>
//!
//! Wraps one JSON query envelope lazily, reads each field in turn and logs
//! what was decoded, then prints the decode metrics.

use std::process::ExitCode;
use std::sync::Arc;

use qwire_core::error::{QwireError, Result};
use qwire_core::protocol::parse_envelope;
use qwire_core::QueryMessage;

use qwire_host::obs::{logging, metrics::DecodeMetrics};
use qwire_host::{config, CodecSet};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [cfg_path, envelope_path] = args.as_slice() else {
        eprintln!("usage: qwire-inspect <config.yaml> <envelope.json>");
        return ExitCode::from(2);
    };

    let cfg = match config::load_from_file(cfg_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config load failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(&cfg.logging) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match inspect(&cfg.codecs, envelope_path) {
        Ok(rendered) => {
            print!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "inspect failed");
            ExitCode::FAILURE
        }
    }
}

fn inspect(codecs: &config::CodecsSection, envelope_path: &str) -> Result<String> {
    let raw = std::fs::read(envelope_path)
        .map_err(|e| QwireError::Internal(format!("read envelope failed: {e}")))?;
    let envelope = parse_envelope(&raw)?;

    let metrics = Arc::new(DecodeMetrics::default());
    let set = CodecSet::from_config(codecs).metered(Arc::clone(&metrics));
    let msg = set.wrap(envelope);

    tracing::info!(query = msg.query_name(), id = msg.identifier(), "envelope received");

    let ty = msg.payload_type()?;
    tracing::info!(
        type_name = ty.name(),
        revision = ty.revision().unwrap_or("-"),
        rust_type = ty.rust_name(),
        "payload"
    );
    let payload = msg.payload()?;
    tracing::debug!(?payload, "payload value");

    let shape = msg.response_shape()?;
    tracing::info!(?shape, "response shape");

    let md = msg.meta_data()?;
    let keys: Vec<&str> = md.keys().collect();
    tracing::info!(entries = md.len(), ?keys, "metadata");

    Ok(metrics.render())
}
