use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use wristfeed::feed::RefreshHandle;
use wristfeed::sink::RenderSink;
use wristfeed::storage::database::ConnectionRole;
use wristfeed::time_utils;

use super::build_engine;

/// Holds the payload of a single pass.
#[derive(Default)]
struct CaptureSink {
    payload: Mutex<Option<String>>,
}

impl RenderSink for CaptureSink {
    fn render_wrist_feed(&self, payload: &str) {
        if let Ok(mut slot) = self.payload.lock() {
            *slot = Some(payload.to_string());
        }
    }
}

/// `snapshot`: one forced pass, wrist payload on stdout.
pub fn run(pretty: bool) -> Result<()> {
    let sink = Arc::new(CaptureSink::default());
    let mut engine = build_engine(ConnectionRole::Cli, sink.clone())?;
    engine
        .run_pass(true, time_utils::now(), &RefreshHandle::detached())
        .context("Feed pass failed")?;

    let payload = sink
        .payload
        .lock()
        .map_err(|_| anyhow::anyhow!("capture lock poisoned"))?
        .take()
        .unwrap_or_else(|| "[]".to_string());

    if pretty {
        let value: serde_json::Value = serde_json::from_str(&payload)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", payload);
    }
    Ok(())
}
