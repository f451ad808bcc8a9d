//! Shared helpers for the mock API tests.
// Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tromero::logger::{InteractionRecord, InteractionSink};
use tromero::{Tromero, TromeroBuilder};

/// Interaction sink that forwards records to a channel so tests can await
/// the fire-and-forget persistence deterministically.
pub struct CaptureSink {
    tx: mpsc::UnboundedSender<InteractionRecord>,
}

impl CaptureSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<InteractionRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl InteractionSink for CaptureSink {
    async fn save(&self, record: InteractionRecord) -> tromero::Result<()> {
        self.tx.send(record).ok();
        Ok(())
    }
}

/// Route library warnings (dropped parameters, fallback hops, collapsed
/// system prompts) to the test output; visible under `--nocapture`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tromero=warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Builder preconfigured against mock servers, with a capturing sink.
pub fn client_builder(base_url: &str, sink: Arc<CaptureSink>) -> TromeroBuilder {
    init_tracing();
    Tromero::builder()
        .tromero_key("test-tromero-key")
        .base_url(base_url)
        .interaction_sink(sink)
}

/// Await the next captured record, failing the test after a bounded wait.
pub async fn next_record(
    rx: &mut mpsc::UnboundedReceiver<InteractionRecord>,
) -> InteractionRecord {
    tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for interaction record")
        .expect("record channel closed")
}

/// Assert that no record arrives within a short grace period.
pub async fn assert_no_record(rx: &mut mpsc::UnboundedReceiver<InteractionRecord>) {
    let outcome =
        tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await;
    assert!(outcome.is_err(), "unexpected interaction record was saved");
}
