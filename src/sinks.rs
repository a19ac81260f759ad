//! C11 — Alert Sink Interface.
//!
//! A sink is a callable receiving a finished Risk Signal; it MUST NOT
//! mutate it. The engine calls sinks sequentially, in registration order,
//! after the signal is fully constructed. All sinks here are best-effort:
//! failures are reported to the caller (who logs and moves on) and never
//! propagate out of `analyze_*`.

use std::time::Duration;

use crate::engine::RiskSignal;

pub trait AlertSink: Send + Sync {
    fn dispatch(&self, signal: &RiskSignal) -> Result<(), String>;
}

/// Writes the human-readable alert line to stdout.
pub struct ConsoleSink;

impl AlertSink for ConsoleSink {
    fn dispatch(&self, signal: &RiskSignal) -> Result<(), String> {
        println!("{}", signal.to_alert_message());
        Ok(())
    }
}

/// Emits the canonical structured form as a single JSON line, suitable for
/// log aggregation.
pub struct StructuredSink;

impl AlertSink for StructuredSink {
    fn dispatch(&self, signal: &RiskSignal) -> Result<(), String> {
        let line = serde_json::to_string(signal).map_err(|e| e.to_string())?;
        println!("{line}");
        Ok(())
    }
}

/// Fire-and-forget HTTP POST with a short timeout.
///
/// Per §5 this is the third sanctioned suspension point in the pipeline,
/// but `dispatch` itself is called from `SentinelEngine::finish`, which is
/// synchronous — so the sink owns a small dedicated background runtime
/// (one worker thread, driving tasks independently of the caller) and
/// spawns the POST onto it rather than blocking on the network round
/// trip. `dispatch` returns as soon as the request is queued; send
/// failures are only ever logged, never surfaced.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    runtime: tokio::runtime::Runtime,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| e.to_string())?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { client, url: url.into(), runtime })
    }
}

impl AlertSink for WebhookSink {
    fn dispatch(&self, signal: &RiskSignal) -> Result<(), String> {
        let client = self.client.clone();
        let url = self.url.clone();
        let body = serde_json::to_value(signal).map_err(|e| e.to_string())?;
        self.runtime.spawn(async move {
            if let Err(e) = client.post(&url).json(&body).send().await {
                tracing::warn!(error = %e, "webhook sink dispatch failed");
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::SentinelEngine;
    use crate::trace::{PendingTransaction, TxHash};

    fn sample_signal() -> RiskSignal {
        let engine = SentinelEngine::new(EngineConfig::default());
        let tx = PendingTransaction {
            hash: TxHash([3; 32]),
            from: [0; 20],
            to: Some([1; 20]),
            value: 0,
            input: vec![],
            gas_limit: 21000,
            gas_price: 1,
            nonce: 0,
        };
        engine.analyze_pending(&tx, None)
    }

    #[test]
    fn console_sink_never_errors_on_a_well_formed_signal() {
        let sink = ConsoleSink;
        assert!(sink.dispatch(&sample_signal()).is_ok());
    }

    #[test]
    fn structured_sink_serializes_the_signal() {
        let sink = StructuredSink;
        assert!(sink.dispatch(&sample_signal()).is_ok());
    }

    #[test]
    fn webhook_sink_dispatch_returns_immediately_without_waiting_on_the_network() {
        let sink = WebhookSink::new("http://127.0.0.1:0/webhook", Duration::from_millis(50)).unwrap();
        assert!(sink.dispatch(&sample_signal()).is_ok());
    }
}
