//! Thin CLI binary: loads a config and an optional scoring artifact, then
//! drives the engine from newline-delimited JSON trace/pending-tx records
//! on stdin. Standing in for the mempool-observer/gateway host process;
//! no network transport is implemented here.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sentinel_engine::config::EngineConfig;
use sentinel_engine::detector::IsolationForestScorer;
use sentinel_engine::engine::SentinelEngine;
use sentinel_engine::error::SentinelError;
use sentinel_engine::sinks::ConsoleSink;
use sentinel_engine::trace::{ExecutedTrace, PendingTransaction};
use sentinel_engine::RiskLevel;

#[derive(Parser, Debug)]
#[command(name = "sentinel", about = "Online anomaly-detection engine for blockchain transactions")]
struct Args {
    /// Path to a TOML engine configuration. Falls back to defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a bincode-serialized scoring artifact. Runs heuristic-only
    /// when omitted.
    #[arg(long)]
    artifact: Option<PathBuf>,

    /// Also print a human-readable line per signal to stderr.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum InputRecord {
    Pending(PendingTransaction),
    Trace(ExecutedTrace),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            EngineConfig::from_toml(&text)?
        }
        None => EngineConfig::default(),
    };

    let mut engine = SentinelEngine::new(config);

    if let Some(path) = &args.artifact {
        let bytes = std::fs::read(path)
            .map_err(|e| SentinelError::ArtifactUnavailable(format!("{}: {e}", path.display())))?;
        let scorer = IsolationForestScorer::load(&bytes)?;
        engine = engine.with_scorer(Arc::new(scorer));
    }

    engine.add_sink(Box::new(ConsoleSink), RiskLevel::Medium);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: InputRecord = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed input line");
                continue;
            }
        };

        let signal = match record {
            InputRecord::Pending(tx) => engine.analyze_pending(&tx, None),
            InputRecord::Trace(trace) => engine.analyze_trace(&trace, None),
        };

        if args.verbose {
            eprintln!("{}", signal.to_alert_message());
        }
        writeln!(out, "{}", serde_json::to_string(&signal)?)?;
    }

    Ok(())
}
