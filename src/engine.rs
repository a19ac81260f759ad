//! C10 — Signal Engine.
//!
//! Orchestrates C6 -> C7 -> C8 -> C9 in strict sequence (C9's adjustment
//! depends on the raw score C7+C8 produce) and fuses the result into one
//! Risk Signal per call. Two static entry points, `analyze_pending` and
//! `analyze_trace`, rather than a duck-typed input — callers always know
//! which kind of input they have.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::chain::{ChainHandle, NullChainHandle};
use crate::config::EngineConfig;
use crate::detector::Scorer;
use crate::features::aggregator::{self, BytecodeContext};
use crate::features::FeatureRecord;
use crate::heuristic::{self, HeuristicConfig, HeuristicResult, Verdict};
use crate::protocol::{self, ProtocolConfig};
use crate::sinks::AlertSink;
use crate::trace::{ExecutedTrace, PendingTransaction, TxHash};

pub const MODEL_VERSION: &str = "sentinel-engine/0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    fn from_adjusted_score(score: f64) -> Self {
        if score >= 0.70 {
            RiskLevel::Critical
        } else if score >= 0.50 {
            RiskLevel::High
        } else if score >= 0.35 {
            RiskLevel::Medium
        } else if score >= 0.20 {
            RiskLevel::Low
        } else {
            RiskLevel::Safe
        }
    }

    fn recommended_action(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "allow",
            RiskLevel::Low => "monitor",
            RiskLevel::Medium => "flag",
            RiskLevel::High => "block",
            RiskLevel::Critical => "block",
        }
    }

    /// One step up the Safe < Low < Medium < High < Critical ladder,
    /// saturating at Critical.
    fn step_up(self) -> Self {
        match self {
            RiskLevel::Safe => RiskLevel::Low,
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium => RiskLevel::High,
            RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
        }
    }
}

/// A point in time by which `analyze_*` must have finished scoring, or it
/// degrades the signal instead of completing the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(d: Duration) -> Self {
        Deadline(Instant::now() + d)
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlSubScore {
    pub score: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicSummary {
    pub result: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSummary {
    pub name: String,
    pub operation: String,
    pub risk_adjustment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureHighlights {
    pub has_flash_loan: bool,
    pub flash_loan_amount_eth: f64,
    pub unique_contracts: u32,
    pub transfer_count: u32,
    pub max_value_delta_eth: f64,
    pub call_depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub tx_hash: TxHash,
    pub timestamp: DateTime<Utc>,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub raw_risk_score: f64,
    pub confidence: f64,
    pub ml: MlSubScore,
    pub heuristic: HeuristicSummary,
    pub protocol: ProtocolSummary,
    pub risk_indicators: Vec<String>,
    pub features: FeatureHighlights,
    pub recommended_action: String,
    pub explanation: String,
    pub latency_ms: f64,
    pub model_version: String,
}

impl RiskSignal {
    pub fn to_alert_message(&self) -> String {
        let marker = match self.risk_level {
            RiskLevel::Safe => "✅",
            RiskLevel::Low => "ℹ️",
            RiskLevel::Medium => "⚠️",
            RiskLevel::High => "🚨",
            RiskLevel::Critical => "🔥",
        };
        format!(
            "{marker} [{}] {} score={:.4} confidence={:.2} action={} — {}",
            self.risk_level.as_str(),
            self.tx_hash,
            self.risk_score,
            self.confidence,
            self.recommended_action,
            self.explanation
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_analyzed: u64,
    pub safe_count: u64,
    pub low_count: u64,
    pub medium_count: u64,
    pub high_count: u64,
    pub critical_count: u64,
    pub avg_latency_ms: f64,
    pub alert_rate: f64,
}

struct Counters {
    total: AtomicU64,
    safe: AtomicU64,
    low: AtomicU64,
    medium: AtomicU64,
    high: AtomicU64,
    critical: AtomicU64,
    alerted: AtomicU64,
    total_latency_ms: Mutex<f64>,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            total: AtomicU64::new(0),
            safe: AtomicU64::new(0),
            low: AtomicU64::new(0),
            medium: AtomicU64::new(0),
            high: AtomicU64::new(0),
            critical: AtomicU64::new(0),
            alerted: AtomicU64::new(0),
            total_latency_ms: Mutex::new(0.0),
        }
    }
}

impl Counters {
    fn record(&self, level: RiskLevel, latency_ms: f64, alerted: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        match level {
            RiskLevel::Safe => self.safe.fetch_add(1, Ordering::Relaxed),
            RiskLevel::Low => self.low.fetch_add(1, Ordering::Relaxed),
            RiskLevel::Medium => self.medium.fetch_add(1, Ordering::Relaxed),
            RiskLevel::High => self.high.fetch_add(1, Ordering::Relaxed),
            RiskLevel::Critical => self.critical.fetch_add(1, Ordering::Relaxed),
        };
        if alerted {
            self.alerted.fetch_add(1, Ordering::Relaxed);
        }
        *self.total_latency_ms.lock() += latency_ms;
    }

    fn snapshot(&self) -> EngineStats {
        let total = self.total.load(Ordering::Relaxed);
        let avg_latency_ms = if total > 0 { *self.total_latency_ms.lock() / total as f64 } else { 0.0 };
        let alerted = self.alerted.load(Ordering::Relaxed);
        EngineStats {
            total_analyzed: total,
            safe_count: self.safe.load(Ordering::Relaxed),
            low_count: self.low.load(Ordering::Relaxed),
            medium_count: self.medium.load(Ordering::Relaxed),
            high_count: self.high.load(Ordering::Relaxed),
            critical_count: self.critical.load(Ordering::Relaxed),
            avg_latency_ms,
            alert_rate: if total > 0 { alerted as f64 / total as f64 } else { 0.0 },
        }
    }
}

struct SinkEntry {
    sink: Box<dyn AlertSink>,
    min_level: RiskLevel,
}

/// Registries and an optional scorer, assembled once at construction and
/// shared read-only across every analysis thereafter.
pub struct SentinelEngine {
    config: EngineConfig,
    scorer: Option<Arc<dyn Scorer>>,
    chain: Arc<dyn ChainHandle>,
    heuristic_cfg: HeuristicConfig,
    protocol_cfg: ProtocolConfig,
    bytecode_ctx: BytecodeContext,
    sinks: Vec<SinkEntry>,
    counters: Counters,
    recent_alerts: RwLock<VecDeque<RiskSignal>>,
}

impl SentinelEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            scorer: None,
            chain: Arc::new(NullChainHandle),
            heuristic_cfg: HeuristicConfig::default(),
            protocol_cfg: ProtocolConfig::default(),
            bytecode_ctx: BytecodeContext::default(),
            sinks: Vec::new(),
            counters: Counters::default(),
            recent_alerts: RwLock::new(VecDeque::new()),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_chain(mut self, chain: Arc<dyn ChainHandle>) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_heuristic_config(mut self, cfg: HeuristicConfig) -> Self {
        self.heuristic_cfg = cfg;
        self
    }

    pub fn with_protocol_config(mut self, cfg: ProtocolConfig) -> Self {
        self.protocol_cfg = cfg;
        self
    }

    pub fn with_bytecode_context(mut self, ctx: BytecodeContext) -> Self {
        self.bytecode_ctx = ctx;
        self
    }

    /// Sinks may be added but never removed during operation, per the
    /// shared-resource policy.
    pub fn add_sink(&mut self, sink: Box<dyn AlertSink>, min_level: RiskLevel) {
        self.sinks.push(SinkEntry { sink, min_level });
    }

    pub fn get_stats(&self) -> EngineStats {
        self.counters.snapshot()
    }

    pub fn quick_filter(&self, tx: &PendingTransaction) -> bool {
        heuristic::quick_filter(tx)
    }

    pub fn analyze_pending(&self, tx: &PendingTransaction, deadline: Option<Deadline>) -> RiskSignal {
        let start = Instant::now();
        let quick = heuristic::filter(tx, &self.heuristic_cfg);

        if !quick.should_analyze {
            let signal = self.fast_path_signal(tx.hash, &quick, start);
            self.finish(signal)
        } else {
            let record = aggregator::extract_from_pending(tx, &self.bytecode_ctx);
            let heuristic_result = heuristic::filter_with_features(&record);
            let signal = self.fuse(
                tx.hash,
                &record,
                &heuristic_result,
                tx.to.as_ref(),
                tx.selector().as_ref(),
                start,
                deadline,
            );
            self.finish(signal)
        }
    }

    pub fn analyze_trace(&self, trace: &ExecutedTrace, deadline: Option<Deadline>) -> RiskSignal {
        let start = Instant::now();
        let record = aggregator::extract_from_trace(trace, self.chain.as_ref(), &self.bytecode_ctx);
        let heuristic_result = heuristic::filter_with_features(&record);
        let selector = selector_of(&trace.input);
        let signal = self.fuse(
            trace.tx_hash,
            &record,
            &heuristic_result,
            trace.to.as_ref(),
            selector.as_ref(),
            start,
            deadline,
        );
        self.finish(signal)
    }

    /// Degraded signal for a caller whose trace acquisition (the
    /// fork-replay/simulation step that produces an [`ExecutedTrace`] —
    /// out of scope for this crate) timed out or errored before an
    /// `ExecutedTrace` was ever available to hand to `analyze_trace`.
    /// The indicator is `simulation_timeout` when `timed_out` is true,
    /// `simulation_error` otherwise; per §5/§7 a timeout combined with
    /// any other already-known indicator bumps the level one step
    /// (`other_indicators` lets an upstream caller pass along whatever it
    /// had already flagged about the pending transaction, e.g. from the
    /// heuristic pre-filter).
    pub fn trace_acquisition_failed(
        &self,
        tx_hash: TxHash,
        timed_out: bool,
        other_indicators: &[String],
    ) -> RiskSignal {
        let start = Instant::now();
        let tag = if timed_out { "simulation_timeout" } else { "simulation_error" };
        let mut indicators = other_indicators.to_vec();
        push_unique(&mut indicators, tag);

        let mut level = RiskLevel::Low;
        if timed_out && !other_indicators.is_empty() {
            level = level.step_up();
        }

        let signal = RiskSignal {
            tx_hash,
            timestamp: Utc::now(),
            risk_level: level,
            risk_score: 0.0,
            raw_risk_score: 0.0,
            confidence: 0.0,
            ml: MlSubScore { score: 0.0, confidence: 0.0 },
            heuristic: HeuristicSummary { result: Verdict::Unknown.as_str().to_string(), confidence: 0.0 },
            protocol: ProtocolSummary { name: "unknown".to_string(), operation: "unknown".to_string(), risk_adjustment: 0.0 },
            risk_indicators: indicators,
            features: FeatureHighlights {
                has_flash_loan: false,
                flash_loan_amount_eth: 0.0,
                unique_contracts: 0,
                transfer_count: 0,
                max_value_delta_eth: 0.0,
                call_depth: 0,
            },
            recommended_action: level.recommended_action().to_string(),
            explanation: format!("trace acquisition {} before a trace was available", if timed_out { "timed out" } else { "failed" }),
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            model_version: MODEL_VERSION.to_string(),
        };
        self.finish(signal)
    }

    /// Builds the minimal signal for a pending transaction the cheap
    /// table already resolved (simple transfer, or otherwise cleared
    /// without running C6-C9).
    fn fast_path_signal(&self, tx_hash: TxHash, quick: &HeuristicResult, start: Instant) -> RiskSignal {
        RiskSignal {
            tx_hash,
            timestamp: Utc::now(),
            risk_level: RiskLevel::Safe,
            risk_score: 0.0,
            raw_risk_score: 0.0,
            confidence: quick.confidence,
            ml: MlSubScore { score: 0.0, confidence: 0.0 },
            heuristic: HeuristicSummary { result: quick.verdict.as_str().to_string(), confidence: quick.confidence },
            protocol: ProtocolSummary { name: "unknown".to_string(), operation: "unknown".to_string(), risk_adjustment: 0.0 },
            risk_indicators: quick.indicators.clone(),
            features: FeatureHighlights {
                has_flash_loan: false,
                flash_loan_amount_eth: 0.0,
                unique_contracts: 0,
                transfer_count: 0,
                max_value_delta_eth: 0.0,
                call_depth: 0,
            },
            recommended_action: RiskLevel::Safe.recommended_action().to_string(),
            explanation: "simple transfer, cleared without full analysis".to_string(),
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            model_version: MODEL_VERSION.to_string(),
        }
    }

    fn fuse(
        &self,
        tx_hash: TxHash,
        record: &FeatureRecord,
        heuristic_result: &HeuristicResult,
        to: Option<&[u8; 20]>,
        selector: Option<&[u8; 4]>,
        start: Instant,
        deadline: Option<Deadline>,
    ) -> RiskSignal {
        let mut indicators = heuristic_result.indicators.clone();

        let timed_out = deadline.map(|d| d.is_expired()).unwrap_or(false);
        if timed_out {
            push_unique(&mut indicators, "analysis_timeout");
            return RiskSignal {
                tx_hash,
                timestamp: Utc::now(),
                risk_level: RiskLevel::Low,
                risk_score: 0.0,
                raw_risk_score: 0.0,
                confidence: heuristic_result.confidence,
                ml: MlSubScore { score: 0.0, confidence: 0.0 },
                heuristic: HeuristicSummary {
                    result: heuristic_result.verdict.as_str().to_string(),
                    confidence: heuristic_result.confidence,
                },
                protocol: ProtocolSummary { name: "unknown".to_string(), operation: "unknown".to_string(), risk_adjustment: 0.0 },
                risk_indicators: indicators,
                features: feature_highlights(record),
                recommended_action: RiskLevel::Low.recommended_action().to_string(),
                explanation: "analysis deadline exceeded before scoring completed".to_string(),
                latency_ms: start.elapsed().as_secs_f64() * 1000.0,
                model_version: MODEL_VERSION.to_string(),
            };
        }

        let vector = record.to_vector();
        let detection = self.scorer.as_ref().map(|s| s.predict(&vector));

        let anomaly_score = detection.as_ref().map(|d| d.score).unwrap_or(0.0);
        let detector_confidence = detection.as_ref().map(|d| d.confidence).unwrap_or(0.0);
        let is_anomaly = detection.as_ref().map(|d| d.is_anomaly).unwrap_or(false);

        let indicator_fraction = (indicators.len().min(10)) as f64 / 10.0;
        let raw_score = if self.scorer.is_some() {
            0.4 * indicator_fraction + 0.6 * anomaly_score
        } else {
            0.4 * indicator_fraction
        };
        let raw_confidence = if self.scorer.is_some() {
            0.4 * heuristic_result.confidence + 0.6 * detector_confidence
        } else {
            heuristic_result.confidence
        };

        let pre_adjustment_level = if heuristic_result.verdict == Verdict::Suspicious && heuristic_result.confidence > 0.9 {
            RiskLevel::Critical
        } else if heuristic_result.verdict == Verdict::Suspicious && is_anomaly {
            RiskLevel::High
        } else if heuristic_result.verdict == Verdict::Suspicious {
            RiskLevel::Medium
        } else if is_anomaly {
            if detector_confidence > 0.7 {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            }
        } else if indicators.len() >= 2 {
            RiskLevel::Low
        } else {
            RiskLevel::Safe
        };
        let protocol_result = if self.config.enable_protocol_filter {
            protocol::filter(
                to,
                selector,
                record.flash_loan.has_flash_loan,
                record.opcode.total_calls as u64,
                record.state_variance.unique_contracts,
                record.flash_loan.total_borrowed,
                &self.protocol_cfg,
            )
        } else {
            protocol::ProtocolFilterResult::default()
        };

        let adjusted_score = protocol::apply_adjustment(raw_score, protocol_result.risk_adjustment);
        let risk_level = RiskLevel::from_adjusted_score(adjusted_score);

        let explanation =
            build_explanation(heuristic_result, is_anomaly, &protocol_result, pre_adjustment_level, risk_level);

        RiskSignal {
            tx_hash,
            timestamp: Utc::now(),
            risk_level,
            risk_score: (adjusted_score * 10000.0).round() / 10000.0,
            raw_risk_score: raw_score,
            confidence: raw_confidence,
            ml: MlSubScore { score: anomaly_score, confidence: detector_confidence },
            heuristic: HeuristicSummary {
                result: heuristic_result.verdict.as_str().to_string(),
                confidence: heuristic_result.confidence,
            },
            protocol: ProtocolSummary {
                name: protocol_result.protocol.as_str().to_string(),
                operation: protocol_result.operation.as_str().to_string(),
                risk_adjustment: protocol_result.risk_adjustment,
            },
            risk_indicators: indicators,
            features: feature_highlights(record),
            recommended_action: risk_level.recommended_action().to_string(),
            explanation,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            model_version: MODEL_VERSION.to_string(),
        }
    }

    fn finish(&self, signal: RiskSignal) -> RiskSignal {
        let alerts_at_all = self.sinks.iter().any(|e| signal.risk_level >= e.min_level);
        self.counters.record(signal.risk_level, signal.latency_ms, alerts_at_all);

        {
            let mut ring = self.recent_alerts.write();
            if signal.risk_level >= self.config.min_alert_level {
                ring.push_back(signal.clone());
                while ring.len() > self.config.recent_alerts_ring_size {
                    ring.pop_front();
                }
            }
        }

        for entry in &self.sinks {
            if signal.risk_level >= entry.min_level {
                if let Err(e) = entry.sink.dispatch(&signal) {
                    tracing::warn!(tx_hash = %signal.tx_hash, error = %e, "sink dispatch failed");
                }
            }
        }

        tracing::debug!(
            tx_hash = %signal.tx_hash,
            risk_level = signal.risk_level.as_str(),
            latency_ms = signal.latency_ms,
            "analysis complete"
        );

        signal
    }
}

fn selector_of(input: &[u8]) -> Option<[u8; 4]> {
    if input.len() < 4 {
        return None;
    }
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&input[..4]);
    Some(sel)
}

fn feature_highlights(record: &FeatureRecord) -> FeatureHighlights {
    FeatureHighlights {
        has_flash_loan: record.flash_loan.has_flash_loan,
        flash_loan_amount_eth: record.flash_loan.total_borrowed as f64 / 1e18,
        unique_contracts: record.state_variance.unique_contracts,
        transfer_count: record.state_variance.total_changes,
        max_value_delta_eth: record.state_variance.max_delta as f64 / 1e18,
        call_depth: record.opcode.call_depth,
    }
}

fn push_unique(list: &mut Vec<String>, tag: &str) {
    if !list.iter().any(|t| t == tag) {
        list.push(tag.to_string());
    }
}

fn build_explanation(
    heuristic_result: &HeuristicResult,
    is_anomaly: bool,
    protocol_result: &protocol::ProtocolFilterResult,
    pre_adjustment_level: RiskLevel,
    level: RiskLevel,
) -> String {
    let mut clauses = Vec::new();
    clauses.push(format!("heuristic verdict {}", heuristic_result.verdict.as_str()));
    if is_anomaly {
        clauses.push("anomaly detector flagged the feature vector".to_string());
    }
    if protocol_result.protocol != crate::protocol::Protocol::Unknown {
        clauses.push(format!("protocol identified as {}", protocol_result.protocol.as_str()));
    }
    if protocol_result.risk_adjustment.abs() > f64::EPSILON {
        clauses.push(format!("adjustment {:.2}", protocol_result.risk_adjustment));
    }
    if pre_adjustment_level != level {
        clauses.push(format!("pre-adjustment level was {}", pre_adjustment_level.as_str()));
    }
    clauses.push(format!("final level {}", level.as_str()));
    clauses.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::CallTree;

    fn pending_transfer() -> PendingTransaction {
        PendingTransaction {
            hash: TxHash([1; 32]),
            from: [0; 20],
            to: Some([2; 20]),
            value: 10u128.pow(18),
            input: vec![],
            gas_limit: 21000,
            gas_price: 1,
            nonce: 0,
        }
    }

    #[test]
    fn simple_transfer_fast_path_is_safe() {
        let engine = SentinelEngine::new(EngineConfig::default());
        let signal = engine.analyze_pending(&pending_transfer(), None);
        assert_eq!(signal.risk_level, RiskLevel::Safe);
        assert!(signal.risk_indicators.is_empty());
        assert_eq!(signal.heuristic.confidence, 0.99);
    }

    #[test]
    fn canonical_dict_uses_lowercase_level_and_hex_tx_hash() {
        let engine = SentinelEngine::new(EngineConfig::default());
        let signal = engine.analyze_pending(&pending_transfer(), None);
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["risk_level"], "safe");
        let expected_hash = format!("0x{}", "01".repeat(32));
        assert_eq!(value["tx_hash"], expected_hash);
        assert_eq!(value["tx_hash"].as_str().unwrap().len(), 66);
    }

    #[test]
    fn empty_trace_yields_low_or_safe_signal() {
        let engine = SentinelEngine::new(EngineConfig::default());
        let trace = ExecutedTrace {
            tx_hash: TxHash([2; 32]),
            from: [0; 20],
            to: Some([1; 20]),
            value: 0,
            input: vec![],
            gas_used: 0,
            gas_limit: 0,
            call_tree: CallTree::default(),
            storage_changes: vec![],
            logs: vec![],
            created_contract_bytecode: None,
            reverted: false,
        };
        let signal = engine.analyze_trace(&trace, None);
        assert!(signal.risk_level == RiskLevel::Safe || signal.risk_level == RiskLevel::Low);
        assert!((0.0..=1.0).contains(&signal.risk_score));
    }

    #[test]
    fn counters_are_monotonically_increasing() {
        let engine = SentinelEngine::new(EngineConfig::default());
        engine.analyze_pending(&pending_transfer(), None);
        engine.analyze_pending(&pending_transfer(), None);
        let stats = engine.get_stats();
        assert_eq!(stats.total_analyzed, 2);
    }

    #[test]
    fn expired_deadline_degrades_to_low_with_timeout_indicator() {
        let engine = SentinelEngine::new(EngineConfig::default());
        let mut tx = pending_transfer();
        tx.input = vec![1, 2, 3, 4];
        let deadline = Deadline(Instant::now() - Duration::from_millis(1));
        let signal = engine.analyze_pending(&tx, Some(deadline));
        assert_eq!(signal.risk_level, RiskLevel::Low);
        assert!(signal.risk_indicators.iter().any(|i| i == "analysis_timeout"));
    }

    #[test]
    fn trace_acquisition_timeout_alone_stays_at_low() {
        let engine = SentinelEngine::new(EngineConfig::default());
        let signal = engine.trace_acquisition_failed(TxHash([9; 32]), true, &[]);
        assert_eq!(signal.risk_level, RiskLevel::Low);
        assert!(signal.risk_indicators.iter().any(|i| i == "simulation_timeout"));
    }

    #[test]
    fn trace_acquisition_timeout_with_other_indicators_steps_up_one_level() {
        let engine = SentinelEngine::new(EngineConfig::default());
        let signal =
            engine.trace_acquisition_failed(TxHash([9; 32]), true, &["suspicious_selector".to_string()]);
        assert_eq!(signal.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn trace_acquisition_error_without_timeout_uses_simulation_error_tag() {
        let engine = SentinelEngine::new(EngineConfig::default());
        let signal = engine.trace_acquisition_failed(TxHash([9; 32]), false, &[]);
        assert!(signal.risk_indicators.iter().any(|i| i == "simulation_error"));
    }
}
