//! C8 — Anomaly Detector.
//!
//! The pipeline only depends on the `Scorer` capability set — `score`,
//! `threshold`, `contributions` — never on the isolation-forest family
//! specifically, so an alternative scorer artifact can be swapped in
//! without touching `engine.rs`.

mod isolation_forest;

pub use isolation_forest::{IsolationForestScorer, IsolationTree, ScoringArtifact, TreeNode};

use crate::features::aggregator::VECTOR_LEN;

/// A feature's contribution to the overall anomaly score, expressed as a
/// normalized share (all contributions for one scoring call sum to 1).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureContribution {
    pub feature: &'static str,
    pub weight: f64,
}

/// Output of a single scoring call.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectionResult {
    pub score: f64,
    pub is_anomaly: bool,
    pub confidence: f64,
    pub contributions: Vec<FeatureContribution>,
}

/// Capability set a scoring artifact must expose. `vector` is always
/// exactly [`VECTOR_LEN`] elements in the canonical feature order.
pub trait Scorer: Send + Sync {
    fn score(&self, vector: &[f64; VECTOR_LEN]) -> f64;
    fn threshold(&self) -> f64;
    fn contributions(&self, vector: &[f64; VECTOR_LEN]) -> Vec<FeatureContribution>;

    fn predict(&self, vector: &[f64; VECTOR_LEN]) -> DetectionResult {
        let score = self.score(vector);
        let threshold = self.threshold();
        let is_anomaly = score >= threshold;
        let confidence = (0.5 + (score - threshold).abs()).min(1.0);
        DetectionResult { score, is_anomaly, confidence, contributions: self.contributions(vector) }
    }
}
