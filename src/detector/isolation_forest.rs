//! Concrete `Scorer`: a standardized isolation-forest ensemble.
//!
//! The artifact is the unit of serialization — everything needed to
//! reproduce identical scores in a fresh process lives on
//! [`ScoringArtifact`], and `IsolationForestScorer` is a thin read-only
//! wrapper around one.

use serde_big_array::BigArray;

use crate::error::{Result, SentinelError};
use crate::features::aggregator::{FEATURE_NAMES, VECTOR_LEN};

use super::{FeatureContribution, Scorer};

/// Default subsample size path lengths are normalized against, matching
/// the training default (`n_estimators` trees, each fit on a subsample of
/// this size).
pub const DEFAULT_SUBSAMPLE_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TreeNode {
    Leaf { size: usize },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// One isolation tree: an arena of nodes rooted at index 0. Built offline
/// during training; this crate only walks it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IsolationTree {
    pub nodes: Vec<TreeNode>,
}

impl IsolationTree {
    fn path_length(&self, x: &[f64; VECTOR_LEN]) -> f64 {
        let mut idx = 0usize;
        let mut depth = 0.0f64;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Split { feature, threshold, left, right }) => {
                    depth += 1.0;
                    idx = if x[*feature] < *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { size }) => {
                    return depth + average_path_length(*size);
                }
                None => return depth,
            }
        }
    }
}

/// Average path length of an unsuccessful search in a binary search tree
/// over `n` points — the standard isolation-forest normalization term.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * (harmonic(n - 1.0) ) - (2.0 * (n - 1.0) / n)
}

const EULER_MASCHERONI: f64 = 0.5772156649015329;

fn harmonic(n: f64) -> f64 {
    if n <= 0.0 {
        0.0
    } else {
        n.ln() + EULER_MASCHERONI
    }
}

/// Everything needed to reproduce identical scores in a fresh process:
/// the fitted ensemble, the standardization moments, and the knobs that
/// were frozen in at training time.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScoringArtifact {
    pub trees: Vec<IsolationTree>,
    #[serde(with = "BigArray")]
    pub feature_means: [f64; VECTOR_LEN],
    #[serde(with = "BigArray")]
    pub feature_stds: [f64; VECTOR_LEN],
    pub threshold: f64,
    pub contamination: f64,
    pub subsample_size: usize,
}

impl ScoringArtifact {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SentinelError::ArtifactDecode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: ScoringArtifact =
            bincode::deserialize(bytes).map_err(|e| SentinelError::ArtifactDecode(e.to_string()))?;
        Ok(artifact)
    }

    fn z_scores(&self, x: &[f64; VECTOR_LEN]) -> [f64; VECTOR_LEN] {
        let mut out = [0.0f64; VECTOR_LEN];
        for i in 0..VECTOR_LEN {
            let std = self.feature_stds[i];
            out[i] = if std.abs() < f64::EPSILON { 0.0 } else { (x[i] - self.feature_means[i]) / std };
        }
        out
    }
}

/// Read-only wrapper around a loaded [`ScoringArtifact`]. Construction
/// validates the feature dimension so a mismatched artifact fails at
/// startup rather than silently scoring garbage.
pub struct IsolationForestScorer {
    artifact: ScoringArtifact,
}

impl IsolationForestScorer {
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let artifact = ScoringArtifact::from_bytes(bytes)?;
        for tree in &artifact.trees {
            for node in &tree.nodes {
                if let TreeNode::Split { feature, .. } = node {
                    if *feature >= VECTOR_LEN {
                        return Err(SentinelError::ArtifactDimensionMismatch {
                            expected: VECTOR_LEN,
                            actual: feature + 1,
                        });
                    }
                }
            }
        }
        Ok(Self { artifact })
    }

    pub fn from_artifact(artifact: ScoringArtifact) -> Self {
        Self { artifact }
    }

    fn decision_function(&self, x: &[f64; VECTOR_LEN]) -> f64 {
        if self.artifact.trees.is_empty() {
            return 0.0;
        }
        let z = self.artifact.z_scores(x);
        let avg_path_len = self
            .artifact
            .trees
            .iter()
            .map(|t| t.path_length(&z))
            .sum::<f64>()
            / self.artifact.trees.len() as f64;
        let c = average_path_length(self.artifact.subsample_size).max(1e-9);
        (avg_path_len / c) - 0.5
    }
}

impl Scorer for IsolationForestScorer {
    fn score(&self, vector: &[f64; VECTOR_LEN]) -> f64 {
        let d = self.decision_function(vector);
        (0.5 - d / 2.0).clamp(0.0, 1.0)
    }

    fn threshold(&self) -> f64 {
        self.artifact.threshold
    }

    fn contributions(&self, vector: &[f64; VECTOR_LEN]) -> Vec<FeatureContribution> {
        let z = self.artifact.z_scores(vector);
        let abs_sum: f64 = z.iter().map(|v| v.abs()).sum();

        let mut weighted: Vec<FeatureContribution> = (0..VECTOR_LEN)
            .map(|i| {
                let weight = if abs_sum.abs() < f64::EPSILON { 0.0 } else { z[i].abs() / abs_sum };
                FeatureContribution { feature: FEATURE_NAMES[i], weight }
            })
            .collect();

        weighted.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
        weighted.truncate(10);
        weighted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trivial_artifact() -> ScoringArtifact {
        ScoringArtifact {
            trees: vec![IsolationTree {
                nodes: vec![
                    TreeNode::Split { feature: 0, threshold: 0.0, left: 1, right: 2 },
                    TreeNode::Leaf { size: 1 },
                    TreeNode::Leaf { size: 4 },
                ],
            }],
            feature_means: [0.0; VECTOR_LEN],
            feature_stds: [1.0; VECTOR_LEN],
            threshold: 0.65,
            contamination: 0.1,
            subsample_size: DEFAULT_SUBSAMPLE_SIZE,
        }
    }

    #[test]
    fn score_is_clamped_to_unit_interval() {
        let scorer = IsolationForestScorer::from_artifact(trivial_artifact());
        let mut v = [0.0f64; VECTOR_LEN];
        v[0] = 50.0;
        let s = scorer.score(&v);
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn contributions_sum_to_one_and_cap_at_ten() {
        let scorer = IsolationForestScorer::from_artifact(trivial_artifact());
        let mut v = [1.0f64; VECTOR_LEN];
        v[0] = 10.0;
        let contributions = scorer.contributions(&v);
        assert!(contributions.len() <= 10);
        let sum: f64 = contributions.iter().map(|c| c.weight).sum();
        assert!((sum - 1.0).abs() < 1e-6 || contributions.is_empty());
    }

    #[test]
    fn artifact_round_trips_through_bincode() {
        let artifact = trivial_artifact();
        let bytes = artifact.to_bytes().unwrap();
        let reloaded = ScoringArtifact::from_bytes(&bytes).unwrap();
        let a = IsolationForestScorer::from_artifact(artifact);
        let b = IsolationForestScorer::from_artifact(reloaded);
        let v = [2.0f64; VECTOR_LEN];
        assert_eq!(a.score(&v), b.score(&v));
    }

    #[test]
    fn load_accepts_a_well_formed_artifact() {
        let bytes = trivial_artifact().to_bytes().unwrap();
        assert!(IsolationForestScorer::load(&bytes).is_ok());
    }
}
