use serde::{Deserialize, Serialize};

use crate::engine::RiskLevel;

/// Runtime configuration for a [`crate::engine::SentinelEngine`].
///
/// Every field here corresponds to an enumerated knob in the external
/// configuration contract; none of it is ambient global state, so the same
/// process can run multiple independently-tuned engines (e.g. one per
/// chain) side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Training contamination parameter frozen into the scoring artifact.
    /// Not adjustable post-load; kept here only for observability.
    pub contamination: f64,

    /// Anomaly score at or above which the detector flags `is_anomaly`.
    pub anomaly_threshold: f64,

    /// Minimum risk level a sink must declare to receive a fanned-out signal.
    pub min_alert_level: RiskLevel,

    pub enable_protocol_filter: bool,
    pub enable_bounds_check: bool,

    /// Deadline for trace acquisition in simulation-integrated deployments.
    pub simulation_timeout_ms: u64,

    /// Jaccard-similarity threshold above which bytecode is flagged as
    /// matching a known-bad sample without being an exact hash match.
    pub bytecode_similarity_threshold: f64,

    /// Bound on the engine's in-memory recent-alerts ring.
    pub recent_alerts_ring_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            anomaly_threshold: 0.65,
            min_alert_level: RiskLevel::Medium,
            enable_protocol_filter: true,
            enable_bounds_check: true,
            simulation_timeout_ms: 200,
            bytecode_similarity_threshold: 0.9,
            recent_alerts_ring_size: 100,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(s: &str) -> crate::error::Result<Self> {
        toml::from_str(s).map_err(|e| crate::error::SentinelError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> crate::error::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::error::SentinelError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.contamination, 0.1);
        assert_eq!(cfg.anomaly_threshold, 0.65);
        assert_eq!(cfg.min_alert_level, RiskLevel::Medium);
        assert_eq!(cfg.simulation_timeout_ms, 200);
        assert_eq!(cfg.recent_alerts_ring_size, 100);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = EngineConfig::default();
        let s = cfg.to_toml().unwrap();
        let back = EngineConfig::from_toml(&s).unwrap();
        assert_eq!(cfg.anomaly_threshold, back.anomaly_threshold);
        assert_eq!(cfg.min_alert_level, back.min_alert_level);
    }
}
