//! Persistence adapter traits.
//!
//! Concrete storage is out of scope — consumers wire these traits to
//! whatever key/value-plus-query store they run. The shapes mirror the
//! three record types the engine's recent-alerts ring and sink fan-out
//! imply: an alert (a signal that crossed a sink threshold), an analysis
//! record (every completed analysis, alerted or not), and a metrics point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{EngineStats, RiskSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    Pending,
    Confirmed,
    FalsePositive,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub status: AlertStatus,
    pub signal: RiskSignal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub signal: RiskSignal,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsPoint {
    pub recorded_at: DateTime<Utc>,
    pub stats: EngineStats,
}

/// Indexed by (status, risk_level, timestamp) in a real backend.
pub trait AlertStore: Send + Sync {
    fn put(&self, alert: &Alert) -> Result<(), String>;
    fn get(&self, id: Uuid) -> Result<Option<Alert>, String>;
    fn set_status(&self, id: Uuid, status: AlertStatus) -> Result<(), String>;
}

/// Indexed by (tx_hash) in a real backend.
pub trait AnalysisStore: Send + Sync {
    fn put(&self, record: &AnalysisRecord) -> Result<(), String>;
    fn get_by_tx_hash(&self, tx_hash: &str) -> Result<Option<AnalysisRecord>, String>;
}
