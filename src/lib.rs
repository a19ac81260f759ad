//! Online anomaly-detection engine for blockchain transactions.
//!
//! Given either a pending transaction or an executed trace, the engine
//! extracts a fixed-dimension feature vector, scores it through a layered
//! pipeline (heuristic filter, anomaly detector, protocol-aware adjuster),
//! and fuses the result into a single advisory Risk Signal.

pub mod abi;
pub mod chain;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod features;
pub mod heuristic;
pub mod persistence;
pub mod protocol;
pub mod sinks;
pub mod trace;

pub use config::EngineConfig;
pub use engine::{Deadline, RiskLevel, RiskSignal, SentinelEngine};
pub use error::{Result, SentinelError};
