//! C2-C6 — feature extraction and aggregation.
//!
//! Each extractor is a stateless function over borrowed trace data; none of
//! them hold mutable state or perform I/O, except the bytecode extractor's
//! optional chain-handle lookups, which are the one sanctioned suspension
//! point per the concurrency model.

pub mod aggregator;
pub mod bytecode;
pub mod flash_loan;
pub mod opcode;
pub mod state_variance;

pub use aggregator::FeatureRecord;
pub use bytecode::BytecodeFeatures;
pub use flash_loan::FlashLoanFeatures;
pub use opcode::OpcodeFeatures;
pub use state_variance::StateVarianceFeatures;
