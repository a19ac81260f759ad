//! C6 — Feature Aggregator.
//!
//! Dispatches to C2-C5 and concatenates their outputs into the 43-element
//! vector the detector (C8) expects. The field order here is the public
//! contract: reordering any sub-record is a breaking change.

use std::collections::HashMap;

use crate::chain::ChainHandle;
use crate::trace::{ExecutedTrace, PendingTransaction};

use super::bytecode::{self, BytecodeFeatures};
use super::flash_loan::{self, FlashLoanFeatures};
use super::opcode::{self, OpcodeFeatures};
use super::state_variance::{self, StateVarianceFeatures};

pub const VECTOR_LEN: usize = 43;

pub const FEATURE_NAMES: [&str; VECTOR_LEN] = [
    "fl_has_flash_loan",
    "fl_count",
    "fl_provider_count",
    "fl_total_borrowed",
    "fl_has_callback",
    "fl_callback_count",
    "fl_nested",
    "fl_repayment",
    "sv_total_changes",
    "sv_unique_contracts",
    "sv_unique_slots",
    "sv_balance_changes",
    "sv_large_changes",
    "sv_max_delta",
    "sv_avg_delta",
    "sv_variance_ratio",
    "sv_zero_to_nonzero",
    "sv_nonzero_to_zero",
    "bc_length",
    "bc_is_contract",
    "bc_is_proxy",
    "bc_age_blocks",
    "bc_is_verified",
    "bc_matches_exploit",
    "bc_jaccard",
    "bc_has_selfdestruct",
    "bc_has_delegatecall",
    "bc_has_create2",
    "bc_unique_opcodes",
    "op_total_calls",
    "op_call_depth",
    "op_delegatecall",
    "op_staticcall",
    "op_create",
    "op_create2",
    "op_selfdestruct",
    "op_call",
    "op_internal_calls",
    "op_external_calls",
    "op_unique_call_types",
    "op_value_transfers",
    "op_gas_ratio",
    "op_revert_count",
];

/// Knobs the bytecode extractor needs; kept together since they always
/// travel as a pair wherever C4 is invoked.
#[derive(Debug, Clone, Default)]
pub struct BytecodeContext {
    pub known_exploits: Vec<Vec<u8>>,
    pub similarity_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureRecord {
    pub flash_loan: FlashLoanFeatures,
    pub state_variance: StateVarianceFeatures,
    pub bytecode: BytecodeFeatures,
    pub opcode: OpcodeFeatures,
    pub metadata: HashMap<String, String>,
}

impl FeatureRecord {
    pub fn to_vector(&self) -> [f64; VECTOR_LEN] {
        let mut out = [0.0f64; VECTOR_LEN];
        out[0..8].copy_from_slice(&self.flash_loan.to_vector());
        out[8..18].copy_from_slice(&self.state_variance.to_vector());
        out[18..29].copy_from_slice(&self.bytecode.to_vector());
        out[29..43].copy_from_slice(&self.opcode.to_vector());
        out
    }

    pub fn feature_names() -> &'static [&'static str; VECTOR_LEN] {
        &FEATURE_NAMES
    }
}

/// Full path: uses all four extractors. Bytecode extraction requires a
/// chain handle; when the `to` address has no resolvable code the record
/// degrades to an empty bytecode sub-record instead of failing.
pub fn extract_from_trace(
    trace: &ExecutedTrace,
    chain: &dyn ChainHandle,
    ctx: &BytecodeContext,
) -> FeatureRecord {
    let fl = flash_loan::extract(trace);
    let sv = state_variance::extract(trace);
    let op = opcode::extract(trace);

    let bc = if let Some(init_code) = &trace.created_contract_bytecode {
        bytecode::extract_from_creation_input(init_code, &ctx.known_exploits, ctx.similarity_threshold)
    } else if let Some(to) = trace.to {
        match chain.get_code(&to, None) {
            Ok(code) if !code.is_empty() => {
                bytecode::extract(&code, &to, chain, &ctx.known_exploits, ctx.similarity_threshold)
            }
            _ => BytecodeFeatures::default(),
        }
    } else {
        BytecodeFeatures::default()
    };

    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), "trace".to_string());
    metadata.insert("tx_hash".to_string(), trace.tx_hash.to_string());

    FeatureRecord { flash_loan: fl, state_variance: sv, bytecode: bc, opcode: op, metadata }
}

/// Pending-transaction path: C2 runs input-only, state-variance is empty,
/// bytecode only runs for contract creation (driven by the init-code
/// payload), and the opcode record is fabricated from tx predicates.
pub fn extract_from_pending(tx: &PendingTransaction, ctx: &BytecodeContext) -> FeatureRecord {
    let fl = flash_loan::extract_from_pending(tx);
    let sv = StateVarianceFeatures::default();
    let op = opcode::extract_from_pending(tx);

    let bc = if tx.is_contract_creation() {
        bytecode::extract_from_creation_input(&tx.input, &ctx.known_exploits, ctx.similarity_threshold)
    } else {
        BytecodeFeatures::default()
    };

    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), "pending".to_string());
    metadata.insert("tx_hash".to_string(), tx.hash.to_string());

    FeatureRecord { flash_loan: fl, state_variance: sv, bytecode: bc, opcode: op, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::NullChainHandle;
    use crate::trace::{CallTree, TxHash};

    #[test]
    fn vector_is_always_43_long() {
        let trace = ExecutedTrace {
            tx_hash: TxHash([0; 32]),
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
        let ctx = BytecodeContext::default();
        let record = extract_from_trace(&trace, &NullChainHandle, &ctx);
        assert_eq!(record.to_vector().len(), VECTOR_LEN);
        assert_eq!(FeatureRecord::feature_names().len(), VECTOR_LEN);
    }

    #[test]
    fn pending_simple_transfer_yields_empty_feature_record() {
        let tx = PendingTransaction {
            hash: TxHash([0; 32]),
            from: [0; 20],
            to: Some([1; 20]),
            value: 10u128.pow(18),
            input: vec![],
            gas_limit: 21000,
            gas_price: 1,
            nonce: 0,
        };
        let record = extract_from_pending(&tx, &BytecodeContext::default());
        assert!(!record.flash_loan.has_flash_loan);
        assert!(!record.bytecode.is_contract);
        assert_eq!(record.opcode.total_calls, 0);
    }
}
