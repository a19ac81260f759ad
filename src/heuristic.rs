//! C7 — Heuristic Filter.
//!
//! Two entry points: a cheap table over a raw pending transaction (before
//! any feature extraction has happened), and a richer table over an
//! already-assembled feature record.

use std::collections::HashSet;

use crate::features::FeatureRecord;
use crate::trace::PendingTransaction;

const LARGE_VALUE_THRESHOLD: u128 = 10u128.pow(19); // 10 ETH-equivalent
const HIGH_GAS_THRESHOLD: u64 = 1_000_000;
const LARGE_FLASH_LOAN_THRESHOLD: u128 = 10u128.pow(24);
const EXTREME_DELTA_THRESHOLD: u128 = 10u128.pow(22);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Verdict {
    Safe,
    Suspicious,
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Safe => "safe",
            Verdict::Suspicious => "suspicious",
            Verdict::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HeuristicResult {
    pub verdict: Verdict,
    pub confidence: f64,
    pub should_analyze: bool,
    pub indicators: Vec<String>,
}

/// Registries the heuristic filter consults, passed in rather than kept as
/// ambient globals so callers and tests can vary them freely.
#[derive(Debug, Clone, Default)]
pub struct HeuristicConfig {
    pub whitelisted_contracts: HashSet<[u8; 20]>,
    pub safe_selectors: HashSet<[u8; 4]>,
    pub suspicious_selectors: HashSet<[u8; 4]>,
}

impl HeuristicConfig {
    pub fn add_whitelisted_contract(&mut self, address: [u8; 20]) {
        self.whitelisted_contracts.insert(address);
    }

    pub fn add_safe_selector(&mut self, selector: [u8; 4]) {
        self.safe_selectors.insert(selector);
    }

    pub fn add_suspicious_selector(&mut self, selector: [u8; 4]) {
        self.suspicious_selectors.insert(selector);
    }
}

fn push_unique(list: &mut Vec<String>, tag: &str) {
    if !list.iter().any(|t| t == tag) {
        list.push(tag.to_string());
    }
}

/// Cheap yes/no check ahead of the full table: is this transaction worth
/// running the pipeline on at all.
pub fn quick_filter(tx: &PendingTransaction) -> bool {
    !tx.is_simple_transfer()
}

pub fn filter(tx: &PendingTransaction, cfg: &HeuristicConfig) -> HeuristicResult {
    if tx.is_simple_transfer() {
        return HeuristicResult {
            verdict: Verdict::Safe,
            confidence: 0.99,
            should_analyze: false,
            indicators: vec![],
        };
    }

    let mut reasons: Vec<String> = Vec::new();
    let mut indicators: Vec<String> = Vec::new();

    if tx.gas_limit < 100_000 && tx.value == 0 {
        push_unique(&mut reasons, "low_gas_no_value");
    }
    if let Some(to) = tx.to {
        if cfg.whitelisted_contracts.contains(&to) {
            push_unique(&mut reasons, "whitelisted_contract");
        }
    }
    if let Some(sel) = tx.selector() {
        if cfg.safe_selectors.contains(&sel) {
            push_unique(&mut reasons, "safe_selector");
        }
        if cfg.suspicious_selectors.contains(&sel) {
            push_unique(&mut indicators, "suspicious_selector");
        }
    }
    if tx.is_contract_creation() {
        push_unique(&mut indicators, "contract_creation");
    }
    if tx.value >= LARGE_VALUE_THRESHOLD {
        push_unique(&mut indicators, "large_value_transfer");
    }
    if tx.gas_limit >= HIGH_GAS_THRESHOLD {
        push_unique(&mut indicators, "high_gas_limit");
    }

    if reasons.len() >= 2 && indicators.is_empty() {
        return HeuristicResult { verdict: Verdict::Safe, confidence: 0.90, should_analyze: false, indicators };
    }
    if indicators.len() >= 2 {
        return HeuristicResult { verdict: Verdict::Suspicious, confidence: 0.70, should_analyze: true, indicators };
    }
    HeuristicResult { verdict: Verdict::Unknown, confidence: 0.50, should_analyze: true, indicators }
}

pub fn filter_with_features(features: &FeatureRecord) -> HeuristicResult {
    if features.bytecode.matches_exploit {
        return HeuristicResult {
            verdict: Verdict::Suspicious,
            confidence: 0.95,
            should_analyze: true,
            indicators: vec!["matches_known_exploit".to_string()],
        };
    }

    let mut indicators: Vec<String> = Vec::new();
    let fl = &features.flash_loan;
    let sv = &features.state_variance;
    let bc = &features.bytecode;
    let op = &features.opcode;

    if fl.has_flash_loan {
        push_unique(&mut indicators, "flash_loan_detected");
    }
    if fl.nested {
        push_unique(&mut indicators, "nested_flash_loan");
    }
    if fl.total_borrowed > LARGE_FLASH_LOAN_THRESHOLD {
        push_unique(&mut indicators, "large_flash_loan");
    }
    if fl.has_flash_loan
        && (sv.large_changes >= 2 || sv.total_changes >= 10 || sv.max_delta > EXTREME_DELTA_THRESHOLD)
    {
        push_unique(&mut indicators, "flash_loan_state_impact");
    }
    if sv.variance_ratio > 0.5 {
        push_unique(&mut indicators, "high_variance_ratio");
    }
    if sv.large_changes >= 4 {
        push_unique(&mut indicators, "multiple_large_changes");
    }
    if sv.max_delta > EXTREME_DELTA_THRESHOLD {
        push_unique(&mut indicators, "extreme_max_delta");
    }
    if bc.jaccard > 0.7 {
        push_unique(&mut indicators, "bytecode_similarity");
    }
    if bc.is_contract && bc.age_blocks < 100 {
        push_unique(&mut indicators, "young_contract");
    }
    if bc.has_selfdestruct {
        push_unique(&mut indicators, "selfdestruct_present");
    }
    if op.delegatecall > 0 {
        push_unique(&mut indicators, "delegatecall_present");
    }
    if op.create2 > 0 {
        push_unique(&mut indicators, "create2_present");
    }
    if op.call_depth > 10 {
        push_unique(&mut indicators, "deep_call_stack");
    }
    if op.total_calls > 50 {
        push_unique(&mut indicators, "high_call_count");
    }

    let n = indicators.len();
    if n == 0 {
        HeuristicResult { verdict: Verdict::Safe, confidence: 0.80, should_analyze: true, indicators }
    } else if n >= 3 {
        let confidence = (0.50 + 0.10 * n as f64).min(0.95);
        HeuristicResult { verdict: Verdict::Suspicious, confidence, should_analyze: true, indicators }
    } else {
        HeuristicResult { verdict: Verdict::Unknown, confidence: 0.50, should_analyze: true, indicators }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{BytecodeFeatures, FlashLoanFeatures, OpcodeFeatures, StateVarianceFeatures};
    use crate::trace::TxHash;
    use std::collections::HashMap;

    fn blank_tx() -> PendingTransaction {
        PendingTransaction {
            hash: TxHash([0; 32]),
            from: [0; 20],
            to: Some([1; 20]),
            value: 0,
            input: vec![],
            gas_limit: 21000,
            gas_price: 1,
            nonce: 0,
        }
    }

    fn blank_record() -> FeatureRecord {
        FeatureRecord {
            flash_loan: FlashLoanFeatures::default(),
            state_variance: StateVarianceFeatures::default(),
            bytecode: BytecodeFeatures::default(),
            opcode: OpcodeFeatures::default(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn simple_transfer_is_always_safe() {
        let tx = blank_tx();
        let res = filter(&tx, &HeuristicConfig::default());
        assert_eq!(res.verdict, Verdict::Safe);
        assert_eq!(res.confidence, 0.99);
        assert!(!res.should_analyze);
        assert!(res.indicators.is_empty());
    }

    #[test]
    fn known_exploit_short_circuits_regardless_of_other_indicators() {
        let mut record = blank_record();
        record.bytecode.matches_exploit = true;
        record.opcode.call_depth = 20;
        let res = filter_with_features(&record);
        assert_eq!(res.verdict, Verdict::Suspicious);
        assert_eq!(res.confidence, 0.95);
    }

    #[test]
    fn zero_indicators_is_safe() {
        let res = filter_with_features(&blank_record());
        assert_eq!(res.verdict, Verdict::Safe);
        assert_eq!(res.confidence, 0.80);
    }

    #[test]
    fn three_indicators_applies_linear_confidence_formula() {
        let mut record = blank_record();
        record.flash_loan.has_flash_loan = true;
        record.opcode.delegatecall = 1;
        record.opcode.create2 = 1;
        let res = filter_with_features(&record);
        assert_eq!(res.verdict, Verdict::Suspicious);
        assert!((res.confidence - 0.80).abs() < 1e-9);
    }

    #[test]
    fn many_indicators_saturate_confidence_at_point_nine_five() {
        let mut record = blank_record();
        record.flash_loan.has_flash_loan = true;
        record.flash_loan.nested = true;
        record.flash_loan.total_borrowed = LARGE_FLASH_LOAN_THRESHOLD + 1;
        record.state_variance.large_changes = 4;
        record.state_variance.max_delta = EXTREME_DELTA_THRESHOLD + 1;
        record.bytecode.has_selfdestruct = true;
        record.opcode.delegatecall = 1;
        record.opcode.create2 = 1;
        let res = filter_with_features(&record);
        assert_eq!(res.verdict, Verdict::Suspicious);
        assert_eq!(res.confidence, 0.95);
    }
}
