//! C3 — State-Variance Extractor.

use std::collections::HashSet;

use crate::trace::{ExecutedTrace, StorageChange};

/// Canonical low-integer slots treated as balance-like regardless of their
/// numeric value (common fixed slots used by simple accounting contracts).
const CANONICAL_BALANCE_SLOTS: &[[u8; 32]] = &[[0u8; 32]];

const LARGE_CHANGE_THRESHOLD: i128 = 1_000_000_000_000_000_000; // 10^18

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StateVarianceFeatures {
    pub total_changes: u32,
    pub unique_contracts: u32,
    pub unique_slots: u32,
    pub balance_changes: u32,
    pub large_changes: u32,
    pub max_delta: u128,
    pub avg_delta: f64,
    pub variance_ratio: f64,
    pub zero_to_nonzero: u32,
    pub nonzero_to_zero: u32,
}

impl StateVarianceFeatures {
    pub fn to_vector(&self) -> [f64; 10] {
        [
            self.total_changes as f64,
            self.unique_contracts as f64,
            self.unique_slots as f64,
            self.balance_changes as f64,
            self.large_changes as f64,
            self.max_delta as f64,
            self.avg_delta,
            self.variance_ratio,
            self.zero_to_nonzero as f64,
            self.nonzero_to_zero as f64,
        ]
    }
}

fn word_as_i128(word: &[u8; 32]) -> i128 {
    let low = &word[16..32];
    let mut acc: i128 = 0;
    for &b in low {
        acc = acc.saturating_mul(256).saturating_add(b as i128);
    }
    acc
}

fn is_zero(word: &[u8; 32]) -> bool {
    word.iter().all(|&b| b == 0)
}

fn is_balance_slot(slot: &[u8; 32]) -> bool {
    if CANONICAL_BALANCE_SLOTS.contains(slot) {
        return true;
    }
    word_as_i128(slot) < 10
}

fn variance_ratio(deltas: &[i128]) -> f64 {
    if deltas.len() < 2 {
        return 0.0;
    }
    let mean = deltas.iter().map(|d| d.unsigned_abs() as f64).sum::<f64>() / deltas.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = deltas
        .iter()
        .map(|d| {
            let v = d.unsigned_abs() as f64;
            (v - mean).powi(2)
        })
        .sum::<f64>()
        / deltas.len() as f64;
    variance.sqrt() / mean
}

/// Primary path: summarize the executed trace's storage writes directly.
pub fn extract(trace: &ExecutedTrace) -> StateVarianceFeatures {
    if trace.storage_changes.is_empty() && !trace.logs.is_empty() {
        return extract_from_logs(trace);
    }
    extract_from_changes(&trace.storage_changes)
}

fn extract_from_changes(changes: &[StorageChange]) -> StateVarianceFeatures {
    if changes.is_empty() {
        return StateVarianceFeatures::default();
    }

    let mut addresses = HashSet::new();
    let mut slots = HashSet::new();
    let mut balance_changes = 0u32;
    let mut large_changes = 0u32;
    let mut deltas: Vec<i128> = Vec::with_capacity(changes.len());
    let mut zero_to_nonzero = 0u32;
    let mut nonzero_to_zero = 0u32;

    for change in changes {
        addresses.insert(change.address);
        slots.insert((change.address, change.slot));

        if is_balance_slot(&change.slot) {
            balance_changes += 1;
        }

        let before = word_as_i128(&change.before);
        let after = word_as_i128(&change.after);
        let delta = after - before;
        deltas.push(delta);

        if delta.unsigned_abs() as i128 >= LARGE_CHANGE_THRESHOLD {
            large_changes += 1;
        }

        if is_zero(&change.before) && !is_zero(&change.after) {
            zero_to_nonzero += 1;
        }
        if !is_zero(&change.before) && is_zero(&change.after) {
            nonzero_to_zero += 1;
        }
    }

    let max_delta = deltas.iter().map(|d| d.unsigned_abs()).max().unwrap_or(0);
    let avg_delta = deltas.iter().map(|d| d.unsigned_abs() as f64).sum::<f64>() / deltas.len() as f64;

    StateVarianceFeatures {
        total_changes: changes.len() as u32,
        unique_contracts: addresses.len() as u32,
        unique_slots: slots.len() as u32,
        balance_changes,
        large_changes,
        max_delta,
        avg_delta,
        variance_ratio: variance_ratio(&deltas),
        zero_to_nonzero,
        nonzero_to_zero,
    }
}

/// Fallback path used when the trace carries logs but no explicit storage
/// diff: coarsens to ERC-20 Transfer-event statistics. Semantically
/// rougher than the direct path but feeds the same named fields.
fn extract_from_logs(trace: &ExecutedTrace) -> StateVarianceFeatures {
    use super::flash_loan::TRANSFER_TOPIC;

    let mut addresses = HashSet::new();
    let mut amounts: Vec<i128> = Vec::new();
    let mut transfer_count = 0u32;

    for log in &trace.logs {
        if log.topics.first() == Some(&TRANSFER_TOPIC) {
            transfer_count += 1;
            addresses.insert(log.address);
            if log.data.len() >= 32 {
                let mut word = [0u8; 32];
                word.copy_from_slice(&log.data[..32]);
                amounts.push(word_as_i128(&word));
            }
        }
    }

    let max_delta = amounts.iter().map(|d| d.unsigned_abs()).max().unwrap_or(0);
    let avg_delta = if amounts.is_empty() {
        0.0
    } else {
        amounts.iter().map(|d| d.unsigned_abs() as f64).sum::<f64>() / amounts.len() as f64
    };
    let large_changes = amounts
        .iter()
        .filter(|d| d.unsigned_abs() as i128 >= LARGE_CHANGE_THRESHOLD)
        .count() as u32;

    StateVarianceFeatures {
        total_changes: transfer_count,
        unique_contracts: addresses.len() as u32,
        unique_slots: 0,
        balance_changes: 0,
        large_changes,
        max_delta,
        avg_delta,
        variance_ratio: variance_ratio(&amounts),
        zero_to_nonzero: 0,
        nonzero_to_zero: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{CallTree, TxHash};

    fn trace_with_changes(changes: Vec<StorageChange>) -> ExecutedTrace {
        ExecutedTrace {
            tx_hash: TxHash([0; 32]),
            from: [0; 20],
            to: Some([1; 20]),
            value: 0,
            input: vec![],
            gas_used: 0,
            gas_limit: 0,
            call_tree: CallTree::default(),
            storage_changes: changes,
            logs: vec![],
            created_contract_bytecode: None,
            reverted: false,
        }
    }

    fn word(n: u64) -> [u8; 32] {
        let mut w = [0u8; 32];
        w[24..].copy_from_slice(&n.to_be_bytes());
        w
    }

    #[test]
    fn empty_changes_yield_empty_record() {
        let f = extract(&trace_with_changes(vec![]));
        assert_eq!(f, StateVarianceFeatures::default());
    }

    #[test]
    fn large_delta_is_flagged() {
        let change = StorageChange {
            address: [1; 20],
            slot: word(5),
            before: word(0),
            after: [0xff; 32],
        };
        let f = extract(&trace_with_changes(vec![change]));
        assert_eq!(f.large_changes, 1);
        assert_eq!(f.zero_to_nonzero, 1);
    }

    #[test]
    fn variance_ratio_is_zero_with_one_sample() {
        let change = StorageChange { address: [1; 20], slot: word(1), before: word(0), after: word(5) };
        let f = extract(&trace_with_changes(vec![change]));
        assert_eq!(f.variance_ratio, 0.0);
    }
}
