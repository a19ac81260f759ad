//! C5 — Opcode/Call-Graph Extractor.

use std::collections::HashSet;

use crate::trace::{CallKind, ExecutedTrace, Log, PendingTransaction};

/// Side product used by the protocol filter and explanation text. The
/// cascade is order-sensitive and evaluated in this exact sequence — a
/// call tree that is both destructive and a multi-transfer is labeled
/// `destructive`, not `multi_transfer`. Preserved as observed, not
/// "improved".
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PatternTag {
    Standard,
    Destructive,
    Metamorphic,
    ProxyChain,
    ComplexMulticall,
    DeepRecursion,
    MultiTransfer,
    BatchCalls,
}

impl PatternTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternTag::Standard => "standard",
            PatternTag::Destructive => "destructive",
            PatternTag::Metamorphic => "metamorphic",
            PatternTag::ProxyChain => "proxy_chain",
            PatternTag::ComplexMulticall => "complex_multicall",
            PatternTag::DeepRecursion => "deep_recursion",
            PatternTag::MultiTransfer => "multi_transfer",
            PatternTag::BatchCalls => "batch_calls",
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OpcodeFeatures {
    pub total_calls: u32,
    pub call_depth: u32,
    pub delegatecall: u32,
    pub staticcall: u32,
    pub create: u32,
    pub create2: u32,
    pub selfdestruct: u32,
    pub call: u32,
    pub internal_calls: u32,
    pub external_calls: u32,
    pub unique_call_types: u32,
    pub value_transfers: u32,
    pub gas_ratio: f64,
    pub revert_count: u32,
    pub pattern: PatternTag,
}

impl Default for OpcodeFeatures {
    fn default() -> Self {
        Self {
            total_calls: 0,
            call_depth: 0,
            delegatecall: 0,
            staticcall: 0,
            create: 0,
            create2: 0,
            selfdestruct: 0,
            call: 0,
            internal_calls: 0,
            external_calls: 0,
            unique_call_types: 0,
            value_transfers: 0,
            gas_ratio: 0.0,
            revert_count: 0,
            pattern: PatternTag::Standard,
        }
    }
}

impl OpcodeFeatures {
    pub fn to_vector(&self) -> [f64; 14] {
        [
            self.total_calls as f64,
            self.call_depth as f64,
            self.delegatecall as f64,
            self.staticcall as f64,
            self.create as f64,
            self.create2 as f64,
            self.selfdestruct as f64,
            self.call as f64,
            self.internal_calls as f64,
            self.external_calls as f64,
            self.unique_call_types as f64,
            self.value_transfers as f64,
            self.gas_ratio,
            self.revert_count as f64,
        ]
    }

    fn classify(&mut self) {
        self.pattern = if self.selfdestruct > 0 {
            PatternTag::Destructive
        } else if self.create2 > 0 && self.delegatecall > 0 {
            PatternTag::Metamorphic
        } else if self.delegatecall > 2 {
            PatternTag::ProxyChain
        } else if self.total_calls > 50 {
            PatternTag::ComplexMulticall
        } else if self.call_depth > 10 {
            PatternTag::DeepRecursion
        } else if self.value_transfers > 5 {
            PatternTag::MultiTransfer
        } else if self.call > 10 {
            PatternTag::BatchCalls
        } else {
            PatternTag::Standard
        };
    }
}

fn is_external(kind: CallKind) -> bool {
    matches!(kind, CallKind::Call | CallKind::StaticCall | CallKind::DelegateCall | CallKind::CallCode)
}

pub fn extract(trace: &ExecutedTrace) -> OpcodeFeatures {
    if trace.call_tree.is_empty() {
        return extract_from_logs(&trace.logs, trace.gas_used);
    }

    let mut f = OpcodeFeatures::default();
    let mut kinds_seen: HashSet<u8> = HashSet::new();
    let mut gas_supplied_sum = 0u64;
    let mut gas_used_sum = 0u64;
    let mut max_depth = 0u32;

    trace.call_tree.walk(|node, depth| {
        f.total_calls += 1;
        max_depth = max_depth.max(depth as u32);
        gas_supplied_sum = gas_supplied_sum.saturating_add(node.gas);
        gas_used_sum = gas_used_sum.saturating_add(node.gas_used);

        let kind_tag = match node.kind {
            CallKind::Call => { f.call += 1; 0 }
            CallKind::StaticCall => { f.staticcall += 1; 1 }
            CallKind::DelegateCall => { f.delegatecall += 1; 2 }
            CallKind::CallCode => 3,
            CallKind::Create => { f.create += 1; 4 }
            CallKind::Create2 => { f.create2 += 1; 5 }
            CallKind::SelfDestruct => { f.selfdestruct += 1; 6 }
        };
        kinds_seen.insert(kind_tag);

        if is_external(node.kind) {
            f.external_calls += 1;
        } else {
            f.internal_calls += 1;
        }

        if node.value > 0 {
            f.value_transfers += 1;
        }
        if node.reverted {
            f.revert_count += 1;
        }
    });

    f.call_depth = max_depth;
    f.unique_call_types = kinds_seen.len() as u32;
    f.gas_ratio = if gas_supplied_sum > 0 {
        gas_used_sum as f64 / gas_supplied_sum as f64
    } else {
        0.0
    };

    f.classify();
    f
}

/// Coarse estimate when no call tree is available: derives unique
/// addresses from logs and a depth estimate capped at 10.
fn extract_from_logs(logs: &[Log], gas_used: u64) -> OpcodeFeatures {
    let mut addresses: HashSet<[u8; 20]> = HashSet::new();
    for log in logs {
        addresses.insert(log.address);
    }
    let unique = addresses.len() as u32;
    let depth_estimate = (unique / 3).min(10);

    let mut f = OpcodeFeatures {
        total_calls: unique,
        call_depth: depth_estimate,
        external_calls: unique,
        unique_call_types: if unique > 0 { 1 } else { 0 },
        gas_ratio: if gas_used > 500_000 { 0.8 } else { 0.5 },
        ..Default::default()
    };
    f.classify();
    f
}

/// Fabricated from predicates on a pending transaction: a single external
/// call when `to` is present and input is non-empty, otherwise an empty
/// record.
pub fn extract_from_pending(tx: &PendingTransaction) -> OpcodeFeatures {
    let mut f = OpcodeFeatures::default();
    if tx.is_contract_interaction() {
        f.total_calls = 1;
        f.call = 1;
        f.external_calls = 1;
        f.unique_call_types = 1;
        f.call_depth = 1;
        if tx.value > 0 {
            f.value_transfers = 1;
        }
    }
    f.classify();
    f
}
