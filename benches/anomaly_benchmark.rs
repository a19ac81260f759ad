//! Benchmarks the warm-path `analyze_trace` call against the latency
//! budget in spec §8 (≤10ms p95 for ≤100 call-tree nodes / ≤100 storage
//! changes on commodity hardware). Run with `cargo bench`.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sentinel_engine::config::EngineConfig;
use sentinel_engine::detector::{IsolationForestScorer, IsolationTree, ScoringArtifact, TreeNode};
use sentinel_engine::engine::SentinelEngine;
use sentinel_engine::trace::{CallKind, CallNode, CallTree, ExecutedTrace, Log, StorageChange, TxHash};
use std::sync::Arc;

const NODE_COUNT: usize = 100;
const STORAGE_CHANGE_COUNT: usize = 100;

fn synthetic_call_tree(n: usize) -> CallTree {
    let mut tree = CallTree::default();
    for i in 0..n {
        let kind = match i % 4 {
            0 => CallKind::Call,
            1 => CallKind::StaticCall,
            2 => CallKind::DelegateCall,
            _ => CallKind::CallCode,
        };
        tree.nodes.push(CallNode {
            kind,
            from: [0u8; 20],
            to: Some([(i % 255) as u8; 20]),
            value: if i % 5 == 0 { 1_000_000_000_000_000_000 } else { 0 },
            input: vec![0xab, 0x9c, 0x4b, 0x5d, 0, 0, 0, 1],
            gas: 100_000,
            gas_used: 60_000,
            reverted: i % 37 == 0,
            parent: if i == 0 { None } else { Some(i - 1) },
            children: if i + 1 < n { vec![i + 1] } else { vec![] },
        });
    }
    tree
}

fn synthetic_storage_changes(n: usize) -> Vec<StorageChange> {
    (0..n)
        .map(|i| {
            let mut before = [0u8; 32];
            let mut after = [0u8; 32];
            before[24..].copy_from_slice(&(i as u64).to_be_bytes());
            after[24..].copy_from_slice(&((i as u64) * 7 + 1).to_be_bytes());
            StorageChange { address: [(i % 255) as u8; 20], slot: [i as u8; 32], before, after }
        })
        .collect()
}

fn synthetic_trace() -> ExecutedTrace {
    ExecutedTrace {
        tx_hash: TxHash([7u8; 32]),
        from: [1u8; 20],
        to: Some([2u8; 20]),
        value: 0,
        input: vec![0x38, 0xed, 0x17, 0x39],
        gas_used: 4_000_000,
        gas_limit: 5_000_000,
        call_tree: synthetic_call_tree(NODE_COUNT),
        storage_changes: synthetic_storage_changes(STORAGE_CHANGE_COUNT),
        logs: vec![Log { address: [2u8; 20], topics: vec![[0xdd; 32]], data: vec![0u8; 32] }],
        created_contract_bytecode: None,
        reverted: false,
    }
}

/// A tiny but non-trivial artifact so the benchmark exercises real tree
/// walks rather than the empty-ensemble fast path.
fn synthetic_artifact() -> ScoringArtifact {
    let tree = IsolationTree {
        nodes: vec![
            TreeNode::Split { feature: 0, threshold: 0.5, left: 1, right: 2 },
            TreeNode::Leaf { size: 4 },
            TreeNode::Split { feature: 29, threshold: 10.0, left: 3, right: 4 },
            TreeNode::Leaf { size: 2 },
            TreeNode::Leaf { size: 8 },
        ],
    };
    ScoringArtifact {
        trees: vec![tree.clone(), tree],
        feature_means: [0.0; 43],
        feature_stds: [1.0; 43],
        threshold: 0.65,
        contamination: 0.1,
        subsample_size: 256,
    }
}

fn bench_analyze_trace(c: &mut Criterion) {
    let engine = SentinelEngine::new(EngineConfig::default())
        .with_scorer(Arc::new(IsolationForestScorer::from_artifact(synthetic_artifact())));
    let trace = synthetic_trace();

    c.bench_function("analyze_trace_warm_100_nodes", |b| {
        b.iter(|| {
            let signal = engine.analyze_trace(black_box(&trace), None);
            black_box(signal);
        })
    });
}

criterion_group!(benches, bench_analyze_trace);
criterion_main!(benches);
