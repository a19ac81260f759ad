//! C1 — Trace Model.
//!
//! Shapes for the two inputs the engine accepts: an executed trace pulled
//! from a fork replay / archive node, and a pending transaction observed in
//! the mempool before it has executed. Call trees are arena-indexed rather
//! than built from owned recursive nodes, since traces from untrusted or
//! buggy tracers can in principle describe a cyclic or absurdly deep call
//! graph; an arena with a depth cap makes that a non-issue for every
//! consumer that walks it.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A 32-byte transaction hash, displayed as `0x`-prefixed hex.
///
/// Serializes as the `0x`-prefixed hex string the canonical signal
/// dictionary (§6) expects, not as a 32-element byte array — `serde`'s
/// derived array form would also leak past `serde`'s 0..=32 impl
/// ceiling on the surrounding struct for anything wider than this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Some(TxHash(out))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for TxHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TxHash::from_hex(&s).ok_or_else(|| de::Error::custom(format!("invalid tx hash hex: {s}")))
    }
}

/// The kind of call a [`CallNode`] represents, mirroring the EVM call
/// opcodes that can appear in a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CallKind {
    Call,
    StaticCall,
    DelegateCall,
    CallCode,
    Create,
    Create2,
    SelfDestruct,
}

/// A single frame in an executed call tree.
///
/// `parent` and `children` are arena indices into the owning
/// [`CallTree`]'s `nodes` vector, not pointers — this keeps the tree
/// representable even if a buggy tracer reports a call graph with a cycle;
/// traversal is index-based and depth-limited rather than recursive on
/// owned nodes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CallNode {
    pub kind: CallKind,
    pub from: [u8; 20],
    pub to: Option<[u8; 20]>,
    pub value: u128,
    pub input: Vec<u8>,
    pub gas: u64,
    pub gas_used: u64,
    pub reverted: bool,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl CallNode {
    pub fn selector(&self) -> Option<[u8; 4]> {
        if self.input.len() < 4 {
            return None;
        }
        let mut sel = [0u8; 4];
        sel.copy_from_slice(&self.input[..4]);
        Some(sel)
    }
}

/// The maximum depth a call-tree walk will descend before giving up on a
/// branch. Cyclic or pathologically deep traces degrade to a truncated
/// walk instead of a stack overflow or infinite loop.
pub const MAX_CALL_DEPTH: usize = 64;

/// An arena of [`CallNode`]s rooted at index 0.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CallTree {
    pub nodes: Vec<CallNode>,
}

impl CallTree {
    pub fn root(&self) -> Option<usize> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    /// Depth-first walk starting at `root`, invoking `visit(node, depth)`
    /// for each reachable node up to [`MAX_CALL_DEPTH`]. Nodes are visited
    /// at most once regardless of how many times they're reachable, which
    /// also guards against cycles introduced by a malformed trace.
    pub fn walk<F: FnMut(&CallNode, usize)>(&self, mut visit: F) {
        let Some(root) = self.root() else { return };
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![(root, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            if idx >= self.nodes.len() || seen[idx] || depth > MAX_CALL_DEPTH {
                continue;
            }
            seen[idx] = true;
            let node = &self.nodes[idx];
            visit(node, depth);
            for &child in node.children.iter().rev() {
                if !seen.get(child).copied().unwrap_or(true) {
                    stack.push((child, depth + 1));
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A single storage slot write observed during execution.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StorageChange {
    pub address: [u8; 20],
    pub slot: [u8; 32],
    pub before: [u8; 32],
    pub after: [u8; 32],
}

/// A log emitted during execution.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Log {
    pub address: [u8; 20],
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
}

/// A fully executed transaction trace, e.g. from a fork replay.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExecutedTrace {
    pub tx_hash: TxHash,
    pub from: [u8; 20],
    pub to: Option<[u8; 20]>,
    pub value: u128,
    pub input: Vec<u8>,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub call_tree: CallTree,
    pub storage_changes: Vec<StorageChange>,
    pub logs: Vec<Log>,
    pub created_contract_bytecode: Option<Vec<u8>>,
    pub reverted: bool,
}

/// A transaction observed in the mempool, not yet executed.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub from: [u8; 20],
    pub to: Option<[u8; 20]>,
    pub value: u128,
    pub input: Vec<u8>,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub nonce: u64,
}

impl PendingTransaction {
    pub fn selector(&self) -> Option<[u8; 4]> {
        if self.input.len() < 4 {
            return None;
        }
        let mut sel = [0u8; 4];
        sel.copy_from_slice(&self.input[..4]);
        Some(sel)
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    pub fn is_simple_transfer(&self) -> bool {
        self.to.is_some() && self.input.is_empty()
    }

    pub fn is_contract_interaction(&self) -> bool {
        self.to.is_some() && !self.input.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: CallKind, parent: Option<usize>, children: Vec<usize>) -> CallNode {
        CallNode {
            kind,
            from: [0; 20],
            to: Some([1; 20]),
            value: 0,
            input: vec![],
            gas: 0,
            gas_used: 0,
            reverted: false,
            parent,
            children,
        }
    }

    #[test]
    fn tx_hash_round_trips_hex() {
        let h = TxHash([7u8; 32]);
        let s = h.to_string();
        assert_eq!(TxHash::from_hex(&s), Some(h));
    }

    #[test]
    fn tx_hash_serializes_as_hex_string_not_byte_array() {
        let h = TxHash([7u8; 32]);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "07".repeat(32)));
        let back: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn predicates_classify_pending_tx_variants() {
        let base = PendingTransaction {
            hash: TxHash([0; 32]),
            from: [0; 20],
            to: None,
            value: 0,
            input: vec![],
            gas_limit: 21000,
            gas_price: 1,
            nonce: 0,
        };
        assert!(base.is_contract_creation());

        let transfer = PendingTransaction { to: Some([1; 20]), ..base.clone() };
        assert!(transfer.is_simple_transfer());
        assert!(!transfer.is_contract_interaction());

        let interaction = PendingTransaction { to: Some([1; 20]), input: vec![1, 2, 3, 4], ..base };
        assert!(interaction.is_contract_interaction());
        assert!(!interaction.is_simple_transfer());
    }

    #[test]
    fn walk_tolerates_cycles() {
        let mut tree = CallTree::default();
        tree.nodes.push(node(CallKind::Call, None, vec![1]));
        tree.nodes.push(node(CallKind::Call, Some(0), vec![0]));

        let mut visited = 0;
        tree.walk(|_, _| visited += 1);
        assert_eq!(visited, 2);
    }

    #[test]
    fn walk_respects_depth_cap() {
        let mut tree = CallTree::default();
        let n = MAX_CALL_DEPTH + 10;
        for i in 0..n {
            let children = if i + 1 < n { vec![i + 1] } else { vec![] };
            tree.nodes.push(node(CallKind::Call, if i == 0 { None } else { Some(i - 1) }, children));
        }
        let mut max_depth_seen = 0;
        tree.walk(|_, depth| max_depth_seen = max_depth_seen.max(depth));
        assert!(max_depth_seen <= MAX_CALL_DEPTH);
    }
}
