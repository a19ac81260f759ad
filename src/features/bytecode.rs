//! C4 — Bytecode Extractor.

use std::collections::HashSet;

use crate::chain::ChainHandle;

const SELFDESTRUCT: u8 = 0xff;
const DELEGATECALL: u8 = 0xf4;
const CREATE2: u8 = 0xf5;

/// EIP-1167 minimal-proxy clone prefix.
const EIP1167_PREFIX: &[u8] = &[0x36, 0x3d, 0x3d, 0x37, 0x3d, 0x3d, 0x3d, 0x36, 0x3d, 0x73];

/// Storage slot patterns that identify well-known proxy standards: code
/// carrying the raw 32-byte slot constant (as ASCII hex, the way a proxy's
/// constructor embeds it as a literal PUSH32 immediate) is treated as a
/// signature match.
const EIP1967_IMPL_SLOT: &str = "360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";
const EIP1822_UUPS_SLOT: &str = "c5f16f0fcc639fa48a6947836d9850f504798523bf8c9a3a87d5876cf622bcf7";
const TRANSPARENT_ADMIN_SLOT: &str = "b53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProxyKind {
    None,
    Eip1967,
    Eip1822,
    Transparent,
    Eip1167Clone,
    Minimal,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BytecodeFeatures {
    pub is_contract: bool,
    pub length_bytes: u32,
    pub hash_prefix: [u8; 8],
    pub is_proxy: bool,
    pub age_blocks: u64,
    pub is_verified: bool,
    pub matches_exploit: bool,
    pub jaccard: f64,
    pub has_selfdestruct: bool,
    pub has_delegatecall: bool,
    pub has_create2: bool,
    pub unique_opcodes: u32,
}

impl BytecodeFeatures {
    pub fn to_vector(&self) -> [f64; 11] {
        [
            self.length_bytes as f64,
            self.is_contract as u8 as f64,
            self.is_proxy as u8 as f64,
            self.age_blocks as f64,
            self.is_verified as u8 as f64,
            self.matches_exploit as u8 as f64,
            self.jaccard,
            self.has_selfdestruct as u8 as f64,
            self.has_delegatecall as u8 as f64,
            self.has_create2 as u8 as f64,
            self.unique_opcodes as f64,
        ]
    }
}

fn detect_proxy(code: &[u8]) -> ProxyKind {
    if code.starts_with(EIP1167_PREFIX) {
        return ProxyKind::Eip1167Clone;
    }
    let hex = hex::encode(code);
    if hex.contains(EIP1967_IMPL_SLOT) {
        return ProxyKind::Eip1967;
    }
    if hex.contains(EIP1822_UUPS_SLOT) {
        return ProxyKind::Eip1822;
    }
    if hex.contains(TRANSPARENT_ADMIN_SLOT) {
        return ProxyKind::Transparent;
    }
    if code.windows(1).any(|w| w[0] == DELEGATECALL) && code.len() < 200 {
        return ProxyKind::Minimal;
    }
    ProxyKind::None
}

/// Counts unique opcodes, skipping PUSH1..PUSH32 immediate bytes so literal
/// data never gets misread as instructions.
fn count_unique_opcodes(code: &[u8]) -> u32 {
    let mut seen = HashSet::new();
    let mut i = 0;
    while i < code.len() {
        let op = code[i];
        seen.insert(op);
        if (0x60..=0x7f).contains(&op) {
            let push_size = (op - 0x5f) as usize;
            i += 1 + push_size;
        } else {
            i += 1;
        }
    }
    seen.len() as u32
}

/// 4-byte sliding windows (step 1) used as the shingle alphabet for the
/// Jaccard similarity comparison against known-bad bytecode.
fn chunks(code: &[u8]) -> HashSet<&[u8]> {
    if code.len() < 4 {
        return HashSet::new();
    }
    (0..=code.len() - 4).map(|i| &code[i..i + 4]).collect()
}

fn jaccard_similarity(a: &[u8], b: &[u8]) -> f64 {
    let ca = chunks(a);
    let cb = chunks(b);
    if ca.is_empty() || cb.is_empty() {
        return 0.0;
    }
    let intersection = ca.intersection(&cb).count();
    let union = ca.union(&cb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn hash_prefix(code: &[u8]) -> [u8; 8] {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(code);
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Binary search for the earliest block at which `get_code` returns
/// non-empty code, bounded by `current_block`. Returns 0 when no chain
/// handle is available or the search fails — contract age is best-effort.
fn contract_age(chain: &dyn ChainHandle, address: &[u8; 20]) -> u64 {
    let Ok(current) = chain.current_block() else { return 0 };
    if current == 0 {
        return 0;
    }

    let mut lo = 0u64;
    let mut hi = current;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match chain.get_code(address, Some(mid)) {
            Ok(code) if !code.is_empty() => hi = mid,
            _ => lo = mid + 1,
        }
    }
    current.saturating_sub(lo)
}

/// Full record for deployed code at `address`, using `chain` for the
/// age lookup when available. `known_exploits` is a registry of bytecode
/// byte-strings treated as exact or near matches.
pub fn extract(
    code: &[u8],
    address: &[u8; 20],
    chain: &dyn ChainHandle,
    known_exploits: &[Vec<u8>],
    similarity_threshold: f64,
) -> BytecodeFeatures {
    if code.is_empty() {
        return BytecodeFeatures { is_contract: false, ..Default::default() };
    }

    let proxy_kind = detect_proxy(code);
    let hp = hash_prefix(code);

    let mut matches_exploit = false;
    let mut best_jaccard = 0.0f64;
    for known in known_exploits {
        if hash_prefix(known) == hp && !known.is_empty() {
            matches_exploit = true;
        }
        let sim = jaccard_similarity(code, known);
        if sim > best_jaccard {
            best_jaccard = sim;
        }
        if sim >= similarity_threshold {
            matches_exploit = true;
        }
    }

    BytecodeFeatures {
        is_contract: true,
        length_bytes: code.len() as u32,
        hash_prefix: hp,
        is_proxy: proxy_kind != ProxyKind::None,
        age_blocks: contract_age(chain, address),
        is_verified: false,
        matches_exploit,
        jaccard: best_jaccard,
        has_selfdestruct: code.contains(&SELFDESTRUCT),
        has_delegatecall: code.contains(&DELEGATECALL),
        has_create2: code.contains(&CREATE2),
        unique_opcodes: count_unique_opcodes(code),
    }
}

/// Contract-creation path: the extractor is driven by the init-code
/// payload rather than deployed code, and no chain-age lookup is
/// meaningful since the contract doesn't exist yet.
pub fn extract_from_creation_input(
    init_code: &[u8],
    known_exploits: &[Vec<u8>],
    similarity_threshold: f64,
) -> BytecodeFeatures {
    extract(init_code, &[0u8; 20], &crate::chain::NullChainHandle, known_exploits, similarity_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_code_is_not_a_contract() {
        let f = extract(&[], &[0; 20], &crate::chain::NullChainHandle, &[], 0.9);
        assert!(!f.is_contract);
    }

    #[test]
    fn opcode_counter_skips_push_immediates() {
        // PUSH1 0xFF, STOP — two opcodes, not three.
        let code = [0x60, 0xff, 0x00];
        assert_eq!(count_unique_opcodes(&code), 2);
    }

    #[test]
    fn eip1167_clone_prefix_detected() {
        let mut code = EIP1167_PREFIX.to_vec();
        code.extend_from_slice(&[0u8; 20]);
        assert_eq!(detect_proxy(&code), ProxyKind::Eip1167Clone);
    }

    #[test]
    fn exact_match_against_known_exploit_flags() {
        let bad = vec![0x60, 0x01, 0x60, 0x02, 0x01, 0x00];
        let f = extract(&bad, &[1; 20], &crate::chain::NullChainHandle, &[bad.clone()], 0.9);
        assert!(f.matches_exploit);
    }
}
