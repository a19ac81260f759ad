//! C2 — Flash-Loan Extractor.
//!
//! Fuses three independent signals (selector match, provider-address match,
//! event-topic match) rather than trusting any single one, since a trace
//! can surface a flash loan through any of them depending on how much of
//! the call tree made it into the trace.

use crate::trace::{CallKind, CallNode, CallTree, ExecutedTrace, Log, PendingTransaction};

/// Selectors of well-known flash-loan entry points (`flashLoan`,
/// `flashLoanSimple`, dYdX `operate`, Balancer `flashLoan`, ...).
pub const FLASH_LOAN_SIGNATURES: &[[u8; 4]] = &[
    [0xab, 0x9c, 0x4b, 0x5d], // Aave V2 flashLoan
    [0x42, 0xb0, 0xb7, 0x70], // Aave V3 flashLoan
    [0x09, 0x46, 0xa1, 0x1f], // Aave V3 flashLoanSimple
    [0x5c, 0xff, 0xe9, 0xde], // Balancer V2 flashLoan
    [0xe6, 0xa4, 0x39, 0x05], // dYdX SoloMargin operate
];

/// Addresses of well-known flash-loan liquidity providers.
pub const FLASH_LOAN_PROVIDERS: &[([u8; 20], &str)] = &[
    (hex20("7d2768de32b0b80b7a3454c06bdac94a69ddc7a9"), "aave_v2"),
    (hex20("87870bca3f3fd6335c3f4ce8392d69350b4fa4e2"), "aave_v3"),
    (hex20("ba12222222228d8ba445958a75a0704d566bf2c8"), "balancer_v2"),
    (hex20("1e0447b19bb6ecfdae1e4ae1694b0c3659614e4e"), "dydx_solo"),
];

/// Callback selectors invoked on the borrower after funds are disbursed.
pub const CALLBACK_SIGNATURES: &[[u8; 4]] = &[
    [0x92, 0x0f, 0x52, 0x01], // executeOperation (Aave)
    [0xf0, 0x4f, 0x27, 0x07], // receiveFlashLoan (Balancer)
    [0x5c, 0xbb, 0x20, 0xca], // uniswapV2Call
];

/// `Transfer(address,address,uint256)` topic0.
pub const TRANSFER_TOPIC: [u8; 32] =
    hex32("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// Flash-loan event topics (`FlashLoan`, `LOG_FLASHLOAN`, ...).
pub const FLASH_LOAN_EVENT_TOPICS: &[[u8; 32]] = &[hex32(
    "631042c832b07452973831137f2d73e395028b44b250dedc5abb0ee766e168a1",
)];

const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
const ERC20_TRANSFER_FROM_SELECTOR: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];

const fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

const fn hex20(s: &str) -> [u8; 20] {
    let bytes = s.as_bytes();
    let mut out = [0u8; 20];
    let mut i = 0;
    while i < 20 {
        out[i] = hex_nibble(bytes[i * 2]) << 4 | hex_nibble(bytes[i * 2 + 1]);
        i += 1;
    }
    out
}

const fn hex32(s: &str) -> [u8; 32] {
    let bytes = s.as_bytes();
    let mut out = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        out[i] = hex_nibble(bytes[i * 2]) << 4 | hex_nibble(bytes[i * 2 + 1]);
        i += 1;
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FlashLoanFeatures {
    pub has_flash_loan: bool,
    pub count: u32,
    pub provider_tags: Vec<String>,
    pub amounts: Vec<u128>,
    pub total_borrowed: u128,
    pub has_callback: bool,
    pub callback_count: u32,
    pub nested: bool,
    pub repayment_detected: bool,
}

impl FlashLoanFeatures {
    pub fn to_vector(&self) -> [f64; 8] {
        [
            self.has_flash_loan as u8 as f64,
            self.count as f64,
            self.provider_tags.len() as f64,
            self.total_borrowed as f64,
            self.has_callback as u8 as f64,
            self.callback_count as f64,
            self.nested as u8 as f64,
            self.repayment_detected as u8 as f64,
        ]
    }
}

/// Decodes a big-endian uint256-ish amount from a 32-byte word embedded in
/// calldata at `offset`. Returns 0 on malformed or too-short input — never
/// fails, per the extractor-never-throws propagation policy.
fn decode_amount_at(data: &[u8], offset: usize) -> u128 {
    if data.len() < offset + 32 {
        return 0;
    }
    let word = &data[offset..offset + 32];
    // Only the low 16 bytes can possibly fit in a u128; a legitimate amount
    // this large would already have overflowed every native-unit balance.
    let low = &word[16..32];
    let mut acc: u128 = 0;
    for &b in low {
        acc = acc.saturating_mul(256).saturating_add(b as u128);
    }
    acc
}

fn amount_from_input(input: &[u8]) -> u128 {
    if input.len() < 36 {
        return 0;
    }
    decode_amount_at(input, 4)
}

fn amount_from_log(log: &Log) -> u128 {
    if log.data.len() < 32 {
        return 0;
    }
    decode_amount_at(&log.data, 0)
}

fn provider_tag(addr: &[u8; 20]) -> Option<&'static str> {
    FLASH_LOAN_PROVIDERS
        .iter()
        .find(|(a, _)| a == addr)
        .map(|(_, tag)| *tag)
}

struct TreeScan {
    matches: u32,
    providers: Vec<String>,
    amounts: Vec<u128>,
    has_callback: bool,
    callback_count: u32,
    depths: Vec<usize>,
    has_transfer_selector: bool,
    has_transfer_from_selector: bool,
}

fn scan_call_tree(tree: &CallTree) -> TreeScan {
    let mut scan = TreeScan {
        matches: 0,
        providers: Vec::new(),
        amounts: Vec::new(),
        has_callback: false,
        callback_count: 0,
        depths: Vec::new(),
        has_transfer_selector: false,
        has_transfer_from_selector: false,
    };

    tree.walk(|node: &CallNode, depth: usize| {
        let selector = node.selector();

        if let Some(sel) = selector {
            if FLASH_LOAN_SIGNATURES.contains(&sel) {
                scan.matches += 1;
                scan.depths.push(depth);
                scan.amounts.push(amount_from_input(&node.input));
            }
            if CALLBACK_SIGNATURES.contains(&sel) {
                scan.has_callback = true;
                scan.callback_count += 1;
            }
            if sel == ERC20_TRANSFER_SELECTOR {
                scan.has_transfer_selector = true;
            }
            if sel == ERC20_TRANSFER_FROM_SELECTOR {
                scan.has_transfer_from_selector = true;
            }
        }

        if let Some(to) = node.to {
            if let Some(tag) = provider_tag(&to) {
                scan.matches = scan.matches.max(1);
                let tag = tag.to_string();
                if !scan.providers.contains(&tag) {
                    scan.providers.push(tag);
                }
            }
        }
    });

    scan
}

fn scan_logs(logs: &[Log]) -> (u32, bool, u32, u128) {
    let mut matches = 0u32;
    let mut transfer_count = 0u32;
    let mut total = 0u128;
    let mut any_event = false;
    for log in logs {
        if let Some(topic0) = log.topics.first() {
            if FLASH_LOAN_EVENT_TOPICS.contains(topic0) {
                matches += 1;
                any_event = true;
                total = total.saturating_add(amount_from_log(log));
            }
            if *topic0 == TRANSFER_TOPIC {
                transfer_count += 1;
            }
        }
    }
    (matches, any_event, transfer_count, total)
}

pub fn extract(trace: &ExecutedTrace) -> FlashLoanFeatures {
    let tree_scan = scan_call_tree(&trace.call_tree);
    let (log_matches, log_event_fired, transfer_count, log_total) = scan_logs(&trace.logs);

    let count = tree_scan.matches.max(log_matches);
    let has_flash_loan = count > 0 || !tree_scan.providers.is_empty() || log_event_fired;

    let mut unique_depths: Vec<usize> = tree_scan.depths.clone();
    unique_depths.sort_unstable();
    unique_depths.dedup();
    let nested = unique_depths.len() > 1;

    let mut providers = tree_scan.providers.clone();
    providers.sort();
    providers.dedup();

    let total_borrowed = tree_scan
        .amounts
        .iter()
        .fold(0u128, |acc, a| acc.saturating_add(*a))
        .saturating_add(log_total);

    let repayment_detected = tree_scan.has_transfer_selector
        || tree_scan.has_transfer_from_selector
        || transfer_count >= 2;

    FlashLoanFeatures {
        has_flash_loan,
        count,
        provider_tags: providers,
        amounts: tree_scan.amounts,
        total_borrowed,
        has_callback: tree_scan.has_callback,
        callback_count: tree_scan.callback_count,
        nested,
        repayment_detected,
    }
}

/// Input-only mode for pending transactions: no call tree, no logs, so
/// only the outer selector and `to` address can signal a flash loan.
pub fn extract_from_pending(tx: &PendingTransaction) -> FlashLoanFeatures {
    let selector = tx.selector();
    let selector_match = selector.map(|s| FLASH_LOAN_SIGNATURES.contains(&s)).unwrap_or(false);
    let provider_match = tx.to.as_ref().and_then(provider_tag);

    let has_flash_loan = selector_match || provider_match.is_some();
    let amount = if selector_match { amount_from_input(&tx.input) } else { 0 };

    FlashLoanFeatures {
        has_flash_loan,
        count: has_flash_loan as u32,
        provider_tags: provider_match.map(|t| vec![t.to_string()]).unwrap_or_default(),
        amounts: if amount > 0 { vec![amount] } else { vec![] },
        total_borrowed: amount,
        has_callback: false,
        callback_count: 0,
        nested: false,
        repayment_detected: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TxHash;

    fn empty_trace() -> ExecutedTrace {
        ExecutedTrace {
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
        }
    }

    #[test]
    fn no_signal_yields_empty_record() {
        let f = extract(&empty_trace());
        assert_eq!(f, FlashLoanFeatures::default());
        assert_eq!(f.to_vector(), [0.0; 8]);
    }

    #[test]
    fn provider_address_alone_flags_flash_loan() {
        let mut trace = empty_trace();
        trace.call_tree.nodes.push(CallNode {
            kind: CallKind::Call,
            from: [0; 20],
            to: Some(FLASH_LOAN_PROVIDERS[0].0),
            value: 0,
            input: vec![],
            gas: 0,
            gas_used: 0,
            reverted: false,
            parent: None,
            children: vec![],
        });
        let f = extract(&trace);
        assert!(f.has_flash_loan);
        assert_eq!(f.provider_tags, vec!["aave_v2".to_string()]);
    }

    #[test]
    fn two_transfer_logs_signal_repayment() {
        let mut trace = empty_trace();
        for _ in 0..2 {
            trace.logs.push(Log { address: [1; 20], topics: vec![TRANSFER_TOPIC], data: vec![] });
        }
        let f = extract(&trace);
        assert!(f.repayment_detected);
    }

    #[test]
    fn pending_tx_selector_match_flags_flash_loan() {
        let tx = PendingTransaction {
            hash: TxHash([0; 32]),
            from: [0; 20],
            to: Some([9; 20]),
            value: 0,
            input: FLASH_LOAN_SIGNATURES[0].to_vec(),
            gas_limit: 3_000_000,
            gas_price: 1,
            nonce: 0,
        };
        let f = extract_from_pending(&tx);
        assert!(f.has_flash_loan);
    }
}
