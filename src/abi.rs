//! Small ABI helper: function-selector derivation from a human-readable
//! signature.
//!
//! The constants hardcoded in `features/flash_loan.rs` and `protocol.rs`
//! are the truncated Keccak-256 of a function signature (per the
//! GLOSSARY); this module exists so a caller building a
//! [`crate::protocol::ProtocolConfig`] or
//! [`crate::heuristic::HeuristicConfig`] at runtime — e.g. from a
//! human-curated list of router function names — can derive the same
//! selectors without hand-encoding hex.

use sha3::{Digest, Keccak256};

/// First four bytes of `Keccak256(signature)`, e.g.
/// `selector_from_signature("transfer(address,uint256)")`.
pub fn selector_from_signature(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erc20_transfer_selector_matches_known_value() {
        assert_eq!(selector_from_signature("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn erc20_transfer_from_selector_matches_known_value() {
        assert_eq!(
            selector_from_signature("transferFrom(address,address,uint256)"),
            [0x23, 0xb8, 0x72, 0xdd]
        );
    }
}
