//! Chain-handle contract consumed by the bytecode extractor (C4).
//!
//! The trace source and any RPC/archive-node backing it are out of scope;
//! this crate only defines the seam the bytecode extractor calls through,
//! and tolerates both methods failing.

/// Narrow read-only view of a chain the bytecode extractor can query for
/// deployed code and the current block height. Implementations may back
/// this with an RPC client, a forked-EVM harness, or a static fixture in
/// tests.
pub trait ChainHandle: Send + Sync {
    /// Returns the deployed bytecode at `address`, optionally as of
    /// `block`. `Ok(vec![])` and `Err` are both treated as "no code" by
    /// callers — the distinction only matters for logging.
    fn get_code(&self, address: &[u8; 20], block: Option<u64>) -> Result<Vec<u8>, String>;

    fn current_block(&self) -> Result<u64, String>;
}

/// A chain handle with no backing data; every query fails. Used when no
/// chain handle is configured so the bytecode extractor can still run in
/// its degraded mode.
pub struct NullChainHandle;

impl ChainHandle for NullChainHandle {
    fn get_code(&self, _address: &[u8; 20], _block: Option<u64>) -> Result<Vec<u8>, String> {
        Err("no chain handle configured".to_string())
    }

    fn current_block(&self) -> Result<u64, String> {
        Err("no chain handle configured".to_string())
    }
}
