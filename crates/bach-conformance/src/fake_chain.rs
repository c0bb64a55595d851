//! Deterministic stand-in for a chain's block-hash lookup
//!
//! A VM executing `BLOCKHASH` needs some chain to ask. Fixtures are run in
//! isolation, so the hash of block `n` is defined as `keccak256` of the decimal
//! text of `n`. The same number always yields the same hash, in every session.

use crate::crypto::keccak256;
use primitive_types::H256;

/// Number of ancestors a VM may query with `BLOCKHASH`
pub const BLOCK_HASH_WINDOW: u64 = 256;

/// Source of block hashes for executions that query them
pub trait BlockHashProvider {
    /// Hash of the block with the given number
    fn block_hash(&self, number: u64) -> H256;

    /// Hashes of the ancestors of `current` reachable by `BLOCKHASH`, oldest first
    fn recent_hashes(&self, current: u64) -> Vec<(u64, H256)> {
        let start = current.saturating_sub(BLOCK_HASH_WINDOW);
        (start..current).map(|n| (n, self.block_hash(n))).collect()
    }
}

/// Minimal block handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeBlock {
    number: u64,
    hash: H256,
}

impl FakeBlock {
    /// Block number
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Block hash
    pub fn hash(&self) -> H256 {
        self.hash
    }
}

/// Chain whose block hashes are derived from block numbers alone
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeChain;

impl FakeChain {
    /// Create a fake chain
    pub fn new() -> Self {
        Self
    }

    /// Block handle for a number
    pub fn block(&self, number: u64) -> FakeBlock {
        FakeBlock {
            number,
            hash: self.block_hash(number),
        }
    }
}

impl BlockHashProvider for FakeChain {
    fn block_hash(&self, number: u64) -> H256 {
        keccak256(number.to_string().as_bytes())
    }
}
