//! Fingerprint index over the old data.
//!
//! Blocks are taken at non-overlapping strides (0, n, 2n, ...), so the index
//! holds at most |old| / n offsets and every match starts block-aligned in the
//! old data. A trailing partial block is never indexed.

use std::collections::HashMap;

use tracing::debug;

use crate::hash::fingerprint;
use crate::types::{DeltaError, Result};

/// Chained table: fingerprint -> ascending old-data offsets.
#[derive(Debug, Default)]
pub struct BlockIndex {
    block_size: usize,
    table: HashMap<u64, Vec<usize>>,
    blocks: usize,
}

impl BlockIndex {
    /// Index `old` in `block_size` strides.
    pub fn build(old: &[u8], block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(DeltaError::Config("block size must be > 0".into()));
        }

        let mut table: HashMap<u64, Vec<usize>> = HashMap::new();
        let mut blocks = 0;
        for (i, block) in old.chunks_exact(block_size).enumerate() {
            table.entry(fingerprint(block)).or_default().push(i * block_size);
            blocks += 1;
        }

        debug!(
            old_len = old.len(),
            block_size,
            blocks,
            distinct = table.len(),
            "built block index"
        );

        Ok(BlockIndex {
            block_size,
            table,
            blocks,
        })
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of indexed blocks (full strides only).
    pub fn len(&self) -> usize {
        self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks == 0
    }

    /// Candidate offsets for a fingerprint, lowest offset first.
    #[inline]
    pub fn candidates(&self, fp: u64) -> &[usize] {
        self.table.get(&fp).map_or(&[], Vec::as_slice)
    }
}
