//! Caching layer for decoded blocks
//!
//! Blocks are immutable once committed, so entries never need invalidation;
//! the LRU bound is the only eviction.
use crate::blockchain::Block;
use crate::primitives::Hash;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

pub struct BlockCache {
    inner: Mutex<LruCache<Hash, Block>>,
}

impl BlockCache {
    pub const DEFAULT_CAPACITY: usize = 128;

    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity_nz = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity_nz)),
        }
    }

    /// Looks up a block and promotes it to most recently used.
    pub fn get(&self, hash: &Hash) -> Option<Block> {
        self.inner.lock().get(hash).cloned()
    }

    pub fn put(&self, block: Block) {
        self.inner.lock().put(block.hash, block);
    }

    /// (entries, capacity)
    pub fn stats(&self) -> (usize, usize) {
        let cache = self.inner.lock();
        (cache.len(), cache.cap().get())
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{Block, BlockHeader};
    use crate::primitives::ZERO_HASH;

    fn block_at(height: u64) -> Block {
        Block::new(
            BlockHeader {
                version: "1.0.0".to_string(),
                height,
                prev_hash: ZERO_HASH,
                merkle_root: ZERO_HASH,
                timestamp: 0,
            },
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn test_block_cache() {
        let cache = BlockCache::new(10);
        let block = block_at(1);
        let hash = block.hash;

        assert_eq!(cache.get(&hash), None);
        cache.put(block.clone());
        assert_eq!(cache.get(&hash), Some(block));
        assert_eq!(cache.stats(), (1, 10));
    }

    #[test]
    fn test_lru_eviction() {
        let cache = BlockCache::new(2);
        let first = block_at(0);
        let second = block_at(1);
        let third = block_at(2);

        cache.put(first.clone());
        cache.put(second.clone());
        // touch `first` so `second` becomes the eviction candidate
        assert!(cache.get(&first.hash).is_some());
        cache.put(third.clone());

        assert_eq!(cache.stats(), (2, 2));
        assert!(cache.get(&second.hash).is_none());
        assert!(cache.get(&first.hash).is_some());
        assert!(cache.get(&third.hash).is_some());
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let cache = BlockCache::new(0);
        cache.put(block_at(0));
        assert_eq!(cache.stats(), (1, 1));
    }
}
