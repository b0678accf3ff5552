//! Pooled vertex/instance storage for a flush.
//!
//! Draw ops don't own vertex memory; they ask the per-server pools for
//! space and receive an opaque `(block, offset)` pair. Blocks are recycled
//! across flushes, so a warmed pool allocates nothing per frame.

use crate::types::IRect;

/// Round `value` up to the nearest multiple of `alignment` (> 0).
pub(crate) fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment > 0);
    (value + alignment - 1) / alignment * alignment
}

/// Identifies one block of pooled storage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferBlockId(usize);

/// An allocation out of a [`BufferAllocPool`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PoolSlice {
    pub block: BufferBlockId,
    pub offset: usize,
    pub size: usize,
}

/// Linear suballocator over a growable list of fixed-size blocks.
///
/// `make_space` bump-allocates within the current block and opens a new one
/// when it overflows; requests larger than a block get a dedicated block.
/// `reset` retires all allocations but keeps the block storage for reuse.
/// When a block limit is set, exhaustion reports `None` and the pool stays
/// usable; callers flush and retry.
#[derive(Debug)]
pub struct BufferAllocPool {
    blocks: Vec<Vec<u8>>,
    /// Index of the block currently being filled.
    active: usize,
    cursor: usize,
    block_size: usize,
    max_blocks: Option<usize>,
}

impl BufferAllocPool {
    pub const DEFAULT_BLOCK_SIZE: usize = 1 << 16;

    pub fn new(block_size: usize) -> Self {
        debug_assert!(block_size > 0);
        Self {
            blocks: Vec::new(),
            active: 0,
            cursor: 0,
            block_size,
            max_blocks: None,
        }
    }

    /// Pool that refuses to grow past `max_blocks` blocks.
    pub fn with_block_limit(block_size: usize, max_blocks: usize) -> Self {
        let mut pool = Self::new(block_size);
        pool.max_blocks = Some(max_blocks.max(1));
        pool
    }

    /// Allocates `size` bytes at `alignment`, or `None` on exhaustion.
    pub fn make_space(&mut self, size: usize, alignment: usize) -> Option<PoolSlice> {
        if size == 0 {
            return None;
        }
        let alignment = alignment.max(1);

        if let Some(block) = self.blocks.get(self.active) {
            let offset = align_up(self.cursor, alignment);
            if offset + size <= block.len() {
                self.cursor = offset + size;
                return Some(PoolSlice {
                    block: BufferBlockId(self.active),
                    offset,
                    size,
                });
            }
        }

        // Advance through blocks kept alive by a previous flush before
        // growing the pool.
        while self.active + 1 < self.blocks.len() {
            self.active += 1;
            self.cursor = 0;
            if size <= self.blocks[self.active].len() {
                self.cursor = size;
                return Some(PoolSlice {
                    block: BufferBlockId(self.active),
                    offset: 0,
                    size,
                });
            }
        }

        // Open a new block; oversized requests get a block of their own.
        if let Some(limit) = self.max_blocks {
            if self.blocks.len() >= limit {
                return None;
            }
        }
        let block_len = self.block_size.max(size);
        self.blocks.push(vec![0; block_len]);
        self.active = self.blocks.len() - 1;
        self.cursor = size;
        Some(PoolSlice {
            block: BufferBlockId(self.active),
            offset: 0,
            size,
        })
    }

    /// CPU-writable view of a previously allocated slice.
    pub fn writer(&mut self, slice: PoolSlice) -> &mut [u8] {
        let block = &mut self.blocks[slice.block.0];
        &mut block[slice.offset..slice.offset + slice.size]
    }

    /// Read-only view, for backends uploading pooled data at submit time.
    pub fn contents(&self, slice: PoolSlice) -> &[u8] {
        let block = &self.blocks[slice.block.0];
        &block[slice.offset..slice.offset + slice.size]
    }

    /// Read-only view of `slice`'s block from its start through the end of
    /// the slice. Bases reported by the flush state are block-relative, so
    /// a backend staging this prefix can index it with them directly.
    pub fn block_contents(&self, slice: PoolSlice) -> &[u8] {
        let block = &self.blocks[slice.block.0];
        &block[..slice.offset + slice.size]
    }

    /// Retires all allocations; keeps block storage for the next flush.
    pub fn reset(&mut self) {
        self.active = 0;
        self.cursor = 0;
    }

    /// Bytes handed out since the last reset (within the active block run).
    pub fn bytes_allocated(&self) -> usize {
        let full: usize = self
            .blocks
            .iter()
            .take(self.active)
            .map(|b| b.len())
            .sum();
        full + self.cursor
    }
}

/// Geometry whose vertex/instance data lives in pooled storage.
///
/// The flush state sizes the allocation from the `*_size`/`*_count`
/// accessors and reports the placement back through the `set_*` callbacks
/// before the op writes its data.
pub trait Mesh {
    /// Bytes per vertex.
    fn vertex_size(&self) -> usize;
    fn vertex_count(&self) -> usize;

    /// Bytes per instance; 0 when not instanced.
    fn instance_size(&self) -> usize {
        0
    }
    fn instance_count(&self) -> usize {
        0
    }

    fn set_vertex_buffer(&mut self, slice: PoolSlice, base_vertex: u32);

    fn set_instance_buffer(&mut self, _slice: PoolSlice, _base_instance: u32) {}
}

/// Clip-free quad mesh covering `bounds`; the simplest pooled geometry.
#[derive(Debug)]
pub struct QuadMesh {
    pub bounds: IRect,
    pub vertex_buffer: Option<(PoolSlice, u32)>,
}

impl QuadMesh {
    pub fn new(bounds: IRect) -> Self {
        Self {
            bounds,
            vertex_buffer: None,
        }
    }
}

impl Mesh for QuadMesh {
    fn vertex_size(&self) -> usize {
        // x, y as f32.
        8
    }

    fn vertex_count(&self) -> usize {
        4
    }

    fn set_vertex_buffer(&mut self, slice: PoolSlice, base_vertex: u32) {
        self.vertex_buffer = Some((slice, base_vertex));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_aligned_and_disjoint() {
        let mut pool = BufferAllocPool::new(256);
        let a = pool.make_space(10, 4).unwrap();
        let b = pool.make_space(10, 4).unwrap();
        assert_eq!(a.offset % 4, 0);
        assert_eq!(b.offset % 4, 0);
        assert!(b.offset >= a.offset + a.size);
    }

    #[test]
    fn overflow_opens_a_new_block() {
        let mut pool = BufferAllocPool::new(64);
        let a = pool.make_space(48, 1).unwrap();
        let b = pool.make_space(48, 1).unwrap();
        assert_ne!(a.block, b.block);
    }

    #[test]
    fn oversized_request_gets_dedicated_block() {
        let mut pool = BufferAllocPool::new(64);
        let big = pool.make_space(1000, 1).unwrap();
        assert_eq!(big.offset, 0);
        assert_eq!(pool.writer(big).len(), 1000);
    }

    #[test]
    fn exhaustion_returns_none_and_pool_stays_usable() {
        let mut pool = BufferAllocPool::with_block_limit(64, 1);
        assert!(pool.make_space(64, 1).is_some());
        assert!(pool.make_space(1, 1).is_none(), "limit reached");
        pool.reset();
        assert!(pool.make_space(32, 1).is_some(), "usable after reset");
    }

    #[test]
    fn reset_recycles_block_storage() {
        let mut pool = BufferAllocPool::new(128);
        let a = pool.make_space(100, 1).unwrap();
        pool.reset();
        let b = pool.make_space(100, 1).unwrap();
        assert_eq!(a, b, "same placement after reset");
    }

    #[test]
    fn block_contents_reach_back_to_the_block_start() {
        let mut pool = BufferAllocPool::new(256);
        let a = pool.make_space(8, 8).unwrap();
        let b = pool.make_space(8, 8).unwrap();
        pool.writer(a).fill(1);
        pool.writer(b).fill(2);

        let bytes = pool.block_contents(b);
        assert_eq!(bytes.len(), b.offset + b.size);
        assert_eq!(&bytes[..8], &[1; 8]);
        assert_eq!(&bytes[8..16], &[2; 8]);
    }

    #[test]
    fn writer_round_trips_data() {
        let mut pool = BufferAllocPool::new(64);
        let slice = pool.make_space(4, 4).unwrap();
        pool.writer(slice).copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(pool.contents(slice), &[1, 2, 3, 4]);
    }
}
