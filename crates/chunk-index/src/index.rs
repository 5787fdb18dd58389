//! Positional index over a growing sequence of chunks.
//!
//! A [`ChunkIndex`] makes a list of immutable chunks addressable as one logical row sequence
//! without copying row data. It keeps shared references to the chunks plus a prefix-sum table of
//! their row counts, and maps a logical position to `(chunk id, offset)` with a binary search over
//! that table.
//!
//! Build phase: one owner appends chunks (`add_chunk`) or merges partition-local indices
//! (`merge`). Read phase: every accessor takes `&self`, so a sealed index can be shared across
//! threads without locking.
//!
//! Positions passed to the routing accessors must be in `0..position_count()`. This is only
//! checked in debug builds; release builds fail with an index panic further down instead.

#![forbid(unsafe_code)]

use crate::address::{encode, SyntheticAddress, MAX_CHUNKS};
use crate::block::{Block, BlockBuilder};
use crate::chunk::{Chunk, ChunkRow};
use crate::error::{ChunkIndexError, Result};
use crate::options::IndexOptions;
use crate::typed::{TypedColumnCache, TypedListHandle};
use crate::types::Value;
use std::iter::FusedIterator;
use std::sync::Arc;

#[derive(Debug)]
pub struct ChunkIndex {
    chunks: Vec<Arc<Chunk>>,
    /// `chunks.len() + 1` entries; `offsets[i]` is the first logical position of chunk `i`.
    offsets: Vec<usize>,
    max_chunk_rows: usize,
    typed: Option<TypedColumnCache>,
}

impl Default for ChunkIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkIndex {
    pub fn new() -> Self {
        Self::from_valid_options(IndexOptions::default())
    }

    pub fn with_options(options: IndexOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_valid_options(options))
    }

    fn from_valid_options(options: IndexOptions) -> Self {
        let mut offsets = Vec::with_capacity(options.chunk_capacity + 1);
        offsets.push(0);
        Self {
            chunks: Vec::with_capacity(options.chunk_capacity),
            offsets,
            max_chunk_rows: options.max_chunk_rows,
            typed: None,
        }
    }

    /// Appends a chunk after all existing ones.
    ///
    /// The chunk must not already be part of this index or of any index merged with it.
    pub fn add_chunk(&mut self, chunk: Arc<Chunk>) -> Result<()> {
        self.assert_cache_not_open("add_chunk");
        self.check_chunk(self.chunks.len(), chunk.position_count())?;
        let end = self.position_count() + chunk.position_count();
        self.chunks.push(chunk);
        self.offsets.push(end);
        Ok(())
    }

    /// Appends the chunks of every non-empty index in `others`, in order.
    ///
    /// Chunk references are shared with the sources. Either every source is merged or, on error,
    /// none is.
    pub fn merge(&mut self, others: &[ChunkIndex]) -> Result<()> {
        self.assert_cache_not_open("merge");

        let mut chunk_id = self.chunks.len();
        for other in others.iter().filter(|o| o.position_count() > 0) {
            for chunk in &other.chunks {
                self.check_chunk(chunk_id, chunk.position_count())?;
                chunk_id += 1;
            }
        }

        let mut merged = 0usize;
        for other in others {
            if other.position_count() == 0 {
                continue;
            }
            if other.typed.as_ref().is_some_and(TypedColumnCache::is_open) {
                log::warn!("merging an index with an open typed cache; the cache is not carried over");
            }
            let base = self.position_count();
            self.chunks.extend(other.chunks.iter().cloned());
            self.offsets
                .extend(other.offsets[1..].iter().map(|offset| offset + base));
            merged += 1;
        }

        log::debug!(
            "merged {merged} of {} indices: {} chunks, {} positions",
            others.len(),
            self.chunk_count(),
            self.position_count()
        );
        Ok(())
    }

    fn check_chunk(&self, chunk_id: usize, rows: usize) -> Result<()> {
        if chunk_id >= MAX_CHUNKS {
            return Err(ChunkIndexError::TooManyChunks {
                chunks: chunk_id + 1,
                max: MAX_CHUNKS,
            });
        }
        if rows > self.max_chunk_rows {
            return Err(ChunkIndexError::ChunkTooLarge {
                rows,
                max: self.max_chunk_rows,
            });
        }
        Ok(())
    }

    #[track_caller]
    fn assert_cache_not_open(&self, op: &str) {
        assert!(
            !self.typed.as_ref().is_some_and(TypedColumnCache::is_open),
            "{op} called after the typed cache was opened"
        );
    }

    pub fn position_count(&self) -> usize {
        // The table always holds at least the leading zero.
        self.offsets[self.offsets.len() - 1]
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk(&self, chunk_id: usize) -> &Arc<Chunk> {
        &self.chunks[chunk_id]
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    /// First logical position of chunk `chunk_id`.
    pub fn chunk_offset(&self, chunk_id: usize) -> usize {
        self.offsets[chunk_id]
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Maps a logical position to `(chunk id, offset in chunk)`.
    ///
    /// Zero-length chunks never own a position and are skipped.
    #[inline]
    pub fn locate(&self, position: usize) -> (usize, usize) {
        debug_assert!(
            position < self.position_count(),
            "position {position} out of range ({} positions)",
            self.position_count()
        );
        // Last chunk whose first position is <= `position`.
        let chunk_id = self.offsets.partition_point(|&start| start <= position) - 1;
        (chunk_id, position - self.offsets[chunk_id])
    }

    #[inline]
    pub fn address(&self, position: usize) -> SyntheticAddress {
        let (chunk_id, offset) = self.locate(position);
        SyntheticAddress::from_raw(encode(chunk_id, offset))
    }

    /// [`Self::locate`] for many positions, writing into `chunk_ids` and `offsets`.
    pub fn locate_batch(&self, positions: &[usize], chunk_ids: &mut [usize], offsets: &mut [usize]) {
        assert!(
            chunk_ids.len() >= positions.len() && offsets.len() >= positions.len(),
            "output slices must hold {} entries",
            positions.len()
        );
        for ((&position, chunk_id), offset) in positions
            .iter()
            .zip(chunk_ids.iter_mut())
            .zip(offsets.iter_mut())
        {
            (*chunk_id, *offset) = self.locate(position);
        }
    }

    #[inline]
    fn cell(&self, column: usize, position: usize) -> (&Block, usize) {
        let (chunk_id, offset) = self.locate(position);
        (self.chunks[chunk_id].block(column), offset)
    }

    pub fn get_value(&self, column: usize, position: usize) -> Value {
        let (block, offset) = self.cell(column, position);
        block.get_value(offset)
    }

    #[inline]
    pub fn get_long(&self, column: usize, position: usize) -> i64 {
        let (block, offset) = self.cell(column, position);
        block.get_long(offset)
    }

    #[inline]
    pub fn get_int(&self, column: usize, position: usize) -> i32 {
        let (block, offset) = self.cell(column, position);
        block.get_int(offset)
    }

    #[inline]
    pub fn get_double(&self, column: usize, position: usize) -> f64 {
        let (block, offset) = self.cell(column, position);
        block.get_double(offset)
    }

    pub fn is_null(&self, column: usize, position: usize) -> bool {
        let (block, offset) = self.cell(column, position);
        block.is_null(offset)
    }

    pub fn write_position_to(&self, column: usize, position: usize, sink: &mut BlockBuilder) {
        let (block, offset) = self.cell(column, position);
        block.write_position_to(offset, sink);
    }

    /// Like [`Self::write_position_to`] for a caller that already holds the chunk address.
    pub fn write_chunk_position_to(
        &self,
        chunk_id: usize,
        offset: usize,
        column: usize,
        sink: &mut BlockBuilder,
    ) {
        self.chunks[chunk_id]
            .block(column)
            .write_position_to(offset, sink);
    }

    pub fn row_at(&self, position: usize) -> ChunkRow<'_> {
        let (chunk_id, offset) = self.locate(position);
        self.chunks[chunk_id].row_at(offset)
    }

    /// Row view for an address previously produced by [`Self::address`].
    pub fn resolve(&self, address: SyntheticAddress) -> ChunkRow<'_> {
        self.chunks[address.chunk_id()].row_at(address.offset())
    }

    #[inline]
    pub fn hash_code(&self, position: usize) -> u64 {
        let (chunk_id, offset) = self.locate(position);
        self.chunks[chunk_id].hash_code(offset)
    }

    /// Compares two rows of this index.
    #[inline]
    pub fn equals(&self, position1: usize, position2: usize) -> bool {
        let (chunk1, offset1) = self.locate(position1);
        let (chunk2, offset2) = self.locate(position2);
        self.chunks[chunk1].equals(offset1, &self.chunks[chunk2], offset2)
    }

    /// Compares a row of this index with row `other_position` of an arbitrary chunk.
    #[inline]
    pub fn equals_chunk_row(&self, position: usize, other: &Chunk, other_position: usize) -> bool {
        let (chunk_id, offset) = self.locate(position);
        self.chunks[chunk_id].equals(offset, other, other_position)
    }

    /// Single-pass iterator over the chunks in append order.
    ///
    /// The index keeps its own references; releasing memory is up to the consumer.
    pub fn drain_chunks(&self) -> DrainChunks<'_> {
        DrainChunks {
            inner: self.chunks.iter(),
        }
    }

    /// Bytes used by the index bookkeeping, excluding chunk payloads and the typed cache.
    pub fn estimate_self_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.offsets.capacity() * std::mem::size_of::<usize>()
            + self.chunks.capacity() * std::mem::size_of::<Arc<Chunk>>()
    }

    /// Bytes the typed cache uses, or would use once opened at the current row count.
    pub fn estimate_cache_size_bytes(&self) -> usize {
        self.typed
            .as_ref()
            .map_or(0, |cache| cache.estimated_size_bytes(self.position_count()))
    }

    /// Installs the extraction logic for the typed cache. Nothing is allocated yet.
    pub fn set_typed_list_handle(&mut self, handle: Arc<dyn TypedListHandle>) {
        self.assert_cache_not_open("set_typed_list_handle");
        self.typed = Some(TypedColumnCache::new(handle));
    }

    pub fn typed_cache(&self) -> Option<&TypedColumnCache> {
        self.typed.as_ref()
    }

    /// Allocates the typed lists for the current row count. No-op without a handle.
    pub fn open_typed_cache(&mut self) {
        let (position_count, chunk_count) = (self.position_count(), self.chunk_count());
        if let Some(cache) = &mut self.typed {
            cache.open(position_count, chunk_count);
        }
    }

    /// Copies chunk `chunk_id` into the typed lists. No-op without a handle.
    pub fn populate_typed_cache(&mut self, chunk_id: usize) {
        if let Some(cache) = &mut self.typed {
            cache.populate(chunk_id, &self.chunks[chunk_id], self.offsets[chunk_id]);
        }
    }

    #[track_caller]
    fn cache_for_read(&self) -> &TypedColumnCache {
        let Some(cache) = &self.typed else {
            panic!("typed cache read without a typed list handle");
        };
        cache
    }

    /// Reads the cached copy of list `column` at `position`.
    ///
    /// Panics unless the cache is open and the chunk owning `position` has been populated.
    #[inline]
    pub fn typed_long(&self, column: usize, position: usize) -> i64 {
        self.cache_for_read().get_long(column, position)
    }

    #[inline]
    pub fn typed_int(&self, column: usize, position: usize) -> i32 {
        self.cache_for_read().get_int(column, position)
    }

    #[inline]
    pub fn typed_double(&self, column: usize, position: usize) -> f64 {
        self.cache_for_read().get_double(column, position)
    }

    /// Releases the typed cache, if any. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(cache) = &mut self.typed {
            cache.close();
        }
    }
}

/// Iterator returned by [`ChunkIndex::drain_chunks`].
#[derive(Debug)]
pub struct DrainChunks<'a> {
    inner: std::slice::Iter<'a, Arc<Chunk>>,
}

impl Iterator for DrainChunks<'_> {
    type Item = Arc<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().cloned()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for DrainChunks<'_> {}

impl FusedIterator for DrainChunks<'_> {}
