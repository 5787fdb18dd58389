#![forbid(unsafe_code)]

use crate::block::{Block, BlockBuilder};
use crate::error::{ChunkIndexError, Result};
use crate::types::{DataType, Value};

/// An immutable batch of equally long blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    blocks: Vec<Block>,
    position_count: usize,
}

impl Chunk {
    pub fn new(blocks: Vec<Block>) -> Result<Self> {
        let position_count = blocks.first().map_or(0, Block::position_count);
        for (idx, block) in blocks.iter().enumerate() {
            if block.position_count() != position_count {
                return Err(ChunkIndexError::BlockLengthMismatch {
                    block: idx,
                    expected: position_count,
                    actual: block.position_count(),
                });
            }
        }
        Ok(Self {
            blocks,
            position_count,
        })
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn block(&self, idx: usize) -> &Block {
        &self.blocks[idx]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Row hash combining every column in order.
    #[inline]
    pub fn hash_code(&self, pos: usize) -> u64 {
        self.blocks
            .iter()
            .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(b.hash_code(pos)))
    }

    /// Row equality against a row of another (possibly differently stored) chunk.
    #[inline]
    pub fn equals(&self, pos: usize, other: &Chunk, other_pos: usize) -> bool {
        self.blocks.len() == other.blocks.len()
            && self
                .blocks
                .iter()
                .zip(&other.blocks)
                .all(|(a, b)| a.equals(pos, b, other_pos))
    }

    pub fn row_at(&self, pos: usize) -> ChunkRow<'_> {
        debug_assert!(pos < self.position_count);
        ChunkRow {
            chunk: self,
            position: pos,
        }
    }

    /// Payload bytes held by all blocks.
    pub fn estimate_size(&self) -> usize {
        self.blocks.iter().map(Block::estimate_size).sum()
    }
}

/// Borrowed view of one row of a chunk.
#[derive(Clone, Copy, Debug)]
pub struct ChunkRow<'a> {
    chunk: &'a Chunk,
    position: usize,
}

impl<'a> ChunkRow<'a> {
    pub fn chunk(&self) -> &'a Chunk {
        self.chunk
    }

    /// Offset of this row inside its chunk.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn column_count(&self) -> usize {
        self.chunk.block_count()
    }

    pub fn get_value(&self, col: usize) -> Value {
        self.chunk.block(col).get_value(self.position)
    }

    pub fn values(&self) -> Vec<Value> {
        self.chunk
            .blocks()
            .iter()
            .map(|b| b.get_value(self.position))
            .collect()
    }

    pub fn hash_code(&self) -> u64 {
        self.chunk.hash_code(self.position)
    }
}

impl PartialEq for ChunkRow<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.chunk.equals(self.position, other.chunk, other.position)
    }
}

/// Row-at-a-time builder for [`Chunk`], mostly useful to producers and tests.
pub struct ChunkBuilder {
    builders: Vec<BlockBuilder>,
}

impl ChunkBuilder {
    pub fn new(types: &[DataType]) -> Self {
        Self::with_capacity(types, 0)
    }

    pub fn with_capacity(types: &[DataType], capacity: usize) -> Self {
        Self {
            builders: types
                .iter()
                .map(|t| BlockBuilder::new(*t, capacity))
                .collect(),
        }
    }

    pub fn append_row(&mut self, row: &[Value]) {
        assert_eq!(
            row.len(),
            self.builders.len(),
            "row length must match schema"
        );
        for (builder, value) in self.builders.iter_mut().zip(row) {
            builder.append_value(value);
        }
    }

    pub fn position_count(&self) -> usize {
        self.builders.first().map_or(0, BlockBuilder::position_count)
    }

    pub fn build(self) -> Chunk {
        let position_count = self.position_count();
        Chunk {
            blocks: self.builders.into_iter().map(BlockBuilder::build).collect(),
            position_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(rows: &[(i64, &str)]) -> Chunk {
        let mut builder = ChunkBuilder::new(&[DataType::Long, DataType::Varchar]);
        for (k, v) in rows {
            builder.append_row(&[Value::Long(*k), Value::from(*v)]);
        }
        builder.build()
    }

    #[test]
    fn rows_compare_across_chunks() {
        let a = chunk(&[(1, "x"), (2, "y")]);
        let b = chunk(&[(2, "y"), (1, "z")]);
        assert!(a.equals(1, &b, 0));
        assert_eq!(a.hash_code(1), b.hash_code(0));
        assert!(!a.equals(0, &b, 1));
        assert_eq!(a.row_at(1), b.row_at(0));
    }

    #[test]
    fn row_view_reads_all_columns() {
        let a = chunk(&[(1, "x"), (2, "y")]);
        let row = a.row_at(1);
        assert_eq!(row.position(), 1);
        assert_eq!(row.column_count(), 2);
        assert_eq!(row.values(), vec![Value::Long(2), Value::from("y")]);
        assert_eq!(row.hash_code(), a.hash_code(1));
    }

    #[test]
    fn new_rejects_ragged_blocks() {
        let mut longs = BlockBuilder::new(DataType::Long, 2);
        longs.append_value(&Value::Long(1));
        longs.append_value(&Value::Long(2));
        let mut ints = BlockBuilder::new(DataType::Int, 1);
        ints.append_value(&Value::Int(1));

        let err = Chunk::new(vec![longs.build(), ints.build()]).unwrap_err();
        assert_eq!(
            err,
            ChunkIndexError::BlockLengthMismatch {
                block: 1,
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn estimate_size_sums_blocks() {
        let c = chunk(&[(1, "ab"), (2, "c")]);
        // 2 longs, 3 string offsets and 3 string bytes; no null masks.
        assert_eq!(c.estimate_size(), 2 * 8 + 3 * 8 + 3);
        assert_eq!(
            c.estimate_size(),
            c.blocks().iter().map(Block::estimate_size).sum::<usize>()
        );
    }

    #[test]
    fn empty_chunk_has_no_positions() {
        let empty = ChunkBuilder::new(&[DataType::Int]).build();
        assert_eq!(empty.position_count(), 0);
        assert_eq!(empty.block_count(), 1);
        assert_eq!(Chunk::new(Vec::new()).unwrap().position_count(), 0);
    }
}
