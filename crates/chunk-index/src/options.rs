#![forbid(unsafe_code)]

use crate::address::MAX_CHUNK_ROWS;
use crate::error::{ChunkIndexError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Number of chunk slots to reserve up front.
    pub chunk_capacity: usize,
    /// Largest chunk the index accepts. Must be in `1..=MAX_CHUNK_ROWS`.
    pub max_chunk_rows: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            chunk_capacity: 16,
            max_chunk_rows: MAX_CHUNK_ROWS,
        }
    }
}

impl IndexOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_rows == 0 || self.max_chunk_rows > MAX_CHUNK_ROWS {
            return Err(ChunkIndexError::InvalidOptions(format!(
                "max_chunk_rows must be between 1 and {MAX_CHUNK_ROWS}, got {}",
                self.max_chunk_rows
            )));
        }
        Ok(())
    }
}
