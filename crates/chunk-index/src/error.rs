use crate::types::DataType;

pub type Result<T> = std::result::Result<T, ChunkIndexError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkIndexError {
    #[error("chunk count {chunks} exceeds the address space limit of {max} chunks")]
    TooManyChunks { chunks: usize, max: usize },

    #[error("chunk with {rows} rows exceeds the per-chunk limit of {max} rows")]
    ChunkTooLarge { rows: usize, max: usize },

    #[error("address ({chunk_id}, {offset}) does not fit the synthetic address layout")]
    AddressOverflow { chunk_id: usize, offset: usize },

    #[error("block {block} has {actual} positions, expected {expected}")]
    BlockLengthMismatch {
        block: usize,
        expected: usize,
        actual: usize,
    },

    #[error("column {column} of type {data_type:?} cannot be cached as a typed list")]
    UnsupportedTypedColumn { column: usize, data_type: DataType },

    #[error("invalid index options: {0}")]
    InvalidOptions(String),
}
