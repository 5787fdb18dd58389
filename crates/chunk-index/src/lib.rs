//! Positional addressing over immutable columnar chunks.
//!
//! This crate focuses on:
//! - Treating a growing list of chunks as one randomly addressable row sequence, without copying
//!   row data ([`ChunkIndex`]).
//! - Packing `(chunk, offset)` pairs into one scalar for hash table slots ([`SyntheticAddress`]).
//! - Optional flat typed copies of key columns for hashing and probing ([`TypedColumnCache`]).

#![forbid(unsafe_code)]

mod bitmap;
mod block;
mod chunk;
mod error;
mod index;
mod options;
mod typed;
mod types;

pub mod address;

pub use crate::address::SyntheticAddress;
pub use crate::bitmap::BitVec;
pub use crate::block::{
    Block, BlockBuilder, FixedBlock, FixedBuilder, VarcharBlock, VarcharBuilder, NULL_HASH,
};
pub use crate::chunk::{Chunk, ChunkBuilder, ChunkRow};
pub use crate::error::{ChunkIndexError, Result};
pub use crate::index::{ChunkIndex, DrainChunks};
pub use crate::options::IndexOptions;
pub use crate::typed::{
    KeyColumnsHandle, TypedColumnCache, TypedList, TypedListHandle, TypedListKind,
};
pub use crate::types::{DataType, Value};
