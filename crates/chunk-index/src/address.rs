//! Synthetic row addresses.
//!
//! A synthetic address packs a `(chunk id, offset in chunk)` pair into one `i64` so that hash
//! tables built by join and aggregation operators can store a single scalar per row.
//!
//! Layout (most significant bit first):
//!
//! ```text
//! | 0 (sign) | chunk id: 31 bits | offset: 32 bits |
//! ```
//!
//! This bounds an index to [`MAX_CHUNKS`] chunks of at most [`MAX_CHUNK_ROWS`] rows each. The sign
//! bit is never set by a valid address, which leaves [`NULL_ADDRESS`] (`-1`) free as an empty-slot
//! marker for raw slot arrays.

#![forbid(unsafe_code)]

use crate::error::{ChunkIndexError, Result};
use std::fmt;

pub const OFFSET_BITS: u32 = 32;
pub const CHUNK_ID_BITS: u32 = 31;

const OFFSET_MASK: i64 = (1i64 << OFFSET_BITS) - 1;
const CHUNK_ID_MASK: i64 = (1i64 << CHUNK_ID_BITS) - 1;

/// Number of addressable chunks.
pub const MAX_CHUNKS: usize = 1 << CHUNK_ID_BITS;
/// Number of addressable rows within one chunk.
pub const MAX_CHUNK_ROWS: usize = 1 << OFFSET_BITS;

/// Empty-slot marker for raw address arrays. Never produced by [`encode`].
pub const NULL_ADDRESS: i64 = -1;

/// Packs a pair into a raw address.
///
/// Branch-free; the caller guarantees `chunk_id < MAX_CHUNKS` and `offset < MAX_CHUNK_ROWS`
/// (checked in debug builds). Use [`SyntheticAddress::try_new`] where the bounds are not already
/// enforced.
#[inline]
pub fn encode(chunk_id: usize, offset: usize) -> i64 {
    debug_assert!(chunk_id < MAX_CHUNKS, "chunk id {chunk_id} out of range");
    debug_assert!(offset < MAX_CHUNK_ROWS, "offset {offset} out of range");
    ((chunk_id as i64) << OFFSET_BITS) | (offset as i64 & OFFSET_MASK)
}

#[inline]
pub fn decode_chunk_id(address: i64) -> usize {
    ((address >> OFFSET_BITS) & CHUNK_ID_MASK) as usize
}

#[inline]
pub fn decode_offset(address: i64) -> usize {
    (address & OFFSET_MASK) as usize
}

/// A `(chunk id, offset)` handle packed into one `i64`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyntheticAddress(i64);

impl SyntheticAddress {
    /// Packs a pair, failing if either field does not fit the layout.
    pub fn try_new(chunk_id: usize, offset: usize) -> Result<Self> {
        if chunk_id >= MAX_CHUNKS || offset >= MAX_CHUNK_ROWS {
            return Err(ChunkIndexError::AddressOverflow { chunk_id, offset });
        }
        Ok(Self(encode(chunk_id, offset)))
    }

    /// Packs a pair.
    ///
    /// # Panics
    ///
    /// If either field does not fit the layout.
    #[track_caller]
    pub fn new(chunk_id: usize, offset: usize) -> Self {
        match Self::try_new(chunk_id, offset) {
            Ok(address) => address,
            Err(err) => panic!("{err}"),
        }
    }

    /// Wraps a raw value read back from a slot array.
    #[inline]
    pub fn from_raw(raw: i64) -> Self {
        debug_assert!(raw >= 0, "raw address {raw} is not a valid synthetic address");
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn chunk_id(self) -> usize {
        decode_chunk_id(self.0)
    }

    #[inline]
    pub fn offset(self) -> usize {
        decode_offset(self.0)
    }
}

impl fmt::Debug for SyntheticAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticAddress")
            .field("chunk_id", &self.chunk_id())
            .field("offset", &self.offset())
            .finish()
    }
}

impl From<SyntheticAddress> for i64 {
    fn from(address: SyntheticAddress) -> Self {
        address.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_maxima() {
        assert_eq!(MAX_CHUNKS, 2_147_483_648);
        assert_eq!(MAX_CHUNK_ROWS, 4_294_967_296);
        assert_eq!(OFFSET_BITS + CHUNK_ID_BITS, 63);
    }

    #[test]
    fn extremes_round_trip_and_stay_non_negative() {
        let max = encode(MAX_CHUNKS - 1, MAX_CHUNK_ROWS - 1);
        assert_eq!(max, i64::MAX);
        assert_eq!(decode_chunk_id(max), MAX_CHUNKS - 1);
        assert_eq!(decode_offset(max), MAX_CHUNK_ROWS - 1);

        assert_eq!(encode(0, 0), 0);
        assert_eq!(encode(1, 0), 1 << 32);
        assert_ne!(encode(0, 0), NULL_ADDRESS);
    }

    #[test]
    fn try_new_rejects_overflow() {
        assert_eq!(
            SyntheticAddress::try_new(MAX_CHUNKS, 0),
            Err(ChunkIndexError::AddressOverflow {
                chunk_id: MAX_CHUNKS,
                offset: 0,
            })
        );
        assert!(SyntheticAddress::try_new(0, MAX_CHUNK_ROWS).is_err());

        let address = SyntheticAddress::try_new(7, 3).unwrap();
        assert_eq!((address.chunk_id(), address.offset()), (7, 3));
        assert_eq!(SyntheticAddress::from_raw(address.raw()), address);
    }

    #[test]
    #[should_panic(expected = "does not fit the synthetic address layout")]
    fn new_panics_on_overflow() {
        SyntheticAddress::new(0, MAX_CHUNK_ROWS);
    }

    #[test]
    fn debug_shows_fields() {
        let address = SyntheticAddress::new(2, 9);
        assert_eq!(
            format!("{address:?}"),
            "SyntheticAddress { chunk_id: 2, offset: 9 }"
        );
    }
}
