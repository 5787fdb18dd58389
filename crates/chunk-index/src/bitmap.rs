#![forbid(unsafe_code)]

/// Fixed-growth bit vector backing null masks and per-chunk flags.
///
/// Bit `i` lives in word `i / 64` at bit position `i % 64` (LSB first).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitVec {
    words: Vec<u64>,
    len: usize,
    ones: usize,
}

impl BitVec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bits(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity(bits.div_ceil(64)),
            len: 0,
            ones: 0,
        }
    }

    pub fn with_len_all_false(bits: usize) -> Self {
        Self {
            words: vec![0u64; bits.div_ceil(64)],
            len: bits,
            ones: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, value: bool) {
        let (word, bit) = (self.len / 64, self.len % 64);
        if bit == 0 {
            self.words.push(0);
        }
        if value {
            self.words[word] |= 1u64 << bit;
            self.ones += 1;
        }
        self.len += 1;
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.len, "bit {index} out of bounds ({})", self.len);
        (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    pub fn set(&mut self, index: usize, value: bool) {
        debug_assert!(index < self.len, "bit {index} out of bounds ({})", self.len);
        let mask = 1u64 << (index % 64);
        let word = &mut self.words[index / 64];
        let was_set = *word & mask != 0;
        if value && !was_set {
            *word |= mask;
            self.ones += 1;
        } else if !value && was_set {
            *word &= !mask;
            self.ones -= 1;
        }
    }

    /// Sets every bit in `start..end`.
    pub fn set_range(&mut self, start: usize, end: usize) {
        debug_assert!(end <= self.len, "range end {end} out of bounds ({})", self.len);
        for index in start..end {
            self.set(index, true);
        }
    }

    pub fn count_ones(&self) -> usize {
        self.ones
    }

    pub fn any(&self) -> bool {
        self.ones > 0
    }

    pub fn size_in_bytes(&self) -> usize {
        self.words.capacity() * std::mem::size_of::<u64>()
    }
}
