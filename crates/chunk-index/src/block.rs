//! Column storage within a chunk.
//!
//! A [`Block`] is a closed set of physical column variants behind one accessor surface. The variant
//! is fixed when the block is built; every accessor is a single `match`, so no per-access type
//! inspection or dynamic dispatch happens on the hot path.
//!
//! Hashing and equality are consistent with each other:
//! - `Int` and `Long` compare and hash as the widened `i64`.
//! - Doubles compare by normalized bit pattern (`-0.0 == 0.0`, all NaNs are equal).
//! - Null equals null and hashes to [`NULL_HASH`].

#![forbid(unsafe_code)]

use crate::bitmap::BitVec;
use crate::types::{DataType, Value};
use ahash::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::{Arc, OnceLock};

/// Hash code of a null cell.
pub const NULL_HASH: u64 = 0;

fn hash_state() -> &'static RandomState {
    static STATE: OnceLock<RandomState> = OnceLock::new();
    // Fixed seeds: hash codes must agree across chunks and partitions of one query.
    STATE.get_or_init(|| {
        RandomState::with_seeds(
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
            0x082e_fa98_ec4e_6c89,
        )
    })
}

#[inline]
fn hash_of<T: Hash>(value: T) -> u64 {
    BuildHasher::hash_one(hash_state(), value)
}

#[inline]
fn normalize_f64(v: f64) -> u64 {
    if v == 0.0 {
        0
    } else if v.is_nan() {
        f64::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

#[track_caller]
fn type_mismatch(op: &str, data_type: DataType) -> ! {
    panic!("{op} is not supported on {data_type:?} blocks")
}

/// Fixed-width values plus an optional null mask (bit set = null).
#[derive(Clone, Debug, PartialEq)]
pub struct FixedBlock<T> {
    values: Box<[T]>,
    nulls: Option<BitVec>,
}

impl<T: Copy> FixedBlock<T> {
    pub fn new(values: Vec<T>, nulls: Option<BitVec>) -> Self {
        if let Some(nulls) = &nulls {
            assert_eq!(nulls.len(), values.len(), "null mask length must match values");
        }
        Self {
            values: values.into_boxed_slice(),
            nulls: nulls.filter(BitVec::any),
        }
    }

    /// Raw values; null positions hold `T::default()`.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn is_null(&self, pos: usize) -> bool {
        self.nulls.as_ref().is_some_and(|n| n.get(pos))
    }

    #[inline]
    pub fn get(&self, pos: usize) -> T {
        self.values[pos]
    }

    fn size_in_bytes(&self) -> usize {
        self.values.len() * std::mem::size_of::<T>()
            + self.nulls.as_ref().map_or(0, BitVec::size_in_bytes)
    }
}

/// Variable-length strings stored as one buffer plus `len + 1` offsets.
#[derive(Clone, Debug, PartialEq)]
pub struct VarcharBlock {
    offsets: Box<[usize]>,
    data: Box<str>,
    nulls: Option<BitVec>,
}

impl VarcharBlock {
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_null(&self, pos: usize) -> bool {
        self.nulls.as_ref().is_some_and(|n| n.get(pos))
    }

    #[inline]
    pub fn get_str(&self, pos: usize) -> &str {
        &self.data[self.offsets[pos]..self.offsets[pos + 1]]
    }

    fn size_in_bytes(&self) -> usize {
        self.offsets.len() * std::mem::size_of::<usize>()
            + self.data.len()
            + self.nulls.as_ref().map_or(0, BitVec::size_in_bytes)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Int(FixedBlock<i32>),
    Long(FixedBlock<i64>),
    Double(FixedBlock<f64>),
    Boolean(FixedBlock<bool>),
    Varchar(VarcharBlock),
}

impl Block {
    pub fn data_type(&self) -> DataType {
        match self {
            Block::Int(_) => DataType::Int,
            Block::Long(_) => DataType::Long,
            Block::Double(_) => DataType::Double,
            Block::Boolean(_) => DataType::Boolean,
            Block::Varchar(_) => DataType::Varchar,
        }
    }

    pub fn position_count(&self) -> usize {
        match self {
            Block::Int(b) => b.len(),
            Block::Long(b) => b.len(),
            Block::Double(b) => b.len(),
            Block::Boolean(b) => b.len(),
            Block::Varchar(b) => b.len(),
        }
    }

    #[inline]
    pub fn is_null(&self, pos: usize) -> bool {
        match self {
            Block::Int(b) => b.is_null(pos),
            Block::Long(b) => b.is_null(pos),
            Block::Double(b) => b.is_null(pos),
            Block::Boolean(b) => b.is_null(pos),
            Block::Varchar(b) => b.is_null(pos),
        }
    }

    pub fn get_value(&self, pos: usize) -> Value {
        if self.is_null(pos) {
            return Value::Null;
        }
        match self {
            Block::Int(b) => Value::Int(b.get(pos)),
            Block::Long(b) => Value::Long(b.get(pos)),
            Block::Double(b) => Value::Double(b.get(pos)),
            Block::Boolean(b) => Value::Boolean(b.get(pos)),
            Block::Varchar(b) => Value::String(Arc::from(b.get_str(pos))),
        }
    }

    #[inline]
    pub fn get_int(&self, pos: usize) -> i32 {
        match self {
            Block::Int(b) => b.get(pos),
            other => type_mismatch("get_int", other.data_type()),
        }
    }

    /// Reads an integer cell, widening `Int` blocks.
    #[inline]
    pub fn get_long(&self, pos: usize) -> i64 {
        match self {
            Block::Int(b) => i64::from(b.get(pos)),
            Block::Long(b) => b.get(pos),
            other => type_mismatch("get_long", other.data_type()),
        }
    }

    #[inline]
    pub fn get_double(&self, pos: usize) -> f64 {
        match self {
            Block::Double(b) => b.get(pos),
            other => type_mismatch("get_double", other.data_type()),
        }
    }

    #[inline]
    pub fn get_bool(&self, pos: usize) -> bool {
        match self {
            Block::Boolean(b) => b.get(pos),
            other => type_mismatch("get_bool", other.data_type()),
        }
    }

    #[inline]
    pub fn get_str(&self, pos: usize) -> &str {
        match self {
            Block::Varchar(b) => b.get_str(pos),
            other => type_mismatch("get_str", other.data_type()),
        }
    }

    /// Appends the cell at `pos` to `builder`, which must have the same type as this block.
    pub fn write_position_to(&self, pos: usize, builder: &mut BlockBuilder) {
        if self.is_null(pos) {
            builder.append_null();
            return;
        }
        match (self, builder) {
            (Block::Int(b), BlockBuilder::Int(out)) => out.push(b.get(pos)),
            (Block::Long(b), BlockBuilder::Long(out)) => out.push(b.get(pos)),
            (Block::Double(b), BlockBuilder::Double(out)) => out.push(b.get(pos)),
            (Block::Boolean(b), BlockBuilder::Boolean(out)) => out.push(b.get(pos)),
            (Block::Varchar(b), BlockBuilder::Varchar(out)) => out.push(b.get_str(pos)),
            (block, builder) => panic!(
                "cannot write a {:?} cell into a {:?} builder",
                block.data_type(),
                builder.data_type()
            ),
        }
    }

    #[inline]
    pub fn hash_code(&self, pos: usize) -> u64 {
        if self.is_null(pos) {
            return NULL_HASH;
        }
        match self {
            Block::Int(b) => hash_of(i64::from(b.get(pos))),
            Block::Long(b) => hash_of(b.get(pos)),
            Block::Double(b) => hash_of(normalize_f64(b.get(pos))),
            Block::Boolean(b) => hash_of(b.get(pos)),
            Block::Varchar(b) => hash_of(b.get_str(pos)),
        }
    }

    /// Compares the cell at `pos` with the cell at `other_pos` of `other`.
    ///
    /// Cells of incompatible types are never equal.
    #[inline]
    pub fn equals(&self, pos: usize, other: &Block, other_pos: usize) -> bool {
        match (self.is_null(pos), other.is_null(other_pos)) {
            (true, true) => return true,
            (true, false) | (false, true) => return false,
            (false, false) => {}
        }
        match (self, other) {
            (Block::Int(_) | Block::Long(_), Block::Int(_) | Block::Long(_)) => {
                self.get_long(pos) == other.get_long(other_pos)
            }
            (Block::Double(a), Block::Double(b)) => {
                normalize_f64(a.get(pos)) == normalize_f64(b.get(other_pos))
            }
            (Block::Boolean(a), Block::Boolean(b)) => a.get(pos) == b.get(other_pos),
            (Block::Varchar(a), Block::Varchar(b)) => a.get_str(pos) == b.get_str(other_pos),
            _ => false,
        }
    }

    /// Payload bytes held by this block.
    pub fn estimate_size(&self) -> usize {
        match self {
            Block::Int(b) => b.size_in_bytes(),
            Block::Long(b) => b.size_in_bytes(),
            Block::Double(b) => b.size_in_bytes(),
            Block::Boolean(b) => b.size_in_bytes(),
            Block::Varchar(b) => b.size_in_bytes(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FixedBuilder<T> {
    values: Vec<T>,
    nulls: BitVec,
}

impl<T: Copy + Default> FixedBuilder<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            nulls: BitVec::with_capacity_bits(capacity),
        }
    }

    pub fn push(&mut self, value: T) {
        self.values.push(value);
        self.nulls.push(false);
    }

    pub fn push_null(&mut self) {
        self.values.push(T::default());
        self.nulls.push(true);
    }

    fn finish(self) -> FixedBlock<T> {
        FixedBlock::new(self.values, Some(self.nulls))
    }
}

#[derive(Clone, Debug)]
pub struct VarcharBuilder {
    offsets: Vec<usize>,
    data: String,
    nulls: BitVec,
}

impl VarcharBuilder {
    fn with_capacity(capacity: usize) -> Self {
        let mut offsets = Vec::with_capacity(capacity + 1);
        offsets.push(0);
        Self {
            offsets,
            data: String::new(),
            nulls: BitVec::with_capacity_bits(capacity),
        }
    }

    pub fn push(&mut self, value: &str) {
        self.data.push_str(value);
        self.offsets.push(self.data.len());
        self.nulls.push(false);
    }

    pub fn push_null(&mut self) {
        self.offsets.push(self.data.len());
        self.nulls.push(true);
    }

    fn finish(self) -> VarcharBlock {
        VarcharBlock {
            offsets: self.offsets.into_boxed_slice(),
            data: self.data.into_boxed_str(),
            nulls: Some(self.nulls).filter(BitVec::any),
        }
    }
}

/// Append-only sink producing one [`Block`].
#[derive(Clone, Debug)]
pub enum BlockBuilder {
    Int(FixedBuilder<i32>),
    Long(FixedBuilder<i64>),
    Double(FixedBuilder<f64>),
    Boolean(FixedBuilder<bool>),
    Varchar(VarcharBuilder),
}

impl BlockBuilder {
    pub fn new(data_type: DataType, capacity: usize) -> Self {
        match data_type {
            DataType::Int => BlockBuilder::Int(FixedBuilder::with_capacity(capacity)),
            DataType::Long => BlockBuilder::Long(FixedBuilder::with_capacity(capacity)),
            DataType::Double => BlockBuilder::Double(FixedBuilder::with_capacity(capacity)),
            DataType::Boolean => BlockBuilder::Boolean(FixedBuilder::with_capacity(capacity)),
            DataType::Varchar => BlockBuilder::Varchar(VarcharBuilder::with_capacity(capacity)),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            BlockBuilder::Int(_) => DataType::Int,
            BlockBuilder::Long(_) => DataType::Long,
            BlockBuilder::Double(_) => DataType::Double,
            BlockBuilder::Boolean(_) => DataType::Boolean,
            BlockBuilder::Varchar(_) => DataType::Varchar,
        }
    }

    pub fn position_count(&self) -> usize {
        match self {
            BlockBuilder::Int(b) => b.values.len(),
            BlockBuilder::Long(b) => b.values.len(),
            BlockBuilder::Double(b) => b.values.len(),
            BlockBuilder::Boolean(b) => b.values.len(),
            BlockBuilder::Varchar(b) => b.offsets.len() - 1,
        }
    }

    pub fn append_null(&mut self) {
        match self {
            BlockBuilder::Int(b) => b.push_null(),
            BlockBuilder::Long(b) => b.push_null(),
            BlockBuilder::Double(b) => b.push_null(),
            BlockBuilder::Boolean(b) => b.push_null(),
            BlockBuilder::Varchar(b) => b.push_null(),
        }
    }

    /// Appends `value`; its type must match the builder exactly (nulls are always accepted).
    pub fn append_value(&mut self, value: &Value) {
        match (self, value) {
            (builder, Value::Null) => builder.append_null(),
            (BlockBuilder::Int(b), Value::Int(v)) => b.push(*v),
            (BlockBuilder::Long(b), Value::Long(v)) => b.push(*v),
            (BlockBuilder::Double(b), Value::Double(v)) => b.push(*v),
            (BlockBuilder::Boolean(b), Value::Boolean(v)) => b.push(*v),
            (BlockBuilder::Varchar(b), Value::String(v)) => b.push(v),
            (builder, value) => panic!(
                "cannot append {value} to a {:?} builder",
                builder.data_type()
            ),
        }
    }

    pub fn build(self) -> Block {
        match self {
            BlockBuilder::Int(b) => Block::Int(b.finish()),
            BlockBuilder::Long(b) => Block::Long(b.finish()),
            BlockBuilder::Double(b) => Block::Double(b.finish()),
            BlockBuilder::Boolean(b) => Block::Boolean(b.finish()),
            BlockBuilder::Varchar(b) => Block::Varchar(b.finish()),
        }
    }
}
