//! Flat typed copies of key columns.
//!
//! Hash join and hash aggregation read their key columns once per probe. Going through
//! [`Block`] costs a chunk lookup plus a variant match on every read; a [`TypedColumnCache`] trades
//! one linear copy pass (and the memory for it) for plain array reads indexed by logical position.
//!
//! The cache is driven by a [`TypedListHandle`] supplied by the operator. The handle decides which
//! columns are copied and how; [`KeyColumnsHandle`] covers the common case of fixed-width key
//! columns.
//!
//! Lifecycle: `Unopened -> Open -> Closed`. While open, each chunk is populated at most once.
//! Reading before open, after close, or at a position whose chunk was never populated is a
//! programming error and panics.

#![forbid(unsafe_code)]

use crate::bitmap::BitVec;
use crate::block::Block;
use crate::chunk::Chunk;
use crate::error::{ChunkIndexError, Result};
use crate::types::DataType;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypedListKind {
    Int,
    Long,
    Double,
}

impl TypedListKind {
    /// The list kind able to mirror a column of `data_type`, if any.
    pub fn for_type(data_type: DataType) -> Option<Self> {
        match data_type {
            DataType::Int => Some(TypedListKind::Int),
            DataType::Long => Some(TypedListKind::Long),
            DataType::Double => Some(TypedListKind::Double),
            DataType::Boolean | DataType::Varchar => None,
        }
    }

    pub fn element_size(self) -> usize {
        match self {
            TypedListKind::Int => std::mem::size_of::<i32>(),
            TypedListKind::Long => std::mem::size_of::<i64>(),
            TypedListKind::Double => std::mem::size_of::<f64>(),
        }
    }
}

/// One flat column mirroring logical row order.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedList {
    Int(Box<[i32]>),
    Long(Box<[i64]>),
    Double(Box<[f64]>),
}

impl TypedList {
    pub fn with_len(kind: TypedListKind, len: usize) -> Self {
        match kind {
            TypedListKind::Int => TypedList::Int(vec![0; len].into_boxed_slice()),
            TypedListKind::Long => TypedList::Long(vec![0; len].into_boxed_slice()),
            TypedListKind::Double => TypedList::Double(vec![0.0; len].into_boxed_slice()),
        }
    }

    pub fn kind(&self) -> TypedListKind {
        match self {
            TypedList::Int(_) => TypedListKind::Int,
            TypedList::Long(_) => TypedListKind::Long,
            TypedList::Double(_) => TypedListKind::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedList::Int(v) => v.len(),
            TypedList::Long(v) => v.len(),
            TypedList::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get_int(&self, pos: usize) -> i32 {
        match self {
            TypedList::Int(v) => v[pos],
            other => panic!("get_int is not supported on {:?} lists", other.kind()),
        }
    }

    #[inline]
    pub fn get_long(&self, pos: usize) -> i64 {
        match self {
            TypedList::Int(v) => i64::from(v[pos]),
            TypedList::Long(v) => v[pos],
            other => panic!("get_long is not supported on {:?} lists", other.kind()),
        }
    }

    #[inline]
    pub fn get_double(&self, pos: usize) -> f64 {
        match self {
            TypedList::Double(v) => v[pos],
            other => panic!("get_double is not supported on {:?} lists", other.kind()),
        }
    }

    /// Copies every value of `block` into `self[base..base + block.position_count()]`.
    ///
    /// Null cells copy as zero.
    pub fn copy_from_block(&mut self, block: &Block, base: usize) {
        match (self, block) {
            (TypedList::Int(dst), Block::Int(src)) => {
                dst[base..base + src.len()].copy_from_slice(src.values());
            }
            (TypedList::Long(dst), Block::Long(src)) => {
                dst[base..base + src.len()].copy_from_slice(src.values());
            }
            (TypedList::Long(dst), Block::Int(src)) => {
                for (d, s) in dst[base..base + src.len()].iter_mut().zip(src.values()) {
                    *d = i64::from(*s);
                }
            }
            (TypedList::Double(dst), Block::Double(src)) => {
                dst[base..base + src.len()].copy_from_slice(src.values());
            }
            (list, block) => panic!(
                "cannot copy a {:?} block into a {:?} list",
                block.data_type(),
                list.kind()
            ),
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        self.len() * self.kind().element_size()
    }
}

/// Operator-supplied extraction logic for a [`TypedColumnCache`].
pub trait TypedListHandle: fmt::Debug + Send + Sync {
    /// Bytes the lists for `position_count` rows would occupy.
    fn estimated_size(&self, position_count: usize) -> usize;

    /// Allocates zeroed lists for `position_count` rows, one per designated column.
    fn typed_lists(&self, position_count: usize) -> Vec<TypedList>;

    /// Copies the designated columns of `chunk` into `lists`, starting at logical position `base`.
    fn consume(&self, chunk: &Chunk, base: usize, lists: &mut [TypedList]);
}

/// Mirrors a fixed set of fixed-width columns, in the order given.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyColumnsHandle {
    columns: Vec<(usize, TypedListKind)>,
}

impl KeyColumnsHandle {
    /// `schema` holds the type of every chunk column; `key_columns` selects the ones to mirror.
    pub fn new(schema: &[DataType], key_columns: &[usize]) -> Result<Self> {
        let columns = key_columns
            .iter()
            .map(|&column| {
                let data_type = *schema.get(column).ok_or_else(|| {
                    ChunkIndexError::InvalidOptions(format!(
                        "key column {column} is out of range for a {}-column schema",
                        schema.len()
                    ))
                })?;
                TypedListKind::for_type(data_type)
                    .map(|kind| (column, kind))
                    .ok_or(ChunkIndexError::UnsupportedTypedColumn { column, data_type })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    /// Chunk column mirrored by each list, in list order.
    pub fn key_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns.iter().map(|(column, _)| *column)
    }
}

impl TypedListHandle for KeyColumnsHandle {
    fn estimated_size(&self, position_count: usize) -> usize {
        self.columns
            .iter()
            .map(|(_, kind)| kind.element_size() * position_count)
            .sum()
    }

    fn typed_lists(&self, position_count: usize) -> Vec<TypedList> {
        self.columns
            .iter()
            .map(|(_, kind)| TypedList::with_len(*kind, position_count))
            .collect()
    }

    fn consume(&self, chunk: &Chunk, base: usize, lists: &mut [TypedList]) {
        for ((column, _), list) in self.columns.iter().zip(lists.iter_mut()) {
            list.copy_from_block(chunk.block(*column), base);
        }
    }
}

#[derive(Debug)]
enum CacheState {
    Unopened,
    Open {
        lists: Vec<TypedList>,
        /// One bit per chunk.
        populated: BitVec,
        /// One bit per logical position.
        filled: BitVec,
    },
    Closed,
}

/// Lazily built flat copies of an index's key columns.
#[derive(Debug)]
pub struct TypedColumnCache {
    handle: Arc<dyn TypedListHandle>,
    state: CacheState,
}

impl TypedColumnCache {
    pub fn new(handle: Arc<dyn TypedListHandle>) -> Self {
        Self {
            handle,
            state: CacheState::Unopened,
        }
    }

    pub fn handle(&self) -> &Arc<dyn TypedListHandle> {
        &self.handle
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, CacheState::Open { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, CacheState::Closed)
    }

    /// Expected bytes before open, actual bytes while open, zero once closed.
    pub fn estimated_size_bytes(&self, position_count: usize) -> usize {
        match &self.state {
            CacheState::Unopened => self.handle.estimated_size(position_count),
            CacheState::Open {
                lists,
                populated,
                filled,
            } => {
                lists.iter().map(TypedList::size_in_bytes).sum::<usize>()
                    + populated.size_in_bytes()
                    + filled.size_in_bytes()
            }
            CacheState::Closed => 0,
        }
    }

    /// Allocates the lists for the final row count of the owning index.
    pub fn open(&mut self, position_count: usize, chunk_count: usize) {
        match self.state {
            CacheState::Unopened => {}
            CacheState::Open { .. } => panic!("typed column cache is already open"),
            CacheState::Closed => panic!("typed column cache reopened after close"),
        }
        let lists = self.handle.typed_lists(position_count);
        log::debug!(
            "opened typed column cache: {} lists, {position_count} positions, {chunk_count} chunks",
            lists.len()
        );
        self.state = CacheState::Open {
            lists,
            populated: BitVec::with_len_all_false(chunk_count),
            filled: BitVec::with_len_all_false(position_count),
        };
    }

    /// Copies `chunk`, whose first row sits at logical position `base`, into the lists.
    pub fn populate(&mut self, chunk_id: usize, chunk: &Chunk, base: usize) {
        let state = self.state_name();
        let CacheState::Open {
            lists,
            populated,
            filled,
        } = &mut self.state
        else {
            panic!("typed column cache populated while {state}");
        };
        assert!(
            chunk_id < populated.len(),
            "chunk {chunk_id} is not part of the cached index"
        );
        assert!(
            !populated.get(chunk_id),
            "chunk {chunk_id} populated twice"
        );
        let end = base + chunk.position_count();
        assert!(
            end <= filled.len(),
            "chunk {chunk_id} ends at position {end}, past the {} cached positions",
            filled.len()
        );
        self.handle.consume(chunk, base, lists);
        populated.set(chunk_id, true);
        filled.set_range(base, end);
    }

    pub fn is_populated(&self, chunk_id: usize) -> bool {
        match &self.state {
            CacheState::Open { populated, .. } => {
                chunk_id < populated.len() && populated.get(chunk_id)
            }
            _ => false,
        }
    }

    /// Number of chunks copied so far.
    pub fn populated_chunks(&self) -> usize {
        match &self.state {
            CacheState::Open { populated, .. } => populated.count_ones(),
            _ => 0,
        }
    }

    #[inline]
    #[track_caller]
    fn list_at(&self, column: usize, position: usize) -> &TypedList {
        let CacheState::Open { lists, filled, .. } = &self.state else {
            panic!("typed column cache read while {}", self.state_name());
        };
        assert!(
            position < filled.len() && filled.get(position),
            "typed column cache read at position {position} before its chunk was populated"
        );
        &lists[column]
    }

    #[inline]
    pub fn get_long(&self, column: usize, position: usize) -> i64 {
        self.list_at(column, position).get_long(position)
    }

    #[inline]
    pub fn get_int(&self, column: usize, position: usize) -> i32 {
        self.list_at(column, position).get_int(position)
    }

    #[inline]
    pub fn get_double(&self, column: usize, position: usize) -> f64 {
        self.list_at(column, position).get_double(position)
    }

    /// Releases the lists. Further calls are no-ops.
    pub fn close(&mut self) {
        if let CacheState::Open { lists, .. } = &self.state {
            log::debug!("closing typed column cache with {} lists", lists.len());
        }
        self.state = CacheState::Closed;
    }

    fn state_name(&self) -> &'static str {
        match self.state {
            CacheState::Unopened => "unopened",
            CacheState::Open { .. } => "open",
            CacheState::Closed => "closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkBuilder;
    use crate::types::Value;

    fn chunk(rows: &[(i32, i64)]) -> Chunk {
        let mut builder = ChunkBuilder::new(&[DataType::Int, DataType::Long, DataType::Varchar]);
        for (a, b) in rows {
            builder.append_row(&[Value::Int(*a), Value::Long(*b), Value::from("pad")]);
        }
        builder.build()
    }

    fn cache() -> TypedColumnCache {
        let schema = [DataType::Int, DataType::Long, DataType::Varchar];
        TypedColumnCache::new(Arc::new(KeyColumnsHandle::new(&schema, &[1, 0]).unwrap()))
    }

    #[test]
    fn populate_out_of_order_fills_both_lists() {
        let first = chunk(&[(1, 10), (2, 20)]);
        let second = chunk(&[(3, 30)]);

        let mut cache = cache();
        assert_eq!(cache.estimated_size_bytes(3), 3 * 8 + 3 * 4);
        cache.open(3, 2);
        cache.populate(1, &second, 2);
        cache.populate(0, &first, 0);

        assert_eq!(cache.populated_chunks(), 2);
        assert_eq!(cache.get_long(0, 0), 10);
        assert_eq!(cache.get_long(0, 2), 30);
        assert_eq!(cache.get_int(1, 1), 2);
        assert_eq!(cache.get_long(1, 2), 3);
    }

    #[test]
    fn key_columns_follow_list_order() {
        let cache = cache();
        let schema = [DataType::Int, DataType::Long, DataType::Varchar];
        let handle = KeyColumnsHandle::new(&schema, &[1, 0]).unwrap();
        assert_eq!(handle.key_columns().collect::<Vec<_>>(), vec![1, 0]);
        assert_eq!(cache.handle().estimated_size(10), 10 * 8 + 10 * 4);
        let kinds: Vec<TypedListKind> = cache
            .handle()
            .typed_lists(1)
            .iter()
            .map(TypedList::kind)
            .collect();
        assert_eq!(kinds, vec![TypedListKind::Long, TypedListKind::Int]);
    }

    #[test]
    #[should_panic(expected = "typed column cache read at position 2 before its chunk was populated")]
    fn read_of_unpopulated_chunk_panics() {
        let mut cache = cache();
        cache.open(3, 2);
        cache.populate(0, &chunk(&[(1, 10), (2, 20)]), 0);
        assert_eq!(cache.get_long(0, 1), 20);
        cache.get_long(0, 2);
    }

    #[test]
    fn close_is_idempotent_and_frees() {
        let mut cache = cache();
        cache.open(0, 0);
        assert!(cache.is_open());
        cache.close();
        cache.close();
        assert!(cache.is_closed());
        assert_eq!(cache.estimated_size_bytes(100), 0);
        assert!(!cache.is_populated(0));
    }

    #[test]
    fn variable_length_columns_are_rejected() {
        let schema = [DataType::Int, DataType::Varchar];
        assert_eq!(
            KeyColumnsHandle::new(&schema, &[1]).unwrap_err(),
            ChunkIndexError::UnsupportedTypedColumn {
                column: 1,
                data_type: DataType::Varchar,
            }
        );
        assert!(matches!(
            KeyColumnsHandle::new(&schema, &[5]),
            Err(ChunkIndexError::InvalidOptions(_))
        ));
    }

    #[test]
    #[should_panic(expected = "typed column cache read while unopened")]
    fn read_before_open_panics() {
        cache().get_long(0, 0);
    }

    #[test]
    #[should_panic(expected = "typed column cache read while closed")]
    fn read_after_close_panics() {
        let mut cache = cache();
        cache.open(0, 0);
        cache.close();
        cache.get_long(0, 0);
    }

    #[test]
    #[should_panic(expected = "populated twice")]
    fn double_populate_panics() {
        let c = chunk(&[(1, 1)]);
        let mut cache = cache();
        cache.open(1, 1);
        cache.populate(0, &c, 0);
        cache.populate(0, &c, 0);
    }

    #[test]
    #[should_panic(expected = "reopened after close")]
    fn reopen_after_close_panics() {
        let mut cache = cache();
        cache.close();
        cache.open(0, 0);
    }
}
