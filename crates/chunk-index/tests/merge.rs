use chunk_index::{Chunk, ChunkBuilder, ChunkIndex, DataType, Value};
use pretty_assertions::assert_eq;
use rayon::prelude::*;
use std::sync::Arc;

fn chunk(rows: &[(&str, i64)]) -> Arc<Chunk> {
    let mut builder = ChunkBuilder::new(&[DataType::Varchar, DataType::Long]);
    for (name, value) in rows {
        builder.append_row(&[Value::from(*name), Value::Long(*value)]);
    }
    Arc::new(builder.build())
}

fn names(index: &ChunkIndex) -> Vec<Value> {
    (0..index.position_count())
        .map(|p| index.get_value(0, p))
        .collect()
}

#[test]
fn merge_concatenates_in_argument_order() {
    let mut a = ChunkIndex::new();
    a.add_chunk(chunk(&[("r0", 0), ("r1", 1)])).unwrap();
    a.add_chunk(chunk(&[("r2", 2)])).unwrap();

    let mut b = ChunkIndex::new();
    b.add_chunk(chunk(&[("s0", 10), ("s1", 11)])).unwrap();

    let mut c = ChunkIndex::new();
    c.merge(&[a, b]).unwrap();

    assert_eq!(c.position_count(), 5);
    assert_eq!(c.chunk_count(), 3);
    assert_eq!(c.offsets(), &[0, 2, 3, 5]);
    assert_eq!(
        names(&c),
        ["r0", "r1", "r2", "s0", "s1"].map(Value::from).to_vec()
    );
}

#[test]
fn merge_shares_chunk_references() {
    let shared = chunk(&[("x", 1)]);
    let mut a = ChunkIndex::new();
    a.add_chunk(Arc::clone(&shared)).unwrap();

    let mut target = ChunkIndex::new();
    target.merge(std::slice::from_ref(&a)).unwrap();

    assert!(Arc::ptr_eq(target.chunk(0), &shared));
    assert!(Arc::ptr_eq(&target.chunks()[0], &a.chunks()[0]));
    // Source, target and the local handle.
    assert_eq!(Arc::strong_count(&shared), 3);
}

#[test]
fn merge_of_only_empty_sources_is_a_no_op() {
    let mut target = ChunkIndex::new();
    target.add_chunk(chunk(&[("x", 1)])).unwrap();
    target
        .merge(&[ChunkIndex::new(), ChunkIndex::new()])
        .unwrap();
    assert_eq!(target.offsets(), &[0, 1]);
    target.merge(&[]).unwrap();
    assert_eq!(target.chunk_count(), 1);
}

#[test]
fn partitions_built_in_parallel_merge_into_one_index() {
    const PARTITIONS: usize = 8;
    const CHUNKS_PER_PARTITION: usize = 5;
    const ROWS_PER_CHUNK: usize = 7;

    let partitions: Vec<ChunkIndex> = (0..PARTITIONS)
        .into_par_iter()
        .map(|partition| {
            let mut local = ChunkIndex::new();
            for c in 0..CHUNKS_PER_PARTITION {
                let mut builder = ChunkBuilder::new(&[DataType::Varchar, DataType::Long]);
                for r in 0..ROWS_PER_CHUNK {
                    let global =
                        (partition * CHUNKS_PER_PARTITION + c) * ROWS_PER_CHUNK + r;
                    builder.append_row(&[
                        Value::from(format!("p{partition}").as_str()),
                        Value::Long(global as i64),
                    ]);
                }
                local.add_chunk(Arc::new(builder.build())).unwrap();
            }
            local
        })
        .collect();

    let mut shared = ChunkIndex::new();
    shared.merge(&partitions).unwrap();
    drop(partitions);

    let total = PARTITIONS * CHUNKS_PER_PARTITION * ROWS_PER_CHUNK;
    assert_eq!(shared.position_count(), total);
    assert_eq!(shared.chunk_count(), PARTITIONS * CHUNKS_PER_PARTITION);

    // Sealed: concurrent readers need no synchronization.
    let mismatches = (0..total)
        .into_par_iter()
        .filter(|&p| shared.get_long(1, p) != p as i64)
        .count();
    assert_eq!(mismatches, 0);
}
