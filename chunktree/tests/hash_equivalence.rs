//! the root hash of a flushed container must match the streaming hasher, no matter how it was built
use chunktree::{hash_bytes, ChunkAccessor, ChunkHasher, Config, Hash, MemAccessor, WriteMode, WriteStrategy};
use common::{configs, container, content, random_bytes, rng};
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use rand::Rng;
use std::io::Write;

mod common;

const SIZES: &[usize] = &[0, 1, 63, 64, 65, 129, 1000, 10_000, 60_000];

fn container_hash(config: &Config, data: &[u8]) -> anyhow::Result<Hash> {
    let store = MemAccessor::default();
    let mut c = container(&store, config.clone())?;
    c.writer(WriteMode::Insert).write_all(data)?;
    let r = c.flush()?;
    c.assert_invariants()?;
    Ok(r.root_hash())
}

#[test]
fn appended_data() -> anyhow::Result<()> {
    common::init_logging();
    for (name, config) in configs() {
        for &size in SIZES {
            let data = random_bytes(size as u64, size);
            let expected = hash_bytes(&config, &data);
            assert_eq!(
                container_hash(&config, &data)?,
                expected,
                "config {} size {}",
                name,
                size
            );
        }
    }
    Ok(())
}

#[test]
fn empty_is_zero() -> anyhow::Result<()> {
    for (_, config) in configs() {
        assert!(container_hash(&config, &[])?.is_zero());
    }
    Ok(())
}

#[test]
fn padding_does_not_change_the_hash() -> anyhow::Result<()> {
    let data = random_bytes(7, 30_000);
    let expected = hash_bytes(&Config::debug_fast(), &data);
    for strategy in [
        WriteStrategy::FixedSizePadding { node_size: 100 },
        WriteStrategy::DynamicPadding,
    ] {
        let config = Config::debug_fast().with_write_strategy(strategy.clone());
        let store = MemAccessor::default();
        let mut c = container(&store, config)?;
        c.writer(WriteMode::Insert).write_all(&data)?;
        let r = c.flush()?;
        assert_eq!(r.root_hash(), expected);
        let leaves = c.leaf_pointers()?;
        let mut padded = 0;
        for pointer in &leaves {
            let stored = store.get(pointer)?.len() as u64;
            assert!(stored >= pointer.data_length);
            if stored > pointer.data_length {
                padded += 1;
            }
            if let WriteStrategy::FixedSizePadding { node_size } = &strategy {
                assert_eq!(stored % *node_size as u64, 0);
            }
        }
        match &strategy {
            WriteStrategy::DynamicPadding => assert_eq!(padded, leaves.len()),
            _ => assert!(padded > 0),
        }
        // padded chunks read back without the padding
        let mut c = chunktree::ChunkContainer::open(std::sync::Arc::new(store), &r)?;
        assert_eq!(content(&mut c)?, data);
    }
    Ok(())
}

#[test]
fn independent_of_edit_order() -> anyhow::Result<()> {
    // write the second half first, then insert the first half in front of it
    for (name, config) in configs() {
        let data = random_bytes(8, 20_000);
        let store = MemAccessor::default();
        let mut c = container(&store, config.clone())?;
        c.writer(WriteMode::Insert).write_all(&data[10_000..])?;
        c.flush()?;
        c.writer(WriteMode::Insert).write_all(&data[..10_000])?;
        let r = c.flush()?;
        assert_eq!(content(&mut c)?, data, "config {}", name);
        assert_eq!(r.root_hash(), hash_bytes(&config, &data), "config {}", name);
        c.assert_invariants()?;
    }
    Ok(())
}

#[test]
fn chunk_wise_inserts_at_random_boundaries() -> anyhow::Result<()> {
    // build the leaf sequence of a reference container by inserting its chunks in random order
    let config = Config::debug_fast();
    let data = random_bytes(9, 30_000);
    let store = MemAccessor::default();
    let mut reference = container(&store, config.clone())?;
    reference.writer(WriteMode::Insert).write_all(&data)?;
    let expected = reference.flush()?.root_hash();
    let mut chunks = Vec::new();
    let mut offset = 0u64;
    for pointer in reference.leaf_pointers()? {
        let chunk = reference.get(offset)?;
        chunks.push((offset, chunk.data.as_slice().to_vec()));
        offset += pointer.data_length;
    }
    let mut rng = rng(10);
    let mut order = (0..chunks.len()).collect::<Vec<_>>();
    for i in (1..order.len()).rev() {
        order.swap(i, rng.gen_range(0..=i));
    }
    let mut c = container(&store, config)?;
    let mut inserted = vec![false; chunks.len()];
    for (step, &i) in order.iter().enumerate() {
        let position = chunks
            .iter()
            .zip(&inserted)
            .take(i)
            .filter(|(_, present)| **present)
            .map(|((_, bytes), _)| bytes.len() as u64)
            .sum::<u64>();
        c.insert(chunks[i].1.clone(), position)?;
        inserted[i] = true;
        if step % 17 == 0 {
            c.flush()?;
            c.assert_invariants()?;
        }
    }
    assert_eq!(c.flush()?.root_hash(), expected);
    assert_eq!(c.leaf_pointers()?, reference.leaf_pointers()?);
    Ok(())
}

#[quickcheck]
fn hasher_matches_container(seed: u64, len: u16) -> TestResult {
    let config = Config::debug_fast();
    let data = random_bytes(seed, len as usize);
    let mut hasher = ChunkHasher::new(&config);
    hasher.write_all(&data).unwrap();
    TestResult::from_bool(container_hash(&config, &data).unwrap() == hasher.finalize())
}
