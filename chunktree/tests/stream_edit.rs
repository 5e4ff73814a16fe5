use chunktree::{
    hash_bytes, BoxConfig, ChunkingConfig, Config, ContainerReader, MemAccessor, WriteMode,
};
use common::{container, content, init_logging, random_bytes, rng, small_cyclic_poly};
use rand::{Rng, RngCore};
use std::io::{Read, Seek, SeekFrom, Write};

mod common;

#[test]
fn insert_between_chunks() -> anyhow::Result<()> {
    let config = Config::new(ChunkingConfig::fixed_size(2), BoxConfig::default());
    let store = MemAccessor::default();
    let mut c = container(&store, config.clone())?;
    c.append(b"11".to_vec())?;
    c.append(b"22".to_vec())?;
    c.append(b"33".to_vec())?;
    c.insert(b"44".to_vec(), 2)?;
    assert_eq!(content(&mut c)?, b"11442233");
    let r = c.flush()?;
    assert_eq!(r.root_hash(), hash_bytes(&config, b"11442233"));
    assert_eq!(r.length, 8);
    c.assert_invariants()?;
    Ok(())
}

#[test]
fn insert_then_delete_restores_the_hash() -> anyhow::Result<()> {
    init_logging();
    let config = small_cyclic_poly();
    let store = MemAccessor::default();
    let data = random_bytes(0, 100_000);
    let mut c = container(&store, config)?;
    c.writer(WriteMode::Insert).write_all(&data)?;
    let r0 = c.flush()?;
    let leaves = c.leaf_pointers()?;
    for &(position, len) in &[(0u64, 10usize), (50_000, 3000), (99_999, 1), (100_000, 500)] {
        let mut writer = c.writer(WriteMode::Insert);
        writer.seek_to(position)?;
        writer.write_all(&random_bytes(position, len))?;
        writer.finish()?;
        writer.seek_to(position)?;
        assert_eq!(writer.delete(len as u64)?, len as u64);
        writer.finish()?;
        drop(writer);
        let r = c.flush()?;
        assert_eq!(r.root_hash(), r0.root_hash());
        assert_eq!(c.leaf_pointers()?, leaves);
    }
    assert_eq!(content(&mut c)?, data);
    Ok(())
}

#[test]
fn random_edits() -> anyhow::Result<()> {
    init_logging();
    let config = small_cyclic_poly();
    let store = MemAccessor::default();
    let mut c = container(&store, config.clone())?;
    let mut expected = Vec::new();
    let mut rng = rng(42);
    let n = 100;
    for i in 0..n {
        let position = rng.gen_range(0..=expected.len());
        let mut bytes = vec![0u8; rng.gen_range(1..2000)];
        rng.fill_bytes(&mut bytes);
        let mut writer = c.writer(WriteMode::Insert);
        writer.seek_to(position as u64)?;
        writer.write_all(&bytes)?;
        writer.finish()?;
        drop(writer);
        expected.splice(position..position, bytes);
        assert_eq!(c.length(), expected.len() as u64);
        if i % 10 == 0 {
            c.flush()?;
            c.assert_invariants()?;
            assert_eq!(content(&mut c)?, expected);
        }
    }
    let r = c.flush()?;
    assert_eq!(r.root_hash(), hash_bytes(&config, &expected));
    for i in 0..n {
        let position = rng.gen_range(0..=expected.len());
        let len = rng.gen_range(0..2000).min(expected.len() - position);
        let mut writer = c.writer(WriteMode::Insert);
        writer.seek_to(position as u64)?;
        assert_eq!(writer.delete(len as u64)?, len as u64);
        writer.finish()?;
        drop(writer);
        expected.drain(position..position + len);
        assert_eq!(c.length(), expected.len() as u64);
        if i % 10 == 0 {
            c.flush()?;
            c.assert_invariants()?;
            assert_eq!(content(&mut c)?, expected);
        }
    }
    let r = c.flush()?;
    assert_eq!(r.root_hash(), hash_bytes(&config, &expected));
    assert_eq!(content(&mut c)?, expected);
    c.assert_invariants()?;
    Ok(())
}

#[test]
fn overwrite_through_io_traits() -> anyhow::Result<()> {
    let config = Config::debug_fast();
    let store = MemAccessor::default();
    let mut expected = random_bytes(1, 30_000);
    let mut c = container(&store, config.clone())?;
    c.writer(WriteMode::Overwrite).write_all(&expected)?;
    {
        let mut writer = c.writer(WriteMode::Overwrite);
        writer.seek(SeekFrom::Start(1000))?;
        writer.write_all(&[7u8; 5000])?;
        writer.seek(SeekFrom::End(-10))?;
        writer.write_all(&[8u8; 100])?;
        writer.flush()?;
    }
    expected[1000..6000].copy_from_slice(&[7u8; 5000]);
    expected.truncate(expected.len() - 10);
    expected.extend_from_slice(&[8u8; 100]);
    assert_eq!(content(&mut c)?, expected);
    assert_eq!(c.flush()?.root_hash(), hash_bytes(&config, &expected));
    Ok(())
}

#[test]
fn truncate() -> anyhow::Result<()> {
    let config = Config::debug_fast();
    let store = MemAccessor::default();
    let data = random_bytes(2, 30_000);
    let mut c = container(&store, config.clone())?;
    c.writer(WriteMode::Insert).write_all(&data)?;
    for &size in &[40_000u64, 29_999, 12_345, 1, 0] {
        let end = c.writer(WriteMode::Insert).truncate(size)?;
        assert_eq!(end, size.min(data.len() as u64));
        let r = c.flush()?;
        let expected = &data[..end as usize];
        assert_eq!(r.root_hash(), hash_bytes(&config, expected));
        assert_eq!(content(&mut c)?, expected);
    }
    assert!(c.is_empty());
    Ok(())
}

#[test]
fn reader_seeks_anywhere() -> anyhow::Result<()> {
    let store = MemAccessor::default();
    let data = random_bytes(3, 10_000);
    let mut c = container(&store, Config::debug_fast())?;
    c.writer(WriteMode::Insert).write_all(&data)?;
    c.flush()?;
    let mut reader = ContainerReader::new(&mut c);
    let mut rng = rng(4);
    for _ in 0..100 {
        let start = rng.gen_range(0..data.len());
        let len = rng.gen_range(0..500).min(data.len() - start);
        reader.seek(SeekFrom::Start(start as u64))?;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        assert_eq!(buf, &data[start..start + len]);
    }
    reader.seek(SeekFrom::Start(20_000))?;
    let mut buf = [0u8; 10];
    assert_eq!(reader.read(&mut buf)?, 0);
    Ok(())
}
