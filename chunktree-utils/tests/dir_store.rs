use chunktree::{hash_bytes, ChunkAccessor, ChunkContainer, Config, WriteMode};
use chunktree_utils::{dump, error::Error, DirAccessor};
use quickcheck_macros::quickcheck;
use std::{
    io::{Read, Write},
    sync::Arc,
};

fn data(len: usize) -> Vec<u8> {
    // deterministic, but without long runs
    (0..len as u64)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 7) as u8)
        .collect()
}

#[test]
fn put_get_release() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = DirAccessor::new(dir.path())?;
    let first = store.put(b"hello".to_vec(), &[0u8; 16])?;
    assert!(!first.was_present);
    let second = store.put(b"hello".to_vec(), &[1u8; 16])?;
    assert!(second.was_present);
    assert_eq!(first.key, second.key);
    assert!(dir.path().join(first.key.to_string()).exists());

    let pointer = chunktree::ChunkPointer::new(
        chunktree::Hash::digest(b"hello"),
        first.key,
        [0u8; 16],
        5,
        0,
    );
    assert_eq!(&store.get(&pointer)?[..], b"hello");
    store.release(&first.key)?;
    assert!(store.get(&pointer).is_ok());
    store.release(&first.key)?;
    let err = store.get(&pointer).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))));
    Ok(())
}

#[test]
fn container_survives_reopening_the_store() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = Config::debug_fast();
    let content = data(50_000);
    let reference = {
        let store = DirAccessor::new(dir.path())?;
        let mut c = ChunkContainer::create(Arc::new(store), config.clone())?;
        c.writer(WriteMode::Insert).write_all(&content)?;
        c.flush()?
    };
    assert_eq!(reference.root_hash(), hash_bytes(&config, &content));

    let store = DirAccessor::new(dir.path())?;
    let mut c = ChunkContainer::open(Arc::new(store), &reference)?;
    let mut result = Vec::new();
    c.reader().read_to_end(&mut result)?;
    assert_eq!(result, content);

    let mut dot = Vec::new();
    dump::graph(&c, &mut dot)?;
    let dot = String::from_utf8(dot)?;
    assert!(dot.starts_with("digraph thetree"));
    assert!(dot.contains("N0 -> N1"));
    Ok(())
}

#[quickcheck]
fn stored_bytes_read_back(data: Vec<u8>) -> anyhow::Result<bool> {
    let dir = tempfile::tempdir()?;
    let store = DirAccessor::new(dir.path())?;
    let result = store.put(data.clone(), &[0u8; 16])?;
    let pointer = chunktree::ChunkPointer::new(
        chunktree::Hash::digest(&data),
        result.key,
        [0u8; 16],
        data.len() as u64,
        0,
    );
    Ok(&store.get(&pointer)?[..] == &data[..])
}
