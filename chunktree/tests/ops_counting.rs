use chunktree::{
    ChunkAccessor, ChunkContainer, ChunkPointer, Config, Hash, Iv, MemAccessor, PutResult,
    WriteMode,
};
use common::random_bytes;
use std::{
    io::Write,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

mod common;

#[derive(Clone)]
struct OpsCountingAccessor {
    inner: MemAccessor,
    reads: Arc<AtomicU64>,
    writes: Arc<AtomicU64>,
}

impl OpsCountingAccessor {
    fn new(inner: MemAccessor) -> Self {
        Self {
            inner,
            reads: Arc::new(AtomicU64::default()),
            writes: Arc::new(AtomicU64::default()),
        }
    }

    fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ChunkAccessor for OpsCountingAccessor {
    fn get(&self, pointer: &ChunkPointer) -> anyhow::Result<Box<[u8]>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(pointer)
    }

    fn put(&self, data: Vec<u8>, iv: &Iv) -> anyhow::Result<PutResult> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put(data, iv)
    }

    fn release(&self, key: &Hash) -> anyhow::Result<()> {
        self.inner.release(key)
    }
}

#[test]
fn random_access_reads_one_path() -> anyhow::Result<()> {
    let store = OpsCountingAccessor::new(MemAccessor::default());
    let data = random_bytes(0, 200_000);
    let mut c = ChunkContainer::create(Arc::new(store.clone()), Config::debug_fast())?;
    c.writer(WriteMode::Insert).write_all(&data)?;
    let r = c.flush()?;
    let height = r.height as u64;

    let mut c = ChunkContainer::open(Arc::new(store.clone()), &r)?;
    let r0 = store.reads();
    let chunk = c.get(123_456)?;
    assert!(chunk.contains(123_456));
    // nodes below the root, and the data chunk
    assert_eq!(store.reads() - r0, height);

    // neighbouring chunks share most of the path
    let r1 = store.reads();
    c.get(chunk.end())?;
    assert!(store.reads() - r1 <= height);
    Ok(())
}

#[test]
fn small_edit_writes_few_chunks() -> anyhow::Result<()> {
    let store = OpsCountingAccessor::new(MemAccessor::default());
    let data = random_bytes(1, 200_000);
    let mut c = ChunkContainer::create(Arc::new(store.clone()), Config::debug_fast())?;
    c.writer(WriteMode::Insert).write_all(&data)?;
    let r = c.flush()?;
    let total = store.writes();

    let mut c = ChunkContainer::open(Arc::new(store.clone()), &r)?;
    let w0 = store.writes();
    let mut writer = c.writer(WriteMode::Overwrite);
    writer.seek_to(100_000)?;
    writer.write_all(b"x")?;
    writer.finish()?;
    drop(writer);
    c.flush()?;
    let writes = store.writes() - w0;
    assert!(writes <= 10 + 4 * r.height as u64, "{} writes", writes);
    assert!(writes * 10 < total);
    Ok(())
}

#[test]
fn flush_without_edits_writes_nothing() -> anyhow::Result<()> {
    let store = OpsCountingAccessor::new(MemAccessor::default());
    let mut c = ChunkContainer::create(Arc::new(store.clone()), Config::debug())?;
    c.writer(WriteMode::Insert).write_all(&random_bytes(2, 5000))?;
    let r = c.flush()?;
    let mut c = ChunkContainer::open(Arc::new(store.clone()), &r)?;
    c.get(2500)?;
    let w0 = store.writes();
    assert_eq!(c.flush()?, r);
    assert_eq!(store.writes(), w0);
    Ok(())
}
