//! a chunk store in a directory, with one file per chunk
use crate::error::Error;
use chunktree::{ChunkAccessor, ChunkPointer, Hash, Iv, PutResult};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::*;

/// Stores every chunk in a file named by the hex encoded SHA-256 of its bytes.
///
/// Reference counts only cover chunks put by this instance. Releasing a chunk
/// put in an earlier session does nothing.
#[derive(Clone)]
pub struct DirAccessor(Arc<Inner>);

struct Inner {
    root: PathBuf,
    refs: Mutex<FnvHashMap<Hash, usize>>,
}

impl DirAccessor {
    /// open a store in `root`, creating the directory if needed
    pub fn new(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self(Arc::new(Inner {
            root,
            refs: Mutex::new(FnvHashMap::default()),
        })))
    }

    pub fn root(&self) -> &Path {
        &self.0.root
    }

    fn path(&self, key: &Hash) -> PathBuf {
        self.0.root.join(key.to_string())
    }
}

impl ChunkAccessor for DirAccessor {
    fn get(&self, pointer: &ChunkPointer) -> anyhow::Result<Box<[u8]>> {
        let path = self.path(&pointer.box_hash);
        match fs::read(&path) {
            Ok(data) => Ok(data.into()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::NotFound(pointer.box_hash).into())
            }
            Err(e) => Err(Error::Io(e).into()),
        }
    }

    fn put(&self, data: Vec<u8>, _iv: &Iv) -> anyhow::Result<PutResult> {
        let key = Hash::digest(&data);
        let path = self.path(&key);
        let was_present = path.exists();
        if !was_present {
            // write to a temporary name first, so a chunk file is either complete or absent
            let tmp = self.0.root.join(format!("{}.tmp", key));
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)?;
        }
        *self.0.refs.lock().entry(key).or_default() += 1;
        trace!("put {} len={} present={}", key, data.len(), was_present);
        Ok(PutResult { key, was_present })
    }

    fn release(&self, key: &Hash) -> anyhow::Result<()> {
        let mut refs = self.0.refs.lock();
        let remove = match refs.get_mut(key) {
            Some(count) => {
                *count -= 1;
                *count == 0
            }
            None => {
                debug!("release of {} which was not put in this session", key);
                false
            }
        };
        if remove {
            refs.remove(key);
            fs::remove_file(self.path(key))?;
        }
        Ok(())
    }
}
