//! sequential and random access io over a container
//!
//! The writer keeps data chunks content defined across edits. An edit at
//! position p re-chunks from the start of the chunk containing p, and keeps
//! going over following chunks until a new boundary coincides with an old one.
//! From there on the old chunks are exactly what chunking the new content would
//! produce, so they stay untouched.
use crate::{
    container::ChunkContainer,
    pointer::ChunkRef,
    splitter::{data_splitter, ChunkSplitter},
};
use anyhow::Result;
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::*;

fn io_error(error: anyhow::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, error)
}

fn seek_target(current: u64, length: u64, pos: SeekFrom) -> io::Result<u64> {
    let (base, offset) = match pos {
        SeekFrom::Start(offset) => return Ok(offset),
        SeekFrom::End(offset) => (length, offset),
        SeekFrom::Current(offset) => (current, offset),
    };
    let target = base as i64 + offset;
    if target < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek before the start of the container",
        ));
    }
    Ok(target as u64)
}

/// Reads a container, keeping the current chunk as a window
pub struct ContainerReader<'a> {
    container: &'a mut ChunkContainer,
    position: u64,
    current: Option<ChunkRef>,
}

impl<'a> ContainerReader<'a> {
    pub fn new(container: &'a mut ChunkContainer) -> Self {
        Self {
            container,
            position: 0,
            current: None,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// read everything from the current position to the end
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut result = Vec::new();
        self.read_to_end(&mut result)?;
        Ok(result)
    }

    fn read0(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || self.position >= self.container.length() {
            return Ok(0);
        }
        let chunk = match self.current.take() {
            Some(chunk) if chunk.contains(self.position) => chunk,
            _ => self.container.get(self.position)?,
        };
        let offset = (self.position - chunk.start) as usize;
        let available = &chunk.data.as_slice()[offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n as u64;
        self.current = Some(chunk);
        Ok(n)
    }
}

impl<'a> Read for ContainerReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read0(buf).map_err(io_error)
    }
}

impl<'a> Seek for ContainerReader<'a> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = seek_target(self.position, self.container.length(), pos)?;
        Ok(self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// written bytes are inserted at the cursor, nothing is overwritten
    Insert,
    /// written bytes replace the bytes at the cursor, extending the container at the end
    Overwrite,
}

/// State of an open edit
struct Transaction {
    splitter: Box<dyn ChunkSplitter>,
    /// bytes of the chunk being built
    buffer: Vec<u8>,
    /// where the chunk being built will be inserted
    insert_position: u64,
    /// old bytes following the cursor, taken from the chunk the edit started in
    tail: Vec<u8>,
}

/// Edits a container at arbitrary positions.
///
/// Edits are buffered until [finish](ContainerWriter::finish) is called, which also
/// happens when seeking and, on a best effort basis, when the writer is dropped.
pub struct ContainerWriter<'a> {
    container: &'a mut ChunkContainer,
    mode: WriteMode,
    position: u64,
    transaction: Option<Transaction>,
}

impl<'a> ContainerWriter<'a> {
    pub fn new(container: &'a mut ChunkContainer, mode: WriteMode) -> Self {
        Self {
            container,
            mode,
            position: 0,
            transaction: None,
        }
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// logical position of the cursor
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn container(&self) -> &ChunkContainer {
        &*self.container
    }

    /// move the cursor, finishing the current edit
    pub fn seek_to(&mut self, position: u64) -> Result<u64> {
        self.finish()?;
        self.position = position.min(self.container.length());
        Ok(self.position)
    }

    /// write at the cursor according to the mode
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if self.mode == WriteMode::Overwrite {
            self.delete(data.len() as u64)?;
        }
        self.begin()?;
        self.feed(data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    /// delete up to `length` bytes after the cursor. Returns the number of bytes deleted.
    pub fn delete(&mut self, length: u64) -> Result<u64> {
        self.begin()?;
        let container = &mut *self.container;
        let txn = match self.transaction.as_mut() {
            Some(txn) => txn,
            None => return Ok(0),
        };
        let from_tail = (length as usize).min(txn.tail.len());
        txn.tail.drain(..from_tail);
        let mut deleted = from_tail as u64;
        while deleted < length && txn.insert_position < container.length() {
            let chunk = container.get(txn.insert_position)?;
            container.remove(chunk.start, chunk.pointer.data_length)?;
            let remaining = length - deleted;
            if remaining >= chunk.pointer.data_length {
                deleted += chunk.pointer.data_length;
            } else {
                txn.tail = chunk.data.as_slice()[remaining as usize..].to_vec();
                deleted = length;
            }
        }
        Ok(deleted)
    }

    /// delete everything after `size`
    pub fn truncate(&mut self, size: u64) -> Result<u64> {
        self.seek_to(size)?;
        self.delete(u64::max_value())?;
        self.finish()
    }

    /// Complete the current edit. Returns the position of the cursor.
    ///
    /// Old chunks after the cursor are re-chunked until a boundary lines up with
    /// the end of an old chunk, or the end of the container is reached.
    pub fn finish(&mut self) -> Result<u64> {
        let mut txn = match self.transaction.take() {
            Some(txn) => txn,
            None => return Ok(self.position),
        };
        let tail = std::mem::take(&mut txn.tail);
        Self::feed0(self.container, &mut txn, &tail)?;
        let mut rechunked = 0usize;
        while !txn.buffer.is_empty() && txn.insert_position < self.container.length() {
            let chunk = self.container.get(txn.insert_position)?;
            self.container
                .remove(chunk.start, chunk.pointer.data_length)?;
            Self::feed0(self.container, &mut txn, chunk.data.as_slice())?;
            rechunked += 1;
        }
        if !txn.buffer.is_empty() {
            let buffer = std::mem::take(&mut txn.buffer);
            self.container.insert(buffer, txn.insert_position)?;
        }
        debug!(
            "edit finished at {}, re-chunked {} following chunks",
            self.position, rechunked
        );
        Ok(self.position)
    }

    /// start an edit at the cursor, if none is open
    fn begin(&mut self) -> Result<()> {
        if self.transaction.is_some() {
            return Ok(());
        }
        let mut txn = Transaction {
            splitter: data_splitter(&self.container.config().chunking),
            buffer: Vec::new(),
            insert_position: self.position,
            tail: Vec::new(),
        };
        let length = self.container.length();
        if length > 0 {
            // the chunk containing the cursor, or the last one when appending
            let chunk = self.container.get(self.position.min(length - 1))?;
            self.container
                .remove(chunk.start, chunk.pointer.data_length)?;
            txn.insert_position = chunk.start;
            let split = (self.position - chunk.start) as usize;
            let (prefix, tail) = chunk.data.as_slice().split_at(split);
            txn.tail = tail.to_vec();
            Self::feed0(self.container, &mut txn, prefix)?;
        }
        self.transaction = Some(txn);
        Ok(())
    }

    fn feed(&mut self, data: &[u8]) -> Result<()> {
        match self.transaction.as_mut() {
            Some(txn) => Self::feed0(self.container, txn, data),
            None => Ok(()),
        }
    }

    /// chunk `data`, inserting every completed chunk
    fn feed0(container: &mut ChunkContainer, txn: &mut Transaction, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let n = txn.splitter.write(data);
            txn.buffer.extend_from_slice(&data[..n]);
            data = &data[n..];
            if txn.splitter.is_triggered() {
                txn.splitter.reset();
                let buffer = std::mem::take(&mut txn.buffer);
                let length = buffer.len() as u64;
                container.insert(buffer, txn.insert_position)?;
                txn.insert_position += length;
            }
        }
        Ok(())
    }
}

impl<'a> Write for ContainerWriter<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io_error)?;
        Ok(buf.len())
    }

    /// completes the current edit, use [ChunkContainer::flush] to persist the tree
    fn flush(&mut self) -> io::Result<()> {
        self.finish().map(drop).map_err(io_error)
    }
}

impl<'a> Seek for ContainerWriter<'a> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.finish().map_err(io_error)?;
        let target = seek_target(self.position, self.container.length(), pos)?;
        self.seek_to(target).map_err(io_error)
    }
}

impl<'a> Drop for ContainerWriter<'a> {
    fn drop(&mut self) {
        if let Err(cause) = self.finish() {
            warn!("unfinished edit could not be completed: {}", cause);
        }
    }
}
