//! Output stages of the archive pipeline.
//!
//! The ZIP writer pushes bytes into a [`ChunkSink`]. Sinks may wrap
//! another sink (base64) or terminate the pipeline (memory, file).
//! Each `write_chunk` is awaited before the writer produces more data,
//! so a slow sink holds the whole pipeline back.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::IoContext;
use crate::{Error, Result};

#[async_trait]
pub trait ChunkSink: Send {
    /// Accept the next piece of output
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;

    /// Flush everything, no more chunks will follow
    async fn finish(&mut self) -> Result<()>;

    /// Tear the stage down after a failure elsewhere in the pipeline
    async fn abort(&mut self) {}
}

/// Accumulates output in memory up to a hard cap
pub struct MemorySink {
    buffers: Vec<Vec<u8>>,
    total_bytes: u64,
    /// Zero disables the cap
    max_bytes: u64,
}

impl MemorySink {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            buffers: Vec::new(),
            total_bytes: 0,
            max_bytes,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffers.concat()
    }
}

#[async_trait]
impl ChunkSink for MemorySink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let total = self.total_bytes + chunk.len() as u64;
        if self.max_bytes > 0 && total > self.max_bytes {
            return Err(Error::SizeExceeded {
                max: self.max_bytes,
            });
        }
        self.buffers.push(chunk.to_vec());
        self.total_bytes = total;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    async fn abort(&mut self) {
        self.buffers.clear();
        self.total_bytes = 0;
    }
}

/// Base64-encodes everything before handing it to the inner sink
pub struct Base64Sink<S: ChunkSink> {
    inner: S,
    /// Bytes that do not yet fill a 3-byte group
    pending: Vec<u8>,
}

impl<S: ChunkSink> Base64Sink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(3),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: ChunkSink> ChunkSink for Base64Sink<S> {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(chunk);
        let aligned = data.len() - data.len() % 3;
        self.pending = data.split_off(aligned);
        if data.is_empty() {
            return Ok(());
        }
        let encoded = STANDARD.encode(&data);
        self.inner.write_chunk(encoded.as_bytes()).await
    }

    async fn finish(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            let encoded = STANDARD.encode(&self.pending);
            self.pending.clear();
            self.inner.write_chunk(encoded.as_bytes()).await?;
        }
        self.inner.finish().await
    }

    async fn abort(&mut self) {
        tracing::debug!("unpiping base64 encoder");
        self.pending.clear();
        self.inner.abort().await;
    }
}

/// Writes the archive to a file
pub struct FileSink {
    writer: BufWriter<tokio::fs::File>,
    path: PathBuf,
}

impl FileSink {
    pub async fn create(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::create(path).await.at_path(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }
}

#[async_trait]
impl ChunkSink for FileSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.writer.write_all(chunk).await.at_path(&self.path)
    }

    async fn finish(&mut self) -> Result<()> {
        self.writer.flush().await.at_path(&self.path)?;
        self.writer.get_mut().sync_all().await.at_path(&self.path)
    }

    async fn abort(&mut self) {
        tracing::debug!(path = %self.path.display(), "removing partially written archive");
        let _ = self.writer.shutdown().await;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!(path = %self.path.display(), "failed to remove partial archive: {}", e);
        }
    }
}
