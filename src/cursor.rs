//! Pull-based, cancelable iteration over archive entries.
//!
//! The next entry is only decoded once the caller is done with the
//! current one, so a visitor can extract, inspect or skip each entry
//! and stop the walk at any point.

use std::path::Path;

use async_trait::async_trait;

use crate::error::IoContext;
use crate::extract::{EntryOutcome, materialize_entry};
use crate::io::LocalFileReader;
use crate::zip::{EntryReader, FileNameEncoding, ModeDefaults, ZipArchive, ZipEntry};
use crate::Result;

/// Whether [`read_entries`] should move on to the next entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFlow {
    Continue,
    Stop,
}

/// Called once per entry, in archive order
#[async_trait]
pub trait EntryVisitor: Send {
    async fn visit(&mut self, entry: &ZipEntry, handle: EntryHandle<'_>) -> Result<EntryFlow>;
}

/// Access to the content of the entry currently being visited
pub struct EntryHandle<'a> {
    archive: &'a ZipArchive<LocalFileReader>,
    entry: &'a ZipEntry,
}

impl<'a> EntryHandle<'a> {
    pub fn entry(&self) -> &ZipEntry {
        self.entry
    }

    /// Write the entry below `dest_dir`, keeping its relative path
    pub async fn extract_to(&self, dest_dir: &Path) -> Result<EntryOutcome> {
        let dest_dir = std::path::absolute(dest_dir).at_path(dest_dir)?;
        tokio::fs::create_dir_all(&dest_dir).await.at_path(&dest_dir)?;
        let root = tokio::fs::canonicalize(&dest_dir).await.at_path(&dest_dir)?;
        materialize_entry(self.archive, self.entry, &root, &ModeDefaults::default()).await
    }

    /// Decompress the whole entry into memory
    pub async fn read_to_vec(&self) -> Result<Vec<u8>> {
        self.archive.extract_to_memory(self.entry, u64::MAX).await
    }

    /// Stream the entry content chunk by chunk
    pub async fn reader(&self) -> Result<EntryReader<'a, LocalFileReader>> {
        self.archive.entry_reader(self.entry).await
    }
}

/// An archive opened for one forward walk over its entries
pub struct EntryCursor {
    archive: ZipArchive<LocalFileReader>,
}

impl EntryCursor {
    pub async fn open(path: &Path) -> Result<Self> {
        Self::open_with_encoding(path, FileNameEncoding::Auto).await
    }

    pub async fn open_with_encoding(path: &Path, encoding: FileNameEncoding) -> Result<Self> {
        let archive = ZipArchive::open(path, encoding).await?;
        Ok(Self { archive })
    }

    /// Number of entries in the archive
    pub fn len(&self) -> u64 {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Advance to the next entry, `None` once the archive is exhausted
    pub fn next_entry(&mut self) -> Result<Option<ZipEntry>> {
        self.archive.next_entry()
    }

    pub fn handle<'a>(&'a self, entry: &'a ZipEntry) -> EntryHandle<'a> {
        EntryHandle {
            archive: &self.archive,
            entry,
        }
    }

    pub fn close(self) {
        self.archive.close();
    }
}

/// Visit every entry of `archive_path` until the visitor stops or fails
pub async fn read_entries<V>(archive_path: &Path, visitor: &mut V) -> Result<()>
where
    V: EntryVisitor + ?Sized,
{
    let mut cursor = EntryCursor::open(archive_path).await?;
    let mut visited = 0u64;
    while let Some(entry) = cursor.next_entry()? {
        visited += 1;
        if visitor.visit(&entry, cursor.handle(&entry)).await? == EntryFlow::Stop {
            tracing::debug!(
                archive = %archive_path.display(),
                entry = %entry.file_name,
                visited,
                "entry walk stopped by visitor"
            );
            break;
        }
    }
    cursor.close();
    Ok(())
}
