use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::io::{LocalFileReader, ReadAt};
use crate::{Error, Result};

use super::encoding::FileNameEncoding;
use super::parser::{CentralDirectory, ZipParser};
use super::stream::EntryReader;
use super::structures::ZipEntry;

/// An open ZIP container yielding its entries one at a time.
///
/// The central directory is fetched once; each call to
/// [`next_entry`](Self::next_entry) decodes a single record. A handle
/// is walked once, re-reading needs a fresh `open`. The underlying file
/// is released when the handle is dropped or [`close`](Self::close)d.
pub struct ZipArchive<R: ReadAt> {
    parser: ZipParser<R>,
    directory: CentralDirectory,
    position: u64,
    yielded: u64,
    encoding: FileNameEncoding,
}

impl ZipArchive<LocalFileReader> {
    /// Open an archive on disk
    pub async fn open(path: &Path, encoding: FileNameEncoding) -> Result<Self> {
        let reader = match LocalFileReader::new(path) {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SourceNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(Error::io(path, e)),
        };
        Self::new(Arc::new(reader), path, encoding).await
    }
}

impl<R: ReadAt> ZipArchive<R> {
    /// Wrap any random access source; `source` labels errors
    pub async fn new(reader: Arc<R>, source: &Path, encoding: FileNameEncoding) -> Result<Self> {
        let parser = ZipParser::new(reader, source);
        let directory = parser.read_central_directory().await?;
        tracing::debug!(
            archive = %source.display(),
            entries = directory.total_entries,
            "opened archive"
        );
        Ok(Self {
            parser,
            directory,
            position: 0,
            yielded: 0,
            encoding,
        })
    }

    pub fn source(&self) -> &Path {
        self.parser.source()
    }

    /// Number of entries declared by the central directory
    pub fn len(&self) -> u64 {
        self.directory.total_entries
    }

    pub fn is_empty(&self) -> bool {
        self.directory.total_entries == 0
    }

    /// Decode the next entry in archive order, `None` at the end
    pub fn next_entry(&mut self) -> Result<Option<ZipEntry>> {
        if self.yielded >= self.directory.total_entries {
            return Ok(None);
        }
        let mut cursor = Cursor::new(self.directory.data.as_slice());
        cursor.set_position(self.position);
        let entry = self.parser.parse_cdfh(&mut cursor, &self.encoding)?;
        self.position = cursor.position();
        self.yielded += 1;
        Ok(Some(entry))
    }

    /// Open the content stream of an entry yielded by this archive
    pub async fn entry_reader(&self, entry: &ZipEntry) -> Result<EntryReader<'_, R>> {
        EntryReader::new(&self.parser, entry).await
    }

    /// Collect every remaining entry
    pub fn list_files(&mut self) -> Result<Vec<ZipEntry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Extract file data to memory, refusing content larger than `limit`
    pub async fn extract_to_memory(&self, entry: &ZipEntry, limit: u64) -> Result<Vec<u8>> {
        self.entry_reader(entry).await?.read_to_end(limit).await
    }

    /// Release the archive
    pub fn close(self) {
        tracing::debug!(archive = %self.source().display(), "closed archive");
    }
}
