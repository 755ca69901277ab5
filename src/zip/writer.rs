//! Streaming ZIP writer.
//!
//! Entries are written front to back without seeking: file entries use
//! the data descriptor flag so CRC and sizes can follow the data. The
//! central directory and EOCD are emitted by [`ZipWriter::finish`].
//! ZIP64 output is not produced.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use flate2::{Compress, Compression, FlushCompress, Status};
use time::{OffsetDateTime, UtcOffset};
use tokio::io::AsyncReadExt;

use crate::error::IoContext;
use crate::pack::ChunkSink;
use crate::{Error, Result};

use super::mode::{DOS_DIRECTORY, S_IFDIR, S_IFLNK, S_IFREG};
use super::structures::*;

const CHUNK_SIZE: usize = 64 * 1024;
const MAX_ENTRIES: usize = 0xFFFF;
const MAX_SIZE: u64 = 0xFFFF_FFFE;

pub struct ZipWriter<S: ChunkSink> {
    sink: S,
    offset: u64,
    entries: Vec<EntryHeader>,
    level: Compression,
    /// Labels errors with what is being archived
    source: PathBuf,
    bytes_in: u64,
}

impl<S: ChunkSink> ZipWriter<S> {
    pub fn new(sink: S, level: u32, source: &Path) -> Self {
        Self {
            sink,
            offset: 0,
            entries: Vec::new(),
            level: Compression::new(level),
            source: source.to_path_buf(),
            bytes_in: 0,
        }
    }

    /// Bytes handed to the sink so far
    pub fn bytes_written(&self) -> u64 {
        self.offset
    }

    /// Uncompressed bytes archived so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_in
    }

    fn failure(&self, reason: impl Into<String>) -> Error {
        Error::Compression {
            path: self.source.clone(),
            reason: reason.into(),
        }
    }

    async fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_chunk(bytes).await?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    fn header(&self, name: &str, flags: u16, modified: SystemTime, mode: u32) -> Result<EntryHeader> {
        if self.entries.len() >= MAX_ENTRIES {
            return Err(self.failure("too many entries for a non-ZIP64 archive"));
        }
        if name.len() > u16::MAX as usize {
            return Err(self.failure(format!("entry name is too long: '{}'", name)));
        }
        let lfh_offset = u32::try_from(self.offset)
            .ok()
            .filter(|o| (*o as u64) <= MAX_SIZE)
            .ok_or_else(|| self.failure("archive is too large for a non-ZIP64 archive"))?;
        let (last_mod_date, last_mod_time) = dos_date_time(modified);
        Ok(EntryHeader {
            file_name: name.to_string(),
            version_made_by: (HOST_UNIX as u16) << 8 | VERSION_NEEDED,
            flags: FLAG_UTF8 | flags,
            compression_method: CompressionMethod::Stored,
            last_mod_time,
            last_mod_date,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            external_attributes: mode << 16,
            lfh_offset,
        })
    }

    /// Add a directory entry, `name` must end with `/`
    pub async fn add_directory(&mut self, name: &str, permissions: u32, modified: SystemTime) -> Result<()> {
        let mut header = self.header(name, 0, modified, S_IFDIR | (permissions & 0o777))?;
        header.external_attributes |= DOS_DIRECTORY;
        self.emit(&header.local_header_bytes()).await?;
        self.entries.push(header);
        Ok(())
    }

    /// Add a symlink entry whose content is the link target
    pub async fn add_symlink(&mut self, name: &str, target: &str, modified: SystemTime) -> Result<()> {
        let mut header = self.header(name, 0, modified, S_IFLNK | 0o777)?;
        header.crc32 = crc32fast::hash(target.as_bytes());
        header.compressed_size = target.len() as u32;
        header.uncompressed_size = target.len() as u32;
        self.emit(&header.local_header_bytes()).await?;
        self.emit(target.as_bytes()).await?;
        self.bytes_in += target.len() as u64;
        self.entries.push(header);
        Ok(())
    }

    /// Add a regular file, compressing its content as it is read
    pub async fn add_file(
        &mut self,
        name: &str,
        path: &Path,
        permissions: u32,
        modified: SystemTime,
    ) -> Result<()> {
        let mut file = tokio::fs::File::open(path).await.at_path(path)?;
        let mut header = self.header(
            name,
            FLAG_DATA_DESCRIPTOR,
            modified,
            S_IFREG | (permissions & 0o777),
        )?;
        header.compression_method = CompressionMethod::Deflate;
        self.emit(&header.local_header_bytes()).await?;

        let mut deflater = Compress::new(self.level, false);
        let mut hasher = crc32fast::Hasher::new();
        let mut input = vec![0u8; CHUNK_SIZE];
        let mut output = vec![0u8; CHUNK_SIZE];
        let mut size = 0u64;

        loop {
            let n = file.read(&mut input).await.at_path(path)?;
            if n == 0 {
                break;
            }
            hasher.update(&input[..n]);
            size += n as u64;
            if size > MAX_SIZE {
                return Err(self.failure(format!("'{}' is too large for a non-ZIP64 archive", name)));
            }
            self.deflate(&mut deflater, &input[..n], &mut output, FlushCompress::None)
                .await?;
        }
        self.deflate(&mut deflater, &[], &mut output, FlushCompress::Finish)
            .await?;

        let compressed = deflater.total_out();
        if compressed > MAX_SIZE {
            return Err(self.failure(format!("'{}' is too large for a non-ZIP64 archive", name)));
        }
        header.crc32 = hasher.finalize();
        header.compressed_size = compressed as u32;
        header.uncompressed_size = size as u32;
        self.emit(&header.data_descriptor_bytes()).await?;
        self.bytes_in += size;
        self.entries.push(header);
        Ok(())
    }

    async fn deflate(
        &mut self,
        deflater: &mut Compress,
        mut input: &[u8],
        output: &mut [u8],
        flush: FlushCompress,
    ) -> Result<()> {
        loop {
            let before_in = deflater.total_in();
            let before_out = deflater.total_out();
            let status = deflater
                .compress(input, output, flush)
                .map_err(|e| self.failure(e.to_string()))?;
            let consumed = (deflater.total_in() - before_in) as usize;
            let produced = (deflater.total_out() - before_out) as usize;
            input = &input[consumed..];
            if produced > 0 {
                self.emit(&output[..produced]).await?;
            }

            let done = match flush {
                FlushCompress::Finish => status == Status::StreamEnd,
                _ => input.is_empty() && produced < output.len(),
            };
            if done {
                return Ok(());
            }
            if consumed == 0 && produced == 0 {
                return Err(self.failure("deflate stream made no progress"));
            }
        }
    }

    /// Write the central directory and EOCD, then flush the sink
    pub async fn finish(&mut self) -> Result<()> {
        let cd_offset = self.offset;
        let entries = std::mem::take(&mut self.entries);
        for header in &entries {
            self.emit(&header.central_header_bytes()).await?;
        }
        let cd_size = self.offset - cd_offset;
        if self.offset > MAX_SIZE {
            return Err(self.failure("archive is too large for a non-ZIP64 archive"));
        }
        let eocd =
            EndOfCentralDirectory::for_single_disk(entries.len() as u16, cd_size as u32, cd_offset as u32);
        self.emit(&eocd.to_bytes()).await?;
        self.sink.finish().await
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Tear down every stage after a failure
    pub async fn abort(mut self) {
        tracing::debug!(source = %self.source.display(), "aborting archive pipeline");
        self.sink.abort().await;
    }
}

/// MS-DOS (date, time) in local time, clamped to the 1980 epoch
pub fn dos_date_time(modified: SystemTime) -> (u16, u16) {
    let utc = OffsetDateTime::from(modified);
    let local = UtcOffset::current_local_offset()
        .map(|offset| utc.to_offset(offset))
        .unwrap_or(utc);
    if local.year() < 1980 {
        return ((1 << 5) | 1, 0);
    }
    let year = (local.year().min(2107) - 1980) as u16;
    let month: u8 = local.month().into();
    let date = (year << 9) | ((month as u16) << 5) | local.day() as u16;
    let time =
        ((local.hour() as u16) << 11) | ((local.minute() as u16) << 5) | (local.second() as u16 / 2);
    (date, time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn dos_timestamps_before_1980_are_clamped() {
        let (date, time) = dos_date_time(SystemTime::UNIX_EPOCH);
        assert_eq!(date, 0x21);
        assert_eq!(time, 0);
    }

    #[test]
    fn dos_timestamp_fields_are_in_range() {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let (date, time) = dos_date_time(modified);
        let year = (date >> 9) + 1980;
        let month = (date >> 5) & 0x0F;
        assert!((2023..=2024).contains(&year));
        assert!((1..=12).contains(&month));
        assert!((time >> 11) < 24);
    }
}
