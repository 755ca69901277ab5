//! Archive creation.
//!
//! Sources are collected up front (a single file, a whole directory or a
//! glob selection below a root), then streamed through
//! [`ZipWriter`](crate::zip::ZipWriter) into a [`ChunkSink`]:
//!
//! ```text
//! source files -> deflate -> [base64] -> memory buffer | file
//! ```

mod sink;
mod source;

pub use sink::{Base64Sink, ChunkSink, FileSink, MemorySink};
pub use source::{SourceItem, SourceKind};

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::zip::ZipWriter;
use crate::{Error, Result, format_size};

/// Default cap for in-memory archives (1 GiB)
pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024 * 1024;
pub const DEFAULT_LEVEL: u32 = 9;

/// Options for [`to_in_memory_zip`]
#[derive(Debug, Clone)]
pub struct InMemoryZipOptions {
    /// Log how long archiving took
    pub is_metered: bool,
    /// Return the archive base64-encoded
    pub encode_to_base64: bool,
    /// Maximum size of the returned buffer in bytes, zero disables the cap
    pub max_size: u64,
    /// Compression level, 0 (store) to 9 (best)
    pub level: u32,
}

impl Default for InMemoryZipOptions {
    fn default() -> Self {
        Self {
            is_metered: true,
            encode_to_base64: false,
            max_size: DEFAULT_MAX_SIZE,
            level: DEFAULT_LEVEL,
        }
    }
}

/// Which files [`to_archive`] picks up
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    pub pattern: String,
    /// Root of the selection, defaults to the archive's parent directory
    pub cwd: Option<PathBuf>,
    pub ignore: Vec<String>,
}

impl Default for ArchiveSource {
    fn default() -> Self {
        Self {
            pattern: "**/*".to_string(),
            cwd: None,
            ignore: Vec::new(),
        }
    }
}

/// Options for [`to_archive`]
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub level: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }
}

/// Reject compression levels outside `0..=9`
pub fn check_level(level: u32) -> Result<u32> {
    if level > 9 {
        return Err(Error::InvalidCompressionLevel(level));
    }
    Ok(level)
}

/// Zip a file or folder into memory.
///
/// Folders are archived relative to themselves, a single file is stored
/// under its base name. Fails with [`Error::SizeExceeded`] as soon as
/// the output (after base64 encoding, if requested) outgrows
/// `max_size`.
pub async fn to_in_memory_zip(src: &Path, opts: &InMemoryZipOptions) -> Result<Vec<u8>> {
    let level = check_level(opts.level)?;
    let items = source::collect_path(src).await?;
    let timer = opts.is_metered.then(Instant::now);

    let sink = MemorySink::new(opts.max_size);
    let (buffer, archive_size) = if opts.encode_to_base64 {
        let (sink, archive_size) = write_archive(Base64Sink::new(sink), &items, level, src).await?;
        (sink.into_inner().into_bytes(), archive_size)
    } else {
        let (sink, archive_size) = write_archive(sink, &items, level, src).await?;
        (sink.into_bytes(), archive_size)
    };

    if let Some(timer) = timer {
        let name = src
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| src.display().to_string());
        let elapsed_ms = timer.elapsed().as_millis() as u64;
        tracing::debug!(
            elapsed_ms,
            size = archive_size,
            "zipped {}'{}' ({}) in {} ms (compression level: {})",
            if opts.encode_to_base64 { "and base64-encoded " } else { "" },
            name,
            format_size(archive_size),
            elapsed_ms,
            level
        );
    }
    Ok(buffer)
}

/// Create `dst_path` from the files matching `src` below its root.
pub async fn to_archive(dst_path: &Path, src: &ArchiveSource, opts: &ArchiveOptions) -> Result<()> {
    let level = check_level(opts.level)?;
    let dst_path = std::path::absolute(dst_path).map_err(|e| Error::io(dst_path, e))?;
    let cwd = match &src.cwd {
        Some(cwd) => std::path::absolute(cwd).map_err(|e| Error::io(cwd, e))?,
        None => dst_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::SourceNotFound(dst_path.clone()))?,
    };
    let items = source::collect_glob(&cwd, &src.pattern, &src.ignore, &dst_path).await?;
    tracing::debug!(
        archive = %dst_path.display(),
        cwd = %cwd.display(),
        entries = items.len(),
        "creating archive"
    );

    let sink = FileSink::create(&dst_path).await?;
    write_archive(sink, &items, level, &cwd).await?;
    Ok(())
}

/// Drive the pipeline, tearing every stage down on failure
async fn write_archive<S: ChunkSink>(
    sink: S,
    items: &[SourceItem],
    level: u32,
    source: &Path,
) -> Result<(S, u64)> {
    let mut writer = ZipWriter::new(sink, level, source);
    let result = match add_items(&mut writer, items).await {
        Ok(()) => writer.finish().await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        writer.abort().await;
        return Err(e);
    }
    let archive_size = writer.bytes_written();
    tracing::debug!(
        source = %source.display(),
        entries = items.len(),
        bytes_in = writer.bytes_read(),
        bytes_out = archive_size,
        "archive written"
    );
    Ok((writer.into_inner(), archive_size))
}

async fn add_items<S: ChunkSink>(writer: &mut ZipWriter<S>, items: &[SourceItem]) -> Result<()> {
    for item in items {
        match &item.kind {
            SourceKind::Directory => {
                writer
                    .add_directory(&item.name, item.permissions, item.modified)
                    .await?
            }
            SourceKind::Symlink(target) => {
                writer.add_symlink(&item.name, target, item.modified).await?
            }
            SourceKind::File => {
                writer
                    .add_file(&item.name, &item.path, item.permissions, item.modified)
                    .await?
            }
        }
    }
    Ok(())
}
