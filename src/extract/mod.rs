//! Extraction of a whole archive into a directory tree.
//!
//! Entries are processed strictly one after another in archive order:
//!
//! ```text
//! Pending -> PathResolved -> DirectoryCreated | SymlinkCreated | FileWritten
//! ```
//!
//! The first failure moves the run into the terminal `Canceled` state,
//! after which no further entry is read and the archive is closed.
//! Files written before the failure are left in place.

mod path;
mod system;

pub use path::{lexical_relative_path, resolve_entry_path};
pub use system::{CommandOutput, CommandRunner, SystemUnzipError, TokioCommandRunner};

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::error::IoContext;
use crate::io::ReadAt;
use crate::zip::{EntryKind, EntryMode, FileNameEncoding, ModeDefaults, ZipArchive, ZipEntry};
use crate::{Error, Result};

/// macOS resource fork sidecar folder
const MACOS_METADATA_PREFIX: &str = "__MACOSX/";

/// Symlink entries hold a path, never a payload
const MAX_SYMLINK_TARGET: u64 = 4096;

/// Options for [`extract_all`]
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Encoding label for entry names, auto-detected when unset.
    /// Ignored by the system unzip.
    pub file_names_encoding: Option<String>,
    /// Try the platform's unzip first, falling back on failure
    pub use_system_unzip: bool,
    /// Mode for directories whose entry carries none (default 0o755)
    pub default_dir_mode: Option<u32>,
    /// Mode for files whose entry carries none (default 0o644)
    pub default_file_mode: Option<u32>,
}

/// What happened to a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Skipped,
    DirectoryCreated,
    SymlinkCreated,
    FileWritten(u64),
}

enum ExtractionState {
    Running { processed: u64 },
    Completed { processed: u64 },
    Canceled(Error),
}

/// Extracts archives with a configurable process runner
pub struct Extractor {
    options: ExtractOptions,
    runner: Arc<dyn CommandRunner>,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self {
            options,
            runner: Arc::new(TokioCommandRunner),
        }
    }

    /// Replace the runner used for the system unzip
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Extract every entry of `archive_path` below the absolute `dest_dir`
    pub async fn extract_all(&self, archive_path: &Path, dest_dir: &Path) -> Result<()> {
        if !dest_dir.is_absolute() {
            return Err(Error::NotAbsoluteDestination(dest_dir.to_path_buf()));
        }
        tokio::fs::create_dir_all(dest_dir).await.at_path(dest_dir)?;
        let root = tokio::fs::canonicalize(dest_dir).await.at_path(dest_dir)?;

        if self.options.use_system_unzip {
            match system::extract_with_system_unzip(self.runner.as_ref(), archive_path, &root).await
            {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!("unzip failed; falling back to in-process extraction: {}", e),
            }
        }

        let encoding = FileNameEncoding::from_label(self.options.file_names_encoding.as_deref())?;
        let defaults = ModeDefaults::new(self.options.default_dir_mode, self.options.default_file_mode);
        let mut archive = ZipArchive::open(archive_path, encoding).await?;

        let started = Instant::now();
        let mut state = ExtractionState::Running { processed: 0 };
        while let ExtractionState::Running { processed } = state {
            state = match next_outcome(&mut archive, &root, &defaults).await {
                Ok(Some(_)) => ExtractionState::Running {
                    processed: processed + 1,
                },
                Ok(None) => ExtractionState::Completed { processed },
                Err(e) => ExtractionState::Canceled(e),
            };
        }
        archive.close();

        match state {
            ExtractionState::Canceled(e) => Err(e),
            ExtractionState::Completed { processed } | ExtractionState::Running { processed } => {
                tracing::debug!(
                    archive = %archive_path.display(),
                    dest = %root.display(),
                    entries = processed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "extracted archive"
                );
                Ok(())
            }
        }
    }
}

/// Extract `archive_path` into the absolute `dest_dir`
pub async fn extract_all(archive_path: &Path, dest_dir: &Path, options: &ExtractOptions) -> Result<()> {
    Extractor::new(options.clone())
        .extract_all(archive_path, dest_dir)
        .await
}

async fn next_outcome<R: ReadAt>(
    archive: &mut ZipArchive<R>,
    root: &Path,
    defaults: &ModeDefaults,
) -> Result<Option<EntryOutcome>> {
    let Some(entry) = archive.next_entry()? else {
        return Ok(None);
    };
    if entry.file_name.starts_with(MACOS_METADATA_PREFIX) {
        tracing::debug!(entry = %entry.file_name, "skipping metadata entry");
        return Ok(Some(EntryOutcome::Skipped));
    }
    materialize_entry(archive, &entry, root, defaults)
        .await
        .map(Some)
}

/// Resolve an entry below the canonical `root` and create it on disk
pub(crate) async fn materialize_entry<R: ReadAt>(
    archive: &ZipArchive<R>,
    entry: &ZipEntry,
    root: &Path,
    defaults: &ModeDefaults,
) -> Result<EntryOutcome> {
    let mode = EntryMode::decode(entry, defaults);
    let target = resolve_entry_path(root, &entry.file_name).await?;

    let outcome = match mode.kind {
        EntryKind::Directory => {
            create_directory(&target, mode.permissions).await?;
            EntryOutcome::DirectoryCreated
        }
        EntryKind::Symlink => {
            create_symlink(archive, entry, &target).await?;
            EntryOutcome::SymlinkCreated
        }
        EntryKind::File => {
            let written = write_file(archive, entry, &target, mode.permissions).await?;
            EntryOutcome::FileWritten(written)
        }
    };
    tracing::debug!(
        entry = %entry.file_name,
        dest = %target.display(),
        outcome = ?outcome,
        "extracted entry"
    );
    Ok(outcome)
}

async fn create_directory(path: &Path, permissions: u32) -> Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(permissions);
    #[cfg(not(unix))]
    let _ = permissions;
    builder.create(path).await.at_path(path)
}

async fn create_symlink<R: ReadAt>(archive: &ZipArchive<R>, entry: &ZipEntry, path: &Path) -> Result<()> {
    let content = archive.extract_to_memory(entry, MAX_SYMLINK_TARGET).await?;
    let link = String::from_utf8(content).map_err(|_| {
        Error::not_a_zip(
            archive.source(),
            format!("symlink target of '{}' is not UTF-8", entry.file_name),
        )
    })?;

    // Last entry wins over whatever is already there
    if let Ok(metadata) = tokio::fs::symlink_metadata(path).await {
        if !metadata.is_dir() {
            tokio::fs::remove_file(path).await.at_path(path)?;
        }
    }

    #[cfg(unix)]
    {
        tokio::fs::symlink(&link, path).await.at_path(path)
    }

    #[cfg(not(unix))]
    {
        tokio::fs::write(path, link.as_bytes()).await.at_path(path)
    }
}

async fn write_file<R: ReadAt>(
    archive: &ZipArchive<R>,
    entry: &ZipEntry,
    path: &Path,
    permissions: u32,
) -> Result<u64> {
    let mut reader = archive.entry_reader(entry).await?;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(permissions);
    #[cfg(not(unix))]
    let _ = permissions;
    let mut file = options.open(path).await.at_path(path)?;

    reader.copy_to(&mut file, path).await
}
