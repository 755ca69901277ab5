//! # rezip
//!
//! Streaming ZIP extraction and creation.
//!
//! This library reads ZIP archives entry by entry and writes them to a
//! directory tree, guarding against entries that try to escape it. It
//! also builds archives from a file, a folder or a glob selection, either
//! on disk or in a size-capped memory buffer.
//!
//! ## Features
//!
//! - Extract an archive with Unix permissions and symlinks preserved
//! - Optional delegation to the system `unzip` with in-process fallback
//! - Walk entries one at a time and stop early
//! - Create archives on disk or in memory, optionally base64-encoded
//! - Support for ZIP64 archives on read
//! - Stored and deflated entries, with CRC-32 and length checked as they are read
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use rezip::{ExtractOptions, InMemoryZipOptions, extract_all, to_in_memory_zip};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let zip = to_in_memory_zip(Path::new("assets"), &InMemoryZipOptions::default()).await?;
//!     tokio::fs::write("/tmp/assets.zip", &zip).await?;
//!
//!     extract_all(
//!         Path::new("/tmp/assets.zip"),
//!         Path::new("/tmp/assets"),
//!         &ExtractOptions::default(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod cursor;
pub mod error;
pub mod extract;
pub mod integrity;
pub mod io;
pub mod pack;
pub mod zip;

pub use cli::Cli;
pub use cursor::{EntryCursor, EntryFlow, EntryHandle, EntryVisitor, read_entries};
pub use error::Error;
pub use extract::{EntryOutcome, ExtractOptions, Extractor, extract_all};
pub use integrity::assert_valid_zip;
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use pack::{ArchiveOptions, ArchiveSource, InMemoryZipOptions, to_archive, to_in_memory_zip};
pub use zip::{ZipArchive, ZipEntry};

pub type Result<T> = std::result::Result<T, Error>;

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
///
/// ```
/// assert_eq!(rezip::format_size(500), "500 bytes");
/// assert_eq!(rezip::format_size(1536), "1.50 KB");
/// assert_eq!(rezip::format_size(1048576), "1.00 MB");
/// ```
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
