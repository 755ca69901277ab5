//! ZIP container reading and writing.
//!
//! ## Architecture
//!
//! - [`structures`]: on-disk records (EOCD, ZIP64 records, file headers)
//! - [`parser`]: locating and decoding those records from a [`ReadAt`](crate::io::ReadAt) source
//! - [`archive`]: the open archive, yielding entries lazily in central directory order
//! - [`stream`]: chunked, CRC-checked decompression of a single entry
//! - [`mode`]: external attribute decoding (file, directory, symlink, permissions)
//! - [`encoding`]: entry name decoding (UTF-8 flag, CP437, forced labels)
//! - [`writer`]: streaming archive writer
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Reading starts from the EOCD at the end of the file, then fetches the
//! whole Central Directory in one read. Entry data is only touched when
//! an entry is actually opened.
//!
//! ## Limitations
//!
//! - STORED and DEFLATE only
//! - No encryption support
//! - No multi-disk archive support
//! - ZIP64 is understood on read but never written

pub mod archive;
pub mod encoding;
pub mod mode;
pub mod parser;
pub mod stream;
pub mod structures;
pub mod writer;

pub use archive::ZipArchive;
pub use encoding::FileNameEncoding;
pub use mode::{
    DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, EntryKind, EntryMode, ModeDefaults, parse_octal_mode,
};
pub use parser::ZipParser;
pub use stream::EntryReader;
pub use structures::*;
pub use writer::{ZipWriter, dos_date_time};
