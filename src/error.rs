use std::path::PathBuf;

use thiserror::Error;

use crate::format_size;

/// Errors produced while reading, extracting or creating archives.
#[derive(Debug, Error)]
pub enum Error {
    /// The file is not a ZIP container or its structures are corrupt.
    #[error("'{}' is not a valid ZIP archive: {reason}", .path.display())]
    NotAZip { path: PathBuf, reason: String },

    /// An entry resolves outside of the destination directory.
    #[error("out of bound path '{}' found while processing entry '{entry}'", .path.display())]
    PathTraversal { entry: String, path: PathBuf },

    /// The in-memory archive grew beyond its configured cap.
    #[error("the size of the resulting archive must not be greater than {}", format_size(.max.to_owned()))]
    SizeExceeded { max: u64 },

    /// The archive or the source path does not exist.
    #[error("no such file or folder: '{}'", .0.display())]
    SourceNotFound(PathBuf),

    /// Filesystem failure on a specific path.
    #[error("i/o error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure inside the compression stage.
    #[error("failed to archive '{}': {reason}", .path.display())]
    Compression { path: PathBuf, reason: String },

    /// Extraction destination was given as a relative path.
    #[error("target path '{}' is expected to be absolute", .0.display())]
    NotAbsoluteDestination(PathBuf),

    /// File is too short to hold a ZIP signature.
    #[error("the file at '{}' is too small to be a ZIP archive", .0.display())]
    TooSmall(PathBuf),

    /// The file does not start with the `PK` magic.
    #[error(
        "the file signature '{signature}' of '{}' is not equal to the expected ZIP archive signature 'PK'",
        .path.display()
    )]
    BadSignature { path: PathBuf, signature: String },

    /// Unknown file name text encoding label.
    #[error("unknown file name encoding '{0}'")]
    UnknownEncoding(String),

    /// Compression level outside of `0..=9`.
    #[error("compression level {0} is out of range (expected 0-9)")]
    InvalidCompressionLevel(u32),

    /// Permission bits that are not a valid octal mode.
    #[error("invalid octal file mode '{0}'")]
    InvalidMode(String),

    #[error(transparent)]
    Glob(#[from] globset::Error),

    #[error(transparent)]
    Std(#[from] std::io::Error),
}

impl Error {
    /// Wrap an I/O error with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn not_a_zip(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::NotAZip {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Attach the offending path to I/O results.
pub(crate) trait IoContext<T> {
    fn at_path(self, path: impl Into<PathBuf>) -> crate::Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at_path(self, path: impl Into<PathBuf>) -> crate::Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
