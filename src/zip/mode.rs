//! Decoding of external file attributes.
//!
//! Unix zippers keep a `st_mode` in the upper 16 bits of the external
//! attributes. Archives from other hosts often leave it empty, so the
//! entry kind also falls back on the trailing `/` and the MS-DOS
//! directory attribute.

use crate::{Error, Result};

use super::structures::{HOST_MSDOS, ZipEntry};

pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFLNK: u32 = 0o120000;

/// MS-DOS directory attribute
pub const DOS_DIRECTORY: u32 = 0x10;

pub const DEFAULT_DIR_MODE: u32 = 0o755;
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Permissions used when an entry carries none
#[derive(Debug, Clone, Copy)]
pub struct ModeDefaults {
    pub dir_mode: u32,
    pub file_mode: u32,
}

impl Default for ModeDefaults {
    fn default() -> Self {
        Self {
            dir_mode: DEFAULT_DIR_MODE,
            file_mode: DEFAULT_FILE_MODE,
        }
    }
}

impl ModeDefaults {
    /// Defaults from optional caller overrides; zero means unset
    pub fn new(dir_mode: Option<u32>, file_mode: Option<u32>) -> Self {
        Self {
            dir_mode: dir_mode.filter(|m| *m != 0).unwrap_or(DEFAULT_DIR_MODE),
            file_mode: file_mode.filter(|m| *m != 0).unwrap_or(DEFAULT_FILE_MODE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// What an entry is and the permission bits it should get
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMode {
    pub kind: EntryKind,
    /// Always within `0o777`
    pub permissions: u32,
}

impl EntryMode {
    pub fn decode(entry: &ZipEntry, defaults: &ModeDefaults) -> Self {
        let mode = (entry.external_attributes >> 16) & 0xFFFF;
        let kind = if mode & S_IFMT == S_IFLNK {
            EntryKind::Symlink
        } else if mode & S_IFMT == S_IFDIR
            || entry.file_name.ends_with('/')
            || (entry.host_system() == HOST_MSDOS && entry.external_attributes == DOS_DIRECTORY)
        {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        let mode = match (mode, kind) {
            (0, EntryKind::Directory) => defaults.dir_mode,
            (0, _) => defaults.file_mode,
            (mode, _) => mode,
        };

        Self {
            kind,
            permissions: mode & 0o777,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
}

/// Parse an octal permission string such as `755` or `0o644`
pub fn parse_octal_mode(value: &str) -> Result<u32> {
    let digits = value.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .ok_or_else(|| Error::InvalidMode(value.to_string()))
}
