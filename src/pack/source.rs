use std::path::{Path, PathBuf};
use std::time::SystemTime;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

use crate::{Error, Result};

/// What an archive entry is made from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Directory,
    /// Symlink with its target text
    Symlink(String),
}

/// One filesystem object queued for archiving
#[derive(Debug, Clone)]
pub struct SourceItem {
    /// Entry name, `/`-separated, directories end with `/`
    pub name: String,
    pub path: PathBuf,
    pub kind: SourceKind,
    pub permissions: u32,
    pub modified: SystemTime,
}

/// Collect a single file, or a folder's content relative to the folder
pub(crate) async fn collect_path(src: &Path) -> Result<Vec<SourceItem>> {
    let metadata = match tokio::fs::metadata(src).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::SourceNotFound(src.to_path_buf()));
        }
        Err(e) => return Err(Error::io(src, e)),
    };

    if !metadata.is_dir() {
        let name = src
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| Error::SourceNotFound(src.to_path_buf()))?;
        return Ok(vec![SourceItem {
            name,
            path: src.to_path_buf(),
            kind: SourceKind::File,
            permissions: permissions(&metadata, false),
            modified: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
        }]);
    }

    let root = src.to_path_buf();
    walk(root, |_| true).await
}

/// Collect everything below `cwd` matching `pattern` and none of `ignore`
pub(crate) async fn collect_glob(
    cwd: &Path,
    pattern: &str,
    ignore: &[String],
    exclude: &Path,
) -> Result<Vec<SourceItem>> {
    if !tokio::fs::try_exists(cwd).await.unwrap_or(false) {
        return Err(Error::SourceNotFound(cwd.to_path_buf()));
    }
    let include = glob_set(std::slice::from_ref(&pattern.to_string()))?;
    let ignore = glob_set(ignore)?;
    let exclude = exclude.to_path_buf();

    walk(cwd.to_path_buf(), move |(entry, name)| {
        let name = name.trim_end_matches('/');
        entry.path() != exclude && include.is_match(name) && !ignore.is_match(name)
    })
    .await
}

fn glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

async fn walk<F>(root: PathBuf, keep: F) -> Result<Vec<SourceItem>>
where
    F: Fn((&DirEntry, &str)) -> bool + Send + 'static,
{
    let task_root = root.clone();
    tokio::task::spawn_blocking(move || walk_blocking(&task_root, keep))
        .await
        .map_err(|e| Error::io(&root, std::io::Error::other(e)))?
}

fn walk_blocking<F>(root: &Path, keep: F) -> Result<Vec<SourceItem>>
where
    F: Fn((&DirEntry, &str)) -> bool,
{
    let mut items = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io(path, e.into())
        })?;
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let mut name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let metadata = entry
            .metadata()
            .map_err(|e| Error::io(entry.path(), e.into()))?;
        let file_type = metadata.file_type();
        let kind = if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
            SourceKind::Symlink(target.to_string_lossy().to_string())
        } else if file_type.is_dir() {
            name.push('/');
            SourceKind::Directory
        } else {
            SourceKind::File
        };

        if !keep((&entry, &name)) {
            continue;
        }
        items.push(SourceItem {
            name,
            path: entry.path().to_path_buf(),
            permissions: permissions(&metadata, kind == SourceKind::Directory),
            kind,
            modified: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
        });
    }
    Ok(items)
}

#[cfg(unix)]
fn permissions(metadata: &std::fs::Metadata, _is_dir: bool) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permissions(metadata: &std::fs::Metadata, is_dir: bool) -> u32 {
    use crate::zip::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
    let mode = if is_dir { DEFAULT_DIR_MODE } else { DEFAULT_FILE_MODE };
    if metadata.permissions().readonly() {
        mode & 0o555
    } else {
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pattern_crosses_directories() {
        let set = glob_set(&["**/*".to_string()]).unwrap();
        assert!(set.is_match("a.txt"));
        assert!(set.is_match("test-dir/a.txt"));
    }

    #[test]
    fn star_stays_within_a_directory() {
        let set = glob_set(&["*.txt".to_string()]).unwrap();
        assert!(set.is_match("a.txt"));
        assert!(!set.is_match("test-dir/a.txt"));
    }
}
