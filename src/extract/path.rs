//! Zip-slip defense.
//!
//! Entry names are checked lexically first, so nothing is created for a
//! name that climbs out of the root. The parent directory is then
//! created and canonicalized to catch escapes through symlinks that
//! earlier entries (or the existing tree) put in place.

use std::path::{Component, Path, PathBuf};

use crate::error::IoContext;
use crate::{Error, Result};

/// Resolve `entry_name` below the canonical `root`, creating its parent.
///
/// Returns the absolute destination path of the entry. Fails with
/// [`Error::PathTraversal`] when the entry would land outside `root`.
pub async fn resolve_entry_path(root: &Path, entry_name: &str) -> Result<PathBuf> {
    let relative = lexical_relative_path(entry_name).ok_or_else(|| Error::PathTraversal {
        entry: entry_name.to_string(),
        path: root.join(entry_name),
    })?;
    let traversal = |path: &Path| Error::PathTraversal {
        entry: entry_name.to_string(),
        path: path.to_path_buf(),
    };

    if relative.as_os_str().is_empty() {
        return Ok(root.to_path_buf());
    }

    let target = root.join(&relative);
    let parent = target.parent().unwrap_or(root).to_path_buf();

    // Refuse before creating anything if an existing ancestor already escapes
    let existing = nearest_existing_ancestor(&parent).await;
    let canonical = tokio::fs::canonicalize(&existing).await.at_path(&existing)?;
    if !canonical.starts_with(root) {
        return Err(traversal(&canonical));
    }

    tokio::fs::create_dir_all(&parent).await.at_path(&parent)?;
    let canonical_parent = tokio::fs::canonicalize(&parent).await.at_path(&parent)?;
    if !canonical_parent.starts_with(root) {
        return Err(traversal(&canonical_parent));
    }

    let resolved = match relative.file_name() {
        Some(name) => canonical_parent.join(name),
        None => canonical_parent,
    };

    // A symlink already sitting at the destination must stay inside too
    if let Ok(metadata) = tokio::fs::symlink_metadata(&resolved).await {
        if metadata.file_type().is_symlink() {
            match tokio::fs::canonicalize(&resolved).await {
                Ok(real) if real.starts_with(root) => {}
                Ok(real) => return Err(traversal(&real)),
                Err(_) => return Err(traversal(&resolved)),
            }
        }
    }

    Ok(resolved)
}

/// Normalize an entry name into a relative path that stays below its root.
///
/// `None` for absolute names, drive prefixes and `..` that climbs above
/// the root. An empty result means the root itself.
pub fn lexical_relative_path(entry_name: &str) -> Option<PathBuf> {
    let name = entry_name.replace('\\', "/");
    if name.starts_with('/') || has_drive_prefix(&name) {
        return None;
    }

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(&name).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.iter().collect())
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

async fn nearest_existing_ancestor(path: &Path) -> PathBuf {
    let mut current = path;
    loop {
        if tokio::fs::symlink_metadata(current).await.is_ok() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return current.to_path_buf(),
        }
    }
}
