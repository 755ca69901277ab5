use std::path::Path;

use tokio::io::AsyncReadExt;

use crate::error::IoContext;
use crate::{Error, Result};

const ZIP_MAGIC: &[u8; 2] = b"PK";
const MIN_SIZE: u64 = 4;

/// Shallow check that `path` starts with the ZIP `PK` magic.
///
/// Only the first bytes are looked at, a truncated or corrupt archive
/// can still pass.
pub async fn assert_valid_zip(path: &Path) -> Result<()> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::SourceNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(Error::io(path, e)),
    };
    if metadata.len() < MIN_SIZE {
        return Err(Error::TooSmall(path.to_path_buf()));
    }

    let mut file = tokio::fs::File::open(path).await.at_path(path)?;
    let mut signature = [0u8; 2];
    file.read_exact(&mut signature).await.at_path(path)?;
    if &signature != ZIP_MAGIC {
        return Err(Error::BadSignature {
            path: path.to_path_buf(),
            signature: String::from_utf8_lossy(&signature).into_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn accepts_pk_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ok.zip");
        std::fs::write(&path, b"PK\x03\x04rest").unwrap();
        assert_valid_zip(&path).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_short_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.zip");
        std::fs::write(&path, b"PK").unwrap();
        assert!(matches!(
            assert_valid_zip(&path).await,
            Err(Error::TooSmall(_))
        ));
    }

    #[tokio::test]
    async fn rejects_other_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.zip");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        match assert_valid_zip(&path).await {
            Err(Error::BadSignature { signature, .. }) => assert_eq!(signature, "%P"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.zip");
        assert!(matches!(
            assert_valid_zip(&path).await,
            Err(Error::SourceNotFound(_))
        ));
    }
}
