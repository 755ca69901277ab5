mod common;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use common::{KANJI_BASE64, ZIPPED_BASE64, read_string, write_fixture, zipped_fixture};
use rezip::extract::{CommandOutput, CommandRunner};
use rezip::pack::MemorySink;
use rezip::zip::ZipWriter;
use rezip::{Error, ExtractOptions, Extractor, extract_all};

/// Build an archive whose single file entry is called `name`
async fn archive_with_entry(dir: &Path, name: &str) -> Result<PathBuf> {
    let payload = dir.join("payload.txt");
    tokio::fs::write(&payload, "pwned").await?;

    let mut writer = ZipWriter::new(MemorySink::new(0), 6, dir);
    writer
        .add_file(name, &payload, 0o644, SystemTime::now())
        .await?;
    writer.finish().await?;

    let zip = dir.join("crafted.zip");
    tokio::fs::write(&zip, writer.into_inner().into_bytes()).await?;
    Ok(zip)
}

#[tokio::test]
async fn extracts_zip_contents_to_directory() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let assets = TempDir::new()?;
    zipped_fixture(tmp_root.path(), assets.path()).await?;

    let test_dir = assets.path().join("unzipped").join("test-dir");
    assert_eq!(read_string(test_dir.join("a.txt")).await?, "Hello World");
    assert_eq!(read_string(test_dir.join("b.txt")).await?, "Foo Bar");
    Ok(())
}

#[tokio::test]
async fn extraction_is_idempotent() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let assets = TempDir::new()?;
    let zip = zipped_fixture(tmp_root.path(), assets.path()).await?;

    tokio::fs::write(assets.path().join("unzipped/test-dir/a.txt"), "stale content, longer").await?;
    extract_all(&zip, assets.path(), &ExtractOptions::default()).await?;

    assert_eq!(
        read_string(assets.path().join("unzipped/test-dir/a.txt")).await?,
        "Hello World"
    );
    Ok(())
}

#[tokio::test]
async fn relative_destination_is_rejected() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let zip = write_fixture(tmp_root.path(), "zipped.zip", ZIPPED_BASE64).await?;

    let err = extract_all(&zip, Path::new("relative/out"), &ExtractOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotAbsoluteDestination(_)));
    assert!(!Path::new("relative/out").exists());
    Ok(())
}

#[tokio::test]
async fn missing_archive_is_reported() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let err = extract_all(
        &tmp_root.path().join("blabla.zip"),
        &tmp_root.path().join("out"),
        &ExtractOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::SourceNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn utf8_names_without_flag_are_kept() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let assets = TempDir::new()?;
    let zip = write_fixture(tmp_root.path(), "zipped.zip", KANJI_BASE64).await?;

    extract_all(&zip, assets.path(), &ExtractOptions::default()).await?;
    assert!(assets.path().join("kanji-正世丕.app").exists());
    Ok(())
}

#[tokio::test]
async fn unknown_encoding_label_fails() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let zip = write_fixture(tmp_root.path(), "zipped.zip", ZIPPED_BASE64).await?;
    let options = ExtractOptions {
        file_names_encoding: Some("klingon".into()),
        ..Default::default()
    };

    let err = extract_all(&zip, &tmp_root.path().join("out"), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownEncoding(_)));
    Ok(())
}

#[tokio::test]
async fn parent_traversal_creates_nothing_outside() -> Result<()> {
    let sandbox = TempDir::new()?;
    let zip = archive_with_entry(sandbox.path(), "../evil.txt").await?;
    let dest = sandbox.path().join("dest");

    let err = extract_all(&zip, &dest, &ExtractOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PathTraversal { .. }), "{err}");
    assert!(!sandbox.path().join("evil.txt").exists());
    assert_eq!(std::fs::read_dir(&dest)?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn absolute_entry_name_is_rejected() -> Result<()> {
    let sandbox = TempDir::new()?;
    let outside = sandbox.path().join("outside.txt");
    let name = outside.to_string_lossy().replace('\\', "/");
    let zip = archive_with_entry(sandbox.path(), &name).await?;

    let err = extract_all(&zip, &sandbox.path().join("dest"), &ExtractOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PathTraversal { .. }), "{err}");
    assert!(!outside.exists());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_parent_cannot_escape() -> Result<()> {
    let sandbox = TempDir::new()?;
    let dest = sandbox.path().join("dest");
    let outside = sandbox.path().join("outside");
    std::fs::create_dir_all(&dest)?;
    std::fs::create_dir_all(&outside)?;
    std::os::unix::fs::symlink(&outside, dest.join("escape"))?;

    let zip = archive_with_entry(sandbox.path(), "escape/evil.txt").await?;
    let err = extract_all(&zip, &dest, &ExtractOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PathTraversal { .. }), "{err}");
    assert!(!outside.join("evil.txt").exists());
    Ok(())
}

#[tokio::test]
async fn macos_metadata_is_skipped() -> Result<()> {
    let sandbox = TempDir::new()?;
    let zip = archive_with_entry(sandbox.path(), "__MACOSX/._a.txt").await?;
    let dest = sandbox.path().join("dest");

    extract_all(&zip, &dest, &ExtractOptions::default()).await?;
    assert!(!dest.join("__MACOSX").exists());
    Ok(())
}

#[tokio::test]
async fn corrupted_data_fails_crc_check() -> Result<()> {
    let sandbox = TempDir::new()?;
    let payload = sandbox.path().join("payload.txt");
    tokio::fs::write(&payload, "Hello World").await?;

    // Level 0 keeps the content verbatim inside stored deflate blocks
    let mut writer = ZipWriter::new(MemorySink::new(0), 0, sandbox.path());
    writer
        .add_file("a.txt", &payload, 0o644, SystemTime::now())
        .await?;
    writer.finish().await?;
    let mut bytes = writer.into_inner().into_bytes();
    let at = bytes
        .windows(11)
        .position(|w| w == b"Hello World")
        .expect("stored content");
    bytes[at] = b'J';
    let zip = sandbox.path().join("corrupt.zip");
    tokio::fs::write(&zip, bytes).await?;

    let err = extract_all(&zip, &sandbox.path().join("dest"), &ExtractOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotAZip { .. }), "{err}");
    Ok(())
}

#[tokio::test]
async fn non_zip_input_is_rejected() -> Result<()> {
    let sandbox = TempDir::new()?;
    let not_zip = sandbox.path().join("a.txt");
    tokio::fs::write(&not_zip, "Hello World").await?;

    let err = extract_all(&not_zip, &sandbox.path().join("dest"), &ExtractOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotAZip { .. }), "{err}");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn later_duplicate_entries_replace_earlier_ones() -> Result<()> {
    let sandbox = TempDir::new()?;
    let first = sandbox.path().join("first.txt");
    let second = sandbox.path().join("second.txt");
    tokio::fs::write(&first, "first").await?;
    tokio::fs::write(&second, "second").await?;

    let mut writer = ZipWriter::new(MemorySink::new(0), 6, sandbox.path());
    writer.add_file("x", &first, 0o644, SystemTime::now()).await?;
    writer.add_symlink("x", "y", SystemTime::now()).await?;
    writer.add_file("y", &first, 0o644, SystemTime::now()).await?;
    writer.add_file("y", &second, 0o644, SystemTime::now()).await?;
    writer.finish().await?;
    let zip = sandbox.path().join("dupes.zip");
    tokio::fs::write(&zip, writer.into_inner().into_bytes()).await?;

    let dest = sandbox.path().join("dest");
    extract_all(&zip, &dest, &ExtractOptions::default()).await?;

    let x = dest.join("x");
    assert!(std::fs::symlink_metadata(&x)?.file_type().is_symlink());
    assert_eq!(std::fs::read_link(&x)?, Path::new("y"));
    assert_eq!(read_string(dest.join("y")).await?, "second");
    assert_eq!(read_string(&x).await?, "second");
    Ok(())
}

/// Pretends `unzip` exists but always fails
struct BrokenUnzip;

#[async_trait]
impl CommandRunner for BrokenUnzip {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        Some(PathBuf::from("/opt/broken").join(name))
    }

    async fn run(&self, _program: &Path, _args: &[OsString]) -> std::io::Result<CommandOutput> {
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: "cannot find zipfile directory".into(),
            code: Some(9),
        })
    }
}

/// Pretends `unzip` is not installed
struct NoUnzip;

#[async_trait]
impl CommandRunner for NoUnzip {
    fn locate(&self, _name: &str) -> Option<PathBuf> {
        None
    }

    async fn run(&self, _program: &Path, _args: &[OsString]) -> std::io::Result<CommandOutput> {
        Err(std::io::ErrorKind::NotFound.into())
    }
}

#[tokio::test]
async fn failing_system_unzip_falls_back() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let zip = write_fixture(tmp_root.path(), "zipped.zip", ZIPPED_BASE64).await?;
    let options = ExtractOptions {
        use_system_unzip: true,
        ..Default::default()
    };

    for runner in [Arc::new(BrokenUnzip) as Arc<dyn CommandRunner>, Arc::new(NoUnzip)] {
        let assets = TempDir::new()?;
        Extractor::new(options.clone())
            .with_runner(runner)
            .extract_all(&zip, assets.path())
            .await?;
        assert_eq!(
            read_string(assets.path().join("unzipped/test-dir/b.txt")).await?,
            "Foo Bar"
        );
    }
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn stored_modes_are_applied() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let tmp_root = TempDir::new()?;
    let assets = TempDir::new()?;
    zipped_fixture(tmp_root.path(), assets.path()).await?;

    let mode = std::fs::metadata(assets.path().join("unzipped/test-dir/a.txt"))?
        .permissions()
        .mode();
    // 0644 from the entry, group/other bits may be masked further by umask
    assert_eq!(mode & 0o700, 0o600);
    assert_eq!(mode & 0o111, 0);
    Ok(())
}
