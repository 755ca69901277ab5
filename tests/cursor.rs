mod common;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use common::{ZIPPED_BASE64, read_string, write_fixture};
use rezip::{EntryCursor, EntryFlow, EntryHandle, EntryOutcome, EntryVisitor, Error, ZipEntry, read_entries};

const EXPECTED: [(&str, Option<&str>); 4] = [
    ("unzipped/", None),
    ("unzipped/test-dir/", None),
    ("unzipped/test-dir/a.txt", Some("Hello World")),
    ("unzipped/test-dir/b.txt", Some("Foo Bar")),
];

/// Checks order and extracts every file entry below `out`
struct Checker {
    out: std::path::PathBuf,
    seen: usize,
}

#[async_trait]
impl EntryVisitor for Checker {
    async fn visit(&mut self, entry: &ZipEntry, handle: EntryHandle<'_>) -> rezip::Result<EntryFlow> {
        let (name, contents) = EXPECTED[self.seen];
        assert_eq!(entry.file_name, name);
        if contents.is_some() {
            let outcome = handle.extract_to(&self.out).await?;
            assert!(matches!(outcome, EntryOutcome::FileWritten(_)));
        }
        self.seen += 1;
        Ok(EntryFlow::Continue)
    }
}

struct StopAtFirst {
    seen: usize,
}

#[async_trait]
impl EntryVisitor for StopAtFirst {
    async fn visit(&mut self, _entry: &ZipEntry, _handle: EntryHandle<'_>) -> rezip::Result<EntryFlow> {
        self.seen += 1;
        Ok(EntryFlow::Stop)
    }
}

/// Fails on the second entry
struct FailSecond {
    seen: usize,
}

#[async_trait]
impl EntryVisitor for FailSecond {
    async fn visit(&mut self, entry: &ZipEntry, _handle: EntryHandle<'_>) -> rezip::Result<EntryFlow> {
        self.seen += 1;
        if self.seen == 2 {
            return Err(Error::InvalidMode(entry.file_name.clone()));
        }
        Ok(EntryFlow::Continue)
    }
}

#[tokio::test]
async fn iterates_entries_in_archive_order() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let zip = write_fixture(tmp_root.path(), "zipped.zip", ZIPPED_BASE64).await?;

    let mut checker = Checker {
        out: tmp_root.path().to_path_buf(),
        seen: 0,
    };
    read_entries(&zip, &mut checker).await?;
    assert_eq!(checker.seen, EXPECTED.len());

    for (name, contents) in EXPECTED {
        if let Some(contents) = contents {
            assert_eq!(read_string(tmp_root.path().join(name)).await?, contents);
        }
    }
    Ok(())
}

#[tokio::test]
async fn stop_ends_iteration_without_error() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let zip = write_fixture(tmp_root.path(), "zipped.zip", ZIPPED_BASE64).await?;

    let mut visitor = StopAtFirst { seen: 0 };
    read_entries(&zip, &mut visitor).await?;
    assert_eq!(visitor.seen, 1);
    Ok(())
}

#[tokio::test]
async fn visitor_errors_abort_iteration() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let zip = write_fixture(tmp_root.path(), "zipped.zip", ZIPPED_BASE64).await?;

    let mut visitor = FailSecond { seen: 0 };
    let err = read_entries(&zip, &mut visitor).await.unwrap_err();
    assert!(matches!(err, Error::InvalidMode(ref name) if name == "unzipped/test-dir/"));
    assert_eq!(visitor.seen, 2);
    Ok(())
}

#[tokio::test]
async fn non_zip_file_is_rejected() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let not_zip = tmp_root.path().join("a.txt");
    tokio::fs::write(&not_zip, "Hello World").await?;

    let mut visitor = StopAtFirst { seen: 0 };
    let err = read_entries(&not_zip, &mut visitor).await.unwrap_err();
    assert!(matches!(err, Error::NotAZip { .. }));
    assert_eq!(visitor.seen, 0);
    Ok(())
}

#[tokio::test]
async fn pull_cursor_reads_content() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let zip = write_fixture(tmp_root.path(), "zipped.zip", ZIPPED_BASE64).await?;

    let mut cursor = EntryCursor::open(&zip).await?;
    assert_eq!(cursor.len(), 4);

    let mut contents = Vec::new();
    while let Some(entry) = cursor.next_entry()? {
        if !entry.is_directory {
            let data = cursor.handle(&entry).read_to_vec().await?;
            contents.push(String::from_utf8(data)?);
        }
    }
    cursor.close();
    assert_eq!(contents, ["Hello World", "Foo Bar"]);
    Ok(())
}

#[tokio::test]
async fn entry_reader_streams_in_chunks() -> Result<()> {
    let tmp_root = TempDir::new()?;
    let zip = write_fixture(tmp_root.path(), "zipped.zip", ZIPPED_BASE64).await?;

    let mut cursor = EntryCursor::open(&zip).await?;
    let mut entry = None;
    while let Some(next) = cursor.next_entry()? {
        if next.file_name.ends_with("a.txt") {
            entry = Some(next);
            break;
        }
    }
    let entry = entry.expect("a.txt entry");

    let handle = cursor.handle(&entry);
    let mut reader = handle.reader().await?;
    let mut buf = [0u8; 4];
    let mut data = Vec::new();
    loop {
        let n = reader.read_chunk(&mut buf).await?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    assert_eq!(data, b"Hello World");
    Ok(())
}
