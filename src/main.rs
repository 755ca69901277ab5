//! Main entry point for the rezip CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rezip::cli::{ArchiveArgs, CheckArgs, Command, ExtractArgs, ListArgs, PackArgs};
use rezip::zip::{FileNameEncoding, parse_octal_mode};
use rezip::{
    ArchiveOptions, ArchiveSource, Cli, EntryCursor, ExtractOptions, InMemoryZipOptions,
    format_size,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Extract(args) => extract(args).await,
        Command::List(args) => list(args).await,
        Command::Pack(args) => pack(args).await,
        Command::Archive(args) => archive(args).await,
        Command::Check(args) => check(args).await,
    }
}

async fn extract(args: ExtractArgs) -> Result<()> {
    let dest = match args.extract_dir {
        Some(dir) => std::path::absolute(&dir)
            .with_context(|| format!("invalid destination '{}'", dir.display()))?,
        None => std::env::current_dir().context("cannot determine the current directory")?,
    };
    let options = ExtractOptions {
        file_names_encoding: args.encoding,
        use_system_unzip: args.system_unzip,
        default_dir_mode: args.dir_mode.as_deref().map(parse_octal_mode).transpose()?,
        default_file_mode: args.file_mode.as_deref().map(parse_octal_mode).transpose()?,
    };

    rezip::extract_all(&args.file, &dest, &options)
        .await
        .with_context(|| format!("failed to extract '{}'", args.file.display()))
}

/// List entries in archive order.
///
/// Supports two output formats:
/// - Simple format: just entry names, one per line
/// - Long format (`-l`): sizes, compression ratio and timestamps
async fn list(args: ListArgs) -> Result<()> {
    let encoding = FileNameEncoding::from_label(args.encoding.as_deref())?;
    let mut cursor = EntryCursor::open_with_encoding(&args.file, encoding)
        .await
        .with_context(|| format!("failed to open '{}'", args.file.display()))?;

    if args.long {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    while let Some(entry) = cursor.next_entry()? {
        if !args.long {
            println!("{}", entry.file_name);
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }
    cursor.close();

    if args.long {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }
    Ok(())
}

/// Percentage saved by compression
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

async fn pack(args: PackArgs) -> Result<()> {
    let options = InMemoryZipOptions {
        is_metered: true,
        encode_to_base64: args.base64,
        max_size: args.max_size,
        level: args.level,
    };
    let data = rezip::to_in_memory_zip(&args.src, &options)
        .await
        .with_context(|| format!("failed to zip '{}'", args.src.display()))?;
    tokio::fs::write(&args.output, &data)
        .await
        .with_context(|| format!("failed to write '{}'", args.output.display()))?;
    eprintln!("{}: {}", args.output.display(), format_size(data.len() as u64));
    Ok(())
}

async fn archive(args: ArchiveArgs) -> Result<()> {
    let source = ArchiveSource {
        pattern: args.pattern,
        cwd: args.cwd,
        ignore: args.ignore,
    };
    rezip::to_archive(&args.dst, &source, &ArchiveOptions { level: args.level })
        .await
        .with_context(|| format!("failed to create '{}'", args.dst.display()))
}

async fn check(args: CheckArgs) -> Result<()> {
    rezip::assert_valid_zip(&args.file).await?;
    println!("{}: OK", args.file.display());
    Ok(())
}
