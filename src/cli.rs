use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rezip")]
#[command(version)]
#[command(about = "Streaming ZIP extraction and creation", long_about = None)]
#[command(after_help = "Examples:\n  \
  rezip extract data.zip -d /tmp/data          extract data.zip below /tmp/data\n  \
  rezip list -l data.zip                       list entries with sizes and dates\n  \
  rezip pack ./assets -o assets.zip --level 0  store a folder without compression\n  \
  rezip archive out/site.zip --cwd public --pattern '**/*.html'")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose logging (-vv => trace)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract every entry of an archive into a directory
    Extract(ExtractArgs),
    /// List the entries of an archive
    List(ListArgs),
    /// Zip a single file or folder
    Pack(PackArgs),
    /// Zip the files matching a glob pattern
    Archive(ArchiveArgs),
    /// Check that a file starts with the ZIP signature
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// ZIP file path
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Extract files into exdir (default: current directory)
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<PathBuf>,

    /// Try the system unzip first
    #[arg(long)]
    pub system_unzip: bool,

    /// File name encoding label, e.g. shift_jis or gbk
    #[arg(long, value_name = "LABEL")]
    pub encoding: Option<String>,

    /// Octal mode for directories without one (default 755)
    #[arg(long, value_name = "MODE")]
    pub dir_mode: Option<String>,

    /// Octal mode for files without one (default 644)
    #[arg(long, value_name = "MODE")]
    pub file_mode: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// ZIP file path
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Show sizes, compression ratio and timestamps
    #[arg(short = 'l', long = "long")]
    pub long: bool,

    /// File name encoding label
    #[arg(long, value_name = "LABEL")]
    pub encoding: Option<String>,
}

#[derive(Args, Debug)]
pub struct PackArgs {
    /// File or folder to zip
    #[arg(value_name = "SRC")]
    pub src: PathBuf,

    /// Output file
    #[arg(short = 'o', long, value_name = "OUT")]
    pub output: PathBuf,

    /// Write the archive base64-encoded
    #[arg(long)]
    pub base64: bool,

    /// Maximum size of the result in bytes, 0 for unlimited
    #[arg(long, value_name = "BYTES", default_value_t = crate::pack::DEFAULT_MAX_SIZE)]
    pub max_size: u64,

    /// Compression level, 0 (store) to 9 (best)
    #[arg(short = 'l', long, default_value_t = crate::pack::DEFAULT_LEVEL)]
    pub level: u32,
}

#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// Archive to create
    #[arg(value_name = "DST")]
    pub dst: PathBuf,

    /// Root the pattern is matched against (default: the archive's folder)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Glob selecting the files to include
    #[arg(long, default_value = "**/*")]
    pub pattern: String,

    /// Globs excluding files from the selection
    #[arg(long, value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Compression level, 0 (store) to 9 (best)
    #[arg(short = 'l', long, default_value_t = crate::pack::DEFAULT_LEVEL)]
    pub level: u32,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// File to check
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_log_level() {
        let cli = Cli::parse_from(["rezip", "check", "a.zip"]);
        assert_eq!(cli.log_level(), "warn");
        let cli = Cli::parse_from(["rezip", "-v", "check", "a.zip"]);
        assert_eq!(cli.log_level(), "debug");
        let cli = Cli::parse_from(["rezip", "check", "a.zip", "-q"]);
        assert_eq!(cli.log_level(), "error");
    }

    #[test]
    fn pack_defaults() {
        let cli = Cli::parse_from(["rezip", "pack", "src", "-o", "out.zip"]);
        match cli.command {
            Command::Pack(args) => {
                assert_eq!(args.level, 9);
                assert_eq!(args.max_size, 1024 * 1024 * 1024);
                assert!(!args.base64);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn archive_collects_ignores() {
        let cli = Cli::parse_from([
            "rezip", "archive", "out.zip", "--ignore", "*.log", "--ignore", "tmp/**",
        ]);
        match cli.command {
            Command::Archive(args) => {
                assert_eq!(args.pattern, "**/*");
                assert_eq!(args.ignore, vec!["*.log", "tmp/**"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
