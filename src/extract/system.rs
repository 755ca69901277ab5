//! Delegation to the platform's own unzip tool.
//!
//! `unzip` on Unix, PowerShell's `Expand-Archive` on Windows. Callers
//! treat any failure here as a signal to fall back to the in-process
//! extractor.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Captured result of a child process
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Locates and runs external executables
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Full path of `name`, looked up on `PATH`
    fn locate(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    async fn run(&self, program: &Path, args: &[OsString]) -> std::io::Result<CommandOutput>;
}

/// Runs commands with `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &Path, args: &[OsString]) -> std::io::Result<CommandOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        })
    }
}

#[derive(Debug, Error)]
pub enum SystemUnzipError {
    #[error("could not find system unzip ('{0}')")]
    NotFound(&'static str),
    #[error("failed to launch '{}': {source}", .program.display())]
    Launch {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("'{}' exited with {code:?}: {stderr}", .program.display())]
    Failed {
        program: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
}

fn executable_name() -> &'static str {
    if cfg!(windows) { "powershell.exe" } else { "unzip" }
}

fn unzip_args(zip_path: &Path, dest_dir: &Path) -> Vec<OsString> {
    if cfg!(windows) {
        vec![
            "-command".into(),
            "Expand-Archive".into(),
            "-LiteralPath".into(),
            zip_path.into(),
            "-DestinationPath".into(),
            dest_dir.into(),
            "-Force".into(),
        ]
    } else {
        // quiet, overwrite without prompting, into dest
        vec![
            "-q".into(),
            "-o".into(),
            zip_path.into(),
            "-d".into(),
            dest_dir.into(),
        ]
    }
}

/// Extract with the native tool; `dest_dir` must already exist.
pub async fn extract_with_system_unzip(
    runner: &dyn CommandRunner,
    zip_path: &Path,
    dest_dir: &Path,
) -> Result<(), SystemUnzipError> {
    let name = executable_name();
    let program = runner.locate(name).ok_or(SystemUnzipError::NotFound(name))?;
    tracing::debug!(program = %program.display(), "found system unzip");

    let output = runner
        .run(&program, &unzip_args(zip_path, dest_dir))
        .await
        .map_err(|source| SystemUnzipError::Launch {
            program: program.clone(),
            source,
        })?;

    if !output.success() {
        return Err(SystemUnzipError::Failed {
            program,
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(())
}
