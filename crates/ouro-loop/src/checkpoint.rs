//! Checkpoint tool - version-control snapshots of the working tree
//!
//! The controller treats checkpointing as best-effort: a failed commit is
//! logged and counted, never fatal. The git implementation shells out
//! through a command-runner seam so tests never touch a real repository.

use async_trait::async_trait;
use ouro_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

#[async_trait]
pub trait CheckpointTool: Send + Sync {
    async fn stage_all(&self) -> Result<()>;
    async fn commit(&self, message: &str) -> Result<()>;
    async fn tag(&self, name: &str, message: &str) -> Result<()>;
}

/// Output of one external command, reduced to what the checkpoint logic
/// branches on.
#[derive(Clone, Debug)]
pub struct CommandOutput {
    pub success: bool,
    pub stderr: String,
}

/// Seam for running external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, cwd: &Path, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Runs commands via tokio's process API.
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, cwd: &Path, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .await?;
        Ok(CommandOutput {
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Git-backed checkpoints: `git add -A`, `git commit`, annotated tags.
pub struct GitCheckpoint {
    workdir: PathBuf,
    runner: Box<dyn CommandRunner>,
}

impl GitCheckpoint {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            runner: Box::new(SystemCommandRunner),
        }
    }

    pub fn with_runner(workdir: impl Into<PathBuf>, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            workdir: workdir.into(),
            runner,
        }
    }

    async fn git(&self, args: &[&str]) -> Result<()> {
        let output = self.runner.run(&self.workdir, "git", args).await?;
        if !output.success {
            return Err(Error::Checkpoint(format!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                output.stderr.trim()
            )));
        }
        debug!(subcommand = args.first(), "git ok");
        Ok(())
    }
}

#[async_trait]
impl CheckpointTool for GitCheckpoint {
    async fn stage_all(&self) -> Result<()> {
        self.git(&["add", "-A"]).await
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.git(&["commit", "-m", message]).await
    }

    async fn tag(&self, name: &str, message: &str) -> Result<()> {
        self.git(&["tag", "-a", name, "-m", message]).await
    }
}

/// Checkpoint tool that records nothing. Used when checkpointing is
/// disabled or no repository is available.
pub struct NoopCheckpoint;

#[async_trait]
impl CheckpointTool for NoopCheckpoint {
    async fn stage_all(&self) -> Result<()> {
        Ok(())
    }

    async fn commit(&self, _message: &str) -> Result<()> {
        Ok(())
    }

    async fn tag(&self, _name: &str, _message: &str) -> Result<()> {
        Ok(())
    }
}
