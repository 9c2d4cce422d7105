//! Git adapter.
//!
//! Shells out to the `git` binary in the project root. Only the operations
//! the filer needs are exposed: pull, and stage+commit+push.

use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{PublishOutcome, PullOutcome, VersionControl};

/// Git CLI adapter
pub struct GitCli {
    repo_root: PathBuf,
    binary_path: String,
}

impl GitCli {
    /// Create an adapter for the repository at `repo_root`
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            binary_path: "git".to_string(),
        }
    }

    /// Use a custom git binary
    pub fn with_binary_path(mut self, binary_path: impl Into<String>) -> Self {
        self.binary_path = binary_path.into();
        self
    }

    async fn git(&self, args: &[&str]) -> Result<Output> {
        debug!("git {}", args.join(" "));
        Command::new(&self.binary_path)
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .await
            .with_context(|| format!("Failed to execute 'git {}'", args.first().unwrap_or(&"")))
    }

    async fn git_ok(&self, args: &[&str]) -> Result<Output> {
        let output = self.git(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {} failed: {}", args.join(" "), stderr.trim());
        }
        Ok(output)
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.repo_root).unwrap_or(path)
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn pull(&self) -> Result<PullOutcome> {
        let output = self.git_ok(&["pull"]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if stdout.contains("Already up to date") {
            info!("Working tree already up to date");
            Ok(PullOutcome::UpToDate)
        } else {
            info!("Pulled new changes: {}", stdout.trim());
            Ok(PullOutcome::Updated)
        }
    }

    async fn publish(&self, paths: &[PathBuf], message: &str) -> Result<PublishOutcome> {
        let rel: Vec<String> = paths
            .iter()
            .map(|p| self.relative(p).to_string_lossy().to_string())
            .collect();

        let mut add_args = vec!["add", "--all", "--"];
        add_args.extend(rel.iter().map(String::as_str));
        self.git_ok(&add_args).await?;

        // Exit status 0 means the index matches HEAD
        let diff = self.git(&["diff", "--cached", "--quiet"]).await?;
        if diff.status.success() {
            info!("No changes to commit");
            return Ok(PublishOutcome::NothingToCommit);
        }

        self.git_ok(&["commit", "-m", message]).await?;
        info!("Committed: {}", message.lines().next().unwrap_or(message));

        self.git_ok(&["push"]).await?;
        info!("Pushed to remote");

        Ok(PublishOutcome::Pushed)
    }
}
