//! Git mirror and rsync deployment.

use std::path::Path;

use async_trait::async_trait;

use super::process::{copy_tree, ProcessRunner};
use super::{Deployer, SiteOutput};
use crate::core::{Config, DeployStage, GitConfig, Result, RsyncConfig};

/// Syncs the build output into a mirror, commits it, and transfers it.
#[derive(Debug, Clone)]
pub struct GitRsyncDeployer {
    git: GitConfig,
    rsync: RsyncConfig,
    runner: ProcessRunner,
}

impl GitRsyncDeployer {
    /// Create a deployer from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            git: config.git.clone(),
            rsync: config.rsync.clone(),
            runner: ProcessRunner::new(config.timeouts.deploy()),
        }
    }

    /// Replace the mirror contents with the build output, keeping `.git`.
    fn sync_mirror(output_dir: &Path, mirror_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(mirror_dir)?;
        for entry in std::fs::read_dir(mirror_dir)? {
            let entry = entry?;
            if entry.file_name() == ".git" {
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }
        copy_tree(output_dir, mirror_dir)?;
        tracing::info!(mirror = %mirror_dir.display(), "Synced build output to mirror");
        Ok(())
    }

    async fn commit_and_push(&self, mirror_dir: &Path) -> Result<()> {
        let git = self.runner.clone().current_dir(mirror_dir);

        if !mirror_dir.join(".git").exists() {
            git.check("git", ["init"]).await?;
            git.check("git", ["remote", "add", "origin", self.git.mirror_repo.as_str()]).await?;
            git.check("git", ["branch", "-M", self.git.branch.as_str()]).await?;
            tracing::info!(repo = %self.git.mirror_repo, "Initialized mirror repository");
        }

        git.check("git", ["add", "."]).await?;

        let diff = git.run("git", ["diff", "--cached", "--quiet"]).await?;
        if diff.success() {
            tracing::info!("No changes to commit");
            return Ok(());
        }

        let message = format!("Deploy: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
        git.check("git", ["commit", "-m", message.as_str()]).await?;
        git.check("git", ["push", "-u", "origin", self.git.branch.as_str()]).await?;
        tracing::info!(repo = %self.git.mirror_repo, "Pushed mirror");
        Ok(())
    }

    /// Arguments for the rsync invocation.
    fn rsync_args(&self, mirror_dir: &Path) -> Vec<String> {
        let mut args = vec!["-avz".to_string(), "--delete".to_string(), "--exclude".to_string(), ".git".to_string()];
        if let Some(ref key) = self.rsync.ssh_key {
            args.push("-e".to_string());
            args.push(format!("ssh -i {}", key.display()));
        }
        args.push(format!("{}/", mirror_dir.display()));
        args.push(self.rsync_target());
        args
    }

    fn rsync_target(&self) -> String {
        if self.rsync.user.is_empty() {
            format!("{}:{}", self.rsync.host, self.rsync.target_path)
        } else {
            format!("{}@{}:{}", self.rsync.user, self.rsync.host, self.rsync.target_path)
        }
    }

    async fn transfer(&self, mirror_dir: &Path) -> Result<()> {
        self.runner.check("rsync", self.rsync_args(mirror_dir)).await?;
        tracing::info!(target = %self.rsync_target(), "Transferred site");
        Ok(())
    }
}

#[async_trait]
impl Deployer for GitRsyncDeployer {
    async fn deploy(&self, site: &SiteOutput) -> Result<()> {
        tracing::info!(output = %site.output_dir.display(), "Starting deployment");

        let mirror = &site.mirror_dir;
        Self::sync_mirror(&site.output_dir, mirror).map_err(|e| e.at_stage(DeployStage::Mirror))?;

        if self.git.auto_commit {
            self.commit_and_push(mirror).await.map_err(|e| e.at_stage(DeployStage::Commit))?;
        }

        if self.rsync.enabled {
            self.transfer(mirror).await.map_err(|e| e.at_stage(DeployStage::Transfer))?;
        }

        tracing::info!("Deployment complete");
        Ok(())
    }
}
