//! Human-readable terminal renderer.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize as _;

use crate::application::services::deployment::{
    InstallOutcome, RepairOutcome, StatusReport, UninstallOutcome, UpgradeOutcome,
};
use crate::domain::{DeployConfig, DeploymentState, InstalledArtifact, LinkStatus};
use crate::output::OutputContext;

/// Renders deployment results as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    pub fn render_version(&self, version: &str) {
        println!("tyb-deploy {version}");
    }

    pub fn render_install(&self, outcome: &InstallOutcome) {
        match outcome {
            InstallOutcome::Installed(a) => {
                self.ctx.success(&format!("Installed tynkerbase-agent {}", a.version));
            }
            InstallOutcome::AlreadyInstalled(a) => {
                self.ctx
                    .info(&format!("tynkerbase-agent {} is already installed", a.version));
            }
            InstallOutcome::Repaired(a) => {
                self.ctx.success(&format!(
                    "Completed interrupted install of tynkerbase-agent {}",
                    a.version
                ));
            }
        }
        self.artifact_details(outcome.artifact());
    }

    pub fn render_upgrade(&self, outcome: &UpgradeOutcome) {
        match outcome {
            UpgradeOutcome::Upgraded { from, to } => {
                self.ctx.success(&format!(
                    "Upgraded tynkerbase-agent {} → {}",
                    from.version, to.version
                ));
                self.artifact_details(to);
            }
            UpgradeOutcome::UpToDate(a) => {
                self.ctx
                    .info(&format!("tynkerbase-agent {} is up to date", a.version));
            }
        }
    }

    pub fn render_uninstall(&self, outcome: &UninstallOutcome) {
        match (&outcome.removed_version, outcome.previous_state) {
            (_, DeploymentState::Absent) => self.ctx.info("tynkerbase-agent is not installed"),
            (Some(version), _) => {
                self.ctx
                    .success(&format!("Removed tynkerbase-agent {version}"));
            }
            (None, _) => self.ctx.success("Removed leftover agent files"),
        }
        if outcome.workspace_removed {
            self.ctx.success("Removed project workspace");
        }
    }

    pub fn render_repair(&self, outcome: &RepairOutcome) {
        match outcome {
            RepairOutcome::Relinked(a) => {
                self.ctx
                    .success(&format!("Repaired: entry point now runs {}", a.version));
            }
            RepairOutcome::Unlinked => {
                self.ctx
                    .success("Repaired: removed dangling entry point (agent not installed)");
            }
            RepairOutcome::ClearedStaging => {
                self.ctx.success("Repaired: removed stale staging directory");
            }
            RepairOutcome::Healthy(state) => {
                self.ctx.info(&format!("Nothing to repair (state: {state})"));
            }
        }
    }

    pub fn render_status(&self, report: &StatusReport) {
        if self.ctx.quiet {
            return;
        }
        let state = report.state.to_string();
        let styled = match report.state {
            DeploymentState::Installed => state.style(self.ctx.styles.success).to_string(),
            DeploymentState::FailedPartial => state.style(self.ctx.styles.error).to_string(),
            DeploymentState::Absent | DeploymentState::Staged => {
                state.style(self.ctx.styles.warning).to_string()
            }
        };
        self.ctx.kv("State:      ", &styled);
        match &report.artifact {
            Some(a) => {
                self.ctx.kv("Version:    ", &a.version);
                self.ctx.kv(
                    "Installed:  ",
                    &a.installed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                );
                self.ctx.kv("Checksum:   ", &a.checksum);
            }
            None => self.ctx.kv("Version:    ", "-"),
        }
        self.ctx
            .kv("Install:    ", &report.install_root.display().to_string());
        let entry = match &report.link {
            LinkStatus::Missing => format!("{} (missing)", report.entry_point.display()),
            LinkStatus::Points(target) => format!(
                "{} → {}",
                report.entry_point.display(),
                target.display()
            ),
            LinkStatus::NotALink => format!("{} (not a symlink)", report.entry_point.display()),
        };
        self.ctx.kv("Entry point:", &entry);
        if report.staging_present {
            self.ctx.warn("Stale staging directory present");
        }

        println!();
        self.ctx.header("Workspace:");
        if report.workspace.present {
            self.ctx.kv(
                "Path:    ",
                &report.workspace.root.display().to_string(),
            );
            let projects = if report.workspace.projects.is_empty() {
                "none".to_string()
            } else {
                report.workspace.projects.join(", ")
            };
            self.ctx.kv("Projects:", &projects);
        } else {
            self.ctx.kv(
                "Path:    ",
                &format!("{} (absent)", report.workspace.root.display()),
            );
        }

        if report.state == DeploymentState::FailedPartial {
            println!();
            self.ctx.info("Run: tyb-deploy repair");
        }
    }

    /// Render the effective configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn render_config(&self, config: &DeployConfig, path: &Path) -> Result<()> {
        self.ctx.header(&format!("Configuration ({})", path.display()));
        println!();
        let yaml = serde_yaml::to_string(config).context("cannot serialize config")?;
        print!("{yaml}");
        Ok(())
    }

    pub fn render_config_path(&self, path: &Path) {
        println!("{}", path.display());
    }

    fn artifact_details(&self, artifact: &InstalledArtifact) {
        self.ctx
            .kv("Executable:", &artifact.executable.display().to_string());
        self.ctx.kv("Checksum:  ", &artifact.checksum);
    }
}
