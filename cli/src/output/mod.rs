//! Output formatting module

pub mod failure;
pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use std::path::Path;

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;

use crate::application::services::deployment::{
    InstallOutcome, RepairOutcome, StatusReport, UninstallOutcome, UpgradeOutcome,
};
use crate::domain::DeployConfig;
pub use failure::ErrorReport;
pub use human::HumanRenderer;
pub use reporter::TerminalReporter;
pub use styles::Styles;

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Check if progress indicators should be shown.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    /// Print an error message prefixed with `✗` to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }
}

/// Renders results as JSON documents on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        json::print(&serde_json::json!({ "version": version }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_install(&self, outcome: &InstallOutcome) -> Result<()> {
        let result = match outcome {
            InstallOutcome::Installed(_) => "installed",
            InstallOutcome::AlreadyInstalled(_) => "already_installed",
            InstallOutcome::Repaired(_) => "repaired",
        };
        json::print(&serde_json::json!({
            "result": result,
            "artifact": outcome.artifact(),
        }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_upgrade(&self, outcome: &UpgradeOutcome) -> Result<()> {
        let doc = match outcome {
            UpgradeOutcome::Upgraded { from, to } => serde_json::json!({
                "result": "upgraded",
                "from": from.version,
                "artifact": to,
            }),
            UpgradeOutcome::UpToDate(a) => serde_json::json!({
                "result": "up_to_date",
                "artifact": a,
            }),
        };
        json::print(&doc)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_uninstall(&self, outcome: &UninstallOutcome) -> Result<()> {
        json::print(&serde_json::json!({
            "result": "uninstalled",
            "previous_state": outcome.previous_state,
            "removed_version": outcome.removed_version,
            "workspace_removed": outcome.workspace_removed,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_repair(&self, outcome: &RepairOutcome) -> Result<()> {
        let doc = match outcome {
            RepairOutcome::Relinked(a) => {
                serde_json::json!({ "result": "relinked", "artifact": a })
            }
            RepairOutcome::Unlinked => serde_json::json!({ "result": "unlinked" }),
            RepairOutcome::ClearedStaging => serde_json::json!({ "result": "cleared_staging" }),
            RepairOutcome::Healthy(state) => {
                serde_json::json!({ "result": "healthy", "state": state })
            }
        };
        json::print(&doc)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_status(&self, report: &StatusReport) -> Result<()> {
        json::print(report)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config(&self, config: &DeployConfig, path: &Path) -> Result<()> {
        json::print(&serde_json::json!({
            "path": path,
            "config": config,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config_path(&self, path: &Path) -> Result<()> {
        json::print(&serde_json::json!({ "path": path }))
    }
}

/// Dispatches rendering to the human or JSON renderer.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_version(version);
                Ok(())
            }
            Self::Json(r) => r.render_version(version),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_install(&self, outcome: &InstallOutcome) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_install(outcome);
                Ok(())
            }
            Self::Json(r) => r.render_install(outcome),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_upgrade(&self, outcome: &UpgradeOutcome) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_upgrade(outcome);
                Ok(())
            }
            Self::Json(r) => r.render_upgrade(outcome),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_uninstall(&self, outcome: &UninstallOutcome) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_uninstall(outcome);
                Ok(())
            }
            Self::Json(r) => r.render_uninstall(outcome),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_repair(&self, outcome: &RepairOutcome) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_repair(outcome);
                Ok(())
            }
            Self::Json(r) => r.render_repair(outcome),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_status(&self, report: &StatusReport) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_status(report);
                Ok(())
            }
            Self::Json(r) => r.render_status(report),
        }
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config(&self, config: &DeployConfig, path: &Path) -> Result<()> {
        match self {
            Self::Human(r) => r.render_config(config, path),
            Self::Json(r) => r.render_config(config, path),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config_path(&self, path: &Path) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_config_path(path);
                Ok(())
            }
            Self::Json(r) => r.render_config_path(path),
        }
    }
}
