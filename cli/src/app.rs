//! Application context - unified state passed to every command handler.
//!
//! `AppContext` owns the loaded configuration, output settings and the
//! cancellation flag, and builds the production deployment components from
//! them so command handlers never construct infrastructure themselves.

use std::path::PathBuf;

use anyhow::Result;

use crate::application::services::deployment::DeploymentManager;
use crate::domain::DeployConfig;
use crate::infra::artifact_store::ArtifactStore;
use crate::infra::config::YamlConfigStore;
use crate::infra::interrupt::InterruptFlag;
use crate::infra::lock::InstallLock;
use crate::infra::source::ReleaseProvider;
use crate::infra::symlink::SymlinkManager;
use crate::infra::workspace::WorkspaceManager;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer, TerminalReporter};

/// Deployment manager wired to the real filesystem.
pub type ProductionManager =
    DeploymentManager<ArtifactStore, SymlinkManager, WorkspaceManager, InstallLock, InterruptFlag>;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Answer yes to destructive prompts.
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
    /// Explicit config file (`--config` / `TYB_DEPLOY_CONFIG`).
    pub config: Option<PathBuf>,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Effective, validated configuration.
    pub config: DeployConfig,
    /// File the configuration was read from (may not exist).
    pub config_path: PathBuf,
    /// `--yes` was given: destructive prompts are pre-confirmed.
    pub assume_yes: bool,
    /// No prompts may be shown (`CI` set or no attended terminal).
    pub non_interactive: bool,
    /// Set by Ctrl-C; transitions stop at the next safe point.
    pub interrupt: InterruptFlag,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration cannot be read or is invalid.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let store = YamlConfigStore::new(flags.config.clone());
        let config = store.load()?;

        let ci_env = std::env::var("CI").is_ok();
        let non_interactive = ci_env || !console::user_attended();

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        Ok(Self {
            // JSON mode keeps stdout for the result document.
            output: OutputContext::new(
                flags.output.no_color,
                flags.output.quiet || flags.output.json,
            ),
            mode,
            config,
            config_path: store.path().to_path_buf(),
            assume_yes: flags.behaviour.yes,
            non_interactive,
            interrupt: InterruptFlag::new(),
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Progress reporter for long-running transitions.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` returns `default` immediately
    /// without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }

    /// The project workspace named by the configuration.
    #[must_use]
    pub fn workspace(&self) -> WorkspaceManager {
        WorkspaceManager::new(self.config.workspace_root.clone())
    }

    /// Release source named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if no bundle name is known for this platform.
    pub fn source(&self) -> Result<ReleaseProvider> {
        Ok(ReleaseProvider::from_config(&self.config.source)?)
    }

    /// Deployment manager over the configured paths.
    #[must_use]
    pub fn deployment_manager(&self) -> ProductionManager {
        let cfg = &self.config;
        DeploymentManager::new(
            ArtifactStore::new(cfg.install_root.clone(), cfg.executable.clone()),
            SymlinkManager::new(cfg.entry_point.clone()),
            self.workspace(),
            InstallLock::new(cfg.lock_path()),
            self.interrupt.clone(),
        )
        .with_retry(cfg.fetch.retry_policy())
        .with_fetch_timeout(cfg.fetch.timeout())
    }
}
