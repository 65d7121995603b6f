//! `tyb-deploy config` - show the effective configuration.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::output::Renderer;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Print the configuration file path
    Path,
}

/// Run `tyb-deploy config show`.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized.
pub fn show(app: &AppContext) -> Result<ExitCode> {
    app.renderer().render_config(&app.config, &app.config_path)?;
    Ok(ExitCode::SUCCESS)
}

/// Run `tyb-deploy config path`. Works even when the file is invalid.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn path(path: &Path, renderer: &Renderer<'_>) -> Result<ExitCode> {
    renderer.render_config_path(path)?;
    Ok(ExitCode::SUCCESS)
}
