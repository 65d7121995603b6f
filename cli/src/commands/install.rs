//! `tyb-deploy install [--version V]` - first installation of the agent.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::domain::VersionSelector;

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Version to install (default: latest)
    #[arg(long = "version", value_name = "VERSION")]
    pub version: Option<String>,
}

/// Run `tyb-deploy install`.
///
/// # Errors
///
/// Returns a `DeployFailure` carrying the post-failure state, or an
/// invalid-invocation error for a malformed version.
pub async fn run(app: &AppContext, args: &InstallArgs) -> Result<ExitCode> {
    let selector = VersionSelector::parse(args.version.as_deref())?;
    let source = app.source()?;
    let mut manager = app.deployment_manager();

    let reporter = app.reporter();
    let outcome = manager.install(&source, &selector, &reporter).await?;
    reporter.finish();

    app.renderer().render_install(&outcome)?;
    Ok(ExitCode::SUCCESS)
}
