//! `tyb-deploy upgrade [--version V] [--allow-downgrade]`

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::deployment::UpgradeRequest;
use crate::domain::VersionSelector;

/// Arguments for the upgrade command.
#[derive(Args)]
pub struct UpgradeArgs {
    /// Version to upgrade to (default: latest)
    #[arg(long = "version", value_name = "VERSION")]
    pub version: Option<String>,

    /// Allow installing a lower version than the current one
    #[arg(long)]
    pub allow_downgrade: bool,
}

/// Run `tyb-deploy upgrade`.
///
/// # Errors
///
/// Returns a `DeployFailure` carrying the post-failure state.
pub async fn run(app: &AppContext, args: &UpgradeArgs) -> Result<ExitCode> {
    let request = UpgradeRequest {
        selector: VersionSelector::parse(args.version.as_deref())?,
        allow_downgrade: args.allow_downgrade,
    };
    let source = app.source()?;
    let mut manager = app.deployment_manager();

    let reporter = app.reporter();
    let outcome = manager.upgrade(&source, &request, &reporter).await?;
    reporter.finish();

    app.renderer().render_upgrade(&outcome)?;
    Ok(ExitCode::SUCCESS)
}
