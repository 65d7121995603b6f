//! `tyb-deploy repair` - finish a transition left in `FailedPartial`.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;

/// Run `tyb-deploy repair`.
///
/// # Errors
///
/// Returns a `DeployFailure` if the repair itself fails.
pub fn run(app: &AppContext) -> Result<ExitCode> {
    let mut manager = app.deployment_manager();
    let reporter = app.reporter();
    let outcome = manager.repair(&reporter)?;
    reporter.finish();
    app.renderer().render_repair(&outcome)?;
    Ok(ExitCode::SUCCESS)
}
