//! `tyb-deploy status` - read-only report of the deployment state.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;

/// Run `tyb-deploy status`. Never takes the install lock.
///
/// # Errors
///
/// Returns an error if the install root, entry point or workspace cannot be read.
pub fn run(app: &AppContext) -> Result<ExitCode> {
    let report = app.deployment_manager().status()?;
    app.renderer().render_status(&report)?;
    Ok(ExitCode::SUCCESS)
}
