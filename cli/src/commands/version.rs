//! Version command

use anyhow::Result;

use crate::output::Renderer;

/// Run the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn run(renderer: &Renderer<'_>) -> Result<()> {
    renderer.render_version(env!("CARGO_PKG_VERSION"))
}
