//! `tyb-deploy uninstall [--purge-workspace]` - remove the agent.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ProjectWorkspace;
use crate::application::services::deployment::WorkspaceRemoval;

/// Arguments for the uninstall command.
#[derive(Args)]
pub struct UninstallArgs {
    /// Also delete the project workspace (asks for confirmation unless --yes)
    #[arg(long)]
    pub purge_workspace: bool,
}

/// Run `tyb-deploy uninstall`.
///
/// # Errors
///
/// Returns a `DeployFailure` carrying the post-failure state. A purge that
/// was neither confirmed nor declined fails with `ConfirmationRequired`.
pub fn run(app: &AppContext, args: &UninstallArgs) -> Result<ExitCode> {
    let removal = if args.purge_workspace {
        let answer = purge_answer(app)?;
        if answer == PurgeAnswer::Declined {
            app.output.info("Keeping the project workspace.");
        }
        answer.removal()
    } else {
        WorkspaceRemoval::Keep
    };

    let mut manager = app.deployment_manager();
    let reporter = app.reporter();
    let outcome = manager.uninstall(removal, &reporter)?;
    reporter.finish();

    app.renderer().render_uninstall(&outcome)?;
    Ok(ExitCode::SUCCESS)
}

/// How the operator answered the workspace purge question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PurgeAnswer {
    Confirmed,
    /// The agent is still removed; only the projects are kept.
    Declined,
    /// Nobody could be asked.
    Unanswered,
}

impl PurgeAnswer {
    fn removal(self) -> WorkspaceRemoval {
        match self {
            Self::Confirmed => WorkspaceRemoval::Purge { confirmed: true },
            Self::Declined => WorkspaceRemoval::Keep,
            Self::Unanswered => WorkspaceRemoval::Purge { confirmed: false },
        }
    }
}

/// Without a terminal and without `--yes` the purge stays unanswered, which
/// the manager rejects before touching anything.
fn purge_answer(app: &AppContext) -> Result<PurgeAnswer> {
    if app.assume_yes {
        return Ok(PurgeAnswer::Confirmed);
    }
    let workspace = app.workspace();
    if !workspace.exists() || app.non_interactive {
        return Ok(PurgeAnswer::Unanswered);
    }

    let projects = workspace.projects()?;
    if !app.output.quiet {
        println!();
        println!(
            "This will permanently delete {} ({} project{}).",
            workspace.root().display(),
            projects.len(),
            if projects.len() == 1 { "" } else { "s" }
        );
        println!();
    }
    if app.confirm("Delete the project workspace?", false)? {
        Ok(PurgeAnswer::Confirmed)
    } else {
        Ok(PurgeAnswer::Declined)
    }
}
