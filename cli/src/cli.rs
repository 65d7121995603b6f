//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;
use crate::commands::config::ConfigCommand;
use crate::domain::config::DEFAULT_CONFIG_PATH;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer};

/// Install, upgrade and remove the tynkerbase agent
#[derive(Parser)]
#[command(
    name = "tyb-deploy",
    version,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "TYB_DEPLOY_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Log diagnostics at debug level (see also TYB_DEPLOY_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Answer yes to confirmation prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install the agent
    Install(commands::install::InstallArgs),

    /// Upgrade the installed agent
    Upgrade(commands::upgrade::UpgradeArgs),

    /// Remove the agent (and optionally the project workspace)
    Uninstall(commands::uninstall::UninstallArgs),

    /// Finish an interrupted install, upgrade or uninstall
    Repair,

    /// Show deployment state
    Status,

    /// Show configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            config,
            json,
            quiet,
            no_color,
            verbose: _,
            yes,
            command,
        } = self;

        // Commands that must work without a loadable configuration.
        if matches!(command, Command::Version | Command::Config(ConfigCommand::Path)) {
            let ctx = OutputContext::new(no_color, quiet);
            let renderer = if json {
                Renderer::Json(JsonRenderer)
            } else {
                Renderer::Human(HumanRenderer::new(&ctx))
            };
            if let Command::Version = command {
                commands::version::run(&renderer)?;
                return Ok(ExitCode::SUCCESS);
            }
            let path = config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
            return commands::config::path(&path, &renderer);
        }

        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
            config,
        })?;

        match command {
            Command::Install(args) => {
                app.interrupt.listen_for_ctrl_c();
                commands::install::run(&app, &args).await
            }
            Command::Upgrade(args) => {
                app.interrupt.listen_for_ctrl_c();
                commands::upgrade::run(&app, &args).await
            }
            Command::Uninstall(args) => {
                app.interrupt.listen_for_ctrl_c();
                commands::uninstall::run(&app, &args)
            }
            Command::Repair => {
                app.interrupt.listen_for_ctrl_c();
                commands::repair::run(&app)
            }
            Command::Status => commands::status::run(&app),
            Command::Config(ConfigCommand::Show) => commands::config::show(&app),
            Command::Config(ConfigCommand::Path) | Command::Version => Ok(ExitCode::SUCCESS),
        }
    }
}
