//! tyb-deploy - deployment state manager for the tynkerbase agent

use std::process::ExitCode;

use clap::Parser;
use tyb_deploy::cli::Cli;
use tyb_deploy::domain::error::{EXIT_INVALID_INVOCATION, EXIT_OK};
use tyb_deploy::output::{ErrorReport, OutputContext};

#[tokio::main]
async fn main() -> ExitCode {
    // clap exits with 2 on usage errors, which is reserved for FailedPartial.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return exit_code(if e.use_stderr() {
                EXIT_INVALID_INVOCATION
            } else {
                EXIT_OK
            });
        }
    };

    tyb_deploy::logging::init(cli.verbose);
    let (json, no_color) = (cli.json, cli.no_color);

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            let report = ErrorReport::from_error(&e);
            report.render(&OutputContext::new(no_color, false), json);
            exit_code(report.exit_code)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
