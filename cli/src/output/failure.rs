//! Turns a command error into what the operator sees and the process exit code.

use owo_colors::OwoColorize as _;

use crate::domain::error::{EXIT_INVALID_INVOCATION, EXIT_RECOVERABLE};
use crate::domain::{ConfigError, DeployError, DeployFailure, DeploymentState};
use crate::output::{OutputContext, json};

/// A classified command failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub message: String,
    /// Stable snake_case code for JSON output.
    pub code: &'static str,
    /// State the host was left in, when a transition observed it.
    pub state: Option<DeploymentState>,
    pub hint: Option<&'static str>,
    pub exit_code: i32,
}

impl ErrorReport {
    /// Classify an error returned by a command handler.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        if let Some(failure) = err.downcast_ref::<DeployFailure>() {
            return Self {
                message: failure.error.to_string(),
                code: failure.error.code(),
                state: Some(failure.state),
                hint: Some(failure.hint()),
                exit_code: failure.exit_code(),
            };
        }
        if let Some(error) = err.downcast_ref::<DeployError>() {
            return Self {
                message: error.to_string(),
                code: error.code(),
                state: None,
                hint: None,
                exit_code: if error.is_invalid_invocation() {
                    EXIT_INVALID_INVOCATION
                } else {
                    EXIT_RECOVERABLE
                },
            };
        }
        if let Some(error) = err.downcast_ref::<ConfigError>() {
            return Self {
                message: error.to_string(),
                code: "invalid_config",
                state: None,
                hint: None,
                exit_code: EXIT_INVALID_INVOCATION,
            };
        }
        Self {
            message: format!("{err:#}"),
            code: "error",
            state: None,
            hint: None,
            exit_code: EXIT_RECOVERABLE,
        }
    }

    /// Print the report: a JSON error object on stdout, or `✗ message` on stderr.
    pub fn render(&self, ctx: &OutputContext, as_json: bool) {
        if as_json {
            match json::format_error(&self.message, self.code, self.state) {
                Ok(text) => println!("{text}"),
                Err(e) => eprintln!("Error: {e}"),
            }
            return;
        }
        ctx.error(&self.message);
        if let Some(state) = self.state {
            eprintln!("    {} {state}", "state:".style(ctx.styles.dim));
        }
        if let Some(hint) = self.hint {
            eprintln!("    {hint}");
        }
    }
}
