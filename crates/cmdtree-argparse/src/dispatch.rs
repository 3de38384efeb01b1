//! Turning a parse into an action.

use std::sync::Arc;

use tracing::debug;

use crate::command::Command;
use crate::error::ParseError;
use crate::help;
use crate::parser::{ParseOutcome, parse, split_tokens};

/// What the caller should do after a run. Nothing here touches the process;
/// printing and exiting are left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A handler finished (or ended the run) with this code.
    Exit(i32),
    /// Help was requested, or the command has no handler.
    Help(String),
    /// The input had errors.
    Usage {
        errors: Vec<ParseError>,
        usage: String,
    },
}

/// Split, parse and dispatch `argv` against `root`.
pub async fn run<S: AsRef<str>>(root: &Arc<Command>, argv: &[S]) -> anyhow::Result<Outcome> {
    let tokens = match split_tokens(argv) {
        Ok(tokens) => tokens,
        Err(err) => {
            return Ok(Outcome::Usage {
                errors: vec![err],
                usage: help::usage(std::slice::from_ref(root)),
            });
        }
    };
    let outcome = parse(root, &tokens).await?;
    dispatch(outcome).await
}

/// Act on a parse: report errors, show help, or execute the resolved command.
pub async fn dispatch(outcome: ParseOutcome) -> anyhow::Result<Outcome> {
    let result = match outcome {
        ParseOutcome::Exit(code) => return Ok(Outcome::Exit(code)),
        ParseOutcome::Parsed(result) => result,
    };
    let path: Vec<Arc<Command>> = result.frames.iter().map(|f| Arc::clone(&f.command)).collect();

    // an explicit --help outranks missing or malformed input
    let command = Arc::clone(result.command());
    let wants_help = command.help_option().is_some() && result.options().has("--help");
    if wants_help {
        debug!(command = %command.name(), "help requested");
        return Ok(Outcome::Help(help::help(&path)));
    }

    if !result.errors.is_empty() {
        debug!(errors = result.errors.len(), "parse failed");
        return Ok(Outcome::Usage {
            errors: result.errors,
            usage: help::usage(&path),
        });
    }

    if !command.has_handler() {
        debug!(command = %command.name(), "no handler, showing help");
        return Ok(Outcome::Help(help::help(&path)));
    }

    let code = command.execute(result.invocation()).await?;
    Ok(Outcome::Exit(code.unwrap_or(0)))
}
