mod check;
mod grammar;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cmdtree_argparse::{ParseOutcome, help, parse, split_tokens};
use tracing_subscriber::{EnvFilter, fmt};

use crate::grammar::{load_tree, resolve_path};
use crate::report::ParseReport;

#[derive(Parser)]
#[command(name = "cmdtree")]
#[command(version, about = "Parse argv against declarative command grammars", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse arguments against a grammar and print the bindings as JSON
    Parse(ParseArgs),

    /// Print help for a command of a grammar
    Help(HelpArgs),

    /// Build a grammar and report structural errors
    Check(CheckArgs),
}

#[derive(Parser)]
struct ParseArgs {
    /// Path to the grammar JSON file
    #[arg(short, long, value_name = "FILE")]
    grammar: PathBuf,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Arguments to parse (after `--`)
    #[arg(last = true, value_name = "ARGV")]
    argv: Vec<String>,
}

#[derive(Parser)]
struct HelpArgs {
    /// Path to the grammar JSON file
    #[arg(short, long, value_name = "FILE")]
    grammar: PathBuf,

    /// Subcommand path, e.g. `remote add`
    #[arg(value_name = "PATH")]
    path: Vec<String>,

    /// Print only the usage line
    #[arg(long)]
    usage: bool,
}

#[derive(Parser)]
struct CheckArgs {
    /// Path to the grammar JSON file
    #[arg(short, long, value_name = "FILE")]
    grammar: PathBuf,

    /// Only output JSON (no human-readable output)
    #[arg(long)]
    json: bool,
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            match cli.command {
                Commands::Parse(args) => parse_command(args).await,
                Commands::Help(args) => help_command(args).await,
                Commands::Check(args) => check_command(args).await,
            }
        })
}

async fn parse_command(args: ParseArgs) -> Result<ExitCode> {
    tracing::debug!(argv = ?args.argv, "executing parse command");

    let root = load_tree(&args.grammar)?;
    let report = match split_tokens(&args.argv) {
        Err(err) => ParseReport::rejected(root.name(), &[err]),
        Ok(tokens) => match parse(&root, &tokens).await? {
            ParseOutcome::Parsed(result) => ParseReport::from_result(&result),
            ParseOutcome::Exit(code) => ParseReport::exited(root.name(), code),
        },
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    Ok(if report.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn help_command(args: HelpArgs) -> Result<ExitCode> {
    tracing::debug!(path = ?args.path, "executing help command");

    let root = load_tree(&args.grammar)?;
    let chain = resolve_path(&root, &args.path).await?;
    if args.usage {
        print!("{}", help::usage(&chain));
    } else {
        print!("{}", help::help(&chain));
    }
    Ok(ExitCode::SUCCESS)
}

async fn check_command(args: CheckArgs) -> Result<ExitCode> {
    tracing::debug!("executing check command");

    let report = check::check_grammar(&args.grammar).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("=== Grammar Check Results ===");
    eprintln!("Grammar: {}", report.grammar);
    eprintln!("Commands: {}", report.commands.len());
    for command in &report.commands {
        let mut notes = Vec::new();
        if !command.aliases.is_empty() {
            notes.push(format!("aliases: {}", command.aliases.join(", ")));
        }
        if command.blind {
            notes.push("blind".to_string());
        }
        eprintln!(
            "  {} ({} argument(s), {} option(s){}{})",
            command.path,
            command.arguments,
            command.options,
            if notes.is_empty() { "" } else { "; " },
            notes.join("; ")
        );
    }
    eprintln!("OK: grammar is valid");
    Ok(ExitCode::SUCCESS)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
