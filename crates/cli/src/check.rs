use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cmdtree_argparse::Command;
use serde::Serialize;

use crate::grammar::load_tree;

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub grammar: String,
    pub commands: Vec<CommandSummary>,
}

#[derive(Debug, Serialize)]
pub struct CommandSummary {
    pub path: String,
    pub aliases: Vec<String>,
    pub arguments: usize,
    pub options: usize,
    pub blind: bool,
    pub lazy: bool,
}

/// Build the grammar at `path` and summarize every command in it.
pub async fn check_grammar(path: &Path) -> Result<CheckReport> {
    let root = load_tree(path)?;
    let mut commands = Vec::new();
    let mut pending = vec![(root.name().to_string(), Arc::clone(&root))];
    while let Some((prefix, command)) = pending.pop() {
        let lazy = command.is_lazy();
        let command = command
            .resolved()
            .await
            .with_context(|| format!("failed to resolve command: {prefix}"))?;
        commands.push(CommandSummary {
            path: prefix.clone(),
            aliases: command.names()[1..].to_vec(),
            arguments: command.arguments().len(),
            options: command.options().len(),
            blind: command.is_blind(),
            lazy,
        });
        // reversed so the stack yields declaration order
        let subs: Vec<&Arc<Command>> = command.commands().elements().collect();
        for sub in subs.into_iter().rev() {
            pending.push((format!("{prefix} {}", sub.name()), Arc::clone(sub)));
        }
    }

    Ok(CheckReport {
        grammar: path.display().to_string(),
        commands,
    })
}
