use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use cmdtree_argparse::Command;
use cmdtree_metadata::load_grammar;

/// Load and build the command tree described by a grammar file.
pub fn load_tree(path: &Path) -> Result<Arc<Command>> {
    let grammar = load_grammar(path)?;
    let root = grammar
        .build()
        .with_context(|| format!("invalid grammar: {}", path.display()))?;
    tracing::debug!(command = %root.name(), "grammar loaded");
    Ok(Arc::new(root))
}

/// Follow `path` (subcommand names or aliases) down from `root`.
pub async fn resolve_path(root: &Arc<Command>, path: &[String]) -> Result<Vec<Arc<Command>>> {
    let mut current = root.resolved().await?;
    let mut chain = vec![Arc::clone(&current)];
    for name in path {
        let Some((sub, _)) = current.find_command(name) else {
            let known: Vec<&str> = current.commands().elements().map(|c| c.name()).collect();
            bail!(
                "unknown command '{name}' under '{}' (available: {})",
                current.name(),
                known.join(", ")
            );
        };
        let sub = sub.resolved().await?;
        chain.push(Arc::clone(&sub));
        current = sub;
    }
    Ok(chain)
}
