//! Plain-text usage and help rendering.

use std::sync::Arc;

use crate::argument::{Argument, display_value};
use crate::command::Command;
use crate::value::Arity;

/// `Usage: prog sub [options] <arg>` for the command at the end of `path`.
pub fn usage(path: &[Arc<Command>]) -> String {
    let Some(command) = path.last() else {
        return String::new();
    };
    let mut parts: Vec<String> = path.iter().map(|c| c.name().to_string()).collect();
    if !command.options().is_empty() {
        parts.push("[options]".to_string());
    }
    parts.extend(command.arguments().iter().map(positional_label));
    if !command.commands().is_empty() {
        parts.push("<command>".to_string());
    }
    if command.is_blind() {
        parts.push("[args...]".to_string());
    }
    format!("Usage: {}\n", parts.join(" "))
}

/// Full help text for the command at the end of `path`.
pub fn help(path: &[Arc<Command>]) -> String {
    let Some(command) = path.last() else {
        return String::new();
    };
    let mut out = usage(path);

    if !command.description().trim().is_empty() {
        out.push('\n');
        out.push_str(command.description().trim_end());
        out.push('\n');
    }

    if !command.arguments().is_empty() {
        let rows = command
            .arguments()
            .iter()
            .map(|a| (positional_label(a), format_arg_help(a)))
            .collect();
        push_section(&mut out, "Arguments", "", rows);
    }

    for group in command.options().iter().filter(|g| !g.is_empty()) {
        let rows = group
            .elements()
            .iter()
            .map(|o| (option_left(o), format_arg_help(o)))
            .collect();
        push_section(&mut out, group.name().unwrap_or("Options"), group.description(), rows);
    }

    for group in command.commands().iter().filter(|g| !g.is_empty()) {
        let rows = group
            .elements()
            .iter()
            .map(|c| (c.names().join(", "), c.description().trim().to_string()))
            .collect();
        push_section(&mut out, group.name().unwrap_or("Commands"), group.description(), rows);
    }

    out
}

fn push_section(out: &mut String, title: &str, description: &str, rows: Vec<(String, String)>) {
    out.push_str(&format!("\n{title}:\n"));
    if !description.trim().is_empty() {
        out.push_str(&format!("  {}\n", description.trim()));
    }
    let width = rows.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    for (left, help) in rows {
        if help.is_empty() {
            out.push_str(&format!("  {}\n", left));
        } else {
            out.push_str(&format!("  {:width$}  {}\n", left, help, width = width));
        }
    }
}

fn positional_label(arg: &Argument) -> String {
    let holder = arg.holder();
    let label = holder.join(" ");
    match arg.arity() {
        Arity::Optional => format!("[{label}]"),
        Arity::ZeroOrMore => format!("[{label}...]"),
        Arity::OneOrMore => format!("<{label}...>"),
        Arity::Exact(n) => {
            let labels: Vec<&String> = if holder.len() == n {
                holder.iter().collect()
            } else {
                std::iter::repeat_n(&holder[0], n).collect()
            };
            let (open, close) = if arg.required() { ("<", ">") } else { ("[", "]") };
            labels
                .iter()
                .map(|l| format!("{open}{l}{close}"))
                .collect::<Vec<_>>()
                .join(" ")
        }
        Arity::Zero => label,
    }
}

fn option_left(option: &Argument) -> String {
    let mut names: Vec<&String> = option.names().iter().collect();
    // short forms first
    names.sort_by_key(|n| n.starts_with("--"));
    let mut left = names
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let holder = option.holder();
    let value = match option.arity() {
        Arity::Zero => None,
        Arity::Exact(n) if holder.len() == n && n > 1 => Some(
            holder
                .iter()
                .map(|h| format!("<{h}>"))
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Arity::Exact(n) => Some(vec![format!("<{}>", holder[0]); n].join(" ")),
        Arity::Optional => Some(format!("[{}]", holder[0])),
        Arity::ZeroOrMore => Some(format!("[{}...]", holder[0])),
        Arity::OneOrMore => Some(format!("<{}...>", holder[0])),
    };
    if let Some(value) = value {
        left.push(' ');
        left.push_str(&value);
    }
    left
}

fn format_arg_help(arg: &Argument) -> String {
    let mut out = arg.description().trim().to_string();
    let mut push = |note: String| {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&note);
    };
    if arg.required() && !arg.is_positional() {
        push("(required)".to_string());
    }
    if let Some(choices) = arg.choices() {
        let choices: Vec<String> = choices.iter().map(display_value).collect();
        push(format!("[choices: {}]", choices.join(", ")));
    }
    if let Some(default) = arg.default_value().filter(|d| !is_trivial_default(d)) {
        push(format!("[default: {}]", display_value(&default)));
    }
    out
}

// Derived defaults of flags and `*` arguments carry no information.
fn is_trivial_default(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(_) => true,
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::Number(n) => n.as_i64() == Some(0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::ArgumentSpec;
    use crate::value::ValueType;

    fn cp() -> Arc<Command> {
        let mut cp = Command::new("cp").about("Copy files");
        cp.add_argument(ArgumentSpec::new("src").description("Source file")).unwrap();
        cp.add_argument(ArgumentSpec::new("dest").arity(Arity::Optional)).unwrap();
        cp.add_option(ArgumentSpec::new("--force").alias("-f").description("Overwrite"))
            .unwrap();
        cp.add_option_group("Output", "").unwrap();
        cp.add_option(
            ArgumentSpec::new("--mode")
                .value_type(ValueType::String)
                .choices(["copy", "link"])
                .default_value("copy")
                .group("Output"),
        )
        .unwrap();
        Arc::new(cp)
    }

    #[test]
    fn usage_lists_positionals_by_arity() {
        assert_eq!(usage(&[cp()]), "Usage: cp [options] <src> [dest]\n");

        let mut cmd = Command::new("sum").without_help();
        cmd.add_argument(ArgumentSpec::new("point").arity(Arity::Exact(2)).holder("X").holder("Y"))
            .unwrap();
        cmd.add_argument(ArgumentSpec::new("n").arity(Arity::OneOrMore)).unwrap();
        assert_eq!(usage(&[Arc::new(cmd)]), "Usage: sum <X> <Y> <n...>\n");
    }

    #[test]
    fn help_renders_sections_in_group_order() {
        let text = help(&[cp()]);
        let expected = "\
Usage: cp [options] <src> [dest]

Copy files

Arguments:
  <src>   Source file
  [dest]

Output:
  --mode <mode>  [choices: copy, link] [default: copy]

Options:
  -h, --help   Show this message
  -f, --force  Overwrite
";
        assert_eq!(text, expected);
    }

    #[test]
    fn subcommand_help_uses_the_full_path() {
        let mut git = Command::new("git");
        git.add_command(Command::new("commit").alias("ci").about("Record changes"))
            .unwrap();
        let git = Arc::new(git);
        let text = help(&[Arc::clone(&git)]);
        assert!(text.starts_with("Usage: git [options] <command>\n"));
        assert!(text.contains("\nCommands:\n  commit, ci  Record changes\n"));

        let (commit, _) = git.find_command("commit").unwrap();
        let text = usage(&[Arc::clone(&git), Arc::clone(commit)]);
        assert_eq!(text, "Usage: git commit [options]\n");
    }
}
