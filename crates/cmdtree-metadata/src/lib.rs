//! JSON data model for command grammars.
//!
//! A grammar file describes one root [`CommandDef`]. Keys are kebab-case:
//!
//! ```json
//! {
//!   "name": "cp",
//!   "description": "Copy files",
//!   "arguments": ["src", { "name": "dest", "nargs": "?" }],
//!   "options": [{ "name": "--force", "aliases": ["-f"] }]
//! }
//! ```
//!
//! [`CommandDef::build`] turns the model into a [`Command`] tree, surfacing the
//! same structural errors as building the tree in code.

use std::fs;
use std::path::Path;

use anyhow::Context;
use cmdtree_argparse::{
    Action, Arity, ArgumentSpec, Command, CommandMatcher, DefinitionError, Value, ValueType,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("{name}: unknown type '{type_name}'")]
    UnknownType { name: String, type_name: String },

    #[error("{name}: invalid pattern")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct CommandDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Regex matched against tokens instead of the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub blind: bool,
    /// Keep the built-in `-h, --help` flag.
    #[serde(default = "default_true")]
    pub help: bool,
    /// Command group of the parent this command is placed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<ArgumentDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub option_groups: Vec<GroupDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command_groups: Vec<GroupDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandDef>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct GroupDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// A positional argument: a bare name, or a full parameter definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentDef {
    Name(String),
    Full(ParamDef),
}

pub type OptionDef = ParamDef;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ParamDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nargs: Option<Nargs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<TypeDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "const", default, skip_serializing_if = "Option::is_none")]
    pub const_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<HolderDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// `2`, `"?"`, `"*"` or `"+"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Nargs {
    Count(usize),
    Symbol(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeDef {
    /// `string`, `number`, `integer`, `boolean` or `json`.
    Named(String),
    Pattern { pattern: String },
    /// One type per position.
    Tuple(Vec<TypeDef>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HolderDef {
    One(String),
    Many(Vec<String>),
}

impl CommandDef {
    /// Build the command tree this definition describes.
    pub fn build(&self) -> Result<Command, MetadataError> {
        let mut command = Command::new(&self.name).about(&self.description);
        for alias in &self.aliases {
            command = command.alias(alias);
        }
        if let Some(pattern) = &self.pattern {
            let re = Regex::new(pattern).map_err(|source| MetadataError::InvalidPattern {
                name: self.name.clone(),
                source,
            })?;
            command = command.matcher(CommandMatcher::Pattern(re));
        }
        if !self.help {
            command = command.without_help();
        }

        for argument in &self.arguments {
            let spec = match argument {
                ArgumentDef::Name(name) => ArgumentSpec::new(name),
                ArgumentDef::Full(param) => param.to_spec()?,
            };
            command.add_argument(spec)?;
        }
        for group in &self.option_groups {
            command.add_option_group(&group.name, &group.description)?;
        }
        for option in &self.options {
            command.add_option(option.to_spec()?)?;
        }
        for group in &self.command_groups {
            command.add_command_group(&group.name, &group.description)?;
        }
        for sub in &self.commands {
            command.add_command_in(sub.group.as_deref(), sub.build()?)?;
        }
        command.set_blind(self.blind)?;
        Ok(command)
    }
}

impl ParamDef {
    pub fn to_spec(&self) -> Result<ArgumentSpec, MetadataError> {
        let name = &self.name;
        let mut spec = ArgumentSpec::new(name).description(&self.description);
        for alias in &self.aliases {
            spec = spec.alias(alias);
        }
        if let Some(nargs) = &self.nargs {
            spec = spec.arity(nargs.to_arity(name)?);
        }
        if let Some(action) = &self.action {
            let action: Action = action.parse().map_err(|_| DefinitionError::InvalidAction {
                name: name.clone(),
                action: action.clone(),
            })?;
            spec = spec.action(action);
        }
        if let Some(value_type) = &self.value_type {
            spec = spec.value_type(value_type.to_value_type(name)?);
        }
        if let Some(default) = &self.default {
            spec = spec.default_value(default.clone());
        }
        if let Some(value) = &self.const_value {
            spec = spec.const_value(value.clone());
        }
        if let Some(choices) = &self.choices {
            spec = spec.choices(choices.iter().cloned());
        }
        if let Some(required) = self.required {
            spec = spec.required(required);
        }
        match &self.holder {
            Some(HolderDef::One(label)) => spec = spec.holder(label),
            Some(HolderDef::Many(labels)) => {
                for label in labels {
                    spec = spec.holder(label);
                }
            }
            None => {}
        }
        if let Some(group) = &self.group {
            spec = spec.group(group);
        }
        Ok(spec)
    }
}

impl Nargs {
    pub fn to_arity(&self, name: &str) -> Result<Arity, DefinitionError> {
        match self {
            Self::Count(n) => Ok(Arity::exact(*n)),
            Self::Symbol(symbol) => symbol.parse().map_err(|_| DefinitionError::InvalidArity {
                name: name.to_string(),
                arity: symbol.clone(),
            }),
        }
    }
}

impl TypeDef {
    pub fn to_value_type(&self, name: &str) -> Result<ValueType, MetadataError> {
        match self {
            Self::Named(type_name) => match type_name.as_str() {
                "string" => Ok(ValueType::String),
                "number" => Ok(ValueType::Number),
                "integer" => Ok(ValueType::Integer),
                "boolean" => Ok(ValueType::Boolean),
                "json" => Ok(ValueType::Json),
                other => Err(MetadataError::UnknownType {
                    name: name.to_string(),
                    type_name: other.to_string(),
                }),
            },
            Self::Pattern { pattern } => {
                ValueType::pattern(pattern).map_err(|source| MetadataError::InvalidPattern {
                    name: name.to_string(),
                    source,
                })
            }
            Self::Tuple(types) => types
                .iter()
                .map(|t| t.to_value_type(name))
                .collect::<Result<Vec<_>, _>>()
                .map(ValueType::Tuple),
        }
    }
}

/// Read and parse a grammar file.
pub fn load_grammar(path: &Path) -> anyhow::Result<CommandDef> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read grammar: {}", path.display()))?;
    let grammar: CommandDef = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse grammar JSON: {}", path.display()))?;
    Ok(grammar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(value: serde_json::Value) -> CommandDef {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn arguments_accept_bare_names() {
        let grammar = def(json!({
            "name": "cp",
            "arguments": ["src", { "name": "dest", "nargs": "?" }]
        }));
        let cp = grammar.build().unwrap();
        assert_eq!(cp.arguments().len(), 2);
        assert_eq!(cp.arguments()[0].arity(), Arity::Exact(1));
        assert_eq!(cp.arguments()[1].arity(), Arity::Optional);
        assert!(cp.help_option().is_some());
    }

    #[test]
    fn types_parse_in_every_form() {
        let param: ParamDef = serde_json::from_value(json!({
            "name": "point",
            "nargs": 2,
            "type": ["number", { "pattern": "^[a-z]+$" }]
        }))
        .unwrap();
        let spec = param.to_spec().unwrap();
        let mut cmd = Command::new("t");
        cmd.add_argument(spec).unwrap();
        assert!(matches!(
            cmd.arguments()[0].value_type(),
            ValueType::Tuple(types) if matches!(types[..], [ValueType::Number, ValueType::Pattern(_)])
        ));
    }

    #[test]
    fn unknown_types_and_actions_are_rejected() {
        let grammar = def(json!({
            "name": "t",
            "options": [{ "name": "--x", "type": "float" }]
        }));
        assert!(matches!(
            grammar.build().unwrap_err(),
            MetadataError::UnknownType { .. }
        ));

        let grammar = def(json!({
            "name": "t",
            "options": [{ "name": "--x", "action": "toggle" }]
        }));
        assert!(matches!(
            grammar.build().unwrap_err(),
            MetadataError::Definition(DefinitionError::InvalidAction { .. })
        ));

        let grammar = def(json!({
            "name": "t",
            "arguments": [{ "name": "x", "nargs": "many" }]
        }));
        assert!(matches!(
            grammar.build().unwrap_err(),
            MetadataError::Definition(DefinitionError::InvalidArity { .. })
        ));
    }

    #[test]
    fn groups_and_subcommands_are_placed() {
        let grammar = def(json!({
            "name": "git",
            "help": false,
            "option-groups": [{ "name": "Output" }],
            "options": [
                { "name": "--color", "type": "string", "choices": ["auto", "never"], "group": "Output" }
            ],
            "command-groups": [{ "name": "Core", "description": "Everyday commands" }],
            "commands": [
                { "name": "commit", "aliases": ["ci"], "group": "Core" },
                { "name": "exec", "blind": true, "arguments": ["program"] }
            ]
        }));
        let git = grammar.build().unwrap();
        assert!(git.help_option().is_none());
        let output = git.options().iter().next().unwrap();
        assert_eq!(output.name(), Some("Output"));
        assert!(output.has("--color"));

        let core = git.commands().iter().next().unwrap();
        assert_eq!(core.name(), Some("Core"));
        assert!(core.has("ci"));
        let (exec, _) = git.find_command("exec").unwrap();
        assert!(exec.is_blind());
    }

    #[test]
    fn structural_errors_surface() {
        let grammar = def(json!({
            "name": "t",
            "options": [{ "name": "--x" }, { "name": "--y", "aliases": ["--x"] }]
        }));
        assert!(matches!(
            grammar.build().unwrap_err(),
            MetadataError::Definition(DefinitionError::DuplicateAlias { .. })
        ));
    }

    #[test]
    fn round_trips_through_json() {
        let grammar = def(json!({
            "name": "cp",
            "arguments": ["src"],
            "options": [{ "name": "--mode", "nargs": "?", "const": "x", "default": "y" }]
        }));
        let text = serde_json::to_value(&grammar).unwrap();
        assert_eq!(text["arguments"], json!(["src"]));
        assert_eq!(text["options"][0]["nargs"], json!("?"));
        assert_eq!(text["options"][0]["const"], json!("x"));
    }
}
