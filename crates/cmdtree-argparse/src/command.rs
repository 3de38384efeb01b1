//! Command tree nodes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use regex::Regex;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::argument::{Argument, ArgumentSpec, HELP_NAMES};
use crate::error::DefinitionError;
use crate::group::{Aliased, Group, Groups};
use crate::maps::{ArgumentsMap, OptionsMap};
use crate::value::Arity;

/// Runs a resolved command. `Some(code)` is the process exit code.
pub type CommandHandler =
    Arc<dyn Fn(Invocation) -> BoxFuture<'static, anyhow::Result<Option<i32>>> + Send + Sync>;

/// Produces the populated subtree of a lazily declared command.
pub type CommandLoader = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Command>> + Send + Sync>;

/// Custom token matching for a command with a single declared name.
#[derive(Clone)]
pub enum CommandMatcher {
    Pattern(Regex),
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl CommandMatcher {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    fn is_match(&self, token: &str) -> bool {
        match self {
            Self::Pattern(re) => re.is_match(token),
            Self::Predicate(f) => f(token),
        }
    }
}

impl fmt::Debug for CommandMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Everything a command handler receives.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub arguments: ArgumentsMap,
    pub options: OptionsMap,
    pub command: Arc<Command>,
    /// Tokens after `--`, or everything past the positionals of a blind command.
    pub rest: Vec<String>,
    /// The alias (or token, for custom matchers) that selected the command.
    pub matched: String,
}

/// A node of the grammar.
pub struct Command {
    names: Vec<String>,
    matcher: Option<CommandMatcher>,
    description: String,
    arguments: Vec<Argument>,
    options: Groups<Argument>,
    commands: Groups<Arc<Command>>,
    handler: Option<CommandHandler>,
    loader: Option<CommandLoader>,
    loaded: OnceCell<Arc<Command>>,
    blind: bool,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("names", &self.names)
            .field("matcher", &self.matcher)
            .field("arguments", &self.arguments)
            .field("options", &self.options)
            .field("commands", &self.commands)
            .field("blind", &self.blind)
            .field("lazy", &self.loader.is_some())
            .finish_non_exhaustive()
    }
}

impl Command {
    /// A command with the built-in `-h, --help` flag.
    pub fn new(name: impl Into<String>) -> Self {
        let mut options = Groups::default();
        if let Some(unnamed) = options.group_mut(None) {
            unnamed.add(Argument::help_flag());
        }
        Self {
            names: vec![name.into()],
            matcher: None,
            description: String::new(),
            arguments: Vec::new(),
            options,
            commands: Groups::default(),
            handler: None,
            loader: None,
            loaded: OnceCell::new(),
            blind: false,
        }
    }

    /// Drop the built-in help flag.
    pub fn without_help(mut self) -> Self {
        self.options.retain(|o| !o.is_help());
        self
    }

    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn about(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn matcher(mut self, matcher: CommandMatcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<i32>>> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |invocation| f(invocation).boxed()));
        self
    }

    /// Defer building the subtree until the command is first traversed.
    pub fn loader<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Command>> + Send + 'static,
    {
        self.loader = Some(Arc::new(move || f().boxed()));
        self
    }

    pub fn name(&self) -> &str {
        &self.names[0]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn options(&self) -> &Groups<Argument> {
        &self.options
    }

    pub fn commands(&self) -> &Groups<Arc<Command>> {
        &self.commands
    }

    pub fn is_blind(&self) -> bool {
        self.blind
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    pub fn is_lazy(&self) -> bool {
        self.loader.is_some()
    }

    pub fn help_option(&self) -> Option<&Argument> {
        self.options.elements().find(|o| o.is_help())
    }

    pub(crate) fn option_at(&self, index: usize) -> Option<&Argument> {
        self.options.elements().nth(index)
    }

    pub fn add_argument(&mut self, spec: ArgumentSpec) -> Result<(), DefinitionError> {
        let argument = Argument::positional(spec)?;
        if self.arguments.iter().any(|a| a.name() == argument.name()) {
            return Err(DefinitionError::DuplicateAlias {
                command: self.name().to_string(),
                alias: argument.name().to_string(),
            });
        }
        if argument.required() && self.arguments.iter().any(|a| !a.required()) {
            return Err(DefinitionError::RequiredAfterOptional {
                command: self.name().to_string(),
                name: argument.name().to_string(),
            });
        }
        self.arguments.push(argument);
        Ok(())
    }

    /// Add an option to its declared group, or to the unnamed one.
    ///
    /// Declaring `-h` or `--help` replaces the built-in help flag.
    pub fn add_option(&mut self, spec: ArgumentSpec) -> Result<(), DefinitionError> {
        let group = spec.group_name().map(str::to_string);
        if let Some(group) = &group {
            if !self.options.contains_group(group) {
                return Err(DefinitionError::UnknownGroup {
                    command: self.name().to_string(),
                    group: group.clone(),
                });
            }
        }
        let option = Argument::optional(spec)?;
        self.check_blind(&option)?;

        let replaces_help = option
            .names()
            .iter()
            .any(|n| HELP_NAMES.contains(&n.as_str()));
        let collision = option.names().iter().find(|n| {
            self.options
                .elements()
                .any(|o| o.matches(n) && !(replaces_help && o.is_help()))
        });
        if let Some(alias) = collision {
            return Err(DefinitionError::DuplicateAlias {
                command: self.name().to_string(),
                alias: alias.clone(),
            });
        }
        if replaces_help {
            self.options.retain(|o| !o.is_help());
        }

        let command = self.name().to_string();
        let target = self
            .options
            .group_mut(group.as_deref())
            .ok_or_else(|| DefinitionError::UnknownGroup {
                command,
                group: group.clone().unwrap_or_default(),
            })?;
        target.add(option);
        Ok(())
    }

    pub fn add_option_group(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<(), DefinitionError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        if self.options.contains_group(&name) {
            return Err(DefinitionError::DuplicateGroup {
                command: self.name().to_string(),
                group: name,
            });
        }
        self.options.push_group(Group::new(Some(name), description));
        Ok(())
    }

    pub fn add_command_group(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<(), DefinitionError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        if self.commands.contains_group(&name) {
            return Err(DefinitionError::DuplicateGroup {
                command: self.name().to_string(),
                group: name,
            });
        }
        self.commands.push_group(Group::new(Some(name), description));
        Ok(())
    }

    pub fn add_command(&mut self, command: Command) -> Result<(), DefinitionError> {
        self.add_command_in(None, command)
    }

    /// Add a subcommand to a named command group (`None` for the unnamed one).
    pub fn add_command_in(
        &mut self,
        group: Option<&str>,
        command: Command,
    ) -> Result<(), DefinitionError> {
        if command.names.iter().any(|n| n.trim().is_empty()) {
            return Err(DefinitionError::EmptyName);
        }
        if command.matcher.is_some() && command.names.len() != 1 {
            return Err(DefinitionError::MatcherNames {
                command: command.name().to_string(),
            });
        }
        if let Some(alias) = command
            .names
            .iter()
            .find(|n| self.commands.elements().any(|c| c.names.contains(*n)))
        {
            return Err(DefinitionError::DuplicateAlias {
                command: self.name().to_string(),
                alias: alias.clone(),
            });
        }
        let parent = self.name().to_string();
        let target =
            self.commands
                .group_mut(group)
                .ok_or_else(|| DefinitionError::UnknownGroup {
                    command: parent,
                    group: group.unwrap_or_default().to_string(),
                })?;
        target.add(Arc::new(command));
        Ok(())
    }

    /// Pass every token after the positionals through to `rest`.
    pub fn set_blind(&mut self, blind: bool) -> Result<(), DefinitionError> {
        if blind {
            for option in self.options.elements() {
                self.blind_conflict(option)?;
            }
        }
        self.blind = blind;
        Ok(())
    }

    fn check_blind(&self, option: &Argument) -> Result<(), DefinitionError> {
        if self.blind {
            self.blind_conflict(option)?;
        }
        Ok(())
    }

    fn blind_conflict(&self, option: &Argument) -> Result<(), DefinitionError> {
        if matches!(option.arity(), Arity::Optional | Arity::ZeroOrMore) {
            return Err(DefinitionError::BlindVariadicOption {
                command: self.name().to_string(),
                name: option.name().to_string(),
                arity: option.arity().to_string(),
            });
        }
        Ok(())
    }

    /// The alias `token` selects this command by, if any.
    pub fn match_alias(&self, token: &str) -> Option<String> {
        match &self.matcher {
            Some(matcher) => matcher.is_match(token).then(|| token.to_string()),
            None => self.names.iter().find(|n| *n == token).cloned(),
        }
    }

    /// First subcommand selected by `token`, with the matched alias.
    pub fn find_command(&self, token: &str) -> Option<(&Arc<Command>, String)> {
        self.commands
            .elements()
            .find_map(|c| c.match_alias(token).map(|matched| (c, matched)))
    }

    /// This node, or the subtree its loader produces. Loaded once.
    pub async fn resolved(self: &Arc<Self>) -> Result<Arc<Command>, DefinitionError> {
        let Some(loader) = &self.loader else {
            return Ok(Arc::clone(self));
        };
        let loaded = self
            .loaded
            .get_or_try_init(|| async {
                debug!(command = %self.name(), "loading lazy command");
                loader().await.map(Arc::new)
            })
            .await
            .map_err(|err| DefinitionError::LoaderFailed {
                command: self.name().to_string(),
                reason: format!("{err:#}"),
            })?;
        Ok(Arc::clone(loaded))
    }

    /// Run the handler. Commands without one report no exit code.
    pub async fn execute(&self, invocation: Invocation) -> anyhow::Result<Option<i32>> {
        match &self.handler {
            Some(handler) => {
                debug!(command = %self.name(), matched = %invocation.matched, "executing command");
                handler(invocation).await
            }
            None => Ok(None),
        }
    }
}

impl Aliased for Command {
    fn aliases(&self) -> &[String] {
        &self.names
    }

    fn matches(&self, token: &str) -> bool {
        self.match_alias(token).is_some()
    }
}
