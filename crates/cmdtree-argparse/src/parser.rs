//! The argv state machine.
//!
//! Parsing walks the token list against the active [`Command`], descending
//! into subcommands as they are matched. Every traversed command gets a
//! [`Frame`] holding its bindings, so the tree itself is never mutated. Most
//! problems are collected into [`ParseResult::errors`]; only a fatal coercion
//! ends the walk early.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::argument::Argument;
use crate::command::{Command, Invocation};
use crate::error::{DefinitionError, ParseError};
use crate::maps::{ArgumentsMap, Binding, OptionsMap};
use crate::value::{Action, Arity, Value, is_negative_number};

/// Everything after this token is passed through verbatim.
pub const STOP_MARKER: &str = "--";

/// Split `--name=value` and `-n=value` into two tokens and reject a bare `-`.
///
/// Tokens after [`STOP_MARKER`] are left untouched.
pub fn split_tokens<S: AsRef<str>>(argv: &[S]) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::with_capacity(argv.len());
    let mut iter = argv.iter().map(AsRef::as_ref);
    while let Some(token) = iter.next() {
        if token == STOP_MARKER {
            tokens.push(token.to_string());
            tokens.extend(iter.by_ref().map(str::to_string));
            break;
        }
        if token == "-" {
            return Err(ParseError::BareDash);
        }
        match token.split_once('=') {
            Some((flag, value))
                if looks_like_option(flag) && !flag.trim_start_matches('-').is_empty() =>
            {
                tokens.push(flag.to_string());
                tokens.push(value.to_string());
            }
            _ => tokens.push(token.to_string()),
        }
    }
    Ok(tokens)
}

fn looks_like_option(token: &str) -> bool {
    token.starts_with('-') && !is_negative_number(token)
}

/// The bindings of one traversed command.
#[derive(Debug, Clone)]
pub struct Frame {
    pub command: Arc<Command>,
    /// The alias that selected the command; the root uses its first name.
    pub matched: String,
    /// Indexed like [`Command::arguments`].
    pub arguments: Vec<Binding>,
    /// Indexed like [`Command::options`] elements, group order first.
    pub options: Vec<Binding>,
}

impl Frame {
    fn new(command: Arc<Command>, matched: String) -> Self {
        Self {
            arguments: vec![Binding::default(); command.arguments().len()],
            options: vec![Binding::default(); command.options().len()],
            command,
            matched,
        }
    }

    pub fn arguments_map(&self) -> ArgumentsMap {
        ArgumentsMap::new(Arc::clone(&self.command), self.arguments.clone())
    }

    pub fn options_map(&self) -> OptionsMap {
        OptionsMap::new(Arc::clone(&self.command), self.options.clone())
    }
}

/// A completed parse.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Root first, resolved command last.
    pub frames: Vec<Frame>,
    pub errors: Vec<ParseError>,
    pub rest: Vec<String>,
    /// Alias that selected the resolved command.
    pub matched: String,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The frame of the resolved command.
    pub fn frame(&self) -> &Frame {
        // a parse always records the root frame
        &self.frames[self.frames.len() - 1]
    }

    pub fn root(&self) -> &Frame {
        &self.frames[0]
    }

    /// The frame of the command the resolved one was reached from.
    pub fn parent(&self) -> Option<&Frame> {
        self.frames.len().checked_sub(2).map(|i| &self.frames[i])
    }

    pub fn command(&self) -> &Arc<Command> {
        &self.frame().command
    }

    /// Matched aliases from the root down.
    pub fn commands(&self) -> Vec<&str> {
        self.frames.iter().map(|f| f.matched.as_str()).collect()
    }

    pub fn arguments(&self) -> ArgumentsMap {
        self.frame().arguments_map()
    }

    pub fn options(&self) -> OptionsMap {
        self.frame().options_map()
    }

    pub fn invocation(&self) -> Invocation {
        let frame = self.frame();
        Invocation {
            arguments: frame.arguments_map(),
            options: frame.options_map(),
            command: Arc::clone(&frame.command),
            rest: self.rest.clone(),
            matched: self.matched.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ParseOutcome {
    Parsed(ParseResult),
    /// An option handler ended the run.
    Exit(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    StartCommand,
    NextArgument,
    FetchParams,
    FinishArgument,
    Finish,
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Argument(usize),
    Option(usize),
}

#[derive(Debug)]
struct Claim {
    target: Target,
    values: Vec<Value>,
}

struct Session<'a> {
    tokens: &'a [String],
    cursor: usize,
    frames: Vec<Frame>,
    queue: VecDeque<usize>,
    pool: Vec<usize>,
    claim: Option<Claim>,
    errors: Vec<ParseError>,
    rest: Vec<String>,
    exit: Option<i32>,
}

/// Parse `tokens` against the tree rooted at `root`.
///
/// Tokens are taken as given; run [`split_tokens`] first to split
/// `--name=value` forms. Errors in the input are collected into the result.
/// `Err` is returned only when a lazy subcommand fails to load.
pub async fn parse<S: AsRef<str>>(
    root: &Arc<Command>,
    tokens: &[S],
) -> Result<ParseOutcome, DefinitionError> {
    let tokens: Vec<String> = tokens.iter().map(|t| t.as_ref().to_string()).collect();
    let resolved = root.resolved().await?;
    let mut session = Session::new(&tokens, Frame::new(resolved, root.name().to_string()));

    let mut state = Some(ParserState::StartCommand);
    while let Some(current) = state {
        trace!(state = ?current, cursor = session.cursor, "parser transition");
        state = match current {
            ParserState::StartCommand => session.start_command(),
            ParserState::NextArgument => session.next_argument().await?,
            ParserState::FetchParams => session.fetch_params(),
            ParserState::FinishArgument => session.finish_argument(),
            ParserState::Finish => session.finish(),
            ParserState::Rest => session.pass_through(),
        };
    }
    Ok(session.into_outcome())
}

impl<'a> Session<'a> {
    fn new(tokens: &'a [String], root: Frame) -> Self {
        Self {
            tokens,
            cursor: 0,
            frames: vec![root],
            queue: VecDeque::new(),
            pool: Vec::new(),
            claim: None,
            errors: Vec::new(),
            rest: Vec::new(),
            exit: None,
        }
    }

    fn command(&self) -> Arc<Command> {
        let frame = &self.frames[self.frames.len() - 1];
        Arc::clone(&frame.command)
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn binding_mut(&mut self, target: Target) -> &mut Binding {
        let frame = self.frame_mut();
        match target {
            Target::Argument(i) => &mut frame.arguments[i],
            Target::Option(i) => &mut frame.options[i],
        }
    }

    fn start_command(&mut self) -> Option<ParserState> {
        let command = self.command();
        debug!(
            command = %command.name(),
            arguments = command.arguments().len(),
            options = command.options().len(),
            "start command"
        );
        self.queue = (0..command.arguments().len()).collect();
        self.pool = (0..command.options().len()).collect();
        Some(ParserState::NextArgument)
    }

    async fn next_argument(&mut self) -> Result<Option<ParserState>, DefinitionError> {
        let command = self.command();
        if command.is_blind() && self.queue.is_empty() {
            return Ok(Some(ParserState::Rest));
        }
        let tokens = self.tokens;
        let Some(token) = tokens.get(self.cursor) else {
            return Ok(Some(ParserState::Finish));
        };
        if token == STOP_MARKER {
            self.cursor += 1;
            return Ok(Some(ParserState::Rest));
        }

        if let Some((sub, matched)) = command.find_command(token) {
            let sub = sub.resolved().await?;
            debug!(command = %sub.name(), %matched, "descending into subcommand");
            self.cursor += 1;
            self.frames.push(Frame::new(sub, matched));
            return Ok(Some(ParserState::StartCommand));
        }

        if looks_like_option(token) {
            let found = self.pool_option(&command, token);
            self.cursor += 1;
            return Ok(Some(match found {
                Some(i) => self.claim(&command, Target::Option(i)),
                None => {
                    debug!(%token, "unknown option");
                    self.errors.push(ParseError::UnknownOption(token.clone()));
                    ParserState::NextArgument
                }
            }));
        }

        // the claimed positional takes this token as its first value
        Ok(Some(match self.queue.pop_front() {
            Some(i) => self.claim(&command, Target::Argument(i)),
            None => ParserState::Finish,
        }))
    }

    fn claim(&mut self, command: &Command, target: Target) -> ParserState {
        let Some(arg) = target_of(command, target) else {
            return ParserState::NextArgument;
        };
        trace!(name = %arg.name(), "claimed");
        if let Target::Option(i) = target {
            if !arg.repeatable() {
                self.pool.retain(|&p| p != i);
            }
        }

        let binding = self.binding_mut(target);
        binding.present = true;
        if arg.arity().takes_values() {
            self.claim = Some(Claim {
                target,
                values: Vec::new(),
            });
            return ParserState::FetchParams;
        }

        let scalar = match arg.action() {
            Action::StoreTrue => Value::Bool(true),
            Action::StoreFalse => Value::Bool(false),
            Action::StoreConst => arg.const_value().cloned().unwrap_or(Value::Null),
            Action::Count => {
                let previous = binding.value.as_ref().and_then(Value::as_i64).unwrap_or(0);
                Value::from(previous + 1)
            }
            Action::Store | Action::Append => Value::Null,
        };
        self.claim = Some(Claim {
            target,
            values: vec![scalar],
        });
        ParserState::FinishArgument
    }

    /// Tokens from the cursor that could still become values, up to the next
    /// subcommand or stop marker. Tokens naming a declared option never count.
    fn possible(&self, command: &Command) -> usize {
        self.tokens[self.cursor..]
            .iter()
            .take_while(|t| *t != STOP_MARKER && command.find_command(t).is_none())
            .filter(|t| !command.options().elements().any(|o| o.matches(t)))
            .count()
    }

    fn pool_option(&self, command: &Command, token: &str) -> Option<usize> {
        self.pool.iter().copied().find(|&i| {
            command
                .option_at(i)
                .is_some_and(|option| option.matches(token))
        })
    }

    /// Values still owed to other required positionals and options.
    fn at_least(&self, command: &Command) -> usize {
        let frame = &self.frames[self.frames.len() - 1];
        let positionals: usize = self
            .queue
            .iter()
            .filter_map(|&i| command.arguments().get(i))
            .filter(|a| a.required())
            .map(|a| a.arity().min())
            .sum();
        let options: usize = self
            .pool
            .iter()
            .filter(|&&i| !frame.options[i].present)
            .filter_map(|&i| command.option_at(i))
            .filter(|o| o.required())
            .map(|o| o.arity().min())
            .sum();
        positionals + options
    }

    fn fetch_params(&mut self) -> Option<ParserState> {
        let mut claim = self.claim.take()?;
        let command = self.command();
        let Some(arg) = target_of(&command, claim.target) else {
            return Some(ParserState::NextArgument);
        };

        let tokens = self.tokens;
        loop {
            match arg.arity() {
                Arity::Optional if !claim.values.is_empty() => break,
                Arity::Exact(n) if claim.values.len() >= n => break,
                _ => {}
            }
            let Some(token) = tokens.get(self.cursor) else {
                break;
            };
            if token == STOP_MARKER
                || command.find_command(token).is_some()
                || self.pool_option(&command, token).is_some()
            {
                break;
            }
            let owed = arg.arity().min().saturating_sub(claim.values.len());
            if owed == 0 && self.possible(&command) <= self.at_least(&command) {
                break;
            }

            self.cursor += 1;
            match arg.coerce(token, claim.values.len()) {
                Ok(value) => {
                    if let Err(err) = arg.check_choice(&value) {
                        self.errors.push(err);
                    }
                    claim.values.push(value);
                }
                Err(err) if err.is_fatal() => {
                    debug!(%err, "fatal coercion, aborting parse");
                    self.errors.push(err);
                    return None;
                }
                Err(err) => self.errors.push(err),
            }
        }

        self.claim = Some(claim);
        Some(ParserState::FinishArgument)
    }

    fn finish_argument(&mut self) -> Option<ParserState> {
        let claim = self.claim.take()?;
        let command = self.command();
        let Some(arg) = target_of(&command, claim.target) else {
            return Some(ParserState::NextArgument);
        };

        let mut values = claim.values;
        let value = match arg.arity() {
            Arity::Zero => values.pop(),
            Arity::Exact(n) if values.len() != n => {
                self.errors.push(ParseError::ArityMismatch {
                    name: arg.name().to_string(),
                    expected: n,
                    actual: values.len(),
                });
                None
            }
            Arity::Exact(1) => values.pop(),
            Arity::Exact(_) | Arity::ZeroOrMore => Some(Value::Array(values)),
            Arity::OneOrMore if values.is_empty() => {
                self.errors.push(ParseError::MissingRequiredValue {
                    name: arg.name().to_string(),
                });
                None
            }
            Arity::OneOrMore => Some(Value::Array(values)),
            Arity::Optional => values.pop().or_else(|| arg.default_value()),
        };

        let binding = self.binding_mut(claim.target);
        if arg.action() == Action::Append {
            if let Some(value) = value {
                let mut list = match binding.value.take() {
                    Some(Value::Array(list)) => list,
                    _ => Vec::new(),
                };
                list.push(value);
                binding.value = Some(Value::Array(list));
            }
        } else if value.is_some() {
            binding.value = value;
        }
        trace!(name = %arg.name(), value = ?binding.value, "bound");

        if let Some(handler) = arg.handler() {
            let bound = binding.value.clone().unwrap_or(Value::Null);
            if let Some(code) = handler(&bound, &command) {
                debug!(name = %arg.name(), code, "option handler requested exit");
                self.exit = Some(code);
                return None;
            }
        }
        Some(ParserState::NextArgument)
    }

    fn pass_through(&mut self) -> Option<ParserState> {
        let remaining = &self.tokens[self.cursor..];
        trace!(count = remaining.len(), "passing tokens through");
        self.rest.extend(remaining.iter().cloned());
        self.cursor = self.tokens.len();
        Some(ParserState::Finish)
    }

    fn finish(&mut self) -> Option<ParserState> {
        for frame in &mut self.frames {
            let command = Arc::clone(&frame.command);
            for (arg, binding) in command.arguments().iter().zip(frame.arguments.iter_mut()) {
                if binding.present {
                    continue;
                }
                let variadic = matches!(arg.arity(), Arity::Optional | Arity::ZeroOrMore);
                if !variadic && arg.required() {
                    self.errors.push(ParseError::MissingRequiredValue {
                        name: arg.name().to_string(),
                    });
                } else {
                    binding.value = arg.default_value();
                }
            }
            for (option, binding) in command.options().elements().zip(frame.options.iter_mut()) {
                if binding.present {
                    continue;
                }
                if option.required() {
                    self.errors.push(ParseError::MissingRequiredValue {
                        name: option.name().to_string(),
                    });
                } else {
                    binding.value = option.default_value();
                }
            }
        }

        for frame in &self.frames {
            let arguments = frame.arguments_map();
            let options = frame.options_map();
            let present = frame
                .command
                .arguments()
                .iter()
                .zip(&frame.arguments)
                .chain(frame.command.options().elements().zip(&frame.options))
                .filter(|(entry, binding)| binding.present && entry.has_verifier());
            for (entry, _) in present {
                if let Err(err) = entry.verify(&arguments, &options) {
                    self.errors.push(err);
                }
            }
        }

        if let Some(token) = self.tokens.get(self.cursor) {
            self.errors.push(ParseError::UnknownParameter(token.clone()));
        }
        None
    }

    fn into_outcome(self) -> ParseOutcome {
        if let Some(code) = self.exit {
            return ParseOutcome::Exit(code);
        }
        let matched = self
            .frames
            .last()
            .map(|f| f.matched.clone())
            .unwrap_or_default();
        ParseOutcome::Parsed(ParseResult {
            frames: self.frames,
            errors: self.errors,
            rest: self.rest,
            matched,
        })
    }
}

fn target_of(command: &Command, target: Target) -> Option<&Argument> {
    match target {
        Target::Argument(i) => command.arguments().get(i),
        Target::Option(i) => command.option_at(i),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::ArgumentSpec;
    use crate::value::ValueType;
    use serde_json::json;

    async fn parse_ok(cmd: &Arc<Command>, argv: &[&str]) -> ParseResult {
        match parse(cmd, argv).await.unwrap() {
            ParseOutcome::Parsed(result) => result,
            other => panic!("expected a parse result, got: {other:?}"),
        }
    }

    #[test]
    fn split_tokens_separates_inline_values() {
        let tokens = split_tokens(&["--out=a.txt", "-n=3", "x=y", "--", "--keep=this"]).unwrap();
        assert_eq!(tokens, vec!["--out", "a.txt", "-n", "3", "x=y", "--", "--keep=this"]);
        assert_eq!(split_tokens(&["-5=x"]).unwrap(), vec!["-5=x"]);
        assert_eq!(split_tokens(&["-"]).unwrap_err(), ParseError::BareDash);
        assert_eq!(split_tokens(&["--", "-"]).unwrap(), vec!["--", "-"]);
    }

    #[tokio::test]
    async fn frames_follow_the_command_path() {
        let mut remote = Command::new("remote");
        remote.add_command(Command::new("add")).unwrap();
        let mut git = Command::new("git");
        git.add_command(remote).unwrap();
        let git = Arc::new(git);

        let result = parse_ok(&git, &["remote", "add"]).await;
        assert_eq!(result.commands(), vec!["git", "remote", "add"]);
        assert_eq!(result.command().name(), "add");
        assert_eq!(result.parent().unwrap().command.name(), "remote");
        assert_eq!(result.root().command.name(), "git");
        assert_eq!(result.matched, "add");
    }

    #[tokio::test]
    async fn count_increments_per_occurrence() {
        let mut cmd = Command::new("tool");
        cmd.add_option(ArgumentSpec::new("-v").action(Action::Count)).unwrap();
        let cmd = Arc::new(cmd);

        let result = parse_ok(&cmd, &["-v", "-v", "-v"]).await;
        assert!(result.is_ok(), "{:?}", result.errors);
        assert_eq!(result.options().get("v").unwrap(), json!(3));

        let result = parse_ok(&cmd, &[]).await;
        assert_eq!(result.options().get("v").unwrap(), json!(0));
    }

    #[tokio::test]
    async fn repeated_store_option_is_unknown_the_second_time() {
        let mut cmd = Command::new("tool");
        cmd.add_option(ArgumentSpec::new("--x").value_type(ValueType::String)).unwrap();
        let cmd = Arc::new(cmd);

        let result = parse_ok(&cmd, &["--x", "1", "--x", "2"]).await;
        assert_eq!(result.options().get("x").unwrap(), json!("1"));
        assert_eq!(
            result.errors,
            vec![
                ParseError::UnknownOption("--x".into()),
                ParseError::UnknownParameter("2".into())
            ]
        );
    }

    #[tokio::test]
    async fn arity_shortfall_is_reported() {
        let mut cmd = Command::new("tool");
        cmd.add_option(ArgumentSpec::new("--point").arity(Arity::Exact(2))).unwrap();
        let cmd = Arc::new(cmd);

        let result = parse_ok(&cmd, &["--point", "1"]).await;
        assert_eq!(
            result.errors,
            vec![ParseError::ArityMismatch {
                name: "--point".into(),
                expected: 2,
                actual: 1
            }]
        );
    }

    #[tokio::test]
    async fn non_fatal_coercion_skips_the_token() {
        let mut cmd = Command::new("tool");
        cmd.add_argument(
            ArgumentSpec::new("n")
                .arity(Arity::OneOrMore)
                .value_type(ValueType::Number),
        )
        .unwrap();
        let cmd = Arc::new(cmd);

        let result = parse_ok(&cmd, &["1", "two", "3"]).await;
        assert_eq!(result.arguments().get("n").unwrap(), json!([1, 3]));
        assert_eq!(result.errors.len(), 1);
        assert!(!result.errors[0].is_fatal());
    }
}
