//! Declarative command grammars and an argv parser for them.
//!
//! A grammar is a tree of [`Command`]s. Each command declares positional
//! [`Argument`]s, grouped options and grouped subcommands. The tree is built
//! once and is immutable afterwards, so it can be shared and parsed
//! concurrently; everything a single parse binds lives in its [`ParseResult`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cmdtree_argparse::{ArgumentSpec, Command, ParseOutcome, parse};
//!
//! let mut cp = Command::new("cp");
//! cp.add_argument(ArgumentSpec::new("src"))?;
//! cp.add_argument(ArgumentSpec::new("dest"))?;
//! cp.add_option(ArgumentSpec::new("--force").alias("-f"))?;
//! let cp = Arc::new(cp);
//!
//! let ParseOutcome::Parsed(result) = parse(&cp, &["a.txt", "b.txt", "--force"]).await? else {
//!     unreachable!("no option handlers declared");
//! };
//! assert_eq!(result.arguments().get("src")?, "a.txt");
//! assert_eq!(result.options().get("force")?, true);
//! ```

pub mod argument;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod group;
pub mod help;
pub mod maps;
pub mod parser;
pub mod value;

pub use argument::{Argument, ArgumentKind, ArgumentSpec, OptionHandler, Verifier};
pub use command::{Command, CommandHandler, CommandLoader, CommandMatcher, Invocation};
pub use dispatch::{Outcome, dispatch, run};
pub use error::{DefinitionError, LookupError, ParseError};
pub use group::{Aliased, Group, Groups};
pub use maps::{ArgumentsMap, Binding, OptionsMap};
pub use parser::{Frame, ParseOutcome, ParseResult, STOP_MARKER, parse, split_tokens};
pub use value::{Action, Arity, CoerceError, Value, ValueType};
