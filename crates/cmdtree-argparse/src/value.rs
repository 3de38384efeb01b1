//! Arity, actions and value coercion.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use thiserror::Error;

pub use serde_json::Value;

static NEGATIVE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-\d+\.?\d*$").expect("negative number pattern is valid"));

/// Whether `token` is a negative number literal such as `-5` or `-1.25`.
///
/// Such tokens are never treated as option names.
pub fn is_negative_number(token: &str) -> bool {
    NEGATIVE_NUMBER.is_match(token)
}

/// `dry-run` -> `dryRun`.
pub(crate) fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' {
            upper = !out.is_empty();
            continue;
        }
        if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// How many values an argument consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// A flag; binds its action's scalar.
    Zero,
    /// Exactly `n` values, `n >= 1`.
    Exact(usize),
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Arity {
    /// `Exact(0)` is normalized to [`Arity::Zero`].
    pub fn exact(n: usize) -> Self {
        if n == 0 { Self::Zero } else { Self::Exact(n) }
    }

    pub fn takes_values(self) -> bool {
        !matches!(self, Self::Zero | Self::Exact(0))
    }

    /// Minimum number of values a successful bind needs.
    pub fn min(self) -> usize {
        match self {
            Self::Exact(n) => n,
            Self::OneOrMore => 1,
            Self::Zero | Self::Optional | Self::ZeroOrMore => 0,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => f.write_str("0"),
            Self::Exact(n) => write!(f, "{n}"),
            Self::Optional => f.write_str("?"),
            Self::ZeroOrMore => f.write_str("*"),
            Self::OneOrMore => f.write_str("+"),
        }
    }
}

impl FromStr for Arity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "?" => Ok(Self::Optional),
            "*" => Ok(Self::ZeroOrMore),
            "+" => Ok(Self::OneOrMore),
            other => other
                .parse::<usize>()
                .map(Self::exact)
                .map_err(|_| format!("invalid arity '{other}'")),
        }
    }
}

/// The binding effect of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    Store,
    StoreConst,
    StoreTrue,
    StoreFalse,
    Append,
    Count,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::StoreConst => "store_const",
            Self::StoreTrue => "store_true",
            Self::StoreFalse => "store_false",
            Self::Append => "append",
            Self::Count => "count",
        }
    }

    /// Actions that bind values taken from argv (as opposed to a fixed scalar).
    pub fn takes_values(self) -> bool {
        matches!(self, Self::Store | Self::Append)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "store" => Ok(Self::Store),
            "store_const" => Ok(Self::StoreConst),
            "store_true" => Ok(Self::StoreTrue),
            "store_false" => Ok(Self::StoreFalse),
            "append" => Ok(Self::Append),
            "count" => Ok(Self::Count),
            other => Err(format!("invalid action '{other}'")),
        }
    }
}

/// A failed conversion of one token.
///
/// Fatal failures abort the whole parse; others are recorded and the token is
/// skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CoerceError {
    pub message: String,
    pub fatal: bool,
}

impl CoerceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: true,
        }
    }
}

/// Custom coercion. Receives the token and the index of the slot it fills.
pub type CoerceFn = Arc<dyn Fn(&str, usize) -> Result<Value, CoerceError> + Send + Sync>;

/// Target type of an argument's values.
#[derive(Clone, Default)]
pub enum ValueType {
    #[default]
    String,
    /// Integer when the token is integral, float otherwise.
    Number,
    Integer,
    Boolean,
    /// Token parsed as a JSON document.
    Json,
    /// Token must match; binds the capture list (whole match first).
    Pattern(Regex),
    Custom(CoerceFn),
    /// One type per position of a fixed-arity argument.
    Tuple(Vec<ValueType>),
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("String"),
            Self::Number => f.write_str("Number"),
            Self::Integer => f.write_str("Integer"),
            Self::Boolean => f.write_str("Boolean"),
            Self::Json => f.write_str("Json"),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
            Self::Tuple(types) => f.debug_tuple("Tuple").field(types).finish(),
        }
    }
}

impl ValueType {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, usize) -> Result<Value, CoerceError> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Pattern)
    }

    /// Convert `token`, which fills slot `index` of the argument.
    ///
    /// For [`ValueType::Tuple`] the index selects the element type, so the
    /// caller passes the number of values bound so far.
    pub fn coerce(&self, token: &str, index: usize) -> Result<Value, CoerceError> {
        match self {
            Self::String => Ok(Value::String(token.to_string())),
            Self::Number => parse_number(token),
            Self::Integer => token
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| CoerceError::new(format!("Incorrect value '{token}', must be an integer"))),
            Self::Boolean => match token.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(CoerceError::new(format!(
                    "Incorrect value '{token}', must be a boolean"
                ))),
            },
            Self::Json => serde_json::from_str(token)
                .map_err(|e| CoerceError::new(format!("Incorrect value '{token}', invalid JSON: {e}"))),
            Self::Pattern(re) => match re.captures(token) {
                Some(caps) => Ok(Value::Array(
                    caps.iter()
                        .map(|m| {
                            m.map(|m| Value::String(m.as_str().to_string()))
                                .unwrap_or(Value::Null)
                        })
                        .collect(),
                )),
                None => Err(CoerceError::fatal(format!(
                    "Incorrect value, must match /{}/",
                    re.as_str()
                ))),
            },
            Self::Custom(f) => f(token, index),
            Self::Tuple(types) => match types.get(index) {
                Some(ty) => ty.coerce(token, index),
                None => Err(CoerceError::new(format!(
                    "Unexpected value '{token}' at position {index}"
                ))),
            },
        }
    }

    /// The value reported for an argument that is neither bound nor defaulted.
    pub fn zero(&self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Number | Self::Integer => Value::from(0),
            Self::Boolean => Value::Bool(false),
            Self::Json | Self::Pattern(_) | Self::Custom(_) | Self::Tuple(_) => Value::Null,
        }
    }
}

fn parse_number(token: &str) -> Result<Value, CoerceError> {
    let trimmed = token.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Ok(Value::from(n));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| CoerceError::new(format!("Incorrect value '{token}', must be a number")))
}
