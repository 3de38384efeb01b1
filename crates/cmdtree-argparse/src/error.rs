use thiserror::Error;

/// A malformed grammar. Raised while the command tree is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("argument name must not be empty")]
    EmptyName,

    #[error("{name}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("{name}: invalid action '{action}'")]
    InvalidAction { name: String, action: String },

    #[error("{name}: invalid arity '{arity}'")]
    InvalidArity { name: String, arity: String },

    #[error("{name}: arity '{arity}' is not compatible with action '{action}'")]
    IncompatibleArity {
        name: String,
        arity: String,
        action: String,
    },

    #[error("{name}: {expected} position(s) declared but {actual} type(s) given")]
    TypeCount {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("{name}: invalid holder: {reason}")]
    InvalidHolder { name: String, reason: String },

    #[error("{name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("{command}: duplicate alias '{alias}'")]
    DuplicateAlias { command: String, alias: String },

    #[error("{command}: required argument '{name}' cannot follow an optional one")]
    RequiredAfterOptional { command: String, name: String },

    #[error("{command}: blind commands cannot declare option '{name}' with arity '{arity}'")]
    BlindVariadicOption {
        command: String,
        name: String,
        arity: String,
    },

    #[error("{command}: unknown group '{group}'")]
    UnknownGroup { command: String, group: String },

    #[error("{command}: duplicate group '{group}'")]
    DuplicateGroup { command: String, group: String },

    #[error("{command}: a custom matcher requires exactly one name")]
    MatcherNames { command: String },

    #[error("failed to load command '{command}': {reason}")]
    LoaderFailed { command: String, reason: String },
}

/// A problem with one parse. These are collected, not raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("{name}: must be provided")]
    MissingRequiredValue { name: String },

    #[error("{name}: expected {expected} value(s), got {actual}")]
    ArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("{name}: invalid value '{value}', must be one of: {choices}")]
    InvalidChoice {
        name: String,
        value: String,
        choices: String,
    },

    #[error("{name}: {message}")]
    Coercion {
        name: String,
        message: String,
        fatal: bool,
    },

    #[error("{name}: {message}")]
    FailedVerification { name: String, message: String },

    #[error("a bare '-' is not a valid argument")]
    BareDash,
}

impl ParseError {
    /// Fatal errors end the parse early.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Coercion { fatal: true, .. })
    }

    /// Name of the argument or option the error is attributed to.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::UnknownOption(name) | Self::UnknownParameter(name) => Some(name),
            Self::MissingRequiredValue { name }
            | Self::ArityMismatch { name, .. }
            | Self::InvalidChoice { name, .. }
            | Self::Coercion { name, .. }
            | Self::FailedVerification { name, .. } => Some(name),
            Self::BareDash => None,
        }
    }
}

/// Accessor-map lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("unknown argument: {0}")]
    Unknown(String),

    #[error("{name}: {message}")]
    Type { name: String, message: String },
}
