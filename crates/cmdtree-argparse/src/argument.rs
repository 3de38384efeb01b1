//! Positional arguments and options.

use std::fmt;
use std::sync::Arc;

use crate::command::Command;
use crate::error::{DefinitionError, ParseError};
use crate::group::Aliased;
use crate::maps::{ArgumentsMap, OptionsMap};
use crate::value::{Action, Arity, Value, ValueType, camel_case, is_negative_number};

pub(crate) const HELP_NAMES: [&str; 2] = ["--help", "-h"];

/// Called once an option has been bound. `Some(code)` ends the run with that
/// exit code.
pub type OptionHandler = Arc<dyn Fn(&Value, &Command) -> Option<i32> + Send + Sync>;

/// Post-parse check of a present argument. `Err(message)` is reported as a
/// failed verification.
pub type Verifier = Arc<dyn Fn(&ArgumentsMap, &OptionsMap) -> Result<(), String> + Send + Sync>;

/// Raw, unvalidated description of an argument or option.
///
/// Turned into an [`Argument`] by [`Argument::positional`] or
/// [`Argument::optional`], which fill in defaults and reject malformed specs.
#[derive(Clone, Default)]
pub struct ArgumentSpec {
    names: Vec<String>,
    arity: Option<Arity>,
    action: Option<Action>,
    value_type: Option<ValueType>,
    default: Option<Value>,
    const_value: Option<Value>,
    choices: Option<Vec<Value>>,
    required: Option<bool>,
    verifier: Option<Verifier>,
    handler: Option<OptionHandler>,
    description: String,
    holder: Vec<String>,
    group: Option<String>,
}

impl ArgumentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            ..Default::default()
        }
    }

    /// Add another name (options only).
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn arity(mut self, arity: Arity) -> Self {
        self.arity = Some(arity);
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn const_value(mut self, value: impl Into<Value>) -> Self {
        self.const_value = Some(value.into());
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn verifier<F>(mut self, f: F) -> Self
    where
        F: Fn(&ArgumentsMap, &OptionsMap) -> Result<(), String> + Send + Sync + 'static,
    {
        self.verifier = Some(Arc::new(f));
        self
    }

    /// Immediate handler (options only).
    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Command) -> Option<i32> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Usage label. Give one label, or one per position for fixed arity.
    pub fn holder(mut self, label: impl Into<String>) -> Self {
        self.holder.push(label.into());
        self
    }

    /// Option group to place the option in (options only).
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub(crate) fn group_name(&self) -> Option<&str> {
        self.group.as_deref()
    }
}

/// Positional or option.
#[derive(Clone)]
pub enum ArgumentKind {
    Positional,
    Optional {
        group: Option<String>,
        handler: Option<OptionHandler>,
    },
}

/// A validated argument or option.
#[derive(Clone)]
pub struct Argument {
    kind: ArgumentKind,
    names: Vec<String>,
    arity: Arity,
    action: Action,
    value_type: ValueType,
    default: Option<Value>,
    const_value: Option<Value>,
    choices: Option<Vec<Value>>,
    required: bool,
    verifier: Option<Verifier>,
    description: String,
    holder: Vec<String>,
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argument")
            .field("names", &self.names)
            .field("positional", &self.is_positional())
            .field("arity", &self.arity)
            .field("action", &self.action)
            .field("value_type", &self.value_type)
            .field("default", &self.default)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

impl Argument {
    pub fn positional(spec: ArgumentSpec) -> Result<Self, DefinitionError> {
        Self::normalize(spec, true)
    }

    pub fn optional(spec: ArgumentSpec) -> Result<Self, DefinitionError> {
        Self::normalize(spec, false)
    }

    pub(crate) fn help_flag() -> Self {
        Self {
            kind: ArgumentKind::Optional {
                group: None,
                handler: None,
            },
            names: HELP_NAMES.iter().map(|s| s.to_string()).collect(),
            arity: Arity::Zero,
            action: Action::StoreTrue,
            value_type: ValueType::Boolean,
            default: None,
            const_value: None,
            choices: None,
            required: false,
            verifier: None,
            description: "Show this message".to_string(),
            holder: Vec::new(),
        }
    }

    fn normalize(spec: ArgumentSpec, positional: bool) -> Result<Self, DefinitionError> {
        let names: Vec<String> = spec.names.iter().map(|n| n.trim().to_string()).collect();
        if names.is_empty() || names.iter().any(|n| n.is_empty()) {
            return Err(DefinitionError::EmptyName);
        }
        let name = names[0].clone();

        let (kind, action, arity) = if positional {
            if names.len() != 1 {
                return Err(invalid(&name, "positional arguments take exactly one name"));
            }
            if name.starts_with('-') {
                return Err(DefinitionError::InvalidName {
                    name,
                    reason: "positional names must not start with '-'",
                });
            }
            if spec.handler.is_some() {
                return Err(invalid(&name, "only options accept a handler"));
            }
            if spec.group.is_some() {
                return Err(invalid(&name, "only options belong to groups"));
            }
            let action = spec.action.unwrap_or_default();
            if action != Action::Store {
                return Err(DefinitionError::InvalidAction {
                    name,
                    action: action.to_string(),
                });
            }
            (ArgumentKind::Positional, action, spec.arity.unwrap_or(Arity::Exact(1)))
        } else {
            for n in &names {
                check_option_name(n)?;
            }
            let action = spec.action.unwrap_or(
                if spec.arity.is_some_and(Arity::takes_values) || spec.value_type.is_some() {
                    Action::Store
                } else {
                    Action::StoreTrue
                },
            );
            let arity = spec.arity.unwrap_or(if action.takes_values() {
                Arity::Exact(1)
            } else {
                Arity::Zero
            });
            let kind = ArgumentKind::Optional {
                group: spec.group.clone(),
                handler: spec.handler.clone(),
            };
            (kind, action, arity)
        };
        let arity = match arity {
            Arity::Exact(0) => Arity::Zero,
            other => other,
        };

        if action.takes_values() != arity.takes_values() {
            return Err(DefinitionError::IncompatibleArity {
                name,
                arity: arity.to_string(),
                action: action.to_string(),
            });
        }
        if action == Action::StoreConst && spec.const_value.is_none() {
            return Err(invalid(&name, "store_const requires a const value"));
        }

        let value_type = spec.value_type.unwrap_or_default();
        if let ValueType::Tuple(types) = &value_type {
            if arity != Arity::Exact(types.len()) {
                return Err(DefinitionError::TypeCount {
                    name,
                    expected: arity.to_string(),
                    actual: types.len(),
                });
            }
        }

        let holder: Vec<String> = spec.holder.iter().map(|h| h.trim().to_string()).collect();
        if holder.iter().any(|h| h.is_empty() || h.contains(char::is_whitespace)) {
            return Err(DefinitionError::InvalidHolder {
                name,
                reason: "labels must be non-empty words".to_string(),
            });
        }
        if holder.len() > 1 && arity != Arity::Exact(holder.len()) {
            return Err(DefinitionError::InvalidHolder {
                name,
                reason: format!("{} labels given for arity '{arity}'", holder.len()),
            });
        }

        if let Some(choices) = &spec.choices {
            if choices.is_empty() {
                return Err(invalid(&name, "choices must not be empty"));
            }
            for candidate in [&spec.default, &spec.const_value].into_iter().flatten() {
                if !candidate.is_array() && !choices.contains(candidate) {
                    return Err(invalid(
                        &name,
                        &format!("{candidate} is not one of the declared choices"),
                    ));
                }
            }
        }

        let required = match spec.required {
            Some(required) => required,
            None if positional => {
                matches!(arity, Arity::Exact(_) | Arity::OneOrMore) && spec.choices.is_none()
            }
            None => false,
        };

        Ok(Self {
            kind,
            names,
            arity,
            action,
            value_type,
            default: spec.default,
            const_value: spec.const_value,
            choices: spec.choices,
            required,
            verifier: spec.verifier,
            description: spec.description,
            holder,
        })
    }

    /// First declared name.
    pub fn name(&self) -> &str {
        &self.names[0]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn kind(&self) -> &ArgumentKind {
        &self.kind
    }

    pub fn is_positional(&self) -> bool {
        matches!(self.kind, ArgumentKind::Positional)
    }

    pub fn is_help(&self) -> bool {
        !self.is_positional() && self.names.iter().any(|n| n == HELP_NAMES[0])
    }

    pub fn group(&self) -> Option<&str> {
        match &self.kind {
            ArgumentKind::Optional { group, .. } => group.as_deref(),
            ArgumentKind::Positional => None,
        }
    }

    pub(crate) fn handler(&self) -> Option<&OptionHandler> {
        match &self.kind {
            ArgumentKind::Optional { handler, .. } => handler.as_ref(),
            ArgumentKind::Positional => None,
        }
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn const_value(&self) -> Option<&Value> {
        self.const_value.as_ref()
    }

    pub fn choices(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn has_verifier(&self) -> bool {
        self.verifier.is_some()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Usage labels; falls back to the dash-stripped name.
    pub fn holder(&self) -> Vec<String> {
        if self.holder.is_empty() {
            vec![self.name().trim_start_matches('-').to_string()]
        } else {
            self.holder.clone()
        }
    }

    /// The explicit default, or the one derived from action and arity.
    pub fn default_value(&self) -> Option<Value> {
        if let Some(default) = &self.default {
            return Some(default.clone());
        }
        match self.action {
            Action::StoreTrue => Some(Value::Bool(false)),
            Action::StoreFalse => Some(Value::Bool(true)),
            Action::Count => Some(Value::from(0)),
            _ if self.arity == Arity::ZeroOrMore => Some(Value::Array(Vec::new())),
            _ => None,
        }
    }

    /// Whether the option stays matchable after it has been bound.
    pub fn repeatable(&self) -> bool {
        matches!(self.action, Action::Append | Action::Count)
    }

    /// Convert the token filling slot `index`.
    pub fn coerce(&self, token: &str, index: usize) -> Result<Value, ParseError> {
        self.value_type
            .coerce(token, index)
            .map_err(|e| ParseError::Coercion {
                name: self.name().to_string(),
                message: e.message,
                fatal: e.fatal,
            })
    }

    pub fn check_choice(&self, value: &Value) -> Result<(), ParseError> {
        let Some(choices) = &self.choices else {
            return Ok(());
        };
        if choices.contains(value) {
            return Ok(());
        }
        Err(ParseError::InvalidChoice {
            name: self.name().to_string(),
            value: display_value(value),
            choices: choices.iter().map(display_value).collect::<Vec<_>>().join(", "),
        })
    }

    pub fn verify(&self, args: &ArgumentsMap, opts: &OptionsMap) -> Result<(), ParseError> {
        let Some(verifier) = &self.verifier else {
            return Ok(());
        };
        verifier(args, opts).map_err(|message| ParseError::FailedVerification {
            name: self.name().to_string(),
            message: if message.trim().is_empty() {
                "verification failed".to_string()
            } else {
                message
            },
        })
    }

    /// Exact alias equality.
    pub fn matches(&self, token: &str) -> bool {
        self.names.iter().any(|n| n == token)
    }

    /// Also accepts dash-stripped and camelCased forms of every name.
    pub fn matches_loose(&self, key: &str) -> bool {
        self.alias_forms().iter().any(|a| a == key)
    }

    /// Every form an accessor map indexes this argument under.
    pub fn alias_forms(&self) -> Vec<String> {
        let mut forms = Vec::with_capacity(self.names.len() * 3);
        for name in &self.names {
            let stripped = name.trim_start_matches('-');
            for form in [name.clone(), stripped.to_string(), camel_case(stripped)] {
                if !forms.contains(&form) {
                    forms.push(form);
                }
            }
        }
        forms
    }
}

impl Aliased for Argument {
    fn aliases(&self) -> &[String] {
        &self.names
    }

    fn matches(&self, token: &str) -> bool {
        Argument::matches(self, token)
    }
}

pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn invalid(name: &str, reason: &str) -> DefinitionError {
    DefinitionError::InvalidArgument {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn check_option_name(name: &str) -> Result<(), DefinitionError> {
    let reason = if !name.starts_with('-') {
        "option names must start with '-'"
    } else if name.trim_start_matches('-').is_empty() {
        "option names need at least one character after the dashes"
    } else if name.contains(char::is_whitespace) {
        "option names must not contain whitespace"
    } else if name.contains('=') {
        "option names must not contain '='"
    } else if is_negative_number(name) {
        "option names must not look like negative numbers"
    } else {
        return Ok(());
    };
    Err(DefinitionError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_option_is_a_flag() {
        let arg = Argument::optional(ArgumentSpec::new("--verbose")).unwrap();
        assert_eq!(arg.action(), Action::StoreTrue);
        assert_eq!(arg.arity(), Arity::Zero);
        assert_eq!(arg.default_value(), Some(json!(false)));
    }

    #[test]
    fn typed_option_takes_one_value() {
        let arg = Argument::optional(ArgumentSpec::new("--x").value_type(ValueType::Number)).unwrap();
        assert_eq!(arg.action(), Action::Store);
        assert_eq!(arg.arity(), Arity::Exact(1));
    }

    #[test]
    fn positional_required_follows_arity() {
        let one = Argument::positional(ArgumentSpec::new("x")).unwrap();
        let maybe = Argument::positional(ArgumentSpec::new("y").arity(Arity::Optional)).unwrap();
        let many = Argument::positional(ArgumentSpec::new("z").arity(Arity::ZeroOrMore)).unwrap();
        assert!(one.required());
        assert!(!maybe.required());
        assert!(!many.required());
        assert_eq!(many.default_value(), Some(json!([])));
        assert_eq!(maybe.default_value(), None);
    }

    #[test]
    fn rejects_flag_actions_with_values() {
        let err = Argument::optional(
            ArgumentSpec::new("--x")
                .action(Action::StoreTrue)
                .arity(Arity::Exact(1)),
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::IncompatibleArity { .. }));

        let err = Argument::optional(ArgumentSpec::new("--x").action(Action::Store).arity(Arity::Zero))
            .unwrap_err();
        assert!(matches!(err, DefinitionError::IncompatibleArity { .. }));
    }

    #[test]
    fn rejects_malformed_names() {
        assert_eq!(
            Argument::positional(ArgumentSpec::new("  ")).unwrap_err(),
            DefinitionError::EmptyName
        );
        assert!(matches!(
            Argument::positional(ArgumentSpec::new("-x")).unwrap_err(),
            DefinitionError::InvalidName { .. }
        ));
        assert!(matches!(
            Argument::optional(ArgumentSpec::new("x")).unwrap_err(),
            DefinitionError::InvalidName { .. }
        ));
        assert!(matches!(
            Argument::optional(ArgumentSpec::new("--a b")).unwrap_err(),
            DefinitionError::InvalidName { .. }
        ));
        assert!(matches!(
            Argument::optional(ArgumentSpec::new("-1")).unwrap_err(),
            DefinitionError::InvalidName { .. }
        ));
    }

    #[test]
    fn tuple_types_must_cover_every_position() {
        let err = Argument::positional(
            ArgumentSpec::new("x")
                .arity(Arity::Exact(3))
                .value_type(ValueType::Tuple(vec![ValueType::Number, ValueType::String])),
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::TypeCount { actual: 2, .. }));
    }

    #[test]
    fn holder_cardinality_is_checked() {
        let ok = Argument::positional(
            ArgumentSpec::new("point")
                .arity(Arity::Exact(2))
                .holder("X")
                .holder("Y"),
        )
        .unwrap();
        assert_eq!(ok.holder(), vec!["X".to_string(), "Y".to_string()]);

        let err = Argument::positional(
            ArgumentSpec::new("point")
                .arity(Arity::OneOrMore)
                .holder("X")
                .holder("Y"),
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidHolder { .. }));

        let err = Argument::positional(ArgumentSpec::new("point").holder("")).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidHolder { .. }));
    }

    #[test]
    fn store_const_needs_a_value() {
        let err = Argument::optional(ArgumentSpec::new("--x").action(Action::StoreConst)).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidArgument { .. }));
    }

    #[test]
    fn loose_matching_accepts_camel_case() {
        let arg = Argument::optional(ArgumentSpec::new("--dry-run").alias("-n")).unwrap();
        assert!(arg.matches("--dry-run"));
        assert!(!arg.matches("dryRun"));
        assert!(arg.matches_loose("dry-run"));
        assert!(arg.matches_loose("dryRun"));
        assert!(arg.matches_loose("n"));
    }

    #[test]
    fn choice_violations_name_the_argument() {
        let arg = Argument::positional(ArgumentSpec::new("mode").choices(["fast", "slow"])).unwrap();
        assert!(arg.check_choice(&json!("fast")).is_ok());
        let err = arg.check_choice(&json!("medium")).unwrap_err();
        assert_eq!(err.to_string(), "mode: invalid value 'medium', must be one of: fast, slow");
    }
}
