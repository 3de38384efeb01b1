//! Read-only views over what one parse bound for a command.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::argument::{Argument, HELP_NAMES};
use crate::command::Command;
use crate::error::LookupError;
use crate::value::Value;

/// Per-parse state of one argument or option.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding {
    pub present: bool,
    pub value: Option<Value>,
}

#[derive(Debug, Clone)]
struct BoundView {
    command: Arc<Command>,
    bindings: Vec<Binding>,
    index: HashMap<String, usize>,
    positional: bool,
}

impl BoundView {
    fn new(command: Arc<Command>, bindings: Vec<Binding>, positional: bool) -> Self {
        let mut view = Self {
            command,
            bindings,
            index: HashMap::new(),
            positional,
        };
        let mut index = HashMap::new();
        for (i, entry) in view.entries().enumerate() {
            for form in entry.alias_forms() {
                index.entry(form).or_insert(i);
            }
        }
        view.index = index;
        view
    }

    fn entries(&self) -> Box<dyn Iterator<Item = &Argument> + '_> {
        if self.positional {
            Box::new(self.command.arguments().iter())
        } else {
            Box::new(self.command.options().elements())
        }
    }

    fn lookup(&self, key: &str) -> Result<(&Argument, Binding), LookupError> {
        let unknown = || LookupError::Unknown(key.to_string());
        let &i = self.index.get(key).ok_or_else(unknown)?;
        let entry = self.entries().nth(i).ok_or_else(unknown)?;
        let binding = self.bindings.get(i).cloned().unwrap_or_default();
        Ok((entry, binding))
    }

    fn resolve(entry: &Argument, binding: Binding) -> Option<Value> {
        binding.value.or_else(|| entry.default_value())
    }

    fn get(&self, key: &str) -> Result<Value, LookupError> {
        let (entry, binding) = self.lookup(key)?;
        Ok(Self::resolve(entry, binding).unwrap_or_else(|| entry.value_type().zero()))
    }

    fn get_or(&self, key: &str, fallback: Value) -> Result<Value, LookupError> {
        let (entry, binding) = self.lookup(key)?;
        Ok(Self::resolve(entry, binding).unwrap_or(fallback))
    }

    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, LookupError> {
        let value = self.get(key)?;
        serde_json::from_value(value).map_err(|e| LookupError::Type {
            name: key.to_string(),
            message: e.to_string(),
        })
    }

    fn has(&self, key: &str) -> bool {
        match self.lookup(key) {
            Ok((_, binding)) if binding.present => true,
            Ok((entry, _)) if self.positional => entry.default_value().is_some(),
            _ => false,
        }
    }

    fn binding(&self, key: &str) -> Option<&Binding> {
        let &i = self.index.get(key)?;
        self.bindings.get(i)
    }

    fn to_map(&self) -> IndexMap<String, Value> {
        self.entries()
            .zip(self.bindings.iter())
            .filter(|(entry, _)| !entry.is_help())
            .map(|(entry, binding)| {
                let value = Self::resolve(entry, binding.clone())
                    .unwrap_or_else(|| entry.value_type().zero());
                (bulk_key(entry), value)
            })
            .collect()
    }
}

/// First alias that is not one of the help names, without its dashes.
fn bulk_key(entry: &Argument) -> String {
    let name = entry
        .names()
        .iter()
        .find(|n| !HELP_NAMES.contains(&n.as_str()))
        .map_or(entry.name(), String::as_str);
    name.trim_start_matches('-').to_string()
}

macro_rules! bound_view {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(BoundView);

        impl $name {
            /// The command the view belongs to.
            pub fn command(&self) -> &Arc<Command> {
                &self.0.command
            }

            /// Bound value, else the default, else the type's zero value.
            pub fn get(&self, key: &str) -> Result<Value, LookupError> {
                self.0.get(key)
            }

            /// Like [`Self::get`], with `fallback` in place of the zero value.
            pub fn get_or(&self, key: &str, fallback: impl Into<Value>) -> Result<Value, LookupError> {
                self.0.get_or(key, fallback.into())
            }

            /// Deserialize the value of `key` into `T`.
            pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, LookupError> {
                self.0.get_as(key)
            }

            pub fn has(&self, key: &str) -> bool {
                self.0.has(key)
            }

            pub fn binding(&self, key: &str) -> Option<&Binding> {
                self.0.binding(key)
            }

            /// All entries keyed by their dash-stripped first name, in
            /// declaration order.
            pub fn to_map(&self) -> IndexMap<String, Value> {
                self.0.to_map()
            }
        }
    };
}

bound_view!(
    /// Positional arguments of one command. `has` is true for present
    /// arguments and for arguments with a usable default.
    ArgumentsMap
);

bound_view!(
    /// Options of one command. `has` is true only for options given on the
    /// command line.
    OptionsMap
);

impl ArgumentsMap {
    pub fn new(command: Arc<Command>, bindings: Vec<Binding>) -> Self {
        Self(BoundView::new(command, bindings, true))
    }
}

impl OptionsMap {
    pub fn new(command: Arc<Command>, bindings: Vec<Binding>) -> Self {
        Self(BoundView::new(command, bindings, false))
    }
}
