//! Ordered groups of options and subcommands.

use std::sync::Arc;

/// Elements that are addressed by one or more aliases.
pub trait Aliased {
    fn aliases(&self) -> &[String];

    fn matches(&self, token: &str) -> bool {
        self.aliases().iter().any(|a| a == token)
    }
}

impl<T: Aliased + ?Sized> Aliased for Arc<T> {
    fn aliases(&self) -> &[String] {
        (**self).aliases()
    }

    fn matches(&self, token: &str) -> bool {
        (**self).matches(token)
    }
}

/// A named bucket of elements. The unnamed group has `name == None`.
#[derive(Debug, Clone)]
pub struct Group<T> {
    name: Option<String>,
    description: String,
    elements: Vec<T>,
}

impl<T> Group<T> {
    pub fn new(name: Option<String>, description: impl Into<String>) -> Self {
        Self {
            name,
            description: description.into(),
            elements: Vec::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn add(&mut self, element: T) {
        self.elements.push(element);
    }

    pub(crate) fn retain(&mut self, f: impl FnMut(&T) -> bool) {
        self.elements.retain(f);
    }
}

impl<T: Aliased> Group<T> {
    pub fn has(&self, alias: &str) -> bool {
        self.elements.iter().any(|e| e.matches(alias))
    }
}

/// Groups in insertion order, with the unnamed group always last.
#[derive(Debug, Clone)]
pub struct Groups<T> {
    groups: Vec<Group<T>>,
}

impl<T> Default for Groups<T> {
    fn default() -> Self {
        Self {
            groups: vec![Group::new(None, "")],
        }
    }
}

impl<T> Groups<T> {
    pub fn iter(&self) -> impl Iterator<Item = &Group<T>> {
        self.groups.iter()
    }

    /// Every element across all groups, group order first.
    pub fn elements(&self) -> impl Iterator<Item = &T> {
        self.groups.iter().flat_map(|g| g.elements.iter())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.elements.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g.name() == Some(name))
    }

    /// Append a named group, keeping the unnamed one at the tail.
    pub(crate) fn push_group(&mut self, group: Group<T>) {
        self.groups.push(group);
        if let Some(pos) = self.groups.iter().position(|g| g.name.is_none()) {
            let unnamed = self.groups.remove(pos);
            self.groups.push(unnamed);
        }
    }

    /// The named group, or the unnamed one for `None`.
    pub(crate) fn group_mut(&mut self, name: Option<&str>) -> Option<&mut Group<T>> {
        self.groups.iter_mut().find(|g| g.name.as_deref() == name)
    }

    pub(crate) fn retain(&mut self, mut f: impl FnMut(&T) -> bool) {
        for group in &mut self.groups {
            group.retain(&mut f);
        }
    }
}

impl<T: Aliased> Groups<T> {
    pub fn find(&self, alias: &str) -> Option<&T> {
        self.elements().find(|e| e.matches(alias))
    }
}
