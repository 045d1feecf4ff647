//! The parsed stylesheet model.
//!
//! A [`Stylesheet`] is a table of `Selector → Rule` plus the `@global`
//! variables. Each structurally distinct selector appears once; repeated
//! blocks for the same selector merge into the same [`Rule`]. The table keeps
//! the order in which selectors first appeared, and every declaration gets a
//! sequence number so that, among selectors of equal priority, the textually
//! last declaration of a property wins.

mod rule;
mod selector;
mod value;

use std::collections::{BTreeMap, HashMap};

pub use rule::{PropertyKeyPath, Rule};
pub use selector::{Selector, SelectorKind, Specificity};
pub use value::{Color, Literal, PluginObject, ResolvedValue, Value, ValueFlags, ValueKind};

#[derive(Debug, Clone)]
struct Entry {
    selector: Selector,
    rule: Rule,
    /// Sequence number of the declaration that last set each key.
    declared_at: BTreeMap<PropertyKeyPath, usize>,
}

/// Ordered `Selector → Rule` table.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    entries: Vec<Entry>,
    index: HashMap<Selector, usize>,
    declarations: usize,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `selector` with an empty rule if it has not been seen before, and
    /// returns its position.
    pub fn add_selector(&mut self, selector: Selector) -> usize {
        if let Some(&position) = self.index.get(&selector) {
            return position;
        }
        let position = self.entries.len();
        self.index.insert(selector.clone(), position);
        self.entries.push(Entry {
            selector,
            rule: Rule::new(),
            declared_at: BTreeMap::new(),
        });
        position
    }

    /// Starts a new declaration; every property set for it shares the
    /// returned sequence number.
    pub fn next_declaration(&mut self) -> usize {
        self.declarations += 1;
        self.declarations
    }

    /// Sets a property of `selector` as part of `declaration`.
    pub fn declare(
        &mut self,
        selector: &Selector,
        key: impl Into<PropertyKeyPath>,
        value: Value,
        declaration: usize,
    ) {
        let position = self.add_selector(selector.clone());
        let entry = &mut self.entries[position];
        let key = key.into();
        entry.declared_at.insert(key.clone(), declaration);
        entry.rule.insert(key, value);
    }

    pub fn get(&self, selector: &Selector) -> Option<&Rule> {
        self.index.get(selector).map(|&i| &self.entries[i].rule)
    }

    /// Declaration position of a selector.
    pub fn position(&self, selector: &Selector) -> Option<usize> {
        self.index.get(selector).copied()
    }

    /// Properties of `selector`, each with the sequence number of the
    /// declaration that set it.
    pub fn declarations<'a>(
        &'a self,
        selector: &Selector,
    ) -> impl Iterator<Item = (&'a PropertyKeyPath, &'a Value, usize)> + 'a {
        let entry = self.index.get(selector).map(|&i| &self.entries[i]);
        entry.into_iter().flat_map(|entry| {
            entry.rule.iter().map(move |(key, value)| {
                let order = entry.declared_at.get(key).copied().unwrap_or_default();
                (key, value, order)
            })
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Selector, &Rule)> {
        self.entries.iter().map(|entry| (&entry.selector, &entry.rule))
    }
}

/// Rules and variables of a loaded stylesheet.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: RuleTable,
    variables: Rule,
}

impl Stylesheet {
    pub fn new(rules: RuleTable, variables: Rule) -> Self {
        Self { rules, variables }
    }

    /// A stylesheet with no rules and no variables.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn variables(&self) -> &Rule {
        &self.variables
    }

    /// Looks up an `@global` variable by name (without `@`).
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.variables.is_empty()
    }

    pub fn into_parts(self) -> (RuleTable, Rule) {
        (self.rules, self.variables)
    }
}
