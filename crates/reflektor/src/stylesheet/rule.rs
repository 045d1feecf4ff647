//! Property key paths and rules.

use std::borrow::Borrow;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::value::Value;

/// A dot-separated property path such as `layer.cornerRadius`.
///
/// Dash-case segments are normalized to camelCase on construction, so
/// `layer.corner-radius` and `layer.cornerRadius` name the same property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PropertyKeyPath(String);

impl PropertyKeyPath {
    pub fn new(path: &str) -> Self {
        let normalized = path
            .split('.')
            .map(camel_case)
            .collect::<Vec<_>>()
            .join(".");
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl Borrow<str> for PropertyKeyPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PropertyKeyPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for PropertyKeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn camel_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut upper = false;
    for c in segment.chars() {
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

/// Property assignments of one selector (or the variables of a stylesheet).
///
/// Keys are unique; inserting an existing key replaces its value. Iteration
/// is in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Rule {
    entries: BTreeMap<PropertyKeyPath, Value>,
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property, returning the previous value.
    pub fn insert(&mut self, key: impl Into<PropertyKeyPath>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Looks up a property. The key is normalized first.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let key = PropertyKeyPath::new(key);
        self.entries.get(key.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, PropertyKeyPath, Value> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PropertyKeyPath> {
        self.entries.keys()
    }

    /// Copies every entry of `other` over this rule.
    pub fn merge(&mut self, other: &Rule) {
        for (key, value) in other.iter() {
            self.entries.insert(key.clone(), value.clone());
        }
    }
}

impl<'a> IntoIterator for &'a Rule {
    type Item = (&'a PropertyKeyPath, &'a Value);
    type IntoIter = btree_map::Iter<'a, PropertyKeyPath, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(PropertyKeyPath, Value)> for Rule {
    fn from_iter<I: IntoIterator<Item = (PropertyKeyPath, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
