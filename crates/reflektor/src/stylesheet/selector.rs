//! Selectors and their priority.

use std::fmt;

use crate::condition::Condition;

/// What a selector primarily targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    /// `.Name` or `Name`: elements whose class identity is `Name`.
    Class(String),
    /// `#name`: elements tagged with the trait `name`.
    Trait(String),
}

/// Ordering key of a selector: later (greater) selectors override earlier
/// ones.
///
/// Fields compare in declaration order, so a trait selector outranks every
/// class selector, a `:trait` qualifier outranks any number of conditions,
/// and more ANDed condition terms outrank fewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Specificity {
    pub trait_selector: bool,
    pub additional_trait: bool,
    pub conditions: usize,
}

/// A selector head, e.g. `.Button[width > 320]:primary`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    kind: SelectorKind,
    additional_trait: Option<String>,
    condition: Option<Condition>,
}

impl Selector {
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(SelectorKind::Class(name.into()))
    }

    pub fn trait_tag(name: impl Into<String>) -> Self {
        Self::new(SelectorKind::Trait(name.into()))
    }

    pub fn new(kind: SelectorKind) -> Self {
        Self {
            kind,
            additional_trait: None,
            condition: None,
        }
    }

    pub fn with_additional_trait(mut self, trait_name: impl Into<String>) -> Self {
        self.additional_trait = Some(trait_name.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn kind(&self) -> &SelectorKind {
        &self.kind
    }

    pub fn additional_trait(&self) -> Option<&str> {
        self.additional_trait.as_deref()
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn priority(&self) -> Specificity {
        Specificity {
            trait_selector: matches!(self.kind, SelectorKind::Trait(_)),
            additional_trait: self.additional_trait.is_some(),
            conditions: self.condition.as_ref().map_or(0, Condition::terms),
        }
    }

    /// Whether the selector targets this class/trait pair, ignoring its
    /// condition.
    pub fn targets(&self, class: &str, trait_name: Option<&str>) -> bool {
        let primary = match &self.kind {
            SelectorKind::Class(name) => name == class,
            SelectorKind::Trait(name) => trait_name == Some(name.as_str()),
        };
        primary
            && self
                .additional_trait
                .as_deref()
                .map_or(true, |t| trait_name == Some(t))
    }

    /// The selector of a nested `&[condition]:trait` block.
    ///
    /// The condition is ANDed with this selector's; the trait qualifier is
    /// added, and fails if it conflicts with an existing one.
    pub fn refine(
        &self,
        condition: Option<&Condition>,
        additional_trait: Option<&str>,
    ) -> Result<Selector, String> {
        let mut refined = self.clone();
        if let Some(extra) = condition {
            refined.condition = Some(match &self.condition {
                Some(existing) => existing.and(extra),
                None => extra.clone(),
            });
        }
        if let Some(trait_name) = additional_trait {
            match &self.additional_trait {
                Some(existing) if existing != trait_name => {
                    return Err(format!(
                        "trait qualifier ':{}' conflicts with ':{}' of '{}'",
                        trait_name, existing, self
                    ));
                }
                _ => refined.additional_trait = Some(trait_name.to_string()),
            }
        }
        Ok(refined)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SelectorKind::Class(name) => write!(f, ".{}", name)?,
            SelectorKind::Trait(name) => write!(f, "#{}", name)?,
        }
        if let Some(condition) = &self.condition {
            write!(f, "[{}]", condition)?;
        }
        if let Some(trait_name) = &self.additional_trait {
            write!(f, ":{}", trait_name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(source: &str) -> Condition {
        Condition::parse_str(source).unwrap()
    }

    #[test]
    fn test_priority_order() {
        let plain = Selector::class("A");
        let one = Selector::class("A").with_condition(cond("width > 1"));
        let two = Selector::class("A").with_condition(cond("width > 1 and height > 1"));
        let qualified = Selector::class("A").with_additional_trait("dark");
        let tagged = Selector::trait_tag("dark");

        assert!(plain.priority() < one.priority());
        assert!(one.priority() < two.priority());
        assert!(two.priority() < qualified.priority());
        assert!(qualified.priority() < tagged.priority());
    }

    #[test]
    fn test_targets() {
        let s = Selector::class("Button");
        assert!(s.targets("Button", None));
        assert!(s.targets("Button", Some("primary")));
        assert!(!s.targets("Label", None));

        let s = Selector::class("Button").with_additional_trait("dark");
        assert!(s.targets("Button", Some("dark")));
        assert!(!s.targets("Button", Some("light")));
        assert!(!s.targets("Button", None));

        let s = Selector::trait_tag("dark");
        assert!(s.targets("Anything", Some("dark")));
        assert!(!s.targets("Anything", None));
    }

    #[test]
    fn test_refine_ands_conditions() {
        let parent = Selector::class("A").with_condition(cond("width > 320"));
        let child = parent.refine(Some(&cond("height > 10")), None).unwrap();
        assert_eq!(child.condition().map(Condition::terms), Some(2));
        assert_eq!(child.to_string(), ".A[((width > 320) and (height > 10))]");
    }

    #[test]
    fn test_refine_trait_conflict() {
        let parent = Selector::class("A").with_additional_trait("dark");
        assert!(parent.refine(None, Some("dark")).is_ok());
        assert!(parent.refine(None, Some("light")).is_err());

        let refined = Selector::class("A").refine(None, Some("dark")).unwrap();
        assert_eq!(refined, Selector::class("A").with_additional_trait("dark"));
    }

    #[test]
    fn test_structural_equality() {
        let a = Selector::class("A").with_condition(cond("width>320"));
        let b = Selector::class("A").with_condition(cond("width > 320px"));
        assert_eq!(a, b);
        assert_ne!(a, Selector::class("A"));
    }
}
