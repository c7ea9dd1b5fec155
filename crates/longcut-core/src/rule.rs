//! Transformation rules and insertion-ordered rule tables.
//!
//! Matching is purely textual: a shortcut matches a path when the path starts
//! with it. When several shortcuts are prefixes of the same path, the rule that
//! was inserted first wins, so a table never depends on hash iteration order.

use serde::{Deserialize, Serialize};

use crate::tier::RuleScope;

/// Shortcut -> longcut rewrite with policy flags. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationRule {
    pub shortcut: String,
    /// Longcut template; the unmatched path suffix is appended to it.
    pub longcut: String,
    pub scope: RuleScope,
    #[serde(default)]
    pub requires_governance: bool,
    #[serde(default)]
    pub requires_blockchain_validation: bool,
}

impl TransformationRule {
    pub fn new(shortcut: impl Into<String>, longcut: impl Into<String>, scope: RuleScope) -> Self {
        Self {
            shortcut: shortcut.into(),
            longcut: longcut.into(),
            scope,
            requires_governance: false,
            requires_blockchain_validation: false,
        }
    }

    pub fn with_governance(mut self) -> Self {
        self.requires_governance = true;
        self
    }

    pub fn with_blockchain_validation(mut self) -> Self {
        self.requires_blockchain_validation = true;
        self
    }

    /// Effective longcut for `path`, or `None` if the shortcut is not a prefix.
    pub fn expand(&self, path: &str) -> Option<String> {
        path.strip_prefix(self.shortcut.as_str())
            .map(|suffix| format!("{}{}", self.longcut, suffix))
    }
}

/// Ordered shortcut -> rule map.
///
/// Re-inserting an existing shortcut replaces the rule in place and keeps its
/// original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: Vec<TransformationRule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Insert or replace. Returns the replaced rule, if any.
    pub fn insert(&mut self, rule: TransformationRule) -> Option<TransformationRule> {
        match self.rules.iter_mut().find(|r| r.shortcut == rule.shortcut) {
            Some(slot) => Some(std::mem::replace(slot, rule)),
            None => {
                self.rules.push(rule);
                None
            }
        }
    }

    pub fn get(&self, shortcut: &str) -> Option<&TransformationRule> {
        self.rules.iter().find(|r| r.shortcut == shortcut)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformationRule> {
        self.rules.iter()
    }

    pub fn shortcuts(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.shortcut.as_str()).collect()
    }

    /// Exact match first, then the first prefix match in insertion order.
    pub fn lookup(&self, path: &str) -> Option<&TransformationRule> {
        self.get(path)
            .or_else(|| self.rules.iter().find(|r| path.starts_with(r.shortcut.as_str())))
    }
}

impl FromIterator<TransformationRule> for RuleTable {
    fn from_iter<I: IntoIterator<Item = TransformationRule>>(iter: I) -> Self {
        let mut table = RuleTable::new();
        for rule in iter {
            table.insert(rule);
        }
        table
    }
}
