//! Predicate rules and their composition into filter sets.
//!
//! A [`PredicateRule`] is a single field/operator/value condition. One filter
//! line is a [`RuleGroup`] (all conditions must hold), and a parsed filter
//! file is a [`FilterSet`] (any group matching is sufficient).

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::inventory::InventoryRecord;

/// Comparison mode for a predicate rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Case-insensitive string equality.
    Exact,
    /// Negation of `Exact`.
    NotEqual,
    /// Pattern found anywhere in the field value (search semantics).
    RegexMatch,
    /// Negation of `RegexMatch`.
    RegexNotMatch,
}

impl MatchMode {
    pub fn is_regex(&self) -> bool {
        matches!(self, MatchMode::RegexMatch | MatchMode::RegexNotMatch)
    }
}

/// Flags applied when compiling a rule's regex pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegexFlags {
    pub case_insensitive: bool,
    pub multi_line: bool,
    pub dot_matches_new_line: bool,
}

impl RegexFlags {
    /// Case-insensitive matching only, the most common configuration.
    pub fn case_insensitive() -> Self {
        Self {
            case_insensitive: true,
            ..Self::default()
        }
    }
}

/// Cache of compiled regexes keyed by (pattern, flags).
///
/// `None` records a pattern that failed to compile, so the warning is emitted
/// once per distinct pattern rather than once per inventory record.
static REGEX_CACHE: LazyLock<DashMap<(String, RegexFlags), Option<Arc<Regex>>>> =
    LazyLock::new(DashMap::new);

fn compiled(pattern: &str, flags: RegexFlags) -> Option<Arc<Regex>> {
    if let Some(entry) = REGEX_CACHE.get(&(pattern.to_string(), flags)) {
        return entry.value().clone();
    }

    let compiled = match RegexBuilder::new(pattern)
        .case_insensitive(flags.case_insensitive)
        .multi_line(flags.multi_line)
        .dot_matches_new_line(flags.dot_matches_new_line)
        .build()
    {
        Ok(re) => Some(Arc::new(re)),
        Err(e) => {
            tracing::warn!(
                pattern = %pattern,
                error = %e,
                "Invalid regex pattern, rule will never match"
            );
            None
        }
    };

    REGEX_CACHE.insert((pattern.to_string(), flags), compiled.clone());
    compiled
}

/// A single field/operator/value condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateRule {
    /// Inventory field the rule inspects.
    pub field: String,
    /// Comparison mode.
    pub mode: MatchMode,
    /// Literal value or regex pattern, depending on `mode`.
    pub value: String,
    /// Flags used when `mode` is regex-based; ignored otherwise.
    pub flags: RegexFlags,
}

impl PredicateRule {
    /// Evaluate this rule against an inventory record.
    ///
    /// A missing field is treated as the empty string. An invalid regex
    /// pattern fails closed: the rule evaluates to false (for both regex
    /// modes) and evaluation of other rules and records continues.
    pub fn evaluate(&self, record: &InventoryRecord) -> bool {
        let actual = record.get(&self.field);
        match self.mode {
            MatchMode::Exact => actual.to_lowercase() == self.value.to_lowercase(),
            MatchMode::NotEqual => actual.to_lowercase() != self.value.to_lowercase(),
            MatchMode::RegexMatch => compiled(&self.value, self.flags)
                .map(|re| re.is_match(actual))
                .unwrap_or(false),
            MatchMode::RegexNotMatch => compiled(&self.value, self.flags)
                .map(|re| !re.is_match(actual))
                .unwrap_or(false),
        }
    }
}

/// One filter-file line: an ordered set of rules that must ALL hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub rules: Vec<PredicateRule>,
}

impl RuleGroup {
    pub fn new(rules: Vec<PredicateRule>) -> Self {
        Self { rules }
    }

    /// Logical AND over all member rules.
    ///
    /// The empty group matches nothing, never everything, so a degenerate
    /// filter line can never select the whole inventory.
    pub fn matches(&self, record: &InventoryRecord) -> bool {
        !self.rules.is_empty() && self.rules.iter().all(|rule| rule.evaluate(record))
    }
}

/// One parsed filter file: an ordered sequence of rule groups, where ANY
/// group matching is sufficient (OR across lines).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub groups: Vec<RuleGroup>,
}

impl FilterSet {
    pub fn new(groups: Vec<RuleGroup>) -> Self {
        Self { groups }
    }

    /// Logical OR across all groups.
    pub fn matches(&self, record: &InventoryRecord) -> bool {
        self.groups.iter().any(|group| group.matches(record))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> InventoryRecord {
        InventoryRecord::from_pairs(pairs.iter().copied())
    }

    fn exact(field: &str, value: &str) -> PredicateRule {
        PredicateRule {
            field: field.to_string(),
            mode: MatchMode::Exact,
            value: value.to_string(),
            flags: RegexFlags::default(),
        }
    }

    fn regex(field: &str, value: &str, flags: RegexFlags) -> PredicateRule {
        PredicateRule {
            field: field.to_string(),
            mode: MatchMode::RegexMatch,
            value: value.to_string(),
            flags,
        }
    }

    #[test]
    fn exact_is_case_insensitive() {
        let rule = exact("department", "sales");
        assert!(rule.evaluate(&record(&[("department", "Sales")])));
        assert!(rule.evaluate(&record(&[("department", "SALES")])));
        assert!(!rule.evaluate(&record(&[("department", "Marketing")])));
    }

    #[test]
    fn not_equal_negates_exact() {
        let rule = PredicateRule {
            mode: MatchMode::NotEqual,
            ..exact("department", "sales")
        };
        assert!(!rule.evaluate(&record(&[("department", "SALES")])));
        assert!(rule.evaluate(&record(&[("department", "Marketing")])));
    }

    #[test]
    fn missing_field_is_empty_string() {
        assert!(exact("department", "").evaluate(&record(&[])));
        assert!(!exact("department", "sales").evaluate(&record(&[])));
        assert!(!regex("department", "sales", RegexFlags::default()).evaluate(&record(&[])));
    }

    #[test]
    fn regex_uses_search_semantics() {
        let rule = regex("name", "Manager", RegexFlags::default());
        assert!(rule.evaluate(&record(&[("name", "Senior Manager of Ops")])));
        assert!(!rule.evaluate(&record(&[("name", "Engineer")])));
    }

    #[test]
    fn regex_case_insensitive_flag() {
        let sensitive = regex("department", "sales|marketing", RegexFlags::default());
        let insensitive = regex(
            "department",
            "sales|marketing",
            RegexFlags::case_insensitive(),
        );
        let rec = record(&[("department", "Marketing")]);
        assert!(!sensitive.evaluate(&rec));
        assert!(insensitive.evaluate(&rec));
    }

    #[test]
    fn anchored_regex_is_respected() {
        let rule = regex("department", "^sales$", RegexFlags::default());
        assert!(rule.evaluate(&record(&[("department", "sales")])));
        assert!(!rule.evaluate(&record(&[("department", "pre-sales")])));
    }

    #[test]
    fn invalid_regex_fails_closed_in_both_modes() {
        let rec = record(&[("department", "Sales")]);
        let bad_match = regex("department", "sal(es", RegexFlags::default());
        assert!(!bad_match.evaluate(&rec));

        // RegexNotMatch also fails closed: an unanswerable question selects nobody
        let bad_not_match = PredicateRule {
            mode: MatchMode::RegexNotMatch,
            ..bad_match
        };
        assert!(!bad_not_match.evaluate(&rec));
    }

    #[test]
    fn empty_group_matches_nothing() {
        let group = RuleGroup::default();
        assert!(!group.matches(&record(&[("department", "Sales")])));
        assert!(!group.matches(&record(&[])));
    }

    #[test]
    fn group_requires_all_rules() {
        let group = RuleGroup::new(vec![exact("department", "sales"), exact("site", "berlin")]);
        assert!(group.matches(&record(&[("department", "Sales"), ("site", "Berlin")])));
        assert!(!group.matches(&record(&[("department", "Sales"), ("site", "Munich")])));
    }

    #[test]
    fn filter_set_ors_across_groups() {
        let filter = FilterSet::new(vec![
            RuleGroup::new(vec![exact("department", "sales")]),
            RuleGroup::new(vec![regex("name", ".*Manager.*", RegexFlags::default())]),
        ]);
        assert!(filter.matches(&record(&[("department", "sales"), ("name", "Ada")])));
        assert!(filter.matches(&record(&[("department", "IT"), ("name", "IT Manager")])));
        assert!(!filter.matches(&record(&[("department", "IT"), ("name", "Ada")])));
    }

    #[test]
    fn empty_filter_set_matches_nothing() {
        assert!(!FilterSet::default().matches(&record(&[("department", "Sales")])));
    }
}
