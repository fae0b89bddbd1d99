//! Filter-matching engine: rule file parsing and evaluation against
//! inventory records.

pub mod engine;
pub mod parser;
pub mod rule;

pub use engine::MatchEngine;
pub use parser::{RuleDefaults, group_from_fields, parse, parse_with_defaults};
pub use rule::{FilterSet, MatchMode, PredicateRule, RegexFlags, RuleGroup};
