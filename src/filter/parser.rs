//! Filter-file parser: plain text in, [`FilterSet`] out.
//!
//! File format, one rule group per line:
//!
//! ```text
//! # comment
//! department="sales", site!="munich"
//! name=~".*Manager.*"
//! department!~"temp|extern"
//! ```
//!
//! Blank lines and `#` comments are skipped. Each remaining line is split on
//! top-level commas (commas inside quoted values are preserved) into
//! `field<op>"value"` tokens. A malformed token drops only its own line;
//! parsing continues for the rest of the file.

use thiserror::Error;

use crate::error::{BroadsideError, Result};
use crate::filter::rule::{FilterSet, MatchMode, PredicateRule, RegexFlags, RuleGroup};

/// Defaults layered onto rules that carry no explicit operator metadata.
///
/// The line syntax has no flag notation, so `flags` supplies the regex flags
/// for every `=~`/`!~` rule in the file. For tabular filter sources (where a
/// row lists fields and values but no operators at all), `mode` supplies the
/// comparison mode as well; see [`group_from_fields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleDefaults {
    pub mode: MatchMode,
    pub flags: RegexFlags,
}

impl Default for RuleDefaults {
    fn default() -> Self {
        Self {
            mode: MatchMode::Exact,
            flags: RegexFlags::case_insensitive(),
        }
    }
}

/// Error local to one rule group; logged and absorbed, never fatal.
#[derive(Error, Debug)]
enum RuleError {
    #[error("no operator found in token '{0}'")]
    MissingOperator(String),

    #[error("empty field name in token '{0}'")]
    EmptyField(String),

    #[error("value is not a quoted literal in token '{0}'")]
    UnquotedValue(String),

    #[error("unescaped quote inside value in token '{0}'")]
    UnescapedQuote(String),

    #[error("unterminated quoted value")]
    UnterminatedQuote,

    #[error("no rules on line")]
    EmptyGroup,
}

/// Parse filter-file text with the standard defaults (exact matching,
/// case-insensitive regex flags).
pub fn parse(text: &str) -> Result<FilterSet> {
    parse_with_defaults(text, &RuleDefaults::default())
}

/// Parse filter-file text into a [`FilterSet`].
///
/// Per-line errors are recovered internally: the offending rule group is
/// dropped with a warning. Returns `Err` only for a structurally corrupt
/// file, defined as one that contains candidate rule lines but yields no
/// parseable group at all.
pub fn parse_with_defaults(text: &str, defaults: &RuleDefaults) -> Result<FilterSet> {
    let mut groups = Vec::new();
    let mut candidate_lines = 0usize;

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        candidate_lines += 1;

        match parse_group(line, defaults) {
            Ok(group) => groups.push(group),
            Err(e) => {
                tracing::warn!(
                    line = line_no + 1,
                    error = %e,
                    "Dropping malformed filter line"
                );
            }
        }
    }

    if candidate_lines > 0 && groups.is_empty() {
        return Err(BroadsideError::Parse(format!(
            "none of {} rule lines could be parsed",
            candidate_lines
        )));
    }

    tracing::debug!(
        groups = groups.len(),
        dropped = candidate_lines - groups.len(),
        "Parsed filter file"
    );
    Ok(FilterSet::new(groups))
}

/// Build a rule group from bare field/value pairs (tabular filter source).
///
/// Every pair becomes a rule with the default mode and flags, unifying the
/// tabular representation behind the same [`FilterSet`] model as the line
/// syntax.
pub fn group_from_fields<I, K, V>(fields: I, defaults: &RuleDefaults) -> RuleGroup
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    RuleGroup::new(
        fields
            .into_iter()
            .map(|(field, value)| PredicateRule {
                field: field.into(),
                mode: defaults.mode,
                value: value.into(),
                flags: defaults.flags,
            })
            .collect(),
    )
}

/// Parse one filter line into a rule group.
fn parse_group(line: &str, defaults: &RuleDefaults) -> std::result::Result<RuleGroup, RuleError> {
    let tokens = split_top_level_commas(line)?;

    let mut rules = Vec::new();
    for token in &tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        rules.push(parse_rule(token, defaults)?);
    }

    if rules.is_empty() {
        return Err(RuleError::EmptyGroup);
    }
    Ok(RuleGroup::new(rules))
}

/// Split a line on commas that are not inside a quoted value.
///
/// Inside quotes, a backslash escapes the following character.
fn split_top_level_commas(line: &str) -> std::result::Result<Vec<String>, RuleError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '\\' if in_quotes => {
                current.push(c);
                match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return Err(RuleError::UnterminatedQuote),
                }
            }
            ',' if !in_quotes => {
                tokens.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(RuleError::UnterminatedQuote);
    }
    tokens.push(current);
    Ok(tokens)
}

/// Parse one `field<op>"value"` token into a rule.
fn parse_rule(token: &str, defaults: &RuleDefaults) -> std::result::Result<PredicateRule, RuleError> {
    let (op_start, op_len, mode) =
        find_operator(token).ok_or_else(|| RuleError::MissingOperator(token.to_string()))?;

    let field = token[..op_start].trim();
    if field.is_empty() {
        return Err(RuleError::EmptyField(token.to_string()));
    }

    let value = unquote(token[op_start + op_len..].trim(), token)?;

    Ok(PredicateRule {
        field: field.to_string(),
        mode,
        value,
        flags: defaults.flags,
    })
}

/// Find the operator in a token; longest match first so `!~` and `!=` are
/// never misread as a bare `!`, nor `=~` as `=`.
///
/// Returns `(byte offset, byte length, mode)`. Scanning stops at the first
/// quote so operator characters inside the value are never considered.
fn find_operator(token: &str) -> Option<(usize, usize, MatchMode)> {
    let bytes = token.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return None,
            b'!' => {
                return match bytes.get(i + 1) {
                    Some(b'~') => Some((i, 2, MatchMode::RegexNotMatch)),
                    Some(b'=') => Some((i, 2, MatchMode::NotEqual)),
                    _ => None,
                };
            }
            b'=' => {
                return match bytes.get(i + 1) {
                    Some(b'~') => Some((i, 2, MatchMode::RegexMatch)),
                    _ => Some((i, 1, MatchMode::Exact)),
                };
            }
            _ => i += 1,
        }
    }
    None
}

/// Strip surrounding quotes and resolve backslash escapes.
///
/// An unescaped quote inside the value is a parse error; so is a value that
/// is not quoted at all.
fn unquote(raw: &str, token: &str) -> std::result::Result<String, RuleError> {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .filter(|_| raw.len() >= 2)
        .ok_or_else(|| RuleError::UnquotedValue(token.to_string()))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => return Err(RuleError::UnescapedQuote(token.to_string())),
            },
            '"' => return Err(RuleError::UnescapedQuote(token.to_string())),
            _ => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryRecord;

    fn record(pairs: &[(&str, &str)]) -> InventoryRecord {
        InventoryRecord::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        let filter = parse("\n  \n# a comment\n   # indented comment\n").unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn parses_all_four_operators() {
        let filter = parse(
            "a=\"1\"\n\
             b!=\"2\"\n\
             c=~\"3\"\n\
             d!~\"4\"\n",
        )
        .unwrap();
        assert_eq!(filter.len(), 4);

        let modes: Vec<MatchMode> = filter
            .groups
            .iter()
            .map(|g| g.rules[0].mode)
            .collect();
        assert_eq!(
            modes,
            vec![
                MatchMode::Exact,
                MatchMode::NotEqual,
                MatchMode::RegexMatch,
                MatchMode::RegexNotMatch
            ]
        );
    }

    #[test]
    fn multiple_rules_per_line_are_anded() {
        let filter = parse("department=\"sales\", site=\"berlin\"").unwrap();
        assert_eq!(filter.len(), 1);
        assert_eq!(filter.groups[0].rules.len(), 2);
        assert!(filter.matches(&record(&[("department", "Sales"), ("site", "Berlin")])));
        assert!(!filter.matches(&record(&[("department", "Sales"), ("site", "Munich")])));
    }

    #[test]
    fn commas_inside_quoted_values_are_preserved() {
        let filter = parse("name=\"Doe, Jane\", department=\"sales\"").unwrap();
        assert_eq!(filter.groups[0].rules.len(), 2);
        assert_eq!(filter.groups[0].rules[0].value, "Doe, Jane");
    }

    #[test]
    fn escaped_quotes_are_unescaped() {
        let filter = parse(r#"title="the \"big\" launch""#).unwrap();
        assert_eq!(filter.groups[0].rules[0].value, r#"the "big" launch"#);
    }

    #[test]
    fn unescaped_inner_quote_drops_only_that_group() {
        let text = "department=\"sal\"es\"\nsite=\"berlin\"\n";
        let filter = parse(text).unwrap();
        assert_eq!(filter.len(), 1);
        assert_eq!(filter.groups[0].rules[0].field, "site");
    }

    #[test]
    fn malformed_token_drops_only_that_group() {
        let text = "department sales\n\
                    =\"no field\"\n\
                    department=unquoted\n\
                    site=\"berlin\"\n";
        let filter = parse(text).unwrap();
        assert_eq!(filter.len(), 1);
        assert_eq!(filter.groups[0].rules[0].field, "site");
    }

    #[test]
    fn file_with_no_parseable_line_is_a_parse_error() {
        let result = parse("department sales\nsite berlin\n");
        assert!(matches!(result, Err(BroadsideError::Parse(_))));
    }

    #[test]
    fn comment_only_file_is_not_an_error() {
        assert!(parse("# nothing here\n").unwrap().is_empty());
    }

    #[test]
    fn default_flags_apply_to_regex_rules() {
        let filter = parse("department=~\"sales\"").unwrap();
        assert!(filter.groups[0].rules[0].flags.case_insensitive);
        assert!(filter.matches(&record(&[("department", "SALES dept")])));

        let strict = RuleDefaults {
            mode: MatchMode::Exact,
            flags: RegexFlags::default(),
        };
        let filter = parse_with_defaults("department=~\"sales\"", &strict).unwrap();
        assert!(!filter.matches(&record(&[("department", "SALES dept")])));
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = "department=\"sales\", site!=\"munich\"\nname=~\".*Manager.*\"\n";
        assert_eq!(parse(text).unwrap(), parse(text).unwrap());
    }

    #[test]
    fn tabular_rows_unify_behind_the_same_model() {
        let group = group_from_fields(
            [("department", "sales"), ("site", "berlin")],
            &RuleDefaults::default(),
        );
        assert_eq!(group.rules.len(), 2);
        assert_eq!(group.rules[0].mode, MatchMode::Exact);
        assert!(group.matches(&record(&[("department", "SALES"), ("site", "Berlin")])));
    }

    #[test]
    fn operator_lexicon_prefers_longest_match() {
        let filter = parse("a!~\"x\"").unwrap();
        assert_eq!(filter.groups[0].rules[0].mode, MatchMode::RegexNotMatch);

        let filter = parse("a!=\"x\"").unwrap();
        assert_eq!(filter.groups[0].rules[0].mode, MatchMode::NotEqual);

        let filter = parse("a=~\"x\"").unwrap();
        assert_eq!(filter.groups[0].rules[0].mode, MatchMode::RegexMatch);
    }
}
