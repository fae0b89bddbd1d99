//! Recipient assembly: union of static lists and matched addresses,
//! case-insensitively deduplicated and syntax-validated.

use std::collections::HashSet;

use crate::validate::is_valid_email;

/// A deduplicated, validated set of email addresses.
///
/// Insertion order is preserved so batching is deterministic; duplicates are
/// detected case-insensitively with the first-seen casing kept for display.
#[derive(Debug, Clone, Default)]
pub struct RecipientSet {
    emails: Vec<String>,
    seen: HashSet<String>,
}

impl RecipientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an address, returning false if it was already present
    /// (case-insensitively). The caller is responsible for validation.
    pub fn insert(&mut self, address: &str) -> bool {
        if self.seen.insert(address.to_lowercase()) {
            self.emails.push(address.to_string());
            true
        } else {
            false
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.seen.contains(&address.to_lowercase())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.emails
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.emails.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

/// Outcome of recipient assembly: the frozen set plus counters for what was
/// dropped along the way.
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub recipients: RecipientSet,
    pub invalid_dropped: usize,
    pub duplicates_dropped: usize,
}

/// Union static recipient lists with matched addresses into a [`RecipientSet`].
///
/// Static-list addresses come first, then matched addresses, preserving
/// first-seen order throughout. Every address must pass syntax validation;
/// invalid entries are dropped with a warning and counted. No address is ever
/// synthesized: the output is a subset of the inputs.
pub fn assemble(static_lists: &[Vec<String>], matched: &[String]) -> AssemblyReport {
    let mut recipients = RecipientSet::new();
    let mut invalid_dropped = 0;
    let mut duplicates_dropped = 0;

    let candidates = static_lists
        .iter()
        .flatten()
        .chain(matched.iter())
        .map(String::as_str);

    for address in candidates {
        let address = address.trim();
        if !is_valid_email(address) {
            tracing::warn!(address = %address, "Dropping syntactically invalid address");
            invalid_dropped += 1;
            continue;
        }
        if !recipients.insert(address) {
            duplicates_dropped += 1;
        }
    }

    tracing::info!(
        recipients = recipients.len(),
        invalid_dropped,
        duplicates_dropped,
        "Recipient assembly complete"
    );

    AssemblyReport {
        recipients,
        invalid_dropped,
        duplicates_dropped,
    }
}
