//! Match engine: evaluates a filter set against inventory records and
//! extracts the matching recipients.

use std::collections::HashSet;

use crate::filter::rule::FilterSet;
use crate::inventory::InventoryRecord;
use crate::validate::{is_valid_email, split_addresses};

/// Evaluates a [`FilterSet`] against inventory records, producing the email
/// addresses of matching records.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    email_field: String,
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new("email")
    }
}

impl MatchEngine {
    /// Create an engine reading addresses from the given field.
    pub fn new(email_field: impl Into<String>) -> Self {
        Self {
            email_field: email_field.into(),
        }
    }

    /// Select the addresses of all inventory records matching the filter.
    ///
    /// Records are visited in their original order and, within a record,
    /// candidate addresses in their original order, so output order is
    /// reproducible across runs. A record's email field may carry several
    /// delimiter-separated addresses; each is a candidate. Syntactically
    /// invalid candidates are dropped with a warning. Addresses in
    /// `already_known` (e.g., from static recipient lists) are excluded;
    /// final deduplication downstream is still authoritative.
    pub fn select(
        &self,
        filter: &FilterSet,
        inventory: &[InventoryRecord],
        already_known: &[String],
    ) -> Vec<String> {
        let known: HashSet<String> = already_known.iter().map(|a| a.to_lowercase()).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut selected = Vec::new();

        for record in inventory {
            if !filter.matches(record) {
                continue;
            }

            for candidate in split_addresses(record.get(&self.email_field)) {
                if !is_valid_email(candidate) {
                    tracing::warn!(
                        address = %candidate,
                        "Dropping syntactically invalid address from matched record"
                    );
                    continue;
                }

                let canonical = candidate.to_lowercase();
                if known.contains(&canonical) {
                    tracing::debug!(address = %candidate, "Address already known, skipping");
                    continue;
                }
                if !seen.insert(canonical) {
                    continue;
                }

                selected.push(candidate.to_string());
            }
        }

        tracing::info!(
            matched = selected.len(),
            records = inventory.len(),
            "Filter matching complete"
        );
        selected
    }
}
