//! Inventory records: the tabular dataset filtered against to derive
//! dynamic recipients (e.g., an employee directory export).

use std::collections::HashMap;

/// One row of the inventory dataset: a mapping from field name to field value.
///
/// Records are immutable once loaded. Absent fields read as the empty string,
/// so predicate evaluation never has to distinguish "missing" from "empty".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    fields: HashMap<String, String>,
}

impl InventoryRecord {
    /// Build a record from field name/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a field value; absent fields read as the empty string.
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map(String::as_str).unwrap_or("")
    }

    /// Whether the record carries the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Field names present on this record.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for InventoryRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

/// Parse delimited inventory text (header row + data rows) into records.
///
/// Rows whose column count does not match the header are skipped with a
/// warning; they never abort the load. Column values are trimmed.
pub fn parse_inventory(text: &str, delimiter: char) -> Vec<InventoryRecord> {
    let mut lines = text.lines();

    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let header: Vec<&str> = header_line.split(delimiter).map(str::trim).collect();

    let mut records = Vec::new();
    for (line_no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let values: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        if values.len() != header.len() {
            tracing::warn!(
                line = line_no + 2,
                expected = header.len(),
                got = values.len(),
                "Skipping inventory row with wrong column count"
            );
            continue;
        }

        records.push(InventoryRecord::from_pairs(
            header.iter().copied().zip(values),
        ));
    }

    tracing::debug!(records = records.len(), "Loaded inventory");
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_reads_as_empty_string() {
        let record = InventoryRecord::from_pairs([("department", "Sales")]);
        assert_eq!(record.get("department"), "Sales");
        assert_eq!(record.get("email"), "");
        assert!(!record.has_field("email"));
    }

    #[test]
    fn parses_header_and_rows() {
        let text = "name;department;email\n\
                    Ada;Engineering;ada@example.com\n\
                    Grace;Sales;grace@example.com\n";
        let records = parse_inventory(text, ';');
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("name"), "Ada");
        assert_eq!(records[1].get("department"), "Sales");
    }

    #[test]
    fn skips_rows_with_wrong_column_count() {
        let text = "name;email\nAda;ada@example.com\nbroken-row\n";
        let records = parse_inventory(text, ';');
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn empty_input_yields_no_records() {
        assert!(parse_inventory("", ';').is_empty());
    }
}
