//! Email-syntax validation, address-list splitting, and filename
//! sanitization for attachments.

use std::sync::LazyLock;

use regex::Regex;

/// Syntax check for a single address. Deliberately conservative: it gates
/// what we hand to the relay, it does not try to implement RFC 5322.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9][A-Za-z0-9.-]*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

/// Whether the address is syntactically acceptable.
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_RE.is_match(address) && !address.contains("..")
}

/// Split a record's email-bearing field into candidate addresses.
///
/// Inventory exports commonly pack several addresses into one cell,
/// separated by commas or semicolons.
pub fn split_addresses(raw: &str) -> impl Iterator<Item = &str> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Sanitize an attachment filename for inclusion in a message.
///
/// Path components are stripped, anything outside `[A-Za-z0-9._-]` is
/// replaced with `_`, and leading dots are dropped so the result can never
/// be a hidden or traversal name.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "attachment".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("jane.doe+tag@sub.example.co.uk"));
        assert!(is_valid_email("user_name%x@example.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@example..com"));
        assert!(!is_valid_email("user with space@example.com"));
    }

    #[test]
    fn splits_on_commas_and_semicolons() {
        let parts: Vec<&str> = split_addresses("a@x.com; b@x.com ,c@x.com").collect();
        assert_eq!(parts, vec!["a@x.com", "b@x.com", "c@x.com"]);
    }

    #[test]
    fn split_skips_empty_segments() {
        let parts: Vec<&str> = split_addresses(" ; a@x.com;; ").collect();
        assert_eq!(parts, vec!["a@x.com"]);
    }

    #[test]
    fn sanitizes_filenames() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("c:\\temp\\notes.txt"), "notes.txt");
        assert_eq!(sanitize_filename("über plan.doc"), "_ber_plan.doc");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("..."), "attachment");
    }
}
