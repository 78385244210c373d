//! PII scrubbing applied to field text before chunking.
//!
//! Content-safety invariant: no raw email address or phone number may reach
//! the embedding collaborator or stored chunk text. Patterns are substituted
//! with fixed placeholders rather than removed, so surrounding context stays
//! embeddable.

use regex::Regex;

/// Replaces email addresses with `[EMAIL]` and common phone-number formats
/// with `[PHONE]`.
pub fn strip_pii(text: &str) -> String {
    use std::sync::LazyLock;

    static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
    });
    static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\b(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b").unwrap()
    });

    let cleaned = EMAIL_RE.replace_all(text, "[EMAIL]");
    PHONE_RE.replace_all(&cleaned, "[PHONE]").into_owned()
}
