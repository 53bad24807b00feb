//! Error message sanitization for persisted and emailed failure text.

use std::sync::LazyLock;

use regex::Regex;

/// Persisted error messages are capped at this many characters.
pub const MAX_ERROR_LEN: usize = 500;

static BEARER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)bearer\s+\S+").expect("static pattern"));

/// Strip credentials and bound the length of a raw failure message.
///
/// Applied before a message leaves the worker; everything downstream
/// (storage, logs, alert emails) only ever sees sanitized text.
pub fn sanitize_error(raw: &str) -> String {
    let redacted = BEARER.replace_all(raw, "Bearer [REDACTED]");
    match redacted.char_indices().nth(MAX_ERROR_LEN) {
        Some((idx, _)) => redacted[..idx].to_owned(),
        None => redacted.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_bearer_tokens() {
        let raw = "error fetching https://x: Authorization: Bearer abc.def.ghi rejected";
        let clean = sanitize_error(raw);
        assert!(clean.contains("Bearer [REDACTED]"));
        assert!(!clean.contains("abc.def.ghi"));
    }

    #[test]
    fn redaction_is_case_insensitive() {
        let clean = sanitize_error("header was 'bearer SECRET123'");
        assert!(!clean.contains("SECRET123"));
    }

    #[test]
    fn truncates_long_messages() {
        let raw = "x".repeat(2 * MAX_ERROR_LEN);
        assert_eq!(sanitize_error(&raw).chars().count(), MAX_ERROR_LEN);
    }

    #[test]
    fn short_messages_pass_through() {
        assert_eq!(sanitize_error("connection refused"), "connection refused");
    }
}
