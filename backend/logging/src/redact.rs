//! Log Redaction
//!
//! Scrubs api keys, salts and partner tokens from free text before logging.

use regex::Regex;
use std::sync::LazyLock;

static HEX_SECRET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[0-9a-fA-F]{32,}\b").unwrap());
static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").unwrap());
static PARTNER_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(x-wor-partner-token[\x22']?\s*[:=]\s*[\x22']?)[^\s\x22',;}]+").unwrap());
static API_KEY_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"("(?:apiKey|salt|authenticationToken)"\s*:\s*")[^"]*""#).unwrap());

/// Redacts secret-looking values in a string.
pub fn redact_secrets(input: &str) -> String {
    let redacted = API_KEY_FIELD_RE.replace_all(input, "${1}[REDACTED]\"");
    let redacted = PARTNER_TOKEN_RE.replace_all(&redacted, "${1}[REDACTED]");
    let redacted = BEARER_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    HEX_SECRET_RE.replace_all(&redacted, "[REDACTED]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_hex_keys() {
        let key = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
        let clean = redact_secrets(&format!("refresh failed for key {key}"));
        assert!(!clean.contains(key));
        assert!(clean.contains("refresh failed"));
    }

    #[test]
    fn test_redacts_json_fields() {
        let raw = r#"{"name":"B","url":"b.example.org","apiKey":"abc","status":"APPROVED"}"#;
        let clean = redact_secrets(raw);
        assert!(!clean.contains("\"abc\""));
        assert!(clean.contains("b.example.org"));
    }

    #[test]
    fn test_redacts_headers() {
        let clean = redact_secrets("X-WOR-Partner-Token: efg123 and Bearer abc.def");
        assert!(!clean.contains("efg123"));
        assert!(!clean.contains("abc.def"));
    }

    #[test]
    fn test_leaves_plain_text() {
        assert_eq!(redact_secrets("contact of b.example.org failed"), "contact of b.example.org failed");
    }
}
