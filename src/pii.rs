//! C6 — PII Redactor (§4.6).
//!
//! Applies four pattern categories, in fixed order, to outbound text: EMAIL,
//! PHONE, API_KEY, PASSWORD. Each detected instance is replaced by a
//! uniquely numbered placeholder and the original substring is retained in
//! a one-to-one mapping so a request-scoped caller could restore it later
//! (§3 "Masking Record"). The Orchestrator itself never calls `restore` on
//! outbound responses (§4.7) — the mapping exists for future per-user
//! restoration only.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::MaskingRecord;

/// Order matters (§4.6): EMAIL and PHONE run first because their syntax can
/// otherwise be swallowed by the looser API_KEY/PASSWORD value patterns.
const CATEGORIES: &[PiiCategory] = &[
    PiiCategory::Email,
    PiiCategory::Phone,
    PiiCategory::ApiKey,
    PiiCategory::Password,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PiiCategory {
    Email,
    Phone,
    ApiKey,
    Password,
}

impl PiiCategory {
    fn label(&self) -> &'static str {
        match self {
            PiiCategory::Email => "EMAIL",
            PiiCategory::Phone => "PHONE",
            PiiCategory::ApiKey => "API_KEY",
            PiiCategory::Password => "PASSWORD",
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            PiiCategory::Email => &EMAIL_RE,
            PiiCategory::Phone => &PHONE_RE,
            PiiCategory::ApiKey => &API_KEY_RE,
            PiiCategory::Password => &PASSWORD_RE,
        }
    }

    /// Index of the capture group holding the "value" that should actually
    /// be replaced. EMAIL/PHONE replace the whole match (group 0); API_KEY
    /// and PASSWORD replace only the value, retaining the prefix verbatim.
    fn value_group(&self) -> usize {
        match self {
            PiiCategory::Email | PiiCategory::Phone => 0,
            PiiCategory::ApiKey | PiiCategory::Password => 1,
        }
    }
}

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex is valid")
});

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{3}[-.]\d{3,4}(?:[-.]\d{4})?\b").expect("phone regex is valid")
});

static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:api[_-]?key|token|secret)\s*[:=]\s*"?([A-Za-z0-9_-]{16,})"?"#,
    )
    .expect("api key regex is valid")
});

static PASSWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:password|passwd|pwd)\s*[:\s]\s*"?([^\s"]{8,})"?"#)
        .expect("password regex is valid")
});

/// C6 — PII Redactor. Stateless: every call to `mask` starts a fresh
/// per-category counter (§3 "each detected PII instance gets a unique
/// placeholder ... N is 1-indexed per type within the masking call").
#[derive(Debug, Default, Clone, Copy)]
pub struct PiiRedactor;

impl PiiRedactor {
    pub fn new() -> Self {
        Self
    }

    /// Mask all PII in `text`, returning the redacted text plus the
    /// placeholder→original mapping. A pattern-engine error (none of these
    /// regexes can fail at match time, but a future engine swap might)
    /// degrades to "no PII found" rather than propagating (§7).
    pub fn mask(&self, text: &str) -> MaskingRecord {
        let mut masked = text.to_string();
        let mut mappings = HashMap::new();

        for category in CATEGORIES {
            masked = self.mask_category(*category, &masked, &mut mappings);
        }

        MaskingRecord {
            masked_text: masked,
            mappings,
        }
    }

    /// Replace one category's matches, left-to-right, tracking a per-category
    /// 1-indexed counter. A character position already consumed by an
    /// earlier category in this same call is left untouched because we
    /// operate on the progressively-masked text (§4.6 "a character position
    /// is redacted at most once").
    fn mask_category(
        &self,
        category: PiiCategory,
        text: &str,
        mappings: &mut HashMap<String, String>,
    ) -> String {
        let regex = category.regex();
        let value_group = category.value_group();
        let mut result = String::with_capacity(text.len());
        let mut last_end = 0usize;
        let mut counter = 1u32;

        for caps in regex.captures_iter(text) {
            let whole = caps.get(0).expect("group 0 always matches");
            let value = caps
                .get(value_group)
                .unwrap_or(whole);

            result.push_str(&text[last_end..value.start()]);

            let placeholder = format!("[{}_REDACTED_{}]", category.label(), counter);
            mappings.insert(placeholder.clone(), value.as_str().to_string());
            result.push_str(&placeholder);

            counter += 1;
            last_end = value.end();
        }
        result.push_str(&text[last_end..]);
        result
    }

    /// `restore` is the left inverse of `mask` on the placeholders it
    /// produced: every `[TYPE_REDACTED_N]` token is swapped back for its
    /// original value. Unknown tokens (not present in `mappings`) pass
    /// through unchanged.
    pub fn restore(&self, masked: &str, mappings: &HashMap<String, String>) -> String {
        let mut restored = masked.to_string();
        // Longer placeholders first is unnecessary here since placeholders
        // are delimited by brackets and never overlap as substrings, but we
        // still sort for deterministic replacement order.
        let mut entries: Vec<(&String, &String)> = mappings.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (placeholder, original) in entries {
            restored = restored.replace(placeholder.as_str(), original.as_str());
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_mixed_pii_string() {
        let redactor = PiiRedactor::new();
        let input = "Email admin@ex.co, phone 555-1234, api_key: sk_live_abcdefghijklmnop";
        let record = redactor.mask(input);

        assert!(record.masked_text.contains("[EMAIL_REDACTED_1]"));
        assert!(record.masked_text.contains("[PHONE_REDACTED_1]"));
        assert!(record.masked_text.contains("[API_KEY_REDACTED_1]"));
        assert_eq!(record.mappings.len(), 3);
        assert!(record.masked_text.contains("api_key:"));
    }

    #[test]
    fn restore_is_left_inverse_of_mask() {
        let redactor = PiiRedactor::new();
        let input = "Contact me at jane.doe@example.com or 555-1234.";
        let record = redactor.mask(input);
        let restored = redactor.restore(&record.masked_text, &record.mappings);
        assert_eq!(restored, input);
    }

    #[test]
    fn password_prefix_is_retained_value_replaced() {
        let redactor = PiiRedactor::new();
        let input = "password: hunter2secret";
        let record = redactor.mask(input);
        assert!(record.masked_text.starts_with("password:"));
        assert!(record.masked_text.contains("[PASSWORD_REDACTED_1]"));
        assert_eq!(record.mappings.get("[PASSWORD_REDACTED_1]").unwrap(), "hunter2secret");
    }

    #[test]
    fn multiple_emails_get_distinct_counters() {
        let redactor = PiiRedactor::new();
        let input = "a@b.com and c@d.com";
        let record = redactor.mask(input);
        assert!(record.masked_text.contains("[EMAIL_REDACTED_1]"));
        assert!(record.masked_text.contains("[EMAIL_REDACTED_2]"));
    }

    #[test]
    fn text_without_pii_is_unchanged() {
        let redactor = PiiRedactor::new();
        let input = "just a normal sentence about retrieval";
        let record = redactor.mask(input);
        assert_eq!(record.masked_text, input);
        assert!(record.mappings.is_empty());
    }
}
