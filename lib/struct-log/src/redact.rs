use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";

const DEFAULT_SENSITIVE_FIELDS: [&str; 12] = [
    "value",
    "values",
    "token",
    "client_token",
    "access_token",
    "jwt",
    "signed_jwt",
    "card_number",
    "pan",
    "password",
    "secret",
    "authorization",
];

const MIN_CARD_DIGITS: usize = 13;
const MAX_CARD_DIGITS: usize = 19;
const VISIBLE_DIGITS: usize = 4;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit run pattern is valid"));

/// Masks every run of 13 to 19 digits down to its last four digits.
///
/// Shorter and longer runs are left as is.
pub fn mask_card_numbers(text: &str) -> Cow<'_, str> {
    DIGIT_RUN.replace_all(text, |caps: &Captures<'_>| {
        let digits = &caps[0];
        if (MIN_CARD_DIGITS..=MAX_CARD_DIGITS).contains(&digits.len()) {
            let hidden = digits.len() - VISIBLE_DIGITS;
            format!("{}{}", "*".repeat(hidden), &digits[hidden..])
        } else {
            digits.to_string()
        }
    })
}

/// Decides what a log field may show.
#[derive(Debug, Clone)]
pub struct Redactor {
    fields: HashSet<String>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self {
            fields: DEFAULT_SENSITIVE_FIELDS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl Redactor {
    /// Add a field name whose value is never logged.
    pub fn with_field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into().to_lowercase());
        self
    }

    pub fn is_sensitive(&self, field: &str) -> bool {
        self.fields.contains(&field.to_lowercase())
    }

    pub fn redact(&self, field: &str, value: &Value) -> Value {
        if self.is_sensitive(field) {
            return Value::String(REDACTED.to_string());
        }
        match value {
            Value::String(s) => Value::String(mask_card_numbers(s).into_owned()),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_card_length_digit_runs() {
        assert_eq!(
            mask_card_numbers("card 4111111111111111 declined"),
            "card ************1111 declined"
        );
        assert_eq!(mask_card_numbers("1234567890123"), "*********0123");
    }

    #[test]
    fn keeps_short_and_long_digit_runs() {
        assert_eq!(mask_card_numbers("order 123456 at 2024"), "order 123456 at 2024");
        let long = "12345678901234567890";
        assert_eq!(mask_card_numbers(long), long);
    }

    #[test]
    fn redacts_sensitive_fields_case_insensitively() {
        let redactor = Redactor::default().with_field("Tweak");
        assert_eq!(
            redactor.redact("client_token", &Value::from("hvs.abc")),
            Value::from(REDACTED)
        );
        assert_eq!(redactor.redact("PAN", &Value::from(42)), Value::from(REDACTED));
        assert_eq!(redactor.redact("tweak", &Value::from("x")), Value::from(REDACTED));
    }

    #[test]
    fn other_fields_are_masked_not_dropped() {
        let redactor = Redactor::default();
        assert_eq!(
            redactor.redact("error", &Value::from("bad input 5500000000000004")),
            Value::from("bad input ************0004")
        );
        assert_eq!(redactor.redact("attempt", &Value::from(3)), Value::from(3));
    }
}
