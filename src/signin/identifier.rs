use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// A normalized sign-in identifier; serializes as `{"phone": ..}` or `{"email": ..}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Identifier {
    Phone(String),
    Email(String),
}

impl Identifier {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Phone(_) => "phone",
            Self::Email(_) => "email",
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Phone(value) | Self::Email(value) => value,
        }
    }
}

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

/// Classify raw user input.
///
/// Exactly ten digits after stripping everything else is a phone number;
/// otherwise the raw value must look like an email address.
#[must_use]
pub fn classify(raw: &str) -> Option<Identifier> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 10 {
        return Some(Identifier::Phone(digits));
    }

    email_pattern()
        .filter(|re| re.is_match(raw))
        .map(|_| Identifier::Email(raw.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_is_normalized_to_digits() {
        assert_eq!(
            classify("+91 (987) 654-3210"),
            None,
            "twelve digits is not a phone"
        );
        assert_eq!(
            classify("(987) 654-3210"),
            Some(Identifier::Phone("9876543210".to_string()))
        );
    }

    #[test]
    fn email_is_lower_cased() {
        assert_eq!(
            classify("Asha.R@Example.COM"),
            Some(Identifier::Email("asha.r@example.com".to_string()))
        );
    }

    #[test]
    fn invalid_input_is_rejected() {
        for raw in [
            "",
            "12345",
            "asha@",
            "asha@example",
            "a b@c.d",
            "98765432101",
            " asha@example.com",
            "asha@example.com ",
        ] {
            assert_eq!(classify(raw), None, "{raw}");
        }
    }

    #[test]
    fn serializes_as_single_keyed_object() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_value(Identifier::Phone("9876543210".to_string()))?,
            serde_json::json!({"phone": "9876543210"})
        );
        Ok(())
    }
}
