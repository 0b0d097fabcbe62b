//! Value objects shared by every context's contact data.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A normalized (trimmed, lowercase) email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Parses and normalizes an email address.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the address is malformed.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let value = raw.trim().to_lowercase();
        let invalid = || DomainError::Validation(format!("invalid email address: '{raw}'"));

        if value.len() > 254 || value.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
        if local.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
        {
            return Err(invalid());
        }
        Ok(Self(value))
    }

    /// Returns the address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A phone number with formatting characters removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Parses a phone number. Digits, spaces, dashes, parentheses and one
    /// leading `+` are accepted; between 7 and 15 digits are required.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the number is malformed.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        let invalid = || DomainError::Validation(format!("invalid phone number: '{raw}'"));

        let (prefix, rest) = match trimmed.strip_prefix('+') {
            Some(rest) => ("+", rest),
            None => ("", trimmed),
        };
        if !rest
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'))
        {
            return Err(invalid());
        }
        let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
        if !(7..=15).contains(&digits.len()) {
            return Err(invalid());
        }
        Ok(Self(format!("{prefix}{digits}")))
    }

    /// Returns the normalized number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_normalized() {
        let email = Email::parse("  Ana@Example.COM ").unwrap();

        assert_eq!(email.as_str(), "ana@example.com");
    }

    #[test]
    fn test_malformed_emails_are_rejected() {
        for raw in ["", "ana", "ana@", "@example.com", "ana@example", "a na@x.com", "a@b@c.com"] {
            assert!(
                matches!(Email::parse(raw), Err(DomainError::Validation(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_phone_strips_formatting() {
        let phone = Phone::parse("+57 (300) 123-4567").unwrap();

        assert_eq!(phone.as_str(), "+573001234567");
    }

    #[test]
    fn test_phone_rejects_letters_and_short_numbers() {
        assert!(Phone::parse("555-CALL").is_err());
        assert!(Phone::parse("12345").is_err());
    }
}
