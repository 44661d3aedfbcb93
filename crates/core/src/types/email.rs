//! Addresses accepted by registration and the OTP endpoints.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why an address was refused before reaching the backend.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,

    #[error("email must be at most {max} characters")]
    TooLong { max: usize },

    #[error("email must contain exactly one @")]
    AtSymbol,

    #[error("email cannot contain whitespace")]
    Whitespace,

    #[error("email is missing a mailbox name")]
    EmptyLocalPart,

    /// Domain empty, or without a dot between labels.
    #[error("email domain is invalid")]
    InvalidDomain,
}

/// A shopper's email address.
///
/// Surrounding whitespace from form input is dropped and the domain is
/// lowercased, so the address sent with `/send-otp/` matches the one later
/// sent with `/verify-otp/` and `/register/`. The mailbox part keeps its case.
///
/// ```
/// use miracle_core::Email;
///
/// let email = Email::parse("  Bola@Example.COM ").unwrap();
/// assert_eq!(email.as_str(), "Bola@example.com");
/// assert!(Email::parse("bola@localhost").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Validate and normalize an address.
    ///
    /// # Errors
    ///
    /// Returns the first [`EmailError`] the input trips.
    pub fn parse(raw: &str) -> Result<Self, EmailError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::AtSymbol)?;
        if domain.contains('@') {
            return Err(EmailError::AtSymbol);
        }
        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }
        if domain.split('.').count() < 2 || domain.split('.').any(str::is_empty) {
            return Err(EmailError::InvalidDomain);
        }

        Ok(Self(format!("{local}@{}", domain.to_ascii_lowercase())))
    }

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

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_input_is_normalized() {
        let email = Email::parse(" buyer+moringa@Shop.Co.UK\n").unwrap();
        assert_eq!(email.as_str(), "buyer+moringa@shop.co.uk");
        assert_eq!(email.to_string(), "buyer+moringa@shop.co.uk");
    }

    #[test]
    fn test_otp_round_uses_same_address() {
        let sent: Email = "Alice@EXAMPLE.com".parse().unwrap();
        let verified: Email = "Alice@example.com ".parse().unwrap();
        assert_eq!(sent, verified);
    }

    #[test]
    fn test_rejects_what_the_backend_would() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(Email::parse("not-an-email"), Err(EmailError::AtSymbol));
        assert_eq!(Email::parse("a@b@example.com"), Err(EmailError::AtSymbol));
        assert_eq!(Email::parse("bo la@example.com"), Err(EmailError::Whitespace));
        assert_eq!(Email::parse("@example.com"), Err(EmailError::EmptyLocalPart));
        assert_eq!(Email::parse("bola@"), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("bola@example."), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("bola@localhost"), Err(EmailError::InvalidDomain));

        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(Email::parse(&long), Err(EmailError::TooLong { .. })));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let email = Email::parse("buyer@example.com").unwrap();
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"buyer@example.com\"");
    }
}
