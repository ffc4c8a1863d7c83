//! Access card number type.

use core::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Overall shape, checked case-insensitively before the stricter part checks.
static CARD_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^CARD-[A-Z0-9]+-\d{2,}$").expect("Invalid regex"));

/// Building letter followed by four digits (floor + unit), e.g. `A1001`.
static APARTMENT_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][0-9]{4}$").expect("Invalid regex"));

/// Errors that can occur when parsing a [`CardNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CardNumberError {
    #[error("card number cannot be empty")]
    Empty,
    #[error("card number must look like CARD-{{apartment code}}-{{sequence}}, e.g. CARD-A1001-01")]
    InvalidFormat,
    #[error("the CARD prefix must be uppercase, e.g. CARD-A1001-01")]
    LowercasePrefix,
    #[error("building letter must be uppercase, e.g. CARD-A1001-01")]
    LowercaseBuilding,
    #[error("apartment code must be a building letter followed by 4 digits, e.g. A1001")]
    InvalidApartmentCode,
    #[error("sequence number must be a positive integer with at least 2 digits")]
    InvalidSequence,
}

/// A validated access card number: `CARD-{apartment code}-{sequence}`.
///
/// ```
/// use sams_core::CardNumber;
///
/// let card = CardNumber::parse("CARD-A1001-01").unwrap();
/// assert_eq!(card.apartment_code(), "A1001");
/// assert_eq!(card.sequence(), 1);
///
/// assert!(CardNumber::parse("card-A1001-01").is_err());
/// assert!(CardNumber::parse("CARD-a1001-01").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardNumber {
    raw: String,
    sequence: u32,
}

impl CardNumber {
    /// Parse and validate a card number.
    ///
    /// # Errors
    ///
    /// Returns a distinct [`CardNumberError`] for each failed check, in the
    /// order: blank, overall shape, prefix case, apartment code, sequence.
    pub fn parse(s: &str) -> Result<Self, CardNumberError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CardNumberError::Empty);
        }
        if !CARD_NUMBER_RE.is_match(s) {
            return Err(CardNumberError::InvalidFormat);
        }

        let mut parts = s.split('-');
        let (Some(prefix), Some(code), Some(seq), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CardNumberError::InvalidFormat);
        };

        if prefix != "CARD" {
            return Err(CardNumberError::LowercasePrefix);
        }

        if !APARTMENT_CODE_RE.is_match(code) {
            return Err(if code.starts_with(|c: char| c.is_lowercase()) {
                CardNumberError::LowercaseBuilding
            } else {
                CardNumberError::InvalidApartmentCode
            });
        }

        let sequence = seq
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or(CardNumberError::InvalidSequence)?;

        Ok(Self {
            raw: s.to_owned(),
            sequence,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The `{building}{4 digits}` middle part.
    #[must_use]
    pub fn apartment_code(&self) -> &str {
        self.raw.split('-').nth(1).unwrap_or_default()
    }

    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for CardNumber {
    type Error = CardNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CardNumber> for String {
    fn from(card: CardNumber) -> Self {
        card.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_card_numbers() {
        let card = CardNumber::parse("CARD-B2305-12").expect("valid");
        assert_eq!(card.apartment_code(), "B2305");
        assert_eq!(card.sequence(), 12);
        assert_eq!(card.to_string(), "CARD-B2305-12");
        assert!(CardNumber::parse("  CARD-A1001-001 ").is_ok());
    }

    #[test]
    fn test_rejects_each_failure_distinctly() {
        assert_eq!(CardNumber::parse("  "), Err(CardNumberError::Empty));
        assert_eq!(
            CardNumber::parse("CARD-A1001-1"),
            Err(CardNumberError::InvalidFormat)
        );
        assert_eq!(
            CardNumber::parse("TAG-A1001-01"),
            Err(CardNumberError::InvalidFormat)
        );
        assert_eq!(
            CardNumber::parse("Card-A1001-01"),
            Err(CardNumberError::LowercasePrefix)
        );
        assert_eq!(
            CardNumber::parse("CARD-a1001-01"),
            Err(CardNumberError::LowercaseBuilding)
        );
        assert_eq!(
            CardNumber::parse("CARD-A101-01"),
            Err(CardNumberError::InvalidApartmentCode)
        );
        assert_eq!(
            CardNumber::parse("CARD-A1001-00"),
            Err(CardNumberError::InvalidSequence)
        );
    }

    #[test]
    fn test_serde_validates() {
        let ok: CardNumber = serde_json::from_str("\"CARD-A1001-01\"").expect("deserialize");
        assert_eq!(ok.sequence(), 1);
        assert!(serde_json::from_str::<CardNumber>("\"CARD-1-01\"").is_err());
    }
}
