//! Canonical PLMN (MCC + MNC) network identifiers.
//!
//! Every comparison between a tower's network and the whitelist goes
//! through [`Plmn`], so there is exactly one place that decides how raw
//! identifiers are normalized.

use serde::{Deserialize, Serialize};

/// A canonical 6-digit network identifier: 3-digit MCC followed by the
/// MNC left-padded with zeros to 3 digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Plmn(String);

impl Plmn {
    /// Canonicalizes a raw identifier.
    ///
    /// Keeps only the ASCII digits of `raw`; the result must be 5 or 6
    /// digits long. The first 3 digits are the MCC, the remainder the MNC,
    /// which is zero-padded to 3 digits. Returns `None` for anything else.
    ///
    /// Canonicalizing an already-canonical identifier returns it unchanged.
    #[must_use]
    pub fn canonicalize(raw: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if !(5..=6).contains(&digits.len()) {
            return None;
        }
        let (mcc, mnc) = digits.split_at(3);
        Some(Self(format!("{mcc}{mnc:0>3}")))
    }

    /// Builds the identifier from numeric codes as reported by the tower
    /// lookup service. Returns `None` if either code exceeds 3 digits.
    #[must_use]
    pub fn from_parts(mcc: u16, mnc: u16) -> Option<Self> {
        if mcc > 999 || mnc > 999 {
            return None;
        }
        Some(Self(format!("{mcc:03}{mnc:03}")))
    }

    /// The 6-digit canonical form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mobile country code part.
    #[must_use]
    pub fn mcc(&self) -> &str {
        &self.0[..3]
    }

    /// Mobile network code part (always 3 digits).
    #[must_use]
    pub fn mnc(&self) -> &str {
        &self.0[3..]
    }
}

impl std::fmt::Display for Plmn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Plmn {
    type Error = InvalidPlmnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::canonicalize(&value).ok_or(InvalidPlmnError { raw: value })
    }
}

impl From<Plmn> for String {
    fn from(value: Plmn) -> Self {
        value.0
    }
}

impl std::str::FromStr for Plmn {
    type Err = InvalidPlmnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::canonicalize(s).ok_or_else(|| InvalidPlmnError { raw: s.to_string() })
    }
}

/// Error returned when a string does not contain a 5 or 6 digit
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPlmnError {
    /// The rejected input.
    pub raw: String,
}

impl std::fmt::Display for InvalidPlmnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid network identifier '{}': expected 5 or 6 digits",
            self.raw
        )
    }
}

impl std::error::Error for InvalidPlmnError {}
