use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Native ledger value in base units.
pub type Amount = u64;

/// Sequential round identifier, the first round is 1.
pub type RoundId = u64;

/// Raw value delivered by a randomness oracle.
pub type RandomValue = u128;

/// Comparable principal identity on the host ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(CoreError::InvalidAddress("address cannot be empty".to_string()));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidAddress(format!(
                "'{}' contains whitespace",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// Identifier of a randomness request, hex encoded 32-byte digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(String);

impl RequestId {
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex characters, for log lines and tables.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RequestId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        let bytes = hex::decode(&normalized)
            .map_err(|e| CoreError::InvalidRequestId(format!("{}: {}", s, e)))?;
        if bytes.len() != 32 {
            return Err(CoreError::InvalidRequestId(format!(
                "{}: expected 32 bytes, got {}",
                s,
                bytes.len()
            )));
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for RequestId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Position of a digit inside a guess, used to report the first invalid one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigitPosition {
    First,
    Second,
    Third,
    Fourth,
}

impl DigitPosition {
    pub const ALL: [DigitPosition; 4] = [
        DigitPosition::First,
        DigitPosition::Second,
        DigitPosition::Third,
        DigitPosition::Fourth,
    ];
}

impl fmt::Display for DigitPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigitPosition::First => write!(f, "First"),
            DigitPosition::Second => write!(f, "Second"),
            DigitPosition::Third => write!(f, "Third"),
            DigitPosition::Fourth => write!(f, "Fourth"),
        }
    }
}

/// Four decimal digits, each in `0..=9`.
///
/// Used both for a player's guess and for the drawn result of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u8; 4]", into = "[u8; 4]")]
pub struct Digits([u8; 4]);

impl Digits {
    /// Derive the drawn digits from an oracle value.
    ///
    /// The rule is public and depends on nothing but `value`: take the four
    /// least significant decimal digits, most significant first. This is the
    /// same as positions 6..9 of the zero-padded 9-digit rendering of
    /// `value mod 10^9`, so `123456789` draws `6 7 8 9` and `42` draws `0 0 4 2`.
    pub fn from_random(value: RandomValue) -> Self {
        let window = value % 10_000;
        Self([
            (window / 1000 % 10) as u8,
            (window / 100 % 10) as u8,
            (window / 10 % 10) as u8,
            (window % 10) as u8,
        ])
    }

    pub fn as_array(&self) -> [u8; 4] {
        self.0
    }

    pub fn get(&self, position: DigitPosition) -> u8 {
        self.0[position as usize]
    }
}

impl TryFrom<[u8; 4]> for Digits {
    type Error = DigitPosition;

    /// Positions are checked in order, the first out-of-range one is reported.
    fn try_from(raw: [u8; 4]) -> std::result::Result<Self, DigitPosition> {
        for (digit, position) in raw.iter().zip(DigitPosition::ALL) {
            if *digit > 9 {
                return Err(position);
            }
        }
        Ok(Self(raw))
    }
}

impl From<Digits> for [u8; 4] {
    fn from(digits: Digits) -> Self {
        digits.0
    }
}

impl fmt::Display for Digits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in self.0 {
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl FromStr for Digits {
    type Err = CoreError;

    /// Parses the compact `"6789"` rendering produced by `Display`.
    fn from_str(s: &str) -> Result<Self> {
        let parsed: Vec<u8> = s
            .chars()
            .map(|c| c.to_digit(10).map(|d| d as u8))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| CoreError::config(format!("'{}' is not a digit string", s)))?;
        let raw: [u8; 4] = parsed
            .try_into()
            .map_err(|_| CoreError::config(format!("'{}' must have exactly four digits", s)))?;
        Digits::try_from(raw)
            .map_err(|position| CoreError::config(format!("{} digit out of range", position)))
    }
}
