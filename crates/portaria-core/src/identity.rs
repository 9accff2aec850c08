//! National identity numbers (CPF) and their two-check-digit validation.
//!
//! Validation is pure and performs no I/O, so both shells can reject a bad
//! number before the store is ever touched.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of digits in a well-formed identity number.
pub const IDENTITY_LEN: usize = 11;

/// Return `true` if `input` is a structurally and checksum-valid identity
/// number. Separators (`.`, `-`, `/`, whitespace) are ignored.
pub fn validate(input: &str) -> bool { IdentityNumber::parse(input).is_ok() }

/// A validated identity number, stored as its 11 bare digits.
///
/// Every accepted spelling of the same number (`111.444.777-35`,
/// `11144477735`) normalises to the same value, so equality and the store's
/// uniqueness constraint hold across spellings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityNumber(String);

impl IdentityNumber {
  /// Strip separators and validate the check digits.
  pub fn parse(input: &str) -> Result<Self> {
    let mut digits = Vec::with_capacity(IDENTITY_LEN);
    for c in input.chars() {
      match c {
        '0'..='9' => digits.push(c as u8 - b'0'),
        '.' | '-' | '/' => {}
        c if c.is_whitespace() => {}
        _ => return Err(Error::InvalidIdentity(input.to_owned())),
      }
    }

    if digits.len() != IDENTITY_LEN || digits.iter().all(|d| *d == digits[0]) {
      return Err(Error::InvalidIdentity(input.to_owned()));
    }

    if check_digit(&digits[..9]) != digits[9] || check_digit(&digits[..10]) != digits[10] {
      return Err(Error::InvalidIdentity(input.to_owned()));
    }

    Ok(Self(digits.iter().map(|d| char::from(b'0' + d)).collect()))
  }

  /// The bare 11 digits, as stored and sent over the wire.
  pub fn as_str(&self) -> &str { &self.0 }

  /// The conventional `XXX.XXX.XXX-XX` rendering.
  pub fn formatted(&self) -> String {
    let d = &self.0;
    format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
  }
}

/// Weighted positional sum over `digits` with weights descending from
/// `digits.len() + 1`, reduced as `(sum * 10) mod 11 mod 10`.
fn check_digit(digits: &[u8]) -> u8 {
  let top = digits.len() as u32 + 1;
  let sum: u32 = digits
    .iter()
    .enumerate()
    .map(|(i, d)| u32::from(*d) * (top - i as u32))
    .sum();
  ((sum * 10) % 11 % 10) as u8
}

impl fmt::Display for IdentityNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for IdentityNumber {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for IdentityNumber {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<IdentityNumber> for String {
  fn from(id: IdentityNumber) -> Self { id.0 }
}
