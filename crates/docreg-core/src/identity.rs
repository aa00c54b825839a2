//! Caller identities.
//!
//! An identity is a 20-byte account address. Both record owners and the
//! registry administrator are identities; the all-zero address is the null
//! identity and can never hold the administrator role.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of raw bytes in an address.
pub const ADDRESS_LEN: usize = 20;

/// A 20-byte account address, displayed as `0x` followed by 40 lowercase hex
/// characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity([u8; ADDRESS_LEN]);

#[derive(Debug, Error, PartialEq)]
pub enum ParseIdentityError {
  #[error("expected {expected} hex characters, got {got}")]
  Length { expected: usize, got: usize },

  #[error("invalid hex: {0}")]
  Hex(#[from] hex::FromHexError),
}

impl Identity {
  /// The null identity.
  pub const NULL: Self = Self([0; ADDRESS_LEN]);

  pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self { Self(bytes) }

  pub fn is_null(&self) -> bool { *self == Self::NULL }
}

impl fmt::Display for Identity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "0x{}", hex::encode(self.0))
  }
}

impl FromStr for Identity {
  type Err = ParseIdentityError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let digits = s
      .strip_prefix("0x")
      .or_else(|| s.strip_prefix("0X"))
      .unwrap_or(s);
    if digits.len() != ADDRESS_LEN * 2 {
      return Err(ParseIdentityError::Length {
        expected: ADDRESS_LEN * 2,
        got:      digits.len(),
      });
    }
    let mut bytes = [0u8; ADDRESS_LEN];
    hex::decode_to_slice(digits, &mut bytes)?;
    Ok(Self(bytes))
  }
}

impl Serialize for Identity {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Identity {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}
