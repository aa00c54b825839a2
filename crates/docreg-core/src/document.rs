//! Document records and the read models returned by registry queries.
//!
//! A document binds a caller-chosen identifier to an opaque content locator
//! and an integrity hash. The registry never dereferences the locator and
//! never computes the hash; both are stored exactly as supplied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, identity::Identity};

/// Caller-supplied record identifier. Zero is never a valid identifier.
pub type RecordId = u64;

/// Required length, in bytes, of every integrity hash (32 bytes as hex).
pub const HASH_LEN: usize = 64;

// ─── Document ────────────────────────────────────────────────────────────────

/// A stored record.
///
/// `owner` and `locator` never change after creation. `active` only ever
/// moves from `true` to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub id:              RecordId,
  pub locator:         String,
  pub integrity_hash:  String,
  pub owner:           Identity,
  pub created_at:      DateTime<Utc>,
  pub last_updated_at: DateTime<Utc>,
  pub active:          bool,
}

// ─── Query results ───────────────────────────────────────────────────────────

/// Result of [`crate::state::RegistryState::record_status`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStatus {
  pub exists: bool,
  pub active: bool,
}

/// Per-owner record counts. `active <= total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCount {
  pub total:  usize,
  pub active: usize,
}

/// Snapshot of the registry's global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
  pub total_records: u64,
  pub administrator: Identity,
  pub paused:        bool,
}

// ─── Validation ──────────────────────────────────────────────────────────────

pub(crate) fn check_id(id: RecordId) -> Result<()> {
  if id == 0 {
    return Err(Error::InvalidIdentifier);
  }
  Ok(())
}

pub(crate) fn check_locator(locator: &str) -> Result<()> {
  if locator.is_empty() {
    return Err(Error::EmptyLocator);
  }
  Ok(())
}

pub(crate) fn check_hash(hash: &str) -> Result<()> {
  let len = hash.len();
  if len != HASH_LEN {
    return Err(Error::InvalidHashLength(len));
  }
  Ok(())
}
