//! Encoding and decoding helpers between registry types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings. Record identifiers are decimal strings,
//! so the full `u64` range survives. Identities use their `0x` hex form.

use chrono::{DateTime, Utc};
use docreg_core::{
  document::{Document, RecordId},
  event::RegistryEvent,
  identity::Identity,
  state::RegistryState,
};

use crate::{Error, Result, store::StoredEvent};

// ─── RecordId ─────────────────────────────────────────────────────────────────

pub fn encode_id(id: RecordId) -> String { id.to_string() }

pub fn decode_id(s: &str) -> Result<RecordId> {
  s.parse()
    .map_err(|e| Error::Decode(format!("record id {s:?}: {e}")))
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Identity ─────────────────────────────────────────────────────────────────

pub fn encode_identity(id: Identity) -> String { id.to_string() }

pub fn decode_identity(s: &str) -> Result<Identity> { Ok(s.parse()?) }

// ─── Counters ─────────────────────────────────────────────────────────────────

pub fn decode_count(n: i64) -> Result<u64> {
  u64::try_from(n).map_err(|_| Error::Decode(format!("negative counter: {n}")))
}

// ─── Raw row types ────────────────────────────────────────────────────────────

/// A `documents` row as read from SQLite, before decoding.
pub struct RawDocument {
  pub record_id:       String,
  pub locator:         String,
  pub integrity_hash:  String,
  pub owner:           String,
  pub created_at:      String,
  pub last_updated_at: String,
  pub active:          bool,
}

impl RawDocument {
  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      id:              decode_id(&self.record_id)?,
      locator:         self.locator,
      integrity_hash:  self.integrity_hash,
      owner:           decode_identity(&self.owner)?,
      created_at:      decode_dt(&self.created_at)?,
      last_updated_at: decode_dt(&self.last_updated_at)?,
      active:          self.active,
    })
  }
}

/// The `registry_meta` row.
pub struct RawMeta {
  pub creator:       String,
  pub administrator: String,
  pub paused:        bool,
  pub total_records: i64,
}

/// The three state tables, read within one transaction.
pub struct RawState {
  pub meta:      RawMeta,
  pub documents: Vec<RawDocument>,
  pub index:     Vec<(String, String)>,
}

impl RawState {
  /// Decode into a [`RegistryState`] and the creator identity. Tables that
  /// break the owner-index bijection are reported as corrupt.
  pub fn decode(self) -> Result<(RegistryState, Identity)> {
    let creator = decode_identity(&self.meta.creator)?;
    let documents = self
      .documents
      .into_iter()
      .map(RawDocument::into_document)
      .collect::<Result<Vec<Document>>>()?;

    let state = RegistryState::from_parts(
      decode_identity(&self.meta.administrator)?,
      self.meta.paused,
      decode_count(self.meta.total_records)?,
      documents,
      group_owner_rows(self.index)?,
    );

    if !state.is_consistent() {
      return Err(Error::Corrupt(
        "owner index, documents, and record counter disagree".into(),
      ));
    }
    Ok((state, creator))
  }
}

/// An `events` row.
pub struct RawEvent {
  pub seq:          i64,
  pub kind:         String,
  pub payload_json: String,
}

impl RawEvent {
  pub fn into_stored(self) -> Result<StoredEvent> {
    let data = serde_json::from_str(&self.payload_json)?;
    Ok(StoredEvent {
      seq:   decode_count(self.seq)?,
      event: RegistryEvent::from_parts(&self.kind, data)?,
    })
  }
}

/// Group `(owner, record_id)` rows, already sorted by owner then position,
/// into per-owner lists.
pub fn group_owner_rows(
  rows: Vec<(String, String)>,
) -> Result<Vec<(Identity, Vec<RecordId>)>> {
  let mut grouped: Vec<(Identity, Vec<RecordId>)> = Vec::new();
  for (owner, record_id) in rows {
    let owner = decode_identity(&owner)?;
    let id = decode_id(&record_id)?;
    match grouped.last_mut() {
      Some((last, ids)) if *last == owner => ids.push(id),
      _ => grouped.push((owner, vec![id])),
    }
  }
  Ok(grouped)
}
