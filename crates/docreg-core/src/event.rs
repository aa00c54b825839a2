//! Audit events and the sinks that record them.
//!
//! Every committed mutation is described by exactly one [`RegistryEvent`].
//! The event log is append-only and decoupled from the queryable state: the
//! state keeps only current values, the log keeps history.

use std::convert::Infallible;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, document::RecordId, identity::Identity};

// ─── RegistryEvent ───────────────────────────────────────────────────────────

/// A committed state transition. The variant name serves as the `kind`
/// discriminant stored by durable sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RegistryEvent {
  // ── Records ─────────────────────────────────────────────────────────────
  DocumentStored {
    id:             RecordId,
    owner:          Identity,
    locator:        String,
    integrity_hash: String,
    timestamp:      DateTime<Utc>,
  },
  DocumentUpdated {
    id:                 RecordId,
    owner:              Identity,
    new_integrity_hash: String,
    timestamp:          DateTime<Utc>,
  },
  DocumentDeactivated {
    id:        RecordId,
    owner:     Identity,
    timestamp: DateTime<Utc>,
  },

  // ── Administration ──────────────────────────────────────────────────────
  ContractPaused {
    administrator: Identity,
    timestamp:     DateTime<Utc>,
  },
  ContractUnpaused {
    administrator: Identity,
    timestamp:     DateTime<Utc>,
  },
  OwnershipTransferred {
    previous_administrator: Identity,
    new_administrator:      Identity,
    timestamp:              DateTime<Utc>,
  },
}

impl RegistryEvent {
  /// The discriminant string stored alongside the JSON payload.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::DocumentStored { .. } => "document_stored",
      Self::DocumentUpdated { .. } => "document_updated",
      Self::DocumentDeactivated { .. } => "document_deactivated",
      Self::ContractPaused { .. } => "contract_paused",
      Self::ContractUnpaused { .. } => "contract_unpaused",
      Self::OwnershipTransferred { .. } => "ownership_transferred",
    }
  }

  pub fn timestamp(&self) -> DateTime<Utc> {
    match self {
      Self::DocumentStored { timestamp, .. }
      | Self::DocumentUpdated { timestamp, .. }
      | Self::DocumentDeactivated { timestamp, .. }
      | Self::ContractPaused { timestamp, .. }
      | Self::ContractUnpaused { timestamp, .. }
      | Self::OwnershipTransferred { timestamp, .. } => *timestamp,
    }
  }

  /// The record this event concerns, if any.
  pub fn record_id(&self) -> Option<RecordId> {
    match self {
      Self::DocumentStored { id, .. }
      | Self::DocumentUpdated { id, .. }
      | Self::DocumentDeactivated { id, .. } => Some(*id),
      _ => None,
    }
  }

  /// Serialise the inner payload (without the type tag).
  pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from a stored discriminant and JSON payload.
  pub fn from_parts(
    discriminant: &str,
    data: serde_json::Value,
  ) -> serde_json::Result<Self> {
    let wrapped = serde_json::json!({ "type": discriminant, "data": data });
    serde_json::from_value(wrapped)
  }
}

// ─── Sinks ───────────────────────────────────────────────────────────────────

/// Durable, ordered destination for committed events.
///
/// [`crate::service::RegistryService`] appends an event *before* applying it
/// to state; if `append` fails, the transition is abandoned and the state is
/// left unchanged.
pub trait EventSink {
  type Error: std::error::Error + Send + Sync + 'static;

  fn append(&mut self, event: &RegistryEvent) -> Result<(), Self::Error>;
}

/// An event sink that keeps every event in memory, in commit order.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
  events: Vec<RegistryEvent>,
}

impl MemoryEventLog {
  pub fn new() -> Self { Self::default() }

  pub fn events(&self) -> &[RegistryEvent] { &self.events }

  pub fn len(&self) -> usize { self.events.len() }

  pub fn is_empty(&self) -> bool { self.events.is_empty() }

  pub fn last(&self) -> Option<&RegistryEvent> { self.events.last() }
}

impl EventSink for MemoryEventLog {
  type Error = Infallible;

  fn append(&mut self, event: &RegistryEvent) -> Result<(), Infallible> {
    self.events.push(event.clone());
    Ok(())
  }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
  type Error = S::Error;

  fn append(&mut self, event: &RegistryEvent) -> Result<(), Self::Error> {
    (**self).append(event)
  }
}
