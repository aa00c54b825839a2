//! Error types for `docreg-core`.
//!
//! Every rejection is synchronous and leaves registry state untouched. The
//! display string of each variant is the human-readable reason; the variant
//! itself is the failure kind.

use thiserror::Error;

use crate::document::RecordId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("Record ID must be greater than 0")]
  InvalidIdentifier,

  #[error("Contract is paused")]
  SystemPaused,

  #[error("CID cannot be empty")]
  EmptyLocator,

  #[error("Invalid metadata hash length: expected 64, got {0}")]
  InvalidHashLength(usize),

  #[error("Record ID already exists: {0}")]
  DuplicateIdentifier(RecordId),

  #[error("Record does not exist: {0}")]
  RecordNotFound(RecordId),

  #[error("Not record owner")]
  NotRecordOwner,

  #[error("Only contract owner can call this")]
  NotAuthorized,

  #[error("New owner cannot be zero address")]
  InvalidAddress,

  #[error("Document already inactive: {0}")]
  AlreadyInactive(RecordId),

  /// The event sink refused the event; the transition was not applied.
  #[error("event sink error: {0}")]
  EventSink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Stable name of the failure kind, independent of the reason text.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::InvalidIdentifier => "InvalidIdentifier",
      Self::SystemPaused => "SystemPaused",
      Self::EmptyLocator => "EmptyLocator",
      Self::InvalidHashLength(_) => "InvalidHashLength",
      Self::DuplicateIdentifier(_) => "DuplicateIdentifier",
      Self::RecordNotFound(_) => "RecordNotFound",
      Self::NotRecordOwner => "NotRecordOwner",
      Self::NotAuthorized => "NotAuthorized",
      Self::InvalidAddress => "InvalidAddress",
      Self::AlreadyInactive(_) => "AlreadyInactive",
      Self::EventSink(_) => "EventSink",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
