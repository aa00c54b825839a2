//! Error type for `docreg-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A registry rule rejected the call. Nothing was written.
  #[error(transparent)]
  Registry(#[from] docreg_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("identity parse error: {0}")]
  Identity(#[from] docreg_core::identity::ParseIdentityError),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("decode error: {0}")]
  Decode(String),

  /// The persisted tables violate a registry invariant.
  #[error("store is corrupt: {0}")]
  Corrupt(String),
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self { Self::Database(e.into()) }
}

impl Error {
  /// The registry failure kind, if this is a rule rejection.
  pub fn registry_kind(&self) -> Option<&'static str> {
    match self {
      Self::Registry(e) => Some(e.kind()),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
