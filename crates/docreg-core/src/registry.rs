//! The `DocumentRegistry` trait — the async call surface backends expose.
//!
//! The trait is implemented by durable backends (e.g.
//! `docreg-store-sqlite`). Client tooling depends on this abstraction, not on
//! any concrete backend. Every mutating method takes the caller's identity
//! explicitly; there is no ambient "current caller".

use std::future::Future;

use crate::{
  document::{ContractInfo, Document, RecordCount, RecordId, RecordStatus},
  identity::Identity,
};

/// Abstraction over a document registry backend.
///
/// Implementations must serialize mutating calls and make each one
/// all-or-nothing. Reads always observe fully committed state.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait DocumentRegistry: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Records ───────────────────────────────────────────────────────────

  /// Create a record owned by `caller`.
  fn store_document(
    &self,
    caller: Identity,
    id: RecordId,
    locator: String,
    integrity_hash: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Fetch a record, active or not. Fails if it was never created.
  fn get_document(
    &self,
    id: RecordId,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  /// Replace a record's integrity hash. Owner only.
  fn update_document_metadata(
    &self,
    caller: Identity,
    id: RecordId,
    new_integrity_hash: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Permanently mark a record inactive. Owner only.
  fn deactivate_document(
    &self,
    caller: Identity,
    id: RecordId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Compare `candidate` with the stored hash. Unknown records yield `false`.
  fn verify_document(
    &self,
    id: RecordId,
    candidate: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn record_status(
    &self,
    id: RecordId,
  ) -> impl Future<Output = Result<RecordStatus, Self::Error>> + Send + '_;

  // ── Owner index ───────────────────────────────────────────────────────

  fn get_user_records(
    &self,
    owner: Identity,
  ) -> impl Future<Output = Result<Vec<RecordId>, Self::Error>> + Send + '_;

  fn get_user_active_records(
    &self,
    owner: Identity,
  ) -> impl Future<Output = Result<Vec<RecordId>, Self::Error>> + Send + '_;

  fn get_user_record_count(
    &self,
    owner: Identity,
  ) -> impl Future<Output = Result<RecordCount, Self::Error>> + Send + '_;

  // ── Administration ────────────────────────────────────────────────────

  fn pause_contract(
    &self,
    caller: Identity,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn unpause_contract(
    &self,
    caller: Identity,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Hand the administrator role to `new_administrator`, effective
  /// immediately.
  fn transfer_ownership(
    &self,
    caller: Identity,
    new_administrator: Identity,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_contract_info(
    &self,
  ) -> impl Future<Output = Result<ContractInfo, Self::Error>> + Send + '_;
}
