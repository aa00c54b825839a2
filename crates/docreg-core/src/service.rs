//! [`RegistryService`] — the in-process registry.
//!
//! Owns the [`RegistryState`], a [`Clock`], and an [`EventSink`]. Mutating
//! operations take `&mut self`, so a single service value is its own
//! single-writer discipline; share it across threads behind one lock.

use tracing::debug;

use crate::{
  Error, Result,
  clock::Clock,
  document::{ContractInfo, Document, RecordCount, RecordId, RecordStatus},
  event::{EventSink, RegistryEvent},
  identity::Identity,
  state::RegistryState,
};

pub struct RegistryService<C, S> {
  state: RegistryState,
  clock: C,
  sink:  S,
}

impl<C: Clock, S: EventSink> RegistryService<C, S> {
  /// A fresh registry administered by `creator`.
  pub fn new(creator: Identity, clock: C, sink: S) -> Result<Self> {
    Ok(Self::with_state(RegistryState::new(creator)?, clock, sink))
  }

  /// Resume from previously committed state.
  pub fn with_state(state: RegistryState, clock: C, sink: S) -> Self {
    Self { state, clock, sink }
  }

  pub fn state(&self) -> &RegistryState { &self.state }

  pub fn sink(&self) -> &S { &self.sink }

  // ── Records ───────────────────────────────────────────────────────────────

  pub fn store_document(
    &mut self,
    caller: Identity,
    id: RecordId,
    locator: &str,
    integrity_hash: &str,
  ) -> Result<()> {
    let event = self
      .state
      .propose_store(caller, id, locator, integrity_hash, self.clock.now())?;
    self.commit(event)
  }

  pub fn update_document_metadata(
    &mut self,
    caller: Identity,
    id: RecordId,
    new_integrity_hash: &str,
  ) -> Result<()> {
    let event = self.state.propose_update(
      caller,
      id,
      new_integrity_hash,
      self.clock.now(),
    )?;
    self.commit(event)
  }

  pub fn deactivate_document(&mut self, caller: Identity, id: RecordId) -> Result<()> {
    let event = self.state.propose_deactivate(caller, id, self.clock.now())?;
    self.commit(event)
  }

  pub fn get_document(&self, id: RecordId) -> Result<&Document> {
    self.state.get_document(id)
  }

  pub fn verify_document(&self, id: RecordId, candidate: &str) -> bool {
    self.state.verify_document(id, candidate)
  }

  pub fn record_status(&self, id: RecordId) -> RecordStatus {
    self.state.record_status(id)
  }

  // ── Owner index ───────────────────────────────────────────────────────────

  pub fn get_user_records(&self, owner: &Identity) -> &[RecordId] {
    self.state.user_records(owner)
  }

  pub fn get_user_active_records(&self, owner: &Identity) -> Vec<RecordId> {
    self.state.user_active_records(owner)
  }

  pub fn get_user_record_count(&self, owner: &Identity) -> RecordCount {
    self.state.user_record_count(owner)
  }

  // ── Administration ────────────────────────────────────────────────────────

  pub fn pause_contract(&mut self, caller: Identity) -> Result<()> {
    let event = self.state.propose_pause(caller, self.clock.now())?;
    self.commit(event)
  }

  pub fn unpause_contract(&mut self, caller: Identity) -> Result<()> {
    let event = self.state.propose_unpause(caller, self.clock.now())?;
    self.commit(event)
  }

  pub fn transfer_ownership(
    &mut self,
    caller: Identity,
    new_administrator: Identity,
  ) -> Result<()> {
    let event =
      self
        .state
        .propose_transfer(caller, new_administrator, self.clock.now())?;
    self.commit(event)
  }

  pub fn get_contract_info(&self) -> ContractInfo { self.state.contract_info() }

  // ── Commit ────────────────────────────────────────────────────────────────

  /// Hand the event to the sink, then apply it. A sink failure leaves the
  /// state untouched.
  fn commit(&mut self, event: RegistryEvent) -> Result<()> {
    self
      .sink
      .append(&event)
      .map_err(|e| Error::EventSink(Box::new(e)))?;
    self.state.apply(&event);
    debug!(kind = event.discriminant(), record = ?event.record_id(), "committed");
    Ok(())
  }
}
