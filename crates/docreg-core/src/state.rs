//! [`RegistryState`] — the registry's four pieces of state and every
//! transition rule over them.
//!
//! Mutation is two-phase. A `propose_*` method checks preconditions against
//! the current state and returns the [`RegistryEvent`] describing the change,
//! without touching anything. [`RegistryState::apply`] then folds an event
//! into the state and cannot fail. Callers persist the event between the two
//! steps, which keeps every operation all-or-nothing.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  document::{
    ContractInfo, Document, RecordCount, RecordId, RecordStatus, check_hash,
    check_id, check_locator,
  },
  event::RegistryEvent,
  identity::Identity,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryState {
  documents:     BTreeMap<RecordId, Document>,
  /// Record identifiers per owner, in creation order. Append-only.
  owner_index:   BTreeMap<Identity, Vec<RecordId>>,
  administrator: Identity,
  paused:        bool,
  total_records: u64,
}

impl RegistryState {
  /// Fresh state: no records, unpaused, administered by `creator`.
  pub fn new(creator: Identity) -> Result<Self> {
    if creator.is_null() {
      return Err(Error::InvalidAddress);
    }
    Ok(Self {
      documents:     BTreeMap::new(),
      owner_index:   BTreeMap::new(),
      administrator: creator,
      paused:        false,
      total_records: 0,
    })
  }

  /// Reassemble state from persisted parts. `owner_index` entries must
  /// already be in creation order. No invariants are checked here; see
  /// [`RegistryState::is_consistent`].
  pub fn from_parts(
    administrator: Identity,
    paused: bool,
    total_records: u64,
    documents: impl IntoIterator<Item = Document>,
    owner_index: impl IntoIterator<Item = (Identity, Vec<RecordId>)>,
  ) -> Self {
    Self {
      documents: documents.into_iter().map(|d| (d.id, d)).collect(),
      owner_index: owner_index.into_iter().collect(),
      administrator,
      paused,
      total_records,
    }
  }

  /// Rebuild state by folding an ordered event log over a fresh registry.
  pub fn replay<'a>(
    creator: Identity,
    events: impl IntoIterator<Item = &'a RegistryEvent>,
  ) -> Result<Self> {
    let mut state = Self::new(creator)?;
    for event in events {
      state.apply(event);
    }
    Ok(state)
  }

  /// Whether the index/store bijection and the record counter agree.
  pub fn is_consistent(&self) -> bool {
    if self.administrator.is_null() {
      return false;
    }
    let mut indexed = BTreeSet::new();
    for (owner, ids) in &self.owner_index {
      for id in ids {
        match self.documents.get(id) {
          Some(doc) if doc.owner == *owner && indexed.insert(*id) => {}
          _ => return false,
        }
      }
    }
    indexed.iter().eq(self.documents.keys())
      && self.total_records == self.documents.len() as u64
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Look up a record. Inactive records are still returned.
  pub fn get_document(&self, id: RecordId) -> Result<&Document> {
    self.documents.get(&id).ok_or(Error::RecordNotFound(id))
  }

  /// `true` iff `id` exists and its stored hash equals `candidate`.
  pub fn verify_document(&self, id: RecordId, candidate: &str) -> bool {
    self
      .documents
      .get(&id)
      .is_some_and(|doc| doc.integrity_hash == candidate)
  }

  pub fn record_status(&self, id: RecordId) -> RecordStatus {
    match self.documents.get(&id) {
      Some(doc) => RecordStatus { exists: true, active: doc.active },
      None => RecordStatus::default(),
    }
  }

  /// Every record `owner` created, in creation order.
  pub fn user_records(&self, owner: &Identity) -> &[RecordId] {
    self.owner_index.get(owner).map(Vec::as_slice).unwrap_or(&[])
  }

  /// The subset of [`RegistryState::user_records`] that is still active.
  pub fn user_active_records(&self, owner: &Identity) -> Vec<RecordId> {
    self
      .user_records(owner)
      .iter()
      .copied()
      .filter(|id| self.documents.get(id).is_some_and(|d| d.active))
      .collect()
  }

  pub fn user_record_count(&self, owner: &Identity) -> RecordCount {
    RecordCount {
      total:  self.user_records(owner).len(),
      active: self.user_active_records(owner).len(),
    }
  }

  pub fn contract_info(&self) -> ContractInfo {
    ContractInfo {
      total_records: self.total_records,
      administrator: self.administrator,
      paused:        self.paused,
    }
  }

  // ── Proposals ─────────────────────────────────────────────────────────────

  pub fn propose_store(
    &self,
    caller: Identity,
    id: RecordId,
    locator: &str,
    integrity_hash: &str,
    now: DateTime<Utc>,
  ) -> Result<RegistryEvent> {
    check_id(id)?;
    self.check_not_paused()?;
    check_locator(locator)?;
    check_hash(integrity_hash)?;
    if self.documents.contains_key(&id) {
      return Err(Error::DuplicateIdentifier(id));
    }

    Ok(RegistryEvent::DocumentStored {
      id,
      owner: caller,
      locator: locator.to_owned(),
      integrity_hash: integrity_hash.to_owned(),
      timestamp: now,
    })
  }

  /// Inactive records may still be updated; doing so does not reactivate
  /// them.
  pub fn propose_update(
    &self,
    caller: Identity,
    id: RecordId,
    new_integrity_hash: &str,
    now: DateTime<Utc>,
  ) -> Result<RegistryEvent> {
    self.owned_record(caller, id)?;
    check_hash(new_integrity_hash)?;

    Ok(RegistryEvent::DocumentUpdated {
      id,
      owner: caller,
      new_integrity_hash: new_integrity_hash.to_owned(),
      timestamp: now,
    })
  }

  pub fn propose_deactivate(
    &self,
    caller: Identity,
    id: RecordId,
    now: DateTime<Utc>,
  ) -> Result<RegistryEvent> {
    let doc = self.owned_record(caller, id)?;
    if !doc.active {
      return Err(Error::AlreadyInactive(id));
    }

    Ok(RegistryEvent::DocumentDeactivated { id, owner: caller, timestamp: now })
  }

  /// Pausing an already-paused registry is allowed and changes nothing.
  pub fn propose_pause(
    &self,
    caller: Identity,
    now: DateTime<Utc>,
  ) -> Result<RegistryEvent> {
    self.check_administrator(caller)?;
    Ok(RegistryEvent::ContractPaused { administrator: caller, timestamp: now })
  }

  pub fn propose_unpause(
    &self,
    caller: Identity,
    now: DateTime<Utc>,
  ) -> Result<RegistryEvent> {
    self.check_administrator(caller)?;
    Ok(RegistryEvent::ContractUnpaused { administrator: caller, timestamp: now })
  }

  pub fn propose_transfer(
    &self,
    caller: Identity,
    new_administrator: Identity,
    now: DateTime<Utc>,
  ) -> Result<RegistryEvent> {
    self.check_administrator(caller)?;
    if new_administrator.is_null() {
      return Err(Error::InvalidAddress);
    }

    Ok(RegistryEvent::OwnershipTransferred {
      previous_administrator: caller,
      new_administrator,
      timestamp: now,
    })
  }

  // ── Apply ─────────────────────────────────────────────────────────────────

  /// Fold a committed event into the state.
  ///
  /// Events must come from a `propose_*` call against this same state (or be
  /// replayed in their original order); record events naming an unknown id
  /// are ignored.
  pub fn apply(&mut self, event: &RegistryEvent) {
    match event {
      RegistryEvent::DocumentStored { id, owner, locator, integrity_hash, timestamp } => {
        self.documents.insert(*id, Document {
          id:              *id,
          locator:         locator.clone(),
          integrity_hash:  integrity_hash.clone(),
          owner:           *owner,
          created_at:      *timestamp,
          last_updated_at: *timestamp,
          active:          true,
        });
        self.owner_index.entry(*owner).or_default().push(*id);
        self.total_records += 1;
      }
      RegistryEvent::DocumentUpdated { id, new_integrity_hash, timestamp, .. } => {
        if let Some(doc) = self.documents.get_mut(id) {
          doc.integrity_hash = new_integrity_hash.clone();
          doc.last_updated_at = *timestamp;
        }
      }
      RegistryEvent::DocumentDeactivated { id, .. } => {
        if let Some(doc) = self.documents.get_mut(id) {
          doc.active = false;
        }
      }
      RegistryEvent::ContractPaused { .. } => self.paused = true,
      RegistryEvent::ContractUnpaused { .. } => self.paused = false,
      RegistryEvent::OwnershipTransferred { new_administrator, .. } => {
        self.administrator = *new_administrator;
      }
    }
  }

  // ── Guards ────────────────────────────────────────────────────────────────

  fn check_not_paused(&self) -> Result<()> {
    if self.paused {
      return Err(Error::SystemPaused);
    }
    Ok(())
  }

  fn check_administrator(&self, caller: Identity) -> Result<()> {
    if caller != self.administrator {
      return Err(Error::NotAuthorized);
    }
    Ok(())
  }

  /// Existence, then pause, then ownership.
  fn owned_record(&self, caller: Identity, id: RecordId) -> Result<&Document> {
    let doc = self.get_document(id)?;
    self.check_not_paused()?;
    if doc.owner != caller {
      return Err(Error::NotRecordOwner);
    }
    Ok(doc)
  }
}
