//! [`SqliteRegistry`] — the SQLite implementation of [`DocumentRegistry`].

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

use docreg_core::{
  clock::{Clock, SystemClock},
  document::{ContractInfo, Document, RecordCount, RecordId, RecordStatus},
  event::RegistryEvent,
  identity::Identity,
  registry::DocumentRegistry,
  state::RegistryState,
};

use crate::{
  encode::{
    RawDocument, RawEvent, RawMeta, RawState, encode_dt, encode_id,
    encode_identity,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Stored events ───────────────────────────────────────────────────────────

/// An audit-log entry with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEvent {
  /// 1-based, strictly increasing commit sequence number.
  pub seq:   u64,
  pub event: RegistryEvent,
}

// ─── Row writes ──────────────────────────────────────────────────────────────

/// The state-table changes implied by one event, pre-encoded so they can be
/// moved onto the database thread.
enum RowWrite {
  Insert {
    record_id: String,
    locator:   String,
    hash:      String,
    owner:     String,
    at:        String,
  },
  UpdateHash {
    record_id: String,
    hash:      String,
    at:        String,
  },
  Deactivate {
    record_id: String,
  },
  SetPaused(bool),
  SetAdministrator(String),
}

impl RowWrite {
  fn from_event(event: &RegistryEvent) -> Self {
    match event {
      RegistryEvent::DocumentStored { id, owner, locator, integrity_hash, timestamp } => {
        Self::Insert {
          record_id: encode_id(*id),
          locator:   locator.clone(),
          hash:      integrity_hash.clone(),
          owner:     encode_identity(*owner),
          at:        encode_dt(*timestamp),
        }
      }
      RegistryEvent::DocumentUpdated { id, new_integrity_hash, timestamp, .. } => {
        Self::UpdateHash {
          record_id: encode_id(*id),
          hash:      new_integrity_hash.clone(),
          at:        encode_dt(*timestamp),
        }
      }
      RegistryEvent::DocumentDeactivated { id, .. } => {
        Self::Deactivate { record_id: encode_id(*id) }
      }
      RegistryEvent::ContractPaused { .. } => Self::SetPaused(true),
      RegistryEvent::ContractUnpaused { .. } => Self::SetPaused(false),
      RegistryEvent::OwnershipTransferred { new_administrator, .. } => {
        Self::SetAdministrator(encode_identity(*new_administrator))
      }
    }
  }

  fn execute(self, tx: &rusqlite::Transaction<'_>) -> rusqlite::Result<()> {
    match self {
      Self::Insert { record_id, locator, hash, owner, at } => {
        tx.execute(
          "INSERT INTO documents (
             record_id, locator, integrity_hash, owner,
             created_at, last_updated_at, active
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, 1)",
          rusqlite::params![record_id, locator, hash, owner, at],
        )?;
        tx.execute(
          "INSERT INTO owner_records (owner, position, record_id)
           VALUES (?1, (SELECT COUNT(*) FROM owner_records WHERE owner = ?1), ?2)",
          rusqlite::params![owner, record_id],
        )?;
        tx.execute(
          "UPDATE registry_meta SET total_records = total_records + 1
           WHERE singleton = 1",
          [],
        )?;
      }
      Self::UpdateHash { record_id, hash, at } => {
        tx.execute(
          "UPDATE documents SET integrity_hash = ?2, last_updated_at = ?3
           WHERE record_id = ?1",
          rusqlite::params![record_id, hash, at],
        )?;
      }
      Self::Deactivate { record_id } => {
        tx.execute(
          "UPDATE documents SET active = 0 WHERE record_id = ?1",
          rusqlite::params![record_id],
        )?;
      }
      Self::SetPaused(paused) => {
        tx.execute(
          "UPDATE registry_meta SET paused = ?1 WHERE singleton = 1",
          rusqlite::params![paused],
        )?;
      }
      Self::SetAdministrator(administrator) => {
        tx.execute(
          "UPDATE registry_meta SET administrator = ?1 WHERE singleton = 1",
          rusqlite::params![administrator],
        )?;
      }
    }
    Ok(())
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Committed state as of a given `PRAGMA data_version`.
struct Cached {
  state:        RegistryState,
  data_version: i64,
}

/// The outcome of one committed transition.
struct Committed {
  event:  RegistryEvent,
  cached: Cached,
}

/// A document registry backed by a single SQLite file.
///
/// Every write runs its precondition checks inside an `IMMEDIATE` SQL
/// transaction against state read from the tables, so several handles (or
/// processes) on one file see each other's commits. Reads are served from an
/// in-memory copy that is reloaded whenever another connection has committed.
/// Cloning is cheap; clones share the connection and the in-memory copy.
pub struct SqliteRegistry<C = SystemClock> {
  conn:    tokio_rusqlite::Connection,
  cache:   Arc<RwLock<Cached>>,
  creator: Identity,
  clock:   Arc<C>,
}

impl<C> Clone for SqliteRegistry<C> {
  fn clone(&self) -> Self {
    Self {
      conn:    self.conn.clone(),
      cache:   self.cache.clone(),
      creator: self.creator,
      clock:   self.clock.clone(),
    }
  }
}

impl SqliteRegistry<SystemClock> {
  /// Open (or create) a registry at `path`. A new file is initialised with
  /// `creator` as administrator; for an existing file `creator` is ignored.
  pub async fn open(path: impl AsRef<Path>, creator: Identity) -> Result<Self> {
    Self::open_with_clock(path, creator, SystemClock).await
  }

  /// Open an in-memory registry — useful for testing.
  pub async fn open_in_memory(creator: Identity) -> Result<Self> {
    Self::open_in_memory_with_clock(creator, SystemClock).await
  }
}

impl<C: Clock + 'static> SqliteRegistry<C> {
  pub async fn open_with_clock(
    path: impl AsRef<Path>,
    creator: Identity,
    clock: C,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::from_connection(conn, creator, clock).await
  }

  pub async fn open_in_memory_with_clock(creator: Identity, clock: C) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::from_connection(conn, creator, clock).await
  }

  async fn from_connection(
    conn: tokio_rusqlite::Connection,
    creator: Identity,
    clock: C,
  ) -> Result<Self> {
    init_schema(&conn, creator).await?;
    let (cached, creator) = load(&conn).await?;
    let info = cached.state.contract_info();
    info!(
      administrator = %info.administrator,
      records = info.total_records,
      paused = info.paused,
      "registry opened"
    );
    Ok(Self {
      conn,
      cache: Arc::new(RwLock::new(cached)),
      creator,
      clock: Arc::new(clock),
    })
  }

  /// The identity that initialised this registry.
  pub fn creator(&self) -> Identity { self.creator }

  /// Audit-log entries with `seq > after`, oldest first.
  pub async fn events(&self, after: u64, limit: Option<usize>) -> Result<Vec<StoredEvent>> {
    let after = i64::try_from(after).unwrap_or(i64::MAX);
    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

    let raws = self
      .conn
      .call(move |conn| Ok(read_events(conn, after, limit)?))
      .await?;

    raws.into_iter().map(RawEvent::into_stored).collect()
  }

  /// Replay the full audit log from the creator and compare the result with
  /// the committed state tables. `true` means they agree; tables that break
  /// the owner-index invariant fail with [`Error::Corrupt`].
  pub async fn audit(&self) -> Result<bool> {
    // One read transaction, so no commit lands between the two reads.
    let (raw, raws) = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        let raw = read_state(&tx)?;
        let raws = read_events(&tx, 0, -1)?;
        Ok((raw, raws))
      })
      .await?;

    let (state, creator) = raw.decode()?;
    let log = raws
      .into_iter()
      .map(RawEvent::into_stored)
      .collect::<Result<Vec<_>>>()?;
    let replayed =
      RegistryState::replay(creator, log.iter().map(|stored| &stored.event))?;
    Ok(replayed == state)
  }

  /// Committed state for a read, reloaded first if another connection has
  /// committed since it was last loaded.
  async fn snapshot(&self) -> Result<RwLockReadGuard<'_, Cached>> {
    let version = self.conn.call(|conn| Ok(data_version(conn)?)).await?;

    let cached = self.cache.read().await;
    if cached.data_version == version {
      return Ok(cached);
    }
    drop(cached);

    let mut cached = self.cache.write().await;
    if cached.data_version != version {
      debug!(from = cached.data_version, to = version, "reloading committed state");
      *cached = load(&self.conn).await?.0;
    }
    Ok(cached.downgrade())
  }

  /// Run one transition: propose against the committed tables, then write
  /// the event and its row changes, all in one `IMMEDIATE` transaction.
  async fn transition<F>(&self, propose: F) -> Result<()>
  where
    F: FnOnce(&RegistryState, DateTime<Utc>) -> docreg_core::Result<RegistryEvent>
      + Send
      + 'static,
  {
    let mut cached = self.cache.write().await;
    let now = self.clock.now();
    let committed = self
      .conn
      .call(move |conn| Ok(commit_transition(conn, propose, now)))
      .await??;

    let event = &committed.event;
    debug!(kind = event.discriminant(), record = ?event.record_id(), "committed");
    *cached = committed.cached;
    Ok(())
  }
}

// ─── Database-thread helpers ─────────────────────────────────────────────────

/// Changes whenever another connection commits to the file.
fn data_version(conn: &rusqlite::Connection) -> rusqlite::Result<i64> {
  conn.query_row("PRAGMA data_version", [], |row| row.get(0))
}

fn commit_transition<F>(
  conn: &mut rusqlite::Connection,
  propose: F,
  now: DateTime<Utc>,
) -> Result<Committed>
where
  F: FnOnce(&RegistryState, DateTime<Utc>) -> docreg_core::Result<RegistryEvent>,
{
  // Read before the write lock is taken; a newer value only forces a reload.
  let version = data_version(conn)?;
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let (mut state, _) = read_state(&tx)?.decode()?;
  // A rejection drops `tx`, which rolls back.
  let event = propose(&state, now)?;
  let payload = event.to_json()?.to_string();

  RowWrite::from_event(&event).execute(&tx)?;
  tx.execute(
    "INSERT INTO events (kind, record_id, payload_json, recorded_at)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![
      event.discriminant(),
      event.record_id().map(encode_id),
      payload,
      encode_dt(event.timestamp()),
    ],
  )?;
  tx.commit()?;

  state.apply(&event);
  Ok(Committed { event, cached: Cached { state, data_version: version } })
}

fn read_state(conn: &rusqlite::Connection) -> rusqlite::Result<RawState> {
  let meta = conn.query_row(
    "SELECT creator, administrator, paused, total_records
     FROM registry_meta WHERE singleton = 1",
    [],
    |row| {
      Ok(RawMeta {
        creator:       row.get(0)?,
        administrator: row.get(1)?,
        paused:        row.get(2)?,
        total_records: row.get(3)?,
      })
    },
  )?;

  let mut stmt = conn.prepare(
    "SELECT record_id, locator, integrity_hash, owner,
            created_at, last_updated_at, active
     FROM documents",
  )?;
  let documents = stmt
    .query_map([], |row| {
      Ok(RawDocument {
        record_id:       row.get(0)?,
        locator:         row.get(1)?,
        integrity_hash:  row.get(2)?,
        owner:           row.get(3)?,
        created_at:      row.get(4)?,
        last_updated_at: row.get(5)?,
        active:          row.get(6)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut stmt = conn.prepare(
    "SELECT owner, record_id FROM owner_records ORDER BY owner, position",
  )?;
  let index = stmt
    .query_map([], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(RawState { meta, documents, index })
}

fn read_events(
  conn: &rusqlite::Connection,
  after: i64,
  limit: i64,
) -> rusqlite::Result<Vec<RawEvent>> {
  let mut stmt = conn.prepare(
    "SELECT seq, kind, payload_json FROM events
     WHERE seq > ?1 ORDER BY seq LIMIT ?2",
  )?;
  let rows = stmt
    .query_map(rusqlite::params![after, limit], |row| {
      Ok(RawEvent {
        seq:          row.get(0)?,
        kind:         row.get(1)?,
        payload_json: row.get(2)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

// ─── Startup ─────────────────────────────────────────────────────────────────

/// Create tables and, for a fresh file, the metadata row.
async fn init_schema(conn: &tokio_rusqlite::Connection, creator: Identity) -> Result<()> {
  let initialised: bool = conn
    .call(|conn| {
      conn.execute_batch(SCHEMA)?;
      Ok(
        conn
          .query_row("SELECT 1 FROM registry_meta WHERE singleton = 1", [], |_| {
            Ok(true)
          })
          .optional()?
          .unwrap_or(false),
      )
    })
    .await?;

  if initialised {
    return Ok(());
  }

  // Rejects the null identity before anything is written.
  RegistryState::new(creator)?;
  let creator_str = encode_identity(creator);

  conn
    .call(move |conn| {
      // Another opener may have initialised the file since the check above.
      conn.execute(
        "INSERT OR IGNORE INTO registry_meta
           (singleton, creator, administrator, paused, total_records)
         VALUES (1, ?1, ?1, 0, 0)",
        rusqlite::params![creator_str],
      )?;
      Ok(())
    })
    .await?;

  info!(creator = %creator, "initialised new registry");
  Ok(())
}

/// Read the committed tables back into memory.
async fn load(conn: &tokio_rusqlite::Connection) -> Result<(Cached, Identity)> {
  let (raw, version) = conn
    .call(|conn| {
      let version = data_version(conn)?;
      let tx = conn.transaction()?;
      let raw = read_state(&tx)?;
      tx.commit()?;
      Ok((raw, version))
    })
    .await?;

  let (state, creator) = raw.decode()?;
  Ok((Cached { state, data_version: version }, creator))
}

// ─── DocumentRegistry impl ───────────────────────────────────────────────────

impl<C: Clock + 'static> DocumentRegistry for SqliteRegistry<C> {
  type Error = Error;

  // ── Records ───────────────────────────────────────────────────────────────

  async fn store_document(
    &self,
    caller:         Identity,
    id:             RecordId,
    locator:        String,
    integrity_hash: String,
  ) -> Result<()> {
    self
      .transition(move |state, now| {
        state.propose_store(caller, id, &locator, &integrity_hash, now)
      })
      .await
  }

  async fn get_document(&self, id: RecordId) -> Result<Document> {
    Ok(self.snapshot().await?.state.get_document(id)?.clone())
  }

  async fn update_document_metadata(
    &self,
    caller:             Identity,
    id:                 RecordId,
    new_integrity_hash: String,
  ) -> Result<()> {
    self
      .transition(move |state, now| {
        state.propose_update(caller, id, &new_integrity_hash, now)
      })
      .await
  }

  async fn deactivate_document(&self, caller: Identity, id: RecordId) -> Result<()> {
    self
      .transition(move |state, now| state.propose_deactivate(caller, id, now))
      .await
  }

  async fn verify_document(&self, id: RecordId, candidate: String) -> Result<bool> {
    Ok(self.snapshot().await?.state.verify_document(id, &candidate))
  }

  async fn record_status(&self, id: RecordId) -> Result<RecordStatus> {
    Ok(self.snapshot().await?.state.record_status(id))
  }

  // ── Owner index ───────────────────────────────────────────────────────────

  async fn get_user_records(&self, owner: Identity) -> Result<Vec<RecordId>> {
    Ok(self.snapshot().await?.state.user_records(&owner).to_vec())
  }

  async fn get_user_active_records(&self, owner: Identity) -> Result<Vec<RecordId>> {
    Ok(self.snapshot().await?.state.user_active_records(&owner))
  }

  async fn get_user_record_count(&self, owner: Identity) -> Result<RecordCount> {
    Ok(self.snapshot().await?.state.user_record_count(&owner))
  }

  // ── Administration ────────────────────────────────────────────────────────

  async fn pause_contract(&self, caller: Identity) -> Result<()> {
    self
      .transition(move |state, now| state.propose_pause(caller, now))
      .await
  }

  async fn unpause_contract(&self, caller: Identity) -> Result<()> {
    self
      .transition(move |state, now| state.propose_unpause(caller, now))
      .await
  }

  async fn transfer_ownership(
    &self,
    caller:            Identity,
    new_administrator: Identity,
  ) -> Result<()> {
    self
      .transition(move |state, now| {
        state.propose_transfer(caller, new_administrator, now)
      })
      .await
  }

  async fn get_contract_info(&self) -> Result<ContractInfo> {
    Ok(self.snapshot().await?.state.contract_info())
  }
}
