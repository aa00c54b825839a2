//! Integration tests for `SqliteRegistry` against in-memory and on-disk
//! databases.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use docreg_core::{
  clock::ManualClock,
  document::RecordStatus,
  event::RegistryEvent,
  identity::Identity,
  registry::DocumentRegistry,
};

use crate::{Error, SqliteRegistry};

const CID: &str = "QmTestCID123456789";
const HASH: &str =
  "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
const NEW_HASH: &str =
  "fedcba9876543210fedcba9876543210fedcba9876543210fedcba9876543210";

const ADMIN: Identity = Identity::from_bytes([0x01; 20]);
const ALICE: Identity = Identity::from_bytes([0xa1; 20]);
const BOB: Identity = Identity::from_bytes([0xb0; 20]);

fn start() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() }

async fn registry() -> (SqliteRegistry<Arc<ManualClock>>, Arc<ManualClock>) {
  let clock = Arc::new(ManualClock::new(start()));
  let reg = SqliteRegistry::open_in_memory_with_clock(ADMIN, clock.clone())
    .await
    .expect("in-memory registry");
  (reg, clock)
}

fn kind(err: &Error) -> Option<&'static str> { err.registry_kind() }

// ─── Initialisation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_registry_info() {
  let (r, _) = registry().await;
  let info = r.get_contract_info().await.unwrap();
  assert_eq!(info.total_records, 0);
  assert_eq!(info.administrator, ADMIN);
  assert!(!info.paused);
  assert_eq!(r.creator(), ADMIN);
  assert!(r.events(0, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn null_creator_rejected_for_new_store() {
  let err = SqliteRegistry::open_in_memory(Identity::NULL)
    .await
    .err()
    .expect("null creator must be rejected");
  assert_eq!(kind(&err), Some("InvalidAddress"));
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn store_get_verify() {
  let (r, _) = registry().await;
  r.store_document(ALICE, 1, CID.into(), HASH.into()).await.unwrap();

  let doc = r.get_document(1).await.unwrap();
  assert_eq!(doc.locator, CID);
  assert_eq!(doc.integrity_hash, HASH);
  assert_eq!(doc.owner, ALICE);
  assert_eq!(doc.last_updated_at, start());
  assert!(doc.active);

  assert_eq!(r.get_user_records(ALICE).await.unwrap(), vec![1]);
  assert!(r.verify_document(1, HASH.into()).await.unwrap());
  assert!(!r.verify_document(1, NEW_HASH.into()).await.unwrap());
  assert!(!r.verify_document(999, HASH.into()).await.unwrap());
  assert_eq!(r.get_contract_info().await.unwrap().total_records, 1);
}

#[tokio::test]
async fn validation_failures_surface_registry_kind() {
  let (r, _) = registry().await;

  let err = r.store_document(ALICE, 0, CID.into(), HASH.into()).await.unwrap_err();
  assert_eq!(kind(&err), Some("InvalidIdentifier"));

  let err = r.store_document(ALICE, 1, String::new(), HASH.into()).await.unwrap_err();
  assert_eq!(kind(&err), Some("EmptyLocator"));

  let err = r.store_document(ALICE, 1, CID.into(), "123".into()).await.unwrap_err();
  assert_eq!(kind(&err), Some("InvalidHashLength"));

  let err = r.get_document(999).await.unwrap_err();
  assert_eq!(kind(&err), Some("RecordNotFound"));
  assert_eq!(err.to_string(), "Record does not exist: 999");
}

#[tokio::test]
async fn duplicate_id_rejected_without_writing() {
  let (r, _) = registry().await;
  r.store_document(ALICE, 1, CID.into(), HASH.into()).await.unwrap();

  let err = r
    .store_document(BOB, 1, "QmAnotherCID".into(), HASH.into())
    .await
    .unwrap_err();
  assert_eq!(kind(&err), Some("DuplicateIdentifier"));

  assert_eq!(r.events(0, None).await.unwrap().len(), 1);
  assert!(r.get_user_records(BOB).await.unwrap().is_empty());
  assert_eq!(r.get_document(1).await.unwrap().owner, ALICE);
}

#[tokio::test]
async fn update_and_deactivate_lifecycle() {
  let (r, clock) = registry().await;
  r.store_document(ALICE, 1, CID.into(), HASH.into()).await.unwrap();
  r.store_document(ALICE, 2, CID.into(), HASH.into()).await.unwrap();

  let err = r
    .update_document_metadata(BOB, 1, NEW_HASH.into())
    .await
    .unwrap_err();
  assert_eq!(kind(&err), Some("NotRecordOwner"));

  clock.advance(Duration::seconds(60));
  r.update_document_metadata(ALICE, 1, NEW_HASH.into()).await.unwrap();
  let doc = r.get_document(1).await.unwrap();
  assert_eq!(doc.integrity_hash, NEW_HASH);
  assert_eq!(doc.last_updated_at, start() + Duration::seconds(60));

  r.deactivate_document(ALICE, 1).await.unwrap();
  assert_eq!(
    r.record_status(1).await.unwrap(),
    RecordStatus { exists: true, active: false }
  );
  let err = r.deactivate_document(ALICE, 1).await.unwrap_err();
  assert_eq!(kind(&err), Some("AlreadyInactive"));

  assert_eq!(r.get_user_records(ALICE).await.unwrap(), vec![1, 2]);
  assert_eq!(r.get_user_active_records(ALICE).await.unwrap(), vec![2]);
  let count = r.get_user_record_count(ALICE).await.unwrap();
  assert_eq!((count.total, count.active), (2, 1));
}

// ─── Administration ──────────────────────────────────────────────────────────

#[tokio::test]
async fn pause_blocks_writes() {
  let (r, _) = registry().await;
  r.store_document(ALICE, 1, CID.into(), HASH.into()).await.unwrap();

  let err = r.pause_contract(ALICE).await.unwrap_err();
  assert_eq!(kind(&err), Some("NotAuthorized"));

  r.pause_contract(ADMIN).await.unwrap();
  assert!(r.get_contract_info().await.unwrap().paused);

  let err = r.store_document(ALICE, 2, CID.into(), HASH.into()).await.unwrap_err();
  assert_eq!(kind(&err), Some("SystemPaused"));
  let err = r.update_document_metadata(ALICE, 1, NEW_HASH.into()).await.unwrap_err();
  assert_eq!(kind(&err), Some("SystemPaused"));
  let err = r.deactivate_document(ALICE, 1).await.unwrap_err();
  assert_eq!(kind(&err), Some("SystemPaused"));

  assert!(r.verify_document(1, HASH.into()).await.unwrap());

  r.unpause_contract(ADMIN).await.unwrap();
  r.store_document(ALICE, 2, CID.into(), HASH.into()).await.unwrap();
}

#[tokio::test]
async fn transfer_ownership_hands_over_admin_rights() {
  let (r, _) = registry().await;

  let err = r.transfer_ownership(ADMIN, Identity::NULL).await.unwrap_err();
  assert_eq!(kind(&err), Some("InvalidAddress"));

  r.transfer_ownership(ADMIN, BOB).await.unwrap();
  assert_eq!(r.get_contract_info().await.unwrap().administrator, BOB);

  let err = r.pause_contract(ADMIN).await.unwrap_err();
  assert_eq!(kind(&err), Some("NotAuthorized"));
  r.pause_contract(BOB).await.unwrap();
}

// ─── Event log ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn events_are_sequenced_in_commit_order() {
  let (r, clock) = registry().await;
  r.store_document(ALICE, 1, CID.into(), HASH.into()).await.unwrap();
  clock.advance(Duration::seconds(1));
  r.update_document_metadata(ALICE, 1, NEW_HASH.into()).await.unwrap();
  r.deactivate_document(ALICE, 1).await.unwrap();
  r.pause_contract(ADMIN).await.unwrap();

  let log = r.events(0, None).await.unwrap();
  let seqs: Vec<_> = log.iter().map(|e| e.seq).collect();
  assert_eq!(seqs, [1, 2, 3, 4]);

  assert_eq!(log[0].event, RegistryEvent::DocumentStored {
    id:             1,
    owner:          ALICE,
    locator:        CID.into(),
    integrity_hash: HASH.into(),
    timestamp:      start(),
  });
  assert_eq!(log[1].event, RegistryEvent::DocumentUpdated {
    id:                 1,
    owner:              ALICE,
    new_integrity_hash: NEW_HASH.into(),
    timestamp:          start() + Duration::seconds(1),
  });
  assert!(matches!(log[2].event, RegistryEvent::DocumentDeactivated { id: 1, .. }));
  assert!(matches!(log[3].event, RegistryEvent::ContractPaused { administrator, .. } if administrator == ADMIN));

  let tail = r.events(2, Some(1)).await.unwrap();
  assert_eq!(tail.len(), 1);
  assert_eq!(tail[0].seq, 3);
}

#[tokio::test]
async fn audit_replays_log_to_same_state() {
  let (r, _) = registry().await;
  r.store_document(ALICE, 1, CID.into(), HASH.into()).await.unwrap();
  r.store_document(BOB, 2, CID.into(), HASH.into()).await.unwrap();
  r.update_document_metadata(BOB, 2, NEW_HASH.into()).await.unwrap();
  r.deactivate_document(ALICE, 1).await.unwrap();
  r.transfer_ownership(ADMIN, ALICE).await.unwrap();
  r.pause_contract(ALICE).await.unwrap();

  assert!(r.audit().await.unwrap());
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn reopen_restores_committed_state() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("registry.db");

  {
    let r = SqliteRegistry::open(&path, ADMIN).await.unwrap();
    for id in [5, 3, 8] {
      r.store_document(ALICE, id, CID.into(), HASH.into()).await.unwrap();
    }
    r.store_document(BOB, 4, CID.into(), HASH.into()).await.unwrap();
    r.update_document_metadata(ALICE, 3, NEW_HASH.into()).await.unwrap();
    r.deactivate_document(ALICE, 8).await.unwrap();
    r.transfer_ownership(ADMIN, BOB).await.unwrap();
    r.pause_contract(BOB).await.unwrap();
  }

  // The creator argument only matters for a brand-new file.
  let r = SqliteRegistry::open(&path, ALICE).await.unwrap();
  assert_eq!(r.creator(), ADMIN);

  let info = r.get_contract_info().await.unwrap();
  assert_eq!(info.total_records, 4);
  assert_eq!(info.administrator, BOB);
  assert!(info.paused);

  assert_eq!(r.get_user_records(ALICE).await.unwrap(), vec![5, 3, 8]);
  assert_eq!(r.get_user_active_records(ALICE).await.unwrap(), vec![5, 3]);
  assert_eq!(r.get_user_records(BOB).await.unwrap(), vec![4]);
  assert!(r.verify_document(3, NEW_HASH.into()).await.unwrap());
  assert!(!r.get_document(8).await.unwrap().active);

  assert_eq!(r.events(0, None).await.unwrap().len(), 8);
  assert!(r.audit().await.unwrap());
}

// ─── Shared files ────────────────────────────────────────────────────────────

async fn two_handles() -> (tempfile::TempDir, SqliteRegistry, SqliteRegistry) {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("registry.db");
  let a = SqliteRegistry::open(&path, ADMIN).await.unwrap();
  let b = SqliteRegistry::open(&path, ADMIN).await.unwrap();
  (dir, a, b)
}

#[tokio::test]
async fn pause_through_one_handle_gates_writes_through_another() {
  let (_dir, a, b) = two_handles().await;

  b.pause_contract(ADMIN).await.unwrap();
  let err = a
    .store_document(ALICE, 1, CID.into(), HASH.into())
    .await
    .unwrap_err();
  assert_eq!(kind(&err), Some("SystemPaused"));

  assert!(a.get_contract_info().await.unwrap().paused);
  assert_eq!(a.record_status(1).await.unwrap(), RecordStatus::default());
  assert_eq!(b.get_contract_info().await.unwrap().total_records, 0);

  a.unpause_contract(ADMIN).await.unwrap();
  b.store_document(ALICE, 1, CID.into(), HASH.into()).await.unwrap();
  assert!(!a.get_contract_info().await.unwrap().paused);
}

#[tokio::test]
async fn handles_on_one_file_check_rules_against_each_others_commits() {
  let (_dir, a, b) = two_handles().await;

  a.store_document(ALICE, 1, CID.into(), HASH.into()).await.unwrap();

  let err = b
    .store_document(BOB, 1, CID.into(), NEW_HASH.into())
    .await
    .unwrap_err();
  assert_eq!(kind(&err), Some("DuplicateIdentifier"));

  let err = b
    .update_document_metadata(BOB, 1, NEW_HASH.into())
    .await
    .unwrap_err();
  assert_eq!(kind(&err), Some("NotRecordOwner"));

  b.update_document_metadata(ALICE, 1, NEW_HASH.into()).await.unwrap();
  assert!(a.verify_document(1, NEW_HASH.into()).await.unwrap());

  a.deactivate_document(ALICE, 1).await.unwrap();
  let err = b.deactivate_document(ALICE, 1).await.unwrap_err();
  assert_eq!(kind(&err), Some("AlreadyInactive"));

  a.transfer_ownership(ADMIN, BOB).await.unwrap();
  let err = b.pause_contract(ADMIN).await.unwrap_err();
  assert_eq!(kind(&err), Some("NotAuthorized"));
  assert_eq!(b.get_contract_info().await.unwrap().administrator, BOB);

  assert_eq!(a.events(0, None).await.unwrap().len(), 4);
  assert!(a.audit().await.unwrap());
  assert!(b.audit().await.unwrap());
}

#[tokio::test]
async fn racing_duplicate_ids_across_handles_admit_exactly_one() {
  let (_dir, a, b) = two_handles().await;

  let mut handles = Vec::new();
  for (i, owner) in [ALICE, BOB, ALICE, BOB].into_iter().enumerate() {
    let r = if i % 2 == 0 { a.clone() } else { b.clone() };
    handles.push(tokio::spawn(async move {
      r.store_document(owner, 7, CID.into(), HASH.into()).await
    }));
  }

  let mut ok = 0;
  for h in handles {
    match h.await.unwrap() {
      Ok(()) => ok += 1,
      Err(e) => assert_eq!(kind(&e), Some("DuplicateIdentifier")),
    }
  }
  assert_eq!(ok, 1);
  assert_eq!(b.get_contract_info().await.unwrap().total_records, 1);
  assert!(a.audit().await.unwrap());
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_writers_are_serialized() {
  let (r, _) = registry().await;

  let mut handles = Vec::new();
  for id in 1..=16u64 {
    let r = r.clone();
    let owner = if id % 2 == 0 { ALICE } else { BOB };
    handles.push(tokio::spawn(async move {
      r.store_document(owner, id, CID.into(), HASH.into()).await
    }));
  }
  for h in handles {
    h.await.unwrap().unwrap();
  }

  assert_eq!(r.get_contract_info().await.unwrap().total_records, 16);
  assert_eq!(r.get_user_record_count(ALICE).await.unwrap().total, 8);
  assert_eq!(r.get_user_record_count(BOB).await.unwrap().total, 8);
  assert!(r.audit().await.unwrap());
}

#[tokio::test]
async fn racing_duplicate_ids_admit_exactly_one() {
  let (r, _) = registry().await;

  let mut handles = Vec::new();
  for owner in [ALICE, BOB, ADMIN, ALICE, BOB] {
    let r = r.clone();
    handles.push(tokio::spawn(async move {
      r.store_document(owner, 7, CID.into(), HASH.into()).await
    }));
  }

  let mut ok = 0;
  for h in handles {
    match h.await.unwrap() {
      Ok(()) => ok += 1,
      Err(e) => assert_eq!(kind(&e), Some("DuplicateIdentifier")),
    }
  }
  assert_eq!(ok, 1);
  assert_eq!(r.events(0, None).await.unwrap().len(), 1);
}
