//! Subcommand implementations. Each one issues exactly one registry call
//! (or none, for `hash`) and renders the result for printing.

use std::path::Path;

use anyhow::{Context as _, Result, bail};
use clap::Subcommand;
use docreg_core::{
  document::{Document, RecordId},
  identity::Identity,
  registry::DocumentRegistry,
};
use docreg_store_sqlite::SqliteRegistry;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Register a new document owned by the caller.
  Store {
    id:      RecordId,
    /// Opaque content locator, e.g. an IPFS CID.
    locator: String,
    /// 64-character integrity hash.
    hash:    String,
  },
  /// Show a document, active or not.
  Get { id: RecordId },
  /// Replace a document's integrity hash (owner only).
  Update { id: RecordId, hash: String },
  /// Permanently deactivate a document (owner only).
  Deactivate { id: RecordId },
  /// Check a candidate hash against the stored one.
  Verify { id: RecordId, hash: String },
  /// Existence and activity probe.
  Status { id: RecordId },
  /// List the records an owner created (defaults to the caller).
  Records {
    owner:  Option<Identity>,
    /// Only records that are still active.
    #[arg(long)]
    active: bool,
  },
  /// Total and active record counts for an owner (defaults to the caller).
  Count { owner: Option<Identity> },
  /// Block all mutating operations (administrator only).
  Pause,
  /// Lift the pause (administrator only).
  Unpause,
  /// Hand the administrator role to another identity.
  TransferOwnership { new_admin: Identity },
  /// Total records, administrator, and pause flag.
  Info,
  /// Print the audit log.
  Events {
    /// Only events with a sequence number greater than this.
    #[arg(long, default_value_t = 0)]
    after: u64,
    #[arg(long)]
    limit: Option<usize>,
  },
  /// Replay the audit log and compare it with the stored state.
  Audit,
  /// Compute the SHA-256 integrity hash of a local file.
  Hash { file: std::path::PathBuf },
}

impl Command {
  /// Whether the command can run without opening the registry.
  pub fn is_offline(&self) -> bool { matches!(self, Self::Hash { .. }) }
}

// ─── Output ───────────────────────────────────────────────────────────────────

/// Renders either pretty JSON or human-readable text.
pub struct Printer {
  pub json: bool,
}

impl Printer {
  pub fn emit<T: Serialize>(
    &self,
    value: &T,
    human: impl FnOnce() -> String,
  ) -> Result<String> {
    if self.json {
      Ok(serde_json::to_string_pretty(value)?)
    } else {
      Ok(human())
    }
  }
}

/// The line printed for a failed command. Registry rejections carry their
/// failure kind.
pub fn render_error(err: &anyhow::Error) -> String {
  let kind = err
    .downcast_ref::<docreg_store_sqlite::Error>()
    .and_then(docreg_store_sqlite::Error::registry_kind);
  match kind {
    Some(kind) => format!("rejected [{kind}]: {err:#}"),
    None => format!("error: {err:#}"),
  }
}

fn describe(doc: &Document) -> String {
  format!(
    "id:           {}\nlocator:      {}\nhash:         {}\nowner:        {}\ncreated:      {}\nlast updated: {}\nactive:       {}",
    doc.id,
    doc.locator,
    doc.integrity_hash,
    doc.owner,
    doc.created_at.to_rfc3339(),
    doc.last_updated_at.to_rfc3339(),
    doc.active,
  )
}

fn join_ids(ids: &[RecordId]) -> String {
  ids.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

/// SHA-256 of a file's contents as 64 lowercase hex characters.
pub fn hash_file(path: &Path) -> Result<String> {
  let bytes = std::fs::read(path)
    .with_context(|| format!("reading {}", path.display()))?;
  Ok(hex::encode(Sha256::digest(&bytes)))
}

pub async fn run(
  command: Command,
  registry: &SqliteRegistry,
  caller: Option<Identity>,
  out: &Printer,
) -> Result<String> {
  let require_caller = || match caller {
    Some(c) => Ok(c),
    None => bail!("this command needs a caller identity (--as or DOCREG_CALLER)"),
  };

  match command {
    Command::Store { id, locator, hash } => {
      let caller = require_caller()?;
      registry.store_document(caller, id, locator, hash).await?;
      tracing::info!(id, owner = %caller, "stored");
      out.emit(&id, || format!("stored record {id}"))
    }
    Command::Get { id } => {
      let doc = registry.get_document(id).await?;
      out.emit(&doc, || describe(&doc))
    }
    Command::Update { id, hash } => {
      registry
        .update_document_metadata(require_caller()?, id, hash)
        .await?;
      out.emit(&id, || format!("updated record {id}"))
    }
    Command::Deactivate { id } => {
      registry.deactivate_document(require_caller()?, id).await?;
      out.emit(&id, || format!("deactivated record {id}"))
    }
    Command::Verify { id, hash } => {
      let valid = registry.verify_document(id, hash).await?;
      out.emit(&valid, || if valid { "valid".into() } else { "invalid".into() })
    }
    Command::Status { id } => {
      let status = registry.record_status(id).await?;
      out.emit(&status, || {
        format!("exists: {}\nactive: {}", status.exists, status.active)
      })
    }
    Command::Records { owner, active } => {
      let owner = match owner {
        Some(o) => o,
        None => require_caller()?,
      };
      let ids = if active {
        registry.get_user_active_records(owner).await?
      } else {
        registry.get_user_records(owner).await?
      };
      out.emit(&ids, || join_ids(&ids))
    }
    Command::Count { owner } => {
      let owner = match owner {
        Some(o) => o,
        None => require_caller()?,
      };
      let count = registry.get_user_record_count(owner).await?;
      out.emit(&count, || {
        format!("total:  {}\nactive: {}", count.total, count.active)
      })
    }
    Command::Pause => {
      registry.pause_contract(require_caller()?).await?;
      out.emit(&true, || "paused".into())
    }
    Command::Unpause => {
      registry.unpause_contract(require_caller()?).await?;
      out.emit(&false, || "unpaused".into())
    }
    Command::TransferOwnership { new_admin } => {
      registry
        .transfer_ownership(require_caller()?, new_admin)
        .await?;
      out.emit(&new_admin, || format!("administrator is now {new_admin}"))
    }
    Command::Info => {
      let info = registry.get_contract_info().await?;
      out.emit(&info, || {
        format!(
          "total records: {}\nadministrator: {}\npaused:        {}",
          info.total_records, info.administrator, info.paused
        )
      })
    }
    Command::Events { after, limit } => {
      let events = registry.events(after, limit).await?;
      out.emit(&events, || {
        events
          .iter()
          .map(|e| {
            let data = e.event.to_json().unwrap_or_default();
            format!("{:>6}  {:<22} {}", e.seq, e.event.discriminant(), data)
          })
          .collect::<Vec<_>>()
          .join("\n")
      })
    }
    Command::Audit => {
      let ok = registry.audit().await?;
      if !ok {
        bail!("audit log does not reproduce the stored state");
      }
      out.emit(&ok, || "audit log matches stored state".into())
    }
    command @ Command::Hash { .. } => run_offline(command, out),
  }
}

/// Run a command that never opens the registry file.
pub fn run_offline(command: Command, out: &Printer) -> Result<String> {
  match command {
    Command::Hash { file } => {
      let digest = hash_file(&file)?;
      out.emit(&digest, || digest.clone())
    }
    other => bail!("{other:?} needs a registry"),
  }
}
