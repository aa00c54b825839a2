//! SQL schema for the registry's SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per record. Rows are never deleted; locator and owner are never
-- updated.
CREATE TABLE IF NOT EXISTS documents (
    record_id       TEXT PRIMARY KEY,   -- decimal u64, never '0'
    locator         TEXT NOT NULL CHECK (locator != ''),
    integrity_hash  TEXT NOT NULL,
    owner           TEXT NOT NULL,      -- 0x-prefixed address
    created_at      TEXT NOT NULL,      -- ISO 8601 UTC
    last_updated_at TEXT NOT NULL,
    active          INTEGER NOT NULL DEFAULT 1
);

-- Append-only per-owner index; position is the creation order.
CREATE TABLE IF NOT EXISTS owner_records (
    owner     TEXT    NOT NULL,
    position  INTEGER NOT NULL,
    record_id TEXT    NOT NULL UNIQUE REFERENCES documents(record_id),
    PRIMARY KEY (owner, position)
);

-- Global registry state; exactly one row.
CREATE TABLE IF NOT EXISTS registry_meta (
    singleton     INTEGER PRIMARY KEY CHECK (singleton = 1),
    creator       TEXT    NOT NULL,
    administrator TEXT    NOT NULL,
    paused        INTEGER NOT NULL DEFAULT 0,
    total_records INTEGER NOT NULL DEFAULT 0
);

-- Audit log. Strictly append-only.
CREATE TABLE IF NOT EXISTS events (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    kind         TEXT NOT NULL,   -- discriminant of RegistryEvent variant
    record_id    TEXT,            -- NULL for administrative events
    payload_json TEXT NOT NULL,   -- JSON payload (inner data only)
    recorded_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS events_record_idx ON events(record_id);

PRAGMA user_version = 1;
";
