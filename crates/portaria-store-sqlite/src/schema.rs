//! SQL schema for the Portaria SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Uniqueness of `identity_number` and the check-out invariants live here,
/// not only in the engine, because the console and the HTTP server may both
/// have the file open at once.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS registrations (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL CHECK (name <> ''),
    identity_number TEXT NOT NULL UNIQUE CHECK (length(identity_number) = 11),
    block           TEXT NOT NULL CHECK (block <> ''),
    unit            TEXT NOT NULL CHECK (unit <> ''),
    plate           TEXT,
    category        TEXT NOT NULL,   -- 'resident' | 'visitor' | 'employee' | 'delivery_agent' | 'service_provider'
    check_in_at     TEXT NOT NULL,   -- RFC 3339 UTC, nanosecond precision
    check_out_at    TEXT,            -- set once, visitors only
    duration_ns     INTEGER,         -- check_out_at - check_in_at
    CHECK ((check_out_at IS NULL) = (duration_ns IS NULL)),
    CHECK (check_out_at IS NULL OR category = 'visitor')
);

CREATE INDEX IF NOT EXISTS registrations_category_idx ON registrations(category);

PRAGMA user_version = 1;
";
