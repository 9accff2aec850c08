//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with nanosecond precision so the
//! stored duration is exactly the difference of the stored timestamps.
//! Durations are integer nanoseconds. Categories use their canonical names.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use portaria_core::{
  IdentityNumber,
  record::{Category, Record},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Nanos, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── TimeDelta ───────────────────────────────────────────────────────────────

pub fn encode_duration(d: TimeDelta) -> Result<i64> {
  d.num_nanoseconds().ok_or(Error::DurationOverflow)
}

pub fn decode_duration(ns: i64) -> TimeDelta { TimeDelta::nanoseconds(ns) }

// ─── Category ────────────────────────────────────────────────────────────────

pub fn decode_category(s: &str) -> Result<Category> { Ok(s.parse()?) }

// ─── IdentityNumber ──────────────────────────────────────────────────────────

pub fn decode_identity(s: &str) -> Result<IdentityNumber> {
  IdentityNumber::parse(s).map_err(Error::Identity)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list shared by every `SELECT` that produces a [`RawRecord`].
pub const RECORD_COLUMNS: &str = "id, name, identity_number, block, unit, plate, category, \
                                  check_in_at, check_out_at, duration_ns";

/// Raw values read directly from a `registrations` row.
pub struct RawRecord {
  pub id:              i64,
  pub name:            String,
  pub identity_number: String,
  pub block:           String,
  pub unit:            String,
  pub plate:           Option<String>,
  pub category:        String,
  pub check_in_at:     String,
  pub check_out_at:    Option<String>,
  pub duration_ns:     Option<i64>,
}

impl RawRecord {
  /// Row mapper for a `SELECT {RECORD_COLUMNS}` statement.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      name:            row.get(1)?,
      identity_number: row.get(2)?,
      block:           row.get(3)?,
      unit:            row.get(4)?,
      plate:           row.get(5)?,
      category:        row.get(6)?,
      check_in_at:     row.get(7)?,
      check_out_at:    row.get(8)?,
      duration_ns:     row.get(9)?,
    })
  }

  pub fn into_record(self) -> Result<Record> {
    Ok(Record {
      id:              self.id,
      name:            self.name,
      identity_number: decode_identity(&self.identity_number)?,
      block:           self.block,
      unit:            self.unit,
      plate:           self.plate,
      category:        decode_category(&self.category)?,
      check_in_at:     decode_dt(&self.check_in_at)?,
      check_out_at:    self.check_out_at.as_deref().map(decode_dt).transpose()?,
      duration:        self.duration_ns.map(decode_duration),
    })
  }
}
