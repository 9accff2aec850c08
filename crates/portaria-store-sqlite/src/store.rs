//! SQLite implementation of [`RegistrationStore`].

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use portaria_core::{
  IdentityNumber,
  record::{Category, NewRecord, Record},
  store::RegistrationStore,
};
use rusqlite::OptionalExtension as _;
use tracing::{debug, info};

use crate::{
  Error, Result,
  encode::{RECORD_COLUMNS, RawRecord, encode_dt, encode_duration},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A registration store backed by a single SQLite file.
///
/// Clones share one reference-counted connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    debug!("opening database at {}", path.display());
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    info!("database ready at {}", path.display());
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Close the underlying connection, flushing any pending work.
  ///
  /// Every clone shares the connection, so this closes it for all of them.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    debug!("database closed");
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── RegistrationStore impl ──────────────────────────────────────────────────

impl RegistrationStore for SqliteStore {
  type Error = Error;

  async fn insert(&self, record: NewRecord) -> Result<Record> {
    let name_str     = record.name.clone();
    let identity_str = record.identity_number.as_str().to_owned();
    let block_str    = record.block.clone();
    let unit_str     = record.unit.clone();
    let plate        = record.plate.clone();
    let category_str = record.category.as_str();
    let at_str       = encode_dt(record.check_in_at);

    // `None` means the UNIQUE constraint rejected the row.
    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO registrations (
             name, identity_number, block, unit, plate, category, check_in_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            name_str,
            identity_str,
            block_str,
            unit_str,
            plate,
            category_str,
            at_str,
          ],
        );
        match inserted {
          Ok(_) => Ok(Some(conn.last_insert_rowid())),
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
          {
            Ok(None)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    match id {
      Some(id) => Ok(record.into_record(id)),
      None => Err(Error::DuplicateIdentity(record.identity_number)),
    }
  }

  async fn find_by_identity(&self, identity_number: &IdentityNumber) -> Result<Option<Record>> {
    let identity_str = identity_number.as_str().to_owned();

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {RECORD_COLUMNS} FROM registrations WHERE identity_number = ?1"),
              rusqlite::params![identity_str],
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn update_checkout(
    &self,
    identity_number: &IdentityNumber,
    check_out_at: DateTime<Utc>,
    duration: TimeDelta,
  ) -> Result<Record> {
    let identity_str = identity_number.as_str().to_owned();
    let at_str       = encode_dt(check_out_at);
    let duration_ns  = encode_duration(duration)?;

    // One conditional statement: a visitor can only ever be closed once, even
    // if two shells race on the same check-out.
    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "UPDATE registrations
                 SET check_out_at = ?2, duration_ns = ?3
                 WHERE identity_number = ?1
                   AND category = 'visitor'
                   AND check_out_at IS NULL
                 RETURNING {RECORD_COLUMNS}"
              ),
              rusqlite::params![identity_str, at_str, duration_ns],
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      Some(raw) => raw.into_record(),
      None => Err(Error::NotFound(identity_number.clone())),
    }
  }

  async fn list(&self, category: Option<Category>) -> Result<Vec<Record>> {
    let category_str = category.map(Category::as_str);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(c) = category_str {
          let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM registrations WHERE category = ?1 ORDER BY id"
          ))?;
          stmt
            .query_map(rusqlite::params![c], RawRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt =
            conn.prepare(&format!("SELECT {RECORD_COLUMNS} FROM registrations ORDER BY id"))?;
          stmt
            .query_map([], RawRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }
}
