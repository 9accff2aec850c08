//! Error type for `portaria-store-sqlite`.

use portaria_core::IdentityNumber;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("corrupt row: {0}")]
  UnknownCategory(#[from] portaria_core::record::UnknownCategory),

  #[error("corrupt row: {0}")]
  Identity(#[source] portaria_core::Error),

  #[error("duration does not fit in i64 nanoseconds")]
  DurationOverflow,

  /// The `UNIQUE` constraint on `identity_number` rejected an insert.
  #[error("identity number {0} is already registered")]
  DuplicateIdentity(IdentityNumber),

  /// No visitor record with an open check-in matched a check-out.
  #[error("no open visitor record for identity number {0}")]
  NotFound(IdentityNumber),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for portaria_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::DuplicateIdentity(id) => Self::DuplicateIdentity(id),
      Error::NotFound(id) => Self::NotFound(id),
      other => Self::store(other),
    }
  }
}
