//! Error types for `portaria-core`.

use thiserror::Error;

use crate::identity::IdentityNumber;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid identity number: {0:?}")]
  InvalidIdentity(String),

  #[error("required field is empty: {0}")]
  EmptyField(&'static str),

  #[error("identity number {0} is already registered")]
  DuplicateIdentity(IdentityNumber),

  /// No open visitor record exists for this identity number. Also covers a
  /// visitor that has already checked out.
  #[error("no open visitor record for identity number {0}")]
  NotFound(IdentityNumber),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend failure that has no domain meaning.
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
