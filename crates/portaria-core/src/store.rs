//! The `RegistrationStore` trait.
//!
//! Implemented by storage backends (e.g. `portaria-store-sqlite`). The
//! [`PresenceEngine`](crate::PresenceEngine) depends on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
  identity::IdentityNumber,
  record::{Category, NewRecord, Record},
};

/// Abstraction over a registration table keyed by identity number.
///
/// The backend, not the engine, is the authority on identity uniqueness: two
/// shells may write to the same store concurrently, so `insert` must reject a
/// duplicate even when the engine's pre-check raced past it.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait RegistrationStore: Send + Sync {
  /// Backend error. Converting into [`crate::Error`] must preserve the
  /// `DuplicateIdentity` and `NotFound` outcomes.
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  /// Persist a new record and return it with its assigned id.
  ///
  /// Fails with a duplicate-identity error if the identity number is already
  /// present; the existing row is never overwritten.
  fn insert(
    &self,
    record: NewRecord,
  ) -> impl Future<Output = Result<Record, Self::Error>> + Send + '_;

  /// Look up the record for `identity_number`. Returns `None` if absent.
  fn find_by_identity<'a>(
    &'a self,
    identity_number: &'a IdentityNumber,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + 'a;

  /// Close an open visitor record, setting `check_out_at` and `duration`
  /// together in one write, and return the updated record.
  ///
  /// Fails with a not-found error unless a visitor record with no check-out
  /// exists for `identity_number`.
  fn update_checkout<'a>(
    &'a self,
    identity_number: &'a IdentityNumber,
    check_out_at: DateTime<Utc>,
    duration: TimeDelta,
  ) -> impl Future<Output = Result<Record, Self::Error>> + Send + 'a;

  /// List all records, optionally filtered by category, in insertion order.
  fn list(
    &self,
    category: Option<Category>,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + '_;
}
