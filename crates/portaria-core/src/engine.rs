//! The presence engine: registration, visitor check-out, and listings.
//!
//! Per-record state machine:
//!
//! ```text
//! NEW ──register──▶ CHECKED_IN ──check_out (visitors only)──▶ CHECKED_OUT
//! ```
//!
//! `CHECKED_IN` is terminal for every category except visitors.

use chrono::{TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  identity::IdentityNumber,
  record::{Category, NewRecord, Record, Registration},
  store::RegistrationStore,
};

/// Business rules over a [`RegistrationStore`].
///
/// The store handle is owned by the engine for its whole lifetime; shells
/// share one engine (behind an `Arc` where needed) rather than opening
/// connections of their own.
#[derive(Debug, Clone)]
pub struct PresenceEngine<S> {
  store: S,
}

impl<S: RegistrationStore> PresenceEngine<S> {
  pub fn new(store: S) -> Self { Self { store } }

  pub fn store(&self) -> &S { &self.store }

  /// Give the store back, e.g. to close it on shutdown.
  pub fn into_store(self) -> S { self.store }

  /// Register a person and stamp their check-in time.
  ///
  /// The identity number and required fields are validated before any I/O.
  /// The duplicate lookup is only a pre-check; the store's uniqueness
  /// constraint decides when two registrations race.
  pub async fn register(&self, input: Registration) -> Result<Record> {
    let identity_number = IdentityNumber::parse(&input.identity_number).inspect_err(|_| {
      warn!(category = %input.category, "rejected registration with invalid identity number");
    })?;

    let name = required("name", &input.name)?;
    let block = required("block", &input.block)?;
    let unit = required("unit", &input.unit)?;

    if self.lookup(&identity_number).await?.is_some() {
      warn!(%identity_number, "identity number already registered");
      return Err(Error::DuplicateIdentity(identity_number));
    }

    let plate = if input.has_vehicle {
      input
        .plate
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_uppercase)
    } else {
      None
    };

    let new = NewRecord {
      name,
      identity_number,
      block,
      unit,
      plate,
      category: input.category,
      check_in_at: Utc::now(),
    };

    let record = self.store.insert(new).await.map_err(Into::into)?;
    info!(
      id = record.id,
      identity_number = %record.identity_number,
      category = %record.category,
      "checked in"
    );
    Ok(record)
  }

  /// Close an open visitor record and compute the length of the stay.
  ///
  /// Unknown identity numbers, non-visitors and visitors who already left
  /// all fail with [`Error::NotFound`].
  pub async fn check_out(&self, identity_number: &str) -> Result<Record> {
    let identity_number = IdentityNumber::parse(identity_number)?;

    let open = match self.lookup(&identity_number).await? {
      Some(record) if record.is_open_visit() => record,
      _ => {
        debug!(%identity_number, "no open visit to close");
        return Err(Error::NotFound(identity_number));
      }
    };

    // A stay is always positive, even if the wall clock stepped back since
    // check-in.
    let check_out_at = Utc::now().max(open.check_in_at + TimeDelta::nanoseconds(1));
    let duration = check_out_at - open.check_in_at;

    let record = self
      .store
      .update_checkout(&identity_number, check_out_at, duration)
      .await
      .map_err(Into::into)?;
    info!(
      id = record.id,
      %identity_number,
      duration_secs = duration.num_seconds(),
      "checked out"
    );
    Ok(record)
  }

  /// Read-only lookup by identity number.
  pub async fn lookup(&self, identity_number: &IdentityNumber) -> Result<Option<Record>> {
    debug!(%identity_number, "lookup");
    self
      .store
      .find_by_identity(identity_number)
      .await
      .map_err(Into::into)
  }

  /// All records, or only those of `category`, in creation order.
  pub async fn list_records(&self, category: Option<Category>) -> Result<Vec<Record>> {
    self.store.list(category).await.map_err(Into::into)
  }
}

fn required(field: &'static str, value: &str) -> Result<String> {
  let value = value.trim();
  if value.is_empty() {
    return Err(Error::EmptyField(field));
  }
  Ok(value.to_owned())
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  };

  use chrono::DateTime;

  use super::*;

  /// In-memory store that counts every call it receives.
  #[derive(Default)]
  struct MemoryStore {
    rows:  Mutex<Vec<Record>>,
    calls: AtomicUsize,
  }

  impl MemoryStore {
    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
  }

  impl RegistrationStore for MemoryStore {
    type Error = Error;

    async fn insert(&self, record: NewRecord) -> Result<Record> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let mut rows = self.rows.lock().unwrap();
      if rows.iter().any(|r| r.identity_number == record.identity_number) {
        return Err(Error::DuplicateIdentity(record.identity_number));
      }
      let record = record.into_record(rows.len() as i64 + 1);
      rows.push(record.clone());
      Ok(record)
    }

    async fn find_by_identity(&self, identity_number: &IdentityNumber) -> Result<Option<Record>> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let rows = self.rows.lock().unwrap();
      Ok(rows.iter().find(|r| &r.identity_number == identity_number).cloned())
    }

    async fn update_checkout(
      &self,
      identity_number: &IdentityNumber,
      check_out_at: DateTime<Utc>,
      duration: TimeDelta,
    ) -> Result<Record> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let mut rows = self.rows.lock().unwrap();
      let row = rows
        .iter_mut()
        .find(|r| &r.identity_number == identity_number && r.is_open_visit())
        .ok_or_else(|| Error::NotFound(identity_number.clone()))?;
      row.check_out_at = Some(check_out_at);
      row.duration = Some(duration);
      Ok(row.clone())
    }

    async fn list(&self, category: Option<Category>) -> Result<Vec<Record>> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let rows = self.rows.lock().unwrap();
      Ok(
        rows
          .iter()
          .filter(|r| category.is_none_or(|c| r.category == c))
          .cloned()
          .collect(),
      )
    }
  }

  fn registration(name: &str, cpf: &str, category: Category) -> Registration {
    Registration {
      name: name.into(),
      identity_number: cpf.into(),
      block: "A".into(),
      unit: "101".into(),
      category,
      has_vehicle: false,
      plate: None,
    }
  }

  fn engine() -> PresenceEngine<MemoryStore> { PresenceEngine::new(MemoryStore::default()) }

  #[tokio::test]
  async fn register_stamps_check_in_and_leaves_check_out_open() {
    let e = engine();
    let before = Utc::now();
    let r = e
      .register(registration("Ana", "111.444.777-35", Category::Visitor))
      .await
      .unwrap();
    assert_eq!(r.identity_number.as_str(), "11144477735");
    assert!(r.check_in_at >= before);
    assert!(r.check_out_at.is_none());
    assert!(r.duration.is_none());
  }

  #[tokio::test]
  async fn second_registration_with_same_identity_is_rejected() {
    let e = engine();
    e.register(registration("Ana", "111.444.777-35", Category::Visitor))
      .await
      .unwrap();

    let mut other = registration("Someone Else", "11144477735", Category::Resident);
    other.block = "B".into();
    let err = e.register(other).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateIdentity(_)), "{err:?}");
    assert_eq!(e.list_records(None).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn invalid_identity_never_reaches_the_store() {
    let e = engine();
    let err = e
      .register(registration("Ana", "111.111.111-11", Category::Visitor))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidIdentity(_)));
    assert_eq!(e.store().calls(), 0);
  }

  #[tokio::test]
  async fn empty_required_field_is_rejected_before_io() {
    let e = engine();
    let mut r = registration("  ", "111.444.777-35", Category::Resident);
    assert!(matches!(e.register(r.clone()).await, Err(Error::EmptyField("name"))));
    r.name = "Ana".into();
    r.unit = String::new();
    assert!(matches!(e.register(r).await, Err(Error::EmptyField("unit"))));
    assert_eq!(e.store().calls(), 0);
  }

  #[tokio::test]
  async fn plate_is_uppercased_only_when_vehicle_declared() {
    let e = engine();
    let mut with_car = registration("Ana", "111.444.777-35", Category::Resident);
    with_car.has_vehicle = true;
    with_car.plate = Some(" abc-1234 ".into());
    assert_eq!(e.register(with_car).await.unwrap().plate.as_deref(), Some("ABC-1234"));

    let mut no_car = registration("Bia", "529.982.247-25", Category::Resident);
    no_car.plate = Some("xyz-9999".into());
    assert_eq!(e.register(no_car).await.unwrap().plate, None);

    let mut blank = registration("Caio", "123.456.789-09", Category::Resident);
    blank.has_vehicle = true;
    blank.plate = Some("   ".into());
    assert_eq!(e.register(blank).await.unwrap().plate, None);
  }

  #[tokio::test]
  async fn check_out_sets_duration_once() {
    let e = engine();
    let r = e
      .register(registration("Ana", "111.444.777-35", Category::Visitor))
      .await
      .unwrap();

    let out = e.check_out("11144477735").await.unwrap();
    let check_out_at = out.check_out_at.unwrap();
    assert!(check_out_at > r.check_in_at);
    assert_eq!(out.duration, Some(check_out_at - out.check_in_at));
    assert!(out.duration.unwrap() > TimeDelta::zero());

    let again = e.check_out("111.444.777-35").await.unwrap_err();
    assert!(matches!(again, Error::NotFound(_)));
  }

  #[tokio::test]
  async fn check_out_stays_positive_when_clock_steps_back() {
    let e = engine();
    let check_in_at = Utc::now() + TimeDelta::hours(1);
    e.store()
      .insert(NewRecord {
        name: "Ana".into(),
        identity_number: IdentityNumber::parse("111.444.777-35").unwrap(),
        block: "A".into(),
        unit: "101".into(),
        plate: None,
        category: Category::Visitor,
        check_in_at,
      })
      .await
      .unwrap();

    let out = e.check_out("11144477735").await.unwrap();
    assert!(out.check_out_at.unwrap() > check_in_at);
    assert_eq!(out.duration, Some(TimeDelta::nanoseconds(1)));
  }

  #[tokio::test]
  async fn check_out_rejects_unknown_and_non_visitors() {
    let e = engine();
    assert!(matches!(e.check_out("111.444.777-35").await, Err(Error::NotFound(_))));

    e.register(registration("Rui", "529.982.247-25", Category::Resident))
      .await
      .unwrap();
    assert!(matches!(e.check_out("52998224725").await, Err(Error::NotFound(_))));

    let rui = e.list_records(None).await.unwrap().remove(0);
    assert!(rui.check_out_at.is_none());
    assert!(rui.duration.is_none());
  }

  #[tokio::test]
  async fn check_out_with_malformed_identity_is_invalid() {
    let e = engine();
    assert!(matches!(e.check_out("123").await, Err(Error::InvalidIdentity(_))));
    assert_eq!(e.store().calls(), 0);
  }

  #[tokio::test]
  async fn list_records_filters_by_category_in_creation_order() {
    let e = engine();
    e.register(registration("Rui", "529.982.247-25", Category::Resident))
      .await
      .unwrap();
    e.register(registration("Ana", "111.444.777-35", Category::Visitor))
      .await
      .unwrap();
    e.register(registration("Lia", "123.456.789-09", Category::Resident))
      .await
      .unwrap();

    let residents = e.list_records(Some(Category::Resident)).await.unwrap();
    assert_eq!(
      residents.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
      ["Rui", "Lia"]
    );

    let all = e.list_records(None).await.unwrap();
    assert_eq!(
      all.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
      ["Rui", "Ana", "Lia"]
    );
  }
}
