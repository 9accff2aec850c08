//! Registration records, one row per registered person or visit.
//!
//! A record is written once at check-in. The only mutation it ever sees is
//! the check-out transition, and only visitors have one.

use std::{fmt, str::FromStr};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityNumber;

/// Sentinel unit for roles that are not attached to an apartment.
pub const NO_UNIT: &str = "N/A";

// ─── Category ────────────────────────────────────────────────────────────────

/// The fixed role classification of a registered person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  Resident,
  Visitor,
  Employee,
  DeliveryAgent,
  ServiceProvider,
}

impl Category {
  pub const ALL: [Category; 5] = [
    Self::Resident,
    Self::Visitor,
    Self::Employee,
    Self::DeliveryAgent,
    Self::ServiceProvider,
  ];

  /// Canonical name stored in the `category` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Resident => "resident",
      Self::Visitor => "visitor",
      Self::Employee => "employee",
      Self::DeliveryAgent => "delivery_agent",
      Self::ServiceProvider => "service_provider",
    }
  }

  /// Portuguese label shown at the gatehouse and sent as `tipo` over HTTP.
  pub fn label(self) -> &'static str {
    match self {
      Self::Resident => "morador",
      Self::Visitor => "visitante",
      Self::Employee => "funcionário",
      Self::DeliveryAgent => "entregador",
      Self::ServiceProvider => "prestador de serviço",
    }
  }

  /// Only visitors leave; every other category stays checked in.
  pub fn can_check_out(self) -> bool { matches!(self, Self::Visitor) }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0:?}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
  type Err = UnknownCategory;

  /// Accepts the canonical names as well as the Portuguese labels, with or
  /// without accents, in any case.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "resident" | "morador" => Ok(Self::Resident),
      "visitor" | "visitante" => Ok(Self::Visitor),
      "employee" | "funcionário" | "funcionario" => Ok(Self::Employee),
      "delivery_agent" | "entregador" => Ok(Self::DeliveryAgent),
      "service_provider" | "prestador de serviço" | "prestador de servico" => {
        Ok(Self::ServiceProvider)
      }
      _ => Err(UnknownCategory(s.to_owned())),
    }
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// Where a record sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
  CheckedIn,
  CheckedOut,
}

/// A persisted registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  /// Store-assigned surrogate key.
  pub id:              i64,
  pub name:            String,
  pub identity_number: IdentityNumber,
  pub block:           String,
  pub unit:            String,
  /// Upper-cased vehicle plate, present only when a vehicle was declared.
  pub plate:           Option<String>,
  pub category:        Category,
  pub check_in_at:     DateTime<Utc>,
  pub check_out_at:    Option<DateTime<Utc>>,
  /// Always `check_out_at - check_in_at` when set.
  #[serde(with = "duration_nanos")]
  pub duration:        Option<TimeDelta>,
}

impl Record {
  pub fn status(&self) -> PresenceStatus {
    if self.check_out_at.is_some() {
      PresenceStatus::CheckedOut
    } else {
      PresenceStatus::CheckedIn
    }
  }

  /// A visitor that has not yet left.
  pub fn is_open_visit(&self) -> bool {
    self.category.can_check_out() && self.status() == PresenceStatus::CheckedIn
  }
}

// ─── NewRecord ───────────────────────────────────────────────────────────────

/// Input to [`crate::store::RegistrationStore::insert`]: a record that has
/// been validated and normalised but not yet assigned an id.
#[derive(Debug, Clone)]
pub struct NewRecord {
  pub name:            String,
  pub identity_number: IdentityNumber,
  pub block:           String,
  pub unit:            String,
  pub plate:           Option<String>,
  pub category:        Category,
  pub check_in_at:     DateTime<Utc>,
}

impl NewRecord {
  pub fn into_record(self, id: i64) -> Record {
    Record {
      id,
      name: self.name,
      identity_number: self.identity_number,
      block: self.block,
      unit: self.unit,
      plate: self.plate,
      category: self.category,
      check_in_at: self.check_in_at,
      check_out_at: None,
      duration: None,
    }
  }
}

// ─── Registration ────────────────────────────────────────────────────────────

/// Raw field values collected by a shell, before validation.
#[derive(Debug, Clone)]
pub struct Registration {
  pub name:            String,
  /// Unparsed identity number as typed by the operator.
  pub identity_number: String,
  pub block:           String,
  pub unit:            String,
  pub category:        Category,
  pub has_vehicle:     bool,
  pub plate:           Option<String>,
}

/// Render a stay as `H:MM:SS`, hours unbounded. Sub-second remainders are
/// dropped and negative spans render as zero.
pub fn format_stay(d: TimeDelta) -> String {
  let secs = d.num_seconds().max(0);
  format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}

/// Serialises `Option<TimeDelta>` as integer nanoseconds.
mod duration_nanos {
  use chrono::TimeDelta;
  use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::Error as _};

  pub fn serialize<S: Serializer>(d: &Option<TimeDelta>, s: S) -> Result<S::Ok, S::Error> {
    d.map(|d| d.num_nanoseconds().ok_or_else(|| S::Error::custom("duration overflows i64 nanoseconds")))
      .transpose()?
      .serialize(s)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<TimeDelta>, D::Error> {
    Ok(Option::<i64>::deserialize(d)?.map(TimeDelta::nanoseconds))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn category_parses_canonical_and_portuguese_names() {
    for c in Category::ALL {
      assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
      assert_eq!(c.label().parse::<Category>().unwrap(), c);
    }
    assert_eq!("Funcionario".parse::<Category>().unwrap(), Category::Employee);
    assert_eq!(" VISITANTE ".parse::<Category>().unwrap(), Category::Visitor);
    assert!("zelador".parse::<Category>().is_err());
  }

  #[test]
  fn only_visitors_can_check_out() {
    assert!(Category::Visitor.can_check_out());
    assert!(
      Category::ALL
        .iter()
        .filter(|c| c.can_check_out())
        .eq([Category::Visitor].iter())
    );
  }

  #[test]
  fn stays_render_as_hours_minutes_seconds() {
    assert_eq!(format_stay(TimeDelta::zero()), "0:00:00");
    assert_eq!(format_stay(TimeDelta::milliseconds(1500)), "0:00:01");
    assert_eq!(format_stay(TimeDelta::seconds(3 * 3600 + 7 * 60 + 5)), "3:07:05");
    assert_eq!(format_stay(TimeDelta::hours(26)), "26:00:00");
    assert_eq!(format_stay(TimeDelta::seconds(-5)), "0:00:00");
  }

  #[test]
  fn record_serialises_duration_as_nanoseconds() {
    let at = Utc::now();
    let record = Record {
      id:              1,
      name:            "Ana".into(),
      identity_number: IdentityNumber::parse("111.444.777-35").unwrap(),
      block:           "A".into(),
      unit:            "101".into(),
      plate:           None,
      category:        Category::Visitor,
      check_in_at:     at,
      check_out_at:    Some(at + TimeDelta::seconds(90)),
      duration:        Some(TimeDelta::seconds(90)),
    };
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["duration"], 90_000_000_000_i64);
    assert_eq!(json["category"], "visitor");

    let back: Record = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
    assert_eq!(back.status(), PresenceStatus::CheckedOut);
    assert!(!back.is_open_visit());
  }
}
