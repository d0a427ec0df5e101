//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order in SQL matches chronological
//! order. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use roadwatch_core::incident::{Incident, IncidentType, Interaction};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Column lists ─────────────────────────────────────────────────────────────

pub const TYPE_COLUMNS: &str = "type_id, name, description,
  lifetime_without_confirmation, global_lifetime,
  negative_reports_threshold, positive_reports_threshold, need_recalculation";

pub const INCIDENT_COLUMNS: &str =
  "incident_id, type_id, user_id, latitude, longitude, created_at, updated_at, deleted_at";

pub const INTERACTION_COLUMNS: &str =
  "interaction_id, incident_id, user_id, is_still_present, created_at";

// ─── Raw rows ─────────────────────────────────────────────────────────────────

/// Raw row from `incident_types`.
pub struct RawType {
  pub type_id:                       i64,
  pub name:                          String,
  pub description:                   Option<String>,
  pub lifetime_without_confirmation: i64,
  pub global_lifetime:               i64,
  pub negative_reports_threshold:    i64,
  pub positive_reports_threshold:    i64,
  pub need_recalculation:            bool,
}

impl RawType {
  /// Read the columns of [`TYPE_COLUMNS`] starting at `offset`.
  pub fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      type_id:                       row.get(offset)?,
      name:                          row.get(offset + 1)?,
      description:                   row.get(offset + 2)?,
      lifetime_without_confirmation: row.get(offset + 3)?,
      global_lifetime:               row.get(offset + 4)?,
      negative_reports_threshold:    row.get(offset + 5)?,
      positive_reports_threshold:    row.get(offset + 6)?,
      need_recalculation:            row.get(offset + 7)?,
    })
  }

  pub fn into_type(self) -> Result<IncidentType> {
    let threshold = |v: i64, column: &str| {
      u32::try_from(v).map_err(|_| Error::Decode(format!("{column} = {v}")))
    };

    Ok(IncidentType {
      type_id:                       self.type_id,
      name:                          self.name,
      description:                   self.description,
      lifetime_without_confirmation: self.lifetime_without_confirmation,
      global_lifetime:               self.global_lifetime,
      negative_reports_threshold:    threshold(
        self.negative_reports_threshold,
        "negative_reports_threshold",
      )?,
      positive_reports_threshold:    threshold(
        self.positive_reports_threshold,
        "positive_reports_threshold",
      )?,
      need_recalculation:            self.need_recalculation,
    })
  }
}

/// Raw row from `incidents`.
pub struct RawIncident {
  pub incident_id: String,
  pub type_id:     i64,
  pub user_id:     i64,
  pub latitude:    f64,
  pub longitude:   f64,
  pub created_at:  String,
  pub updated_at:  String,
  pub deleted_at:  Option<String>,
}

impl RawIncident {
  /// Read the columns of [`INCIDENT_COLUMNS`] starting at `offset`.
  pub fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      incident_id: row.get(offset)?,
      type_id:     row.get(offset + 1)?,
      user_id:     row.get(offset + 2)?,
      latitude:    row.get(offset + 3)?,
      longitude:   row.get(offset + 4)?,
      created_at:  row.get(offset + 5)?,
      updated_at:  row.get(offset + 6)?,
      deleted_at:  row.get(offset + 7)?,
    })
  }

  pub fn into_incident(self) -> Result<Incident> {
    Ok(Incident {
      incident_id: decode_uuid(&self.incident_id)?,
      type_id:     self.type_id,
      user_id:     self.user_id,
      latitude:    self.latitude,
      longitude:   self.longitude,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
      deleted_at:  self.deleted_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw row from `incident_interactions`.
pub struct RawInteraction {
  pub interaction_id:   String,
  pub incident_id:      String,
  pub user_id:          i64,
  pub is_still_present: bool,
  pub created_at:       String,
}

impl RawInteraction {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      interaction_id:   row.get(0)?,
      incident_id:      row.get(1)?,
      user_id:          row.get(2)?,
      is_still_present: row.get(3)?,
      created_at:       row.get(4)?,
    })
  }

  pub fn into_interaction(self) -> Result<Interaction> {
    Ok(Interaction {
      interaction_id:   decode_uuid(&self.interaction_id)?,
      incident_id:      decode_uuid(&self.incident_id)?,
      user_id:          self.user_id,
      is_still_present: self.is_still_present,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let base = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let whole = encode_dt(base);
    let fraction = encode_dt(base + Duration::microseconds(1));
    assert_eq!(whole.len(), fraction.len());
    assert!(whole < fraction);
  }

  #[test]
  fn timestamp_roundtrip_keeps_microseconds() {
    let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
      + Duration::microseconds(123_456);
    assert_eq!(decode_dt(&encode_dt(at)).unwrap(), at);
  }
}
