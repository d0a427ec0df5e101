//! Incident types, incidents and interactions.
//!
//! An incident is created once, bumped on every accepted interaction and
//! retired at most once. Interactions are append-only. Incident types are
//! admin-managed policy that the lifecycle rules only ever read.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Location;

/// Identity of an [`IncidentType`].
pub type TypeId = i64;

/// Identity of a user as issued by the external identity service.
pub type UserId = i64;

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Per-type moderation policy, loaded fresh inside each transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentType {
  pub type_id:                       TypeId,
  pub name:                          String,
  pub description:                   Option<String>,
  /// Seconds without a new interaction after which an incident is retired.
  pub lifetime_without_confirmation: i64,
  /// Seconds after creation after which an incident is retired regardless of
  /// activity.
  pub global_lifetime:               i64,
  /// Length of the most-recent-first run of negative interactions that
  /// retires an incident.
  pub negative_reports_threshold:    u32,
  /// Reserved for a future recalculation policy; not enforced.
  pub positive_reports_threshold:    u32,
  pub need_recalculation:            bool,
}

impl IncidentType {
  pub fn inactivity_window(&self) -> Duration {
    Duration::seconds(self.lifetime_without_confirmation)
  }

  pub fn global_window(&self) -> Duration {
    Duration::seconds(self.global_lifetime)
  }
}

/// Input to [`crate::store::IncidentTx::insert_type`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIncidentType {
  pub name:                          String,
  #[serde(default)]
  pub description:                   Option<String>,
  pub lifetime_without_confirmation: i64,
  pub global_lifetime:               i64,
  pub negative_reports_threshold:    u32,
  #[serde(default)]
  pub positive_reports_threshold:    u32,
  #[serde(default)]
  pub need_recalculation:            bool,
}

// ─── Incident ────────────────────────────────────────────────────────────────

/// A reported road condition at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
  pub incident_id: Uuid,
  pub type_id:     TypeId,
  pub user_id:     UserId,
  pub latitude:    f64,
  pub longitude:   f64,
  pub created_at:  DateTime<Utc>,
  /// Bumped on every accepted interaction.
  pub updated_at:  DateTime<Utc>,
  /// `None` while active. Once set it is never cleared.
  pub deleted_at:  Option<DateTime<Utc>>,
}

impl Incident {
  /// A fresh, active incident reported by `user_id` at `now`.
  pub fn new(
    type_id: TypeId,
    user_id: UserId,
    location: Location,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      incident_id: Uuid::new_v4(),
      type_id,
      user_id,
      latitude: location.latitude,
      longitude: location.longitude,
      created_at: now,
      updated_at: now,
      deleted_at: None,
    }
  }

  pub fn location(&self) -> Location {
    Location { latitude: self.latitude, longitude: self.longitude }
  }

  pub fn is_active(&self) -> bool { self.deleted_at.is_none() }
}

// ─── Interaction ─────────────────────────────────────────────────────────────

/// A confirm (`is_still_present = true`) or refute signal from a user other
/// than the incident's author. Never updated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
  pub interaction_id:   Uuid,
  pub incident_id:      Uuid,
  pub user_id:          UserId,
  pub is_still_present: bool,
  pub created_at:       DateTime<Utc>,
}

impl Interaction {
  pub fn new(
    incident_id: Uuid,
    user_id: UserId,
    is_still_present: bool,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      interaction_id: Uuid::new_v4(),
      incident_id,
      user_id,
      is_still_present,
      created_at: now,
    }
  }
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// An incident together with its policy and full interaction history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentView {
  pub incident:      Incident,
  pub incident_type: IncidentType,
  /// Storage order; not meaningful. Use [`crate::policy::negative_streak`] for
  /// recency-ordered evaluation.
  pub interactions:  Vec<Interaction>,
}

/// Candidate row produced by a proximity query; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyIncident {
  pub incident:          Incident,
  /// Great-circle distance to the query center, in meters.
  pub distance:          f64,
  pub interaction_count: usize,
}

/// A fully-loaded incident annotated with its distance to a query center.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentWithDistance {
  pub view:     IncidentView,
  pub distance: f64,
}

/// Parameters for [`crate::store::IncidentTx::find_nearby`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityQuery {
  pub center:        Location,
  pub radius_meters: f64,
  pub type_id:       Option<TypeId>,
}
