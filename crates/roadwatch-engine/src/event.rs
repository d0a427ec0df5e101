//! Messages published on the incident channel.

use chrono::{DateTime, Utc};
use roadwatch_core::incident::{IncidentView, TypeId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
  Create,
  /// Reserved for positive-threshold certification; not emitted yet.
  Certified,
  Deleted,
}

/// Flat projection of an incident for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentPayload {
  pub id:                 Uuid,
  pub type_id:            TypeId,
  pub type_name:          String,
  pub user_id:            UserId,
  pub lat:                f64,
  pub lon:                f64,
  pub interactions_count: usize,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub deleted_at:         Option<DateTime<Utc>>,
}

impl From<&IncidentView> for IncidentPayload {
  fn from(view: &IncidentView) -> Self {
    let incident = &view.incident;
    Self {
      id:                 incident.incident_id,
      type_id:            incident.type_id,
      type_name:          view.incident_type.name.clone(),
      user_id:            incident.user_id,
      lat:                incident.latitude,
      lon:                incident.longitude,
      interactions_count: view.interactions.len(),
      created_at:         incident.created_at,
      updated_at:         incident.updated_at,
      deleted_at:         incident.deleted_at,
    }
  }
}

/// The envelope published on the bus: `{"data": ..., "action": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentMessage {
  pub data:   IncidentPayload,
  pub action: Action,
}

impl IncidentMessage {
  pub fn new(action: Action, view: &IncidentView) -> Self {
    Self { data: IncidentPayload::from(view), action }
  }
}
