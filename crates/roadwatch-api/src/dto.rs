//! Response bodies and the `include` projection.

use chrono::{DateTime, Utc};
use roadwatch_core::incident::{
  IncidentType, IncidentView, IncidentWithDistance, Interaction, TypeId, UserId,
};
use serde::Serialize;
use uuid::Uuid;

/// How much interaction detail to embed in an incident body, chosen with
/// `?include=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Include {
  #[default]
  Nothing,
  Interactions,
  Summary,
}

impl Include {
  /// Unrecognised values fall back to [`Include::Nothing`].
  pub fn parse(value: Option<&str>) -> Self {
    match value {
      Some("interactions") => Include::Interactions,
      Some("summary") => Include::Summary,
      _ => Include::Nothing,
    }
  }
}

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct TypeDto {
  pub id:                            TypeId,
  pub name:                          String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description:                   Option<String>,
  pub lifetime_without_confirmation: i64,
  pub global_lifetime:               i64,
  pub negative_reports_threshold:    u32,
}

impl From<&IncidentType> for TypeDto {
  fn from(t: &IncidentType) -> Self {
    Self {
      id:                            t.type_id,
      name:                          t.name.clone(),
      description:                   t.description.clone(),
      lifetime_without_confirmation: t.lifetime_without_confirmation,
      global_lifetime:               t.global_lifetime,
      negative_reports_threshold:    t.negative_reports_threshold,
    }
  }
}

// ─── Interactions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InteractionsSummary {
  pub is_still_present: usize,
  pub no_still_present: usize,
  pub total:            usize,
}

impl InteractionsSummary {
  pub fn of(interactions: &[Interaction]) -> Self {
    let total = interactions.len();
    let is_still_present = interactions.iter().filter(|i| i.is_still_present).count();
    Self { is_still_present, no_still_present: total - is_still_present, total }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct InteractionDto {
  pub id:               Uuid,
  pub user_id:          UserId,
  pub is_still_present: bool,
  pub created_at:       DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub incident:         Option<Box<IncidentDto>>,
}

impl From<&Interaction> for InteractionDto {
  fn from(i: &Interaction) -> Self {
    Self {
      id:               i.interaction_id,
      user_id:          i.user_id,
      is_still_present: i.is_still_present,
      created_at:       i.created_at,
      incident:         None,
    }
  }
}

impl InteractionDto {
  pub fn with_incident(interaction: &Interaction, incident: &IncidentView, include: Include) -> Self {
    Self {
      incident: Some(Box::new(IncidentDto::project(incident, include))),
      ..Self::from(interaction)
    }
  }
}

// ─── Incidents ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct IncidentDto {
  pub id:                   Uuid,
  pub user_id:              UserId,
  #[serde(rename = "type")]
  pub incident_type:        TypeDto,
  pub lat:                  f64,
  pub lon:                  f64,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub deleted_at:           Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub interactions:         Option<Vec<InteractionDto>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub interactions_summary: Option<InteractionsSummary>,
}

impl IncidentDto {
  pub fn project(view: &IncidentView, include: Include) -> Self {
    let incident = &view.incident;
    let (interactions, interactions_summary) = match include {
      Include::Nothing => (None, None),
      Include::Interactions => {
        (Some(view.interactions.iter().map(InteractionDto::from).collect()), None)
      }
      Include::Summary => (None, Some(InteractionsSummary::of(&view.interactions))),
    };
    Self {
      id: incident.incident_id,
      user_id: incident.user_id,
      incident_type: TypeDto::from(&view.incident_type),
      lat: incident.latitude,
      lon: incident.longitude,
      created_at: incident.created_at,
      updated_at: incident.updated_at,
      deleted_at: incident.deleted_at,
      interactions,
      interactions_summary,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentWithDistanceDto {
  #[serde(flatten)]
  pub incident: IncidentDto,
  /// Meters from the query center.
  pub distance: f64,
}

impl IncidentWithDistanceDto {
  pub fn project(found: &IncidentWithDistance, include: Include) -> Self {
    Self { incident: IncidentDto::project(&found.view, include), distance: found.distance }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn include_parses_known_values_only() {
    assert_eq!(Include::parse(Some("interactions")), Include::Interactions);
    assert_eq!(Include::parse(Some("summary")), Include::Summary);
    assert_eq!(Include::parse(Some("everything")), Include::Nothing);
    assert_eq!(Include::parse(None), Include::Nothing);
  }

  #[test]
  fn summary_counts_both_signals() {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let interactions = vec![
      Interaction::new(id, 1, true, now),
      Interaction::new(id, 2, false, now),
      Interaction::new(id, 3, false, now),
    ];
    let summary = InteractionsSummary::of(&interactions);
    assert_eq!(summary, InteractionsSummary { is_still_present: 1, no_still_present: 2, total: 3 });
  }
}
