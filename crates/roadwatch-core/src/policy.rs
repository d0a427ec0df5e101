//! Moderation rules: dedup candidate selection, cooldowns, the negative
//! streak and the two expiry windows. Pure functions over the domain types.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};

use crate::incident::{Incident, IncidentView, Interaction, NearbyIncident, UserId};

/// Reports closer than this to an active incident of the same type attach to
/// it instead of creating a new one.
pub const DEDUP_RADIUS_METERS: f64 = 100.0;

/// Minimum time between two reports authored by the same user.
pub fn report_cooldown() -> Duration { Duration::seconds(60) }

/// Minimum time between an incident's latest interaction and the next one.
pub fn interaction_cooldown() -> Duration { Duration::minutes(60) }

/// Whose interactions block a new interaction during the cooldown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InteractionCooldownScope {
  /// Any recent interaction on the incident blocks every user.
  #[default]
  Global,
  /// Only the acting user's own recent interactions block them.
  PerUser,
}

/// Why an incident was retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetirementReason {
  NegativeReports,
  Inactivity,
  GlobalLifetime,
}

impl RetirementReason {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::NegativeReports => "negative_reports",
      Self::Inactivity => "inactivity",
      Self::GlobalLifetime => "global_lifetime",
    }
  }
}

// ─── Dedup ───────────────────────────────────────────────────────────────────

/// `Less` when `a` is the better attachment target: more interactions first,
/// then the smaller distance.
fn candidate_order(a: &NearbyIncident, b: &NearbyIncident) -> Ordering {
  b.interaction_count
    .cmp(&a.interaction_count)
    .then_with(|| a.distance.total_cmp(&b.distance))
}

/// Pick the incident a report attaches to. On a full tie the earliest
/// candidate in input order wins.
pub fn choose_candidate(candidates: &[NearbyIncident]) -> Option<&NearbyIncident> {
  candidates.iter().fold(None, |best, c| match best {
    Some(b) if candidate_order(c, b) != Ordering::Less => Some(b),
    _ => Some(c),
  })
}

// ─── Cooldowns ───────────────────────────────────────────────────────────────

/// `true` while `last` (the user's most recent report) is younger than the
/// report cooldown.
pub fn report_cooldown_active(last: Option<&Incident>, now: DateTime<Utc>) -> bool {
  last.is_some_and(|i| now - i.created_at < report_cooldown())
}

pub fn interaction_cooldown_active(
  interactions: &[Interaction],
  actor: UserId,
  scope: InteractionCooldownScope,
  now: DateTime<Utc>,
) -> bool {
  interactions
    .iter()
    .filter(|i| match scope {
      InteractionCooldownScope::Global => true,
      InteractionCooldownScope::PerUser => i.user_id == actor,
    })
    .any(|i| now - i.created_at < interaction_cooldown())
}

// ─── Retirement ──────────────────────────────────────────────────────────────

/// Number of consecutive negative interactions counted from the most recent
/// backwards, stopping at the first positive one.
pub fn negative_streak(interactions: &[Interaction]) -> usize {
  let mut by_recency: Vec<&Interaction> = interactions.iter().collect();
  by_recency.sort_by(|a, b| b.created_at.cmp(&a.created_at));
  by_recency
    .into_iter()
    .take_while(|i| !i.is_still_present)
    .count()
}

pub fn negative_threshold_reached(view: &IncidentView) -> bool {
  negative_streak(&view.interactions) >= view.incident_type.negative_reports_threshold as usize
}

/// `true` once `now − updated_at` exceeds the type's inactivity window.
pub fn inactivity_expired(view: &IncidentView, now: DateTime<Utc>) -> bool {
  now - view.incident.updated_at > view.incident_type.inactivity_window()
}

/// `true` once `now − created_at` exceeds the type's global lifetime.
pub fn lifetime_expired(view: &IncidentView, now: DateTime<Utc>) -> bool {
  now - view.incident.created_at > view.incident_type.global_window()
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;
  use crate::{
    geo::Location,
    incident::{IncidentType, Interaction},
  };

  fn incident_at(now: DateTime<Utc>) -> Incident {
    Incident::new(1, 7, Location::new(48.85, 2.35).unwrap(), now)
  }

  fn candidate(count: usize, distance: f64) -> NearbyIncident {
    NearbyIncident {
      incident: incident_at(Utc::now()),
      distance,
      interaction_count: count,
    }
  }

  fn interaction(present: bool, at: DateTime<Utc>) -> Interaction {
    Interaction::new(Uuid::new_v4(), 42, present, at)
  }

  fn policy(threshold: u32) -> IncidentType {
    IncidentType {
      type_id:                       1,
      name:                          "Accident".into(),
      description:                   None,
      lifetime_without_confirmation: 1800,
      global_lifetime:               7200,
      negative_reports_threshold:    threshold,
      positive_reports_threshold:    0,
      need_recalculation:            false,
    }
  }

  // ─── choose_candidate ────────────────────────────────────────────────────

  #[test]
  fn distance_breaks_interaction_tie() {
    let far = candidate(3, 80.0);
    let near = candidate(3, 40.0);
    let candidates = vec![far, near.clone()];
    let chosen = choose_candidate(&candidates).unwrap();
    assert_eq!(chosen.incident.incident_id, near.incident.incident_id);
  }

  #[test]
  fn more_interactions_beats_closer() {
    let busy_far = candidate(5, 90.0);
    let quiet_near = candidate(1, 5.0);
    let candidates = vec![quiet_near, busy_far.clone()];
    let chosen = choose_candidate(&candidates).unwrap();
    assert_eq!(chosen.incident.incident_id, busy_far.incident.incident_id);
  }

  #[test]
  fn full_tie_keeps_input_order() {
    let first = candidate(2, 10.0);
    let second = candidate(2, 10.0);
    let candidates = vec![first.clone(), second];
    let chosen = choose_candidate(&candidates).unwrap();
    assert_eq!(chosen.incident.incident_id, first.incident.incident_id);
  }

  #[test]
  fn no_candidates_chooses_nothing() {
    assert!(choose_candidate(&[]).is_none());
  }

  // ─── cooldowns ───────────────────────────────────────────────────────────

  #[test]
  fn report_cooldown_is_one_minute() {
    let now = Utc::now();
    let recent = incident_at(now - Duration::seconds(59));
    let old = incident_at(now - Duration::seconds(61));
    assert!(report_cooldown_active(Some(&recent), now));
    assert!(!report_cooldown_active(Some(&old), now));
    assert!(!report_cooldown_active(None, now));
  }

  #[test]
  fn global_interaction_cooldown_ignores_author() {
    let now = Utc::now();
    let history = vec![interaction(true, now - Duration::minutes(10))];
    assert!(interaction_cooldown_active(&history, 99, InteractionCooldownScope::Global, now));
    assert!(!interaction_cooldown_active(&history, 99, InteractionCooldownScope::PerUser, now));
    assert!(interaction_cooldown_active(&history, 42, InteractionCooldownScope::PerUser, now));
  }

  #[test]
  fn interaction_cooldown_expires_after_an_hour() {
    let now = Utc::now();
    let history = vec![interaction(false, now - Duration::minutes(61))];
    assert!(!interaction_cooldown_active(&history, 1, InteractionCooldownScope::Global, now));
  }

  // ─── negative streak ─────────────────────────────────────────────────────

  #[test]
  fn streak_counts_trailing_negatives_only() {
    let t = Utc::now();
    // Storage order is scrambled on purpose.
    let history = vec![
      interaction(false, t - Duration::minutes(1)),
      interaction(false, t - Duration::minutes(5)),
      interaction(true, t - Duration::minutes(3)),
      interaction(false, t - Duration::minutes(2)),
    ];
    assert_eq!(negative_streak(&history), 2);
  }

  #[test]
  fn positive_latest_resets_streak() {
    let t = Utc::now();
    let history = vec![
      interaction(false, t - Duration::minutes(3)),
      interaction(false, t - Duration::minutes(2)),
      interaction(true, t - Duration::minutes(1)),
    ];
    assert_eq!(negative_streak(&history), 0);
  }

  #[test]
  fn threshold_reached_at_exact_count() {
    let t = Utc::now();
    let incident = incident_at(t);
    let interactions = (1..=3)
      .map(|m| interaction(false, t - Duration::minutes(m)))
      .collect();
    let view = IncidentView { incident, incident_type: policy(3), interactions };
    assert!(negative_threshold_reached(&view));

    let view = IncidentView { incident_type: policy(4), ..view };
    assert!(!negative_threshold_reached(&view));
  }

  // ─── expiry ──────────────────────────────────────────────────────────────

  #[test]
  fn windows_are_strict_and_independent() {
    let created = Utc::now();
    let mut incident = incident_at(created);
    incident.updated_at = created + Duration::seconds(7000);
    let view = IncidentView { incident, incident_type: policy(3), interactions: vec![] };

    let at_boundary = created + Duration::seconds(7200);
    assert!(!lifetime_expired(&view, at_boundary));
    assert!(lifetime_expired(&view, at_boundary + Duration::seconds(1)));
    assert!(!inactivity_expired(&view, at_boundary + Duration::seconds(1)));
    assert!(inactivity_expired(&view, created + Duration::seconds(8801)));
  }
}
