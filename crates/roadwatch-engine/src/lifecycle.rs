//! Report and interaction handling.
//!
//! Every decision runs inside one store transaction. Events are published
//! only after that transaction commits, so a rolled-back decision never
//! emits anything.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use roadwatch_core::{
  Error, Result,
  clock::{Clock, SystemClock},
  geo::Location,
  incident::{
    Incident, IncidentType, IncidentView, IncidentWithDistance, Interaction,
    ProximityQuery, TypeId, UserId,
  },
  policy::{self, InteractionCooldownScope, RetirementReason},
  store::{IncidentStore, IncidentTx},
  user::User,
};
use uuid::Uuid;

use crate::{
  config::EngineConfig,
  event::{Action, IncidentMessage},
  notifier::Notifier,
};

/// Result of [`Engine::report_incident`].
#[derive(Debug, Clone)]
pub enum ReportOutcome {
  /// A new incident was stored.
  Created(IncidentView),
  /// The report was folded into an existing nearby incident as a positive
  /// interaction.
  Attached(IncidentView),
}

impl ReportOutcome {
  pub fn view(&self) -> &IncidentView {
    match self {
      Self::Created(v) | Self::Attached(v) => v,
    }
  }
}

/// Result of [`Engine::interact`].
#[derive(Debug, Clone)]
pub enum InteractOutcome {
  Accepted { interaction: Interaction, incident: IncidentView },
  /// The interaction was stored and retired the incident.
  Retired(IncidentView),
}

impl InteractOutcome {
  pub fn incident(&self) -> &IncidentView {
    match self {
      Self::Accepted { incident, .. } | Self::Retired(incident) => incident,
    }
  }
}

enum Reported {
  Created(IncidentView),
  Attached(InteractOutcome),
}

pub struct Engine<S, C = SystemClock> {
  store:    Arc<S>,
  clock:    C,
  notifier: Notifier,
  config:   EngineConfig,
}

impl<S: IncidentStore + 'static, C: Clock> Engine<S, C> {
  pub fn new(store: Arc<S>, clock: C, notifier: Notifier, config: EngineConfig) -> Self {
    Self { store, clock, notifier, config }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn config(&self) -> &EngineConfig { &self.config }

  // ─── Reports ─────────────────────────────────────────────────────────────

  /// Report an incident of `type_id` at a location.
  ///
  /// A report within the dedup radius of an active incident of the same type
  /// becomes a positive interaction on the best candidate instead, and is
  /// subject to the same author and cooldown rules as [`Engine::interact`].
  pub async fn report_incident(
    &self,
    user: &User,
    type_id: TypeId,
    latitude: f64,
    longitude: f64,
  ) -> Result<ReportOutcome> {
    let location = Location::new(latitude, longitude)?;
    let now = self.clock.now();
    let user_id = user.id;
    let enforce_cooldown = self.config.enforce_report_cooldown;
    let scope = self.config.interaction_cooldown_scope;

    let reported = self
      .store
      .transact(move |tx| {
        if tx.get_type(type_id)?.is_none() {
          return Err(Error::BadRequest(format!(
            "incident type {type_id} does not exist"
          )));
        }

        if enforce_cooldown {
          let last = tx.last_incident_by_user(user_id)?;
          if policy::report_cooldown_active(last.as_ref(), now) {
            return Err(Error::RateLimited(
              "you must wait before reporting another incident".into(),
            ));
          }
        }

        let candidates = tx.find_nearby(&ProximityQuery {
          center:        location,
          radius_meters: policy::DEDUP_RADIUS_METERS,
          type_id:       Some(type_id),
        })?;
        if let Some(chosen) = policy::choose_candidate(&candidates) {
          let id = chosen.incident.incident_id;
          return accept_interaction(tx, id, user_id, true, now, scope)
            .map(Reported::Attached);
        }

        let incident = Incident::new(type_id, user_id, location, now);
        tx.insert_incident(&incident)?;
        let view = reload(tx, incident.incident_id)?;
        Ok(Reported::Created(view))
      })
      .await?;

    match reported {
      Reported::Created(view) => {
        tracing::info!(
          incident_id = %view.incident.incident_id,
          type_id,
          user_id,
          "incident created"
        );
        self.notify(Action::Create, &view);
        Ok(ReportOutcome::Created(view))
      }
      Reported::Attached(outcome) => {
        tracing::info!(
          incident_id = %outcome.incident().incident.incident_id,
          user_id,
          "report attached to nearby incident"
        );
        let view = self.after_interaction(outcome).incident().clone();
        Ok(ReportOutcome::Attached(view))
      }
    }
  }

  // ─── Interactions ────────────────────────────────────────────────────────

  /// Record that `user` saw (`present = true`) or did not see the incident.
  ///
  /// Retires the incident when the trailing run of negative interactions
  /// reaches its type's threshold.
  pub async fn interact(
    &self,
    user: &User,
    incident_id: Uuid,
    present: bool,
  ) -> Result<InteractOutcome> {
    let now = self.clock.now();
    let user_id = user.id;
    let scope = self.config.interaction_cooldown_scope;

    let outcome = self
      .store
      .transact(move |tx| accept_interaction(tx, incident_id, user_id, present, now, scope))
      .await?;

    Ok(self.after_interaction(outcome))
  }

  fn after_interaction(&self, outcome: InteractOutcome) -> InteractOutcome {
    match &outcome {
      InteractOutcome::Accepted { interaction, incident } => {
        tracing::debug!(
          incident_id = %incident.incident.incident_id,
          interaction_id = %interaction.interaction_id,
          present = interaction.is_still_present,
          "interaction accepted"
        );
      }
      InteractOutcome::Retired(view) => {
        tracing::info!(
          incident_id = %view.incident.incident_id,
          reason = RetirementReason::NegativeReports.as_str(),
          "incident retired"
        );
        self.notify(Action::Deleted, view);
      }
    }
    outcome
  }

  // ─── Queries ─────────────────────────────────────────────────────────────

  /// Active incidents within `radius` meters, nearest first, optionally of a
  /// single type.
  pub async fn list_active_near(
    &self,
    latitude: f64,
    longitude: f64,
    radius: f64,
    type_id: Option<TypeId>,
  ) -> Result<Vec<IncidentWithDistance>> {
    let center = Location::new(latitude, longitude)?;
    if !radius.is_finite() || radius < 0.0 {
      return Err(Error::BadRequest(format!("invalid radius: {radius}")));
    }
    let query = ProximityQuery { center, radius_meters: radius, type_id };

    self
      .store
      .transact(move |tx| {
        if let Some(id) = type_id {
          if tx.get_type(id)?.is_none() {
            return Err(Error::NotFound(format!("incident type {id} not found")));
          }
        }

        tx.find_nearby(&query)?
          .into_iter()
          .map(|n| -> Result<IncidentWithDistance> {
            let view = reload(tx, n.incident.incident_id)?;
            Ok(IncidentWithDistance { view, distance: n.distance })
          })
          .collect()
      })
      .await
  }

  /// Incidents authored by `user` that have been retired.
  pub async fn user_history(&self, user: &User) -> Result<Vec<IncidentView>> {
    let user_id = user.id;
    self.store.transact(move |tx| tx.retired_by_user(user_id)).await
  }

  pub async fn get_incident(&self, id: Uuid) -> Result<IncidentView> {
    self
      .store
      .get_incident(id)
      .await?
      .ok_or_else(|| Error::NotFound(format!("incident {id} not found")))
  }

  pub async fn list_types(&self) -> Result<Vec<IncidentType>> {
    self.store.list_types().await
  }

  pub async fn get_type(&self, id: TypeId) -> Result<IncidentType> {
    self
      .store
      .get_type(id)
      .await?
      .ok_or_else(|| Error::NotFound(format!("incident type {id} not found")))
  }

  fn notify(&self, action: Action, view: &IncidentView) {
    let message = IncidentMessage::new(action, view);
    self.notifier.publish(&self.config.channel, &message);
  }
}

// ─── Transaction bodies ──────────────────────────────────────────────────────

fn reload(tx: &mut dyn IncidentTx, id: Uuid) -> Result<IncidentView> {
  tx.get_incident(id)?
    .ok_or_else(|| Error::NotFound(format!("incident {id} not found")))
}

/// Validate and store one interaction on a locked incident, retiring it when
/// the negative streak reaches the type's threshold.
fn accept_interaction(
  tx: &mut dyn IncidentTx,
  incident_id: Uuid,
  user_id: UserId,
  present: bool,
  now: DateTime<Utc>,
  scope: InteractionCooldownScope,
) -> Result<InteractOutcome> {
  let view = tx
    .lock_incident(incident_id)?
    .ok_or_else(|| Error::NotFound(format!("incident {incident_id} not found")))?;

  if !view.incident.is_active() {
    return Err(Error::Locked(format!("incident {incident_id} is no longer active")));
  }
  if view.incident.user_id == user_id {
    return Err(Error::Forbidden("you cannot interact with your own incident".into()));
  }
  if policy::interaction_cooldown_active(&view.interactions, user_id, scope, now) {
    return Err(Error::RateLimited(
      "this incident was confirmed recently; try again later".into(),
    ));
  }

  let interaction = Interaction::new(incident_id, user_id, present, now);
  tx.insert_interaction(&interaction)?;
  tx.touch_incident(incident_id, now)?;

  let view = reload(tx, incident_id)?;
  if policy::negative_threshold_reached(&view) && tx.retire_incident(incident_id, now)? {
    return Ok(InteractOutcome::Retired(reload(tx, incident_id)?));
  }

  Ok(InteractOutcome::Accepted { interaction, incident: view })
}
