//! Handler for `POST /incidents/interactions`.

use axum::{
  Json,
  extract::{Query, State, rejection::JsonRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use roadwatch_core::{clock::Clock, store::IncidentStore};
use roadwatch_engine::InteractOutcome;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{CurrentUser, IdentityResolver},
  dto::{Include, InteractionDto},
  error::ApiError,
  incidents::IncludeParams,
};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub incident_id:      Uuid,
  pub is_still_present: bool,
}

/// `POST /incidents/interactions[?include=…]`
///
/// `200` with the interaction and its incident, or `204` when the
/// interaction retired the incident.
pub async fn create<S, C, R>(
  State(state): State<AppState<S, C, R>>,
  CurrentUser(user): CurrentUser,
  Query(params): Query<IncludeParams>,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<Response, ApiError>
where
  S: IncidentStore + 'static,
  C: Clock,
  R: IdentityResolver,
{
  let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let include = Include::parse(params.include.as_deref());

  let outcome = state
    .engine
    .interact(&user, body.incident_id, body.is_still_present)
    .await?;
  Ok(match outcome {
    InteractOutcome::Accepted { interaction, incident } => {
      Json(InteractionDto::with_incident(&interaction, &incident, include)).into_response()
    }
    InteractOutcome::Retired(_) => StatusCode::NO_CONTENT.into_response(),
  })
}
