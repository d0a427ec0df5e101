//! Handlers for `/incidents` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/incidents` | `?lat&lon&radius[&type_id][&include]` |
//! | `POST` | `/incidents` | Body: `{"type_id":1,"lat":48.8,"lon":2.3}`; 202 when attached |
//! | `GET`  | `/incidents/me/history` | Retired incidents of the caller |

use std::str::FromStr;

use axum::{
  Json,
  extract::{Query, State, rejection::JsonRejection},
  http::StatusCode,
};
use roadwatch_core::{clock::Clock, incident::TypeId, store::IncidentStore};
use roadwatch_engine::ReportOutcome;
use serde::Deserialize;

use crate::{
  AppState,
  auth::{CurrentUser, IdentityResolver},
  dto::{IncidentDto, IncidentWithDistanceDto, Include},
  error::ApiError,
};

/// Parse a required query parameter, rejecting absent and empty values.
fn required<T: FromStr>(value: Option<&str>, name: &str) -> Result<T, ApiError> {
  let value = value
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .ok_or_else(|| ApiError::BadRequest(format!("parameter {name} not provided")))?;
  value
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("invalid value for {name}: {value}")))
}

fn optional<T: FromStr>(value: Option<&str>, name: &str) -> Result<Option<T>, ApiError> {
  match value.map(str::trim).filter(|v| !v.is_empty()) {
    Some(v) => required(Some(v), name).map(Some),
    None => Ok(None),
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct IncludeParams {
  pub include: Option<String>,
}

// ─── List near ───────────────────────────────────────────────────────────────

/// Raw query strings; parsed by hand so malformed numbers produce JSON errors.
#[derive(Debug, Default, Deserialize)]
pub struct NearParams {
  pub lat:     Option<String>,
  pub lon:     Option<String>,
  pub radius:  Option<String>,
  pub type_id: Option<String>,
  pub include: Option<String>,
}

/// `GET /incidents?lat=<f64>&lon=<f64>&radius=<meters>[&type_id=<id>][&include=…]`
pub async fn list_near<S, C, R>(
  State(state): State<AppState<S, C, R>>,
  Query(params): Query<NearParams>,
) -> Result<Json<Vec<IncidentWithDistanceDto>>, ApiError>
where
  S: IncidentStore + 'static,
  C: Clock,
  R: IdentityResolver,
{
  let lat: f64 = required(params.lat.as_deref(), "lat")?;
  let lon: f64 = required(params.lon.as_deref(), "lon")?;
  let radius: f64 = required(params.radius.as_deref(), "radius")?;
  let type_id: Option<TypeId> = optional(params.type_id.as_deref(), "type_id")?;
  let include = Include::parse(params.include.as_deref());

  let found = state.engine.list_active_near(lat, lon, radius, type_id).await?;
  Ok(Json(
    found.iter().map(|f| IncidentWithDistanceDto::project(f, include)).collect(),
  ))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub type_id: TypeId,
  pub lat:     f64,
  pub lon:     f64,
}

/// `POST /incidents[?include=…]`
///
/// `200` with the new incident, or `202` with the existing incident the report
/// was attached to.
pub async fn create<S, C, R>(
  State(state): State<AppState<S, C, R>>,
  CurrentUser(user): CurrentUser,
  Query(params): Query<IncludeParams>,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<(StatusCode, Json<IncidentDto>), ApiError>
where
  S: IncidentStore + 'static,
  C: Clock,
  R: IdentityResolver,
{
  let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let include = Include::parse(params.include.as_deref());

  let outcome = state
    .engine
    .report_incident(&user, body.type_id, body.lat, body.lon)
    .await?;
  let status = match outcome {
    ReportOutcome::Created(_) => StatusCode::OK,
    ReportOutcome::Attached(_) => StatusCode::ACCEPTED,
  };
  Ok((status, Json(IncidentDto::project(outcome.view(), include))))
}

// ─── History ─────────────────────────────────────────────────────────────────

/// `GET /incidents/me/history[?include=…]`
pub async fn history<S, C, R>(
  State(state): State<AppState<S, C, R>>,
  CurrentUser(user): CurrentUser,
  Query(params): Query<IncludeParams>,
) -> Result<Json<Vec<IncidentDto>>, ApiError>
where
  S: IncidentStore + 'static,
  C: Clock,
  R: IdentityResolver,
{
  let include = Include::parse(params.include.as_deref());
  let retired = state.engine.user_history(&user).await?;
  Ok(Json(retired.iter().map(|v| IncidentDto::project(v, include)).collect()))
}
