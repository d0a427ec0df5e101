//! Handlers for `/incidents/types` endpoints.

use axum::{
  Json,
  extract::{Path, State, rejection::PathRejection},
};
use roadwatch_core::{clock::Clock, incident::TypeId, store::IncidentStore};

use crate::{AppState, auth::IdentityResolver, dto::TypeDto, error::ApiError};

/// `GET /incidents/types`
pub async fn list<S, C, R>(
  State(state): State<AppState<S, C, R>>,
) -> Result<Json<Vec<TypeDto>>, ApiError>
where
  S: IncidentStore + 'static,
  C: Clock,
  R: IdentityResolver,
{
  let types = state.engine.list_types().await?;
  Ok(Json(types.iter().map(TypeDto::from).collect()))
}

/// `GET /incidents/types/{id}`
pub async fn get_one<S, C, R>(
  State(state): State<AppState<S, C, R>>,
  id: Result<Path<TypeId>, PathRejection>,
) -> Result<Json<TypeDto>, ApiError>
where
  S: IncidentStore + 'static,
  C: Clock,
  R: IdentityResolver,
{
  let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let kind = state.engine.get_type(id).await?;
  Ok(Json(TypeDto::from(&kind)))
}
