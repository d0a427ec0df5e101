//! JSON HTTP API for roadwatch.
//!
//! Exposes an axum [`Router`] over an [`Engine`]. Callers are authenticated by
//! forwarding their `Authorization` header to an external identity service
//! through an [`IdentityResolver`].

pub mod auth;
pub mod dto;
pub mod error;
pub mod incidents;
pub mod interactions;
pub mod types;

use std::sync::Arc;

use axum::{
  Router,
  http::{Method, StatusCode, header},
  routing::{get, post},
};
use roadwatch_core::{
  clock::{Clock, SystemClock},
  store::IncidentStore,
};
use roadwatch_engine::Engine;
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

pub use auth::{AuthError, CurrentUser, HttpIdentityResolver, IdentityResolver};
pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, C = SystemClock, R = HttpIdentityResolver> {
  pub engine:   Arc<Engine<S, C>>,
  pub identity: Arc<R>,
}

impl<S, C, R> Clone for AppState<S, C, R> {
  fn clone(&self) -> Self {
    Self { engine: self.engine.clone(), identity: self.identity.clone() }
  }
}

impl<S, C, R> AppState<S, C, R> {
  pub fn new(engine: Arc<Engine<S, C>>, identity: Arc<R>) -> Self {
    Self { engine, identity }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full API router.
///
/// `/internal/incidents` serves the same listing as `/incidents` and is meant
/// to be reachable only from the private network.
pub fn router<S, C, R>(state: AppState<S, C, R>) -> Router
where
  S: IncidentStore + 'static,
  C: Clock,
  R: IdentityResolver,
{
  Router::new()
    .route("/health", get(health))
    // Incidents
    .route(
      "/incidents",
      get(incidents::list_near::<S, C, R>).post(incidents::create::<S, C, R>),
    )
    .route("/incidents/me/history", get(incidents::history::<S, C, R>))
    .route("/internal/incidents", get(incidents::list_near::<S, C, R>))
    // Interactions
    .route("/incidents/interactions", post(interactions::create::<S, C, R>))
    // Types
    .route("/incidents/types", get(types::list::<S, C, R>))
    .route("/incidents/types/{id}", get(types::get_one::<S, C, R>))
    .layer(cors())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

fn cors() -> CorsLayer {
  CorsLayer::new()
    .allow_origin(Any)
    .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn health() -> StatusCode { StatusCode::OK }
