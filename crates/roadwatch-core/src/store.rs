//! The `IncidentStore` trait and its transaction handle.
//!
//! The engine expresses every operation as a closure over an [`IncidentTx`];
//! the backend runs it inside one transaction, committing when the closure
//! returns `Ok` and rolling back otherwise. Backends (e.g.
//! `roadwatch-store-sqlite`) implement both traits; the engine depends only on
//! this abstraction.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Result,
  incident::{
    Incident, IncidentType, IncidentView, Interaction, NearbyIncident,
    NewIncidentType, ProximityQuery, TypeId, UserId,
  },
};

// ─── Transaction handle ──────────────────────────────────────────────────────

/// Operations available inside a store transaction. Every method is
/// synchronous; the surrounding [`IncidentStore::transact`] call is the only
/// suspension point.
pub trait IncidentTx {
  // ── Incident types ────────────────────────────────────────────────────

  fn list_types(&mut self) -> Result<Vec<IncidentType>>;

  fn get_type(&mut self, id: TypeId) -> Result<Option<IncidentType>>;

  fn get_type_by_name(&mut self, name: &str) -> Result<Option<IncidentType>>;

  fn insert_type(&mut self, input: &NewIncidentType) -> Result<IncidentType>;

  // ── Incidents ─────────────────────────────────────────────────────────

  fn insert_incident(&mut self, incident: &Incident) -> Result<()>;

  /// Load an incident with its type and interactions, without locking.
  fn get_incident(&mut self, id: Uuid) -> Result<Option<IncidentView>>;

  /// Load an incident with its type and interactions, holding an exclusive
  /// lock on its row until the transaction ends.
  fn lock_incident(&mut self, id: Uuid) -> Result<Option<IncidentView>>;

  /// The most recent incident authored by `user`, of any type or status.
  fn last_incident_by_user(&mut self, user: UserId) -> Result<Option<Incident>>;

  /// Retired incidents authored by `user`.
  fn retired_by_user(&mut self, user: UserId) -> Result<Vec<IncidentView>>;

  /// Ids of every active incident, oldest first. Rows are loaded one at a
  /// time through [`IncidentTx::get_incident`], so an unreadable incident
  /// fails only its own load.
  fn active_incident_ids(&mut self) -> Result<Vec<Uuid>>;

  /// Active incidents within `query.radius_meters` of `query.center`,
  /// ordered by ascending distance.
  fn find_nearby(&mut self, query: &ProximityQuery) -> Result<Vec<NearbyIncident>>;

  /// Set `updated_at`.
  fn touch_incident(&mut self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

  /// Set `deleted_at` if the incident is still active. Returns `false` when it
  /// was already retired, in which case nothing is written.
  fn retire_incident(&mut self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;

  // ── Interactions ──────────────────────────────────────────────────────

  fn insert_interaction(&mut self, interaction: &Interaction) -> Result<()>;
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Abstraction over a transactional incident store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait IncidentStore: Send + Sync {
  /// Run `work` inside a single transaction.
  ///
  /// Commits when `work` returns `Ok`; rolls back on `Err`, leaving no partial
  /// state visible. Concurrent transactions that lock the same incident are
  /// serialised.
  fn transact<F, R>(&self, work: F) -> impl Future<Output = Result<R>> + Send + '_
  where
    F: FnOnce(&mut dyn IncidentTx) -> Result<R> + Send + 'static,
    R: Send + 'static;

  // ── Convenience reads ─────────────────────────────────────────────────

  fn list_types(&self) -> impl Future<Output = Result<Vec<IncidentType>>> + Send + '_ {
    self.transact(|tx| tx.list_types())
  }

  fn get_type(
    &self,
    id: TypeId,
  ) -> impl Future<Output = Result<Option<IncidentType>>> + Send + '_ {
    self.transact(move |tx| tx.get_type(id))
  }

  fn get_incident(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<IncidentView>>> + Send + '_ {
    self.transact(move |tx| tx.get_incident(id))
  }

  /// Insert `input` unless a type with the same name exists. Returns the
  /// stored type either way.
  fn ensure_type(
    &self,
    input: NewIncidentType,
  ) -> impl Future<Output = Result<IncidentType>> + Send + '_ {
    self.transact(move |tx| match tx.get_type_by_name(&input.name)? {
      Some(existing) => Ok(existing),
      None => tx.insert_type(&input),
    })
  }
}
