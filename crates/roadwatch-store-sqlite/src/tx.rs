//! SQLite implementation of [`IncidentTx`].
//!
//! Every transaction is opened with `BEGIN IMMEDIATE`, so the database write
//! lock is held from the first statement until commit or rollback. That lock
//! is what serialises concurrent interactions on the same incident; row
//! locking in this backend is therefore at database granularity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use roadwatch_core::{
  geo::BoundingBox,
  incident::{
    Incident, IncidentType, IncidentView, Interaction, NearbyIncident,
    NewIncidentType, ProximityQuery, TypeId, UserId,
  },
  store::IncidentTx,
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    INCIDENT_COLUMNS, INTERACTION_COLUMNS, RawIncident, RawInteraction,
    RawType, TYPE_COLUMNS, decode_uuid, encode_dt, encode_uuid,
  },
};

/// A borrowed connection inside an open transaction.
pub struct SqliteTx<'a> {
  conn: &'a Connection,
}

impl<'a> SqliteTx<'a> {
  pub fn new(conn: &'a Connection) -> Self { Self { conn } }

  // ─── Types ──────────────────────────────────────────────────────────────────

  fn load_types(&self) -> Result<Vec<IncidentType>> {
    let mut stmt = self
      .conn
      .prepare(&format!("SELECT {TYPE_COLUMNS} FROM incident_types ORDER BY type_id ASC"))?;
    let raws = stmt
      .query_map([], |row| RawType::from_row(row, 0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawType::into_type).collect()
  }

  fn load_type_where(&self, clause: &str, param: &dyn rusqlite::ToSql) -> Result<Option<IncidentType>> {
    let raw = self
      .conn
      .query_row(
        &format!("SELECT {TYPE_COLUMNS} FROM incident_types WHERE {clause}"),
        [param],
        |row| RawType::from_row(row, 0),
      )
      .optional()?;
    raw.map(RawType::into_type).transpose()
  }

  fn store_type(&self, input: &NewIncidentType) -> Result<IncidentType> {
    self.conn.execute(
      "INSERT INTO incident_types (
         name, description, lifetime_without_confirmation, global_lifetime,
         negative_reports_threshold, positive_reports_threshold, need_recalculation
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      rusqlite::params![
        input.name,
        input.description,
        input.lifetime_without_confirmation,
        input.global_lifetime,
        input.negative_reports_threshold,
        input.positive_reports_threshold,
        input.need_recalculation,
      ],
    )?;

    Ok(IncidentType {
      type_id:                       self.conn.last_insert_rowid(),
      name:                          input.name.clone(),
      description:                   input.description.clone(),
      lifetime_without_confirmation: input.lifetime_without_confirmation,
      global_lifetime:               input.global_lifetime,
      negative_reports_threshold:    input.negative_reports_threshold,
      positive_reports_threshold:    input.positive_reports_threshold,
      need_recalculation:            input.need_recalculation,
    })
  }

  // ─── Incidents ──────────────────────────────────────────────────────────────

  fn store_incident(&self, incident: &Incident) -> Result<()> {
    self.conn.execute(
      "INSERT INTO incidents (
         incident_id, type_id, user_id, latitude, longitude,
         created_at, updated_at, deleted_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      rusqlite::params![
        encode_uuid(incident.incident_id),
        incident.type_id,
        incident.user_id,
        incident.latitude,
        incident.longitude,
        encode_dt(incident.created_at),
        encode_dt(incident.updated_at),
        incident.deleted_at.map(encode_dt),
      ],
    )?;
    Ok(())
  }

  /// Run an incident `SELECT` whose projection is [`INCIDENT_COLUMNS`].
  fn query_incidents(
    &self,
    sql: &str,
    params: impl rusqlite::Params,
  ) -> Result<Vec<Incident>> {
    let mut stmt = self.conn.prepare(sql)?;
    let raws = stmt
      .query_map(params, |row| RawIncident::from_row(row, 0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawIncident::into_incident).collect()
  }

  fn load_incident(&self, id: Uuid) -> Result<Option<Incident>> {
    let raw = self
      .conn
      .query_row(
        &format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE incident_id = ?1"),
        [encode_uuid(id)],
        |row| RawIncident::from_row(row, 0),
      )
      .optional()?;
    raw.map(RawIncident::into_incident).transpose()
  }

  fn load_interactions(&self, incident_id: Uuid) -> Result<Vec<Interaction>> {
    let mut stmt = self.conn.prepare(&format!(
      "SELECT {INTERACTION_COLUMNS} FROM incident_interactions WHERE incident_id = ?1"
    ))?;
    let raws = stmt
      .query_map([encode_uuid(incident_id)], RawInteraction::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawInteraction::into_interaction).collect()
  }

  /// Attach types and interactions to a batch of incidents. Types are read
  /// once for the whole batch.
  fn with_details(&self, incidents: Vec<Incident>) -> Result<Vec<IncidentView>> {
    if incidents.is_empty() {
      return Ok(Vec::new());
    }

    let types: HashMap<TypeId, IncidentType> = self
      .load_types()?
      .into_iter()
      .map(|t| (t.type_id, t))
      .collect();

    incidents
      .into_iter()
      .map(|incident| {
        let incident_type = types
          .get(&incident.type_id)
          .cloned()
          .ok_or_else(|| Error::Decode(format!("dangling type_id {}", incident.type_id)))?;
        let interactions = self.load_interactions(incident.incident_id)?;
        Ok(IncidentView { incident, incident_type, interactions })
      })
      .collect()
  }

  fn load_view(&self, id: Uuid) -> Result<Option<IncidentView>> {
    let Some(incident) = self.load_incident(id)? else {
      return Ok(None);
    };
    let incident_type = self
      .load_type_where("type_id = ?1", &incident.type_id)?
      .ok_or_else(|| Error::Decode(format!("dangling type_id {}", incident.type_id)))?;
    let interactions = self.load_interactions(id)?;
    Ok(Some(IncidentView { incident, incident_type, interactions }))
  }

  fn load_active_ids(&self) -> Result<Vec<Uuid>> {
    let mut stmt = self.conn.prepare(
      "SELECT incident_id FROM incidents WHERE deleted_at IS NULL ORDER BY created_at ASC",
    )?;
    let raws = stmt
      .query_map([], |row| row.get::<_, String>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(
      raws
        .into_iter()
        .filter_map(|raw| match decode_uuid(&raw) {
          Ok(id) => Some(id),
          Err(e) => {
            tracing::warn!(incident_id = %raw, error = %e, "skipping malformed incident id");
            None
          }
        })
        .collect(),
    )
  }

  fn nearby(&self, query: &ProximityQuery) -> Result<Vec<NearbyIncident>> {
    let bbox = BoundingBox::around(&query.center, query.radius_meters);

    let mut stmt = self.conn.prepare(&format!(
      "SELECT {INCIDENT_COLUMNS},
              (SELECT COUNT(*) FROM incident_interactions ii
                WHERE ii.incident_id = incidents.incident_id) AS interaction_count
       FROM incidents
       WHERE deleted_at IS NULL
         AND latitude  BETWEEN ?1 AND ?2
         AND longitude BETWEEN ?3 AND ?4
         AND (?5 IS NULL OR type_id = ?5)"
    ))?;

    let rows = stmt
      .query_map(
        rusqlite::params![
          bbox.min_latitude,
          bbox.max_latitude,
          bbox.min_longitude,
          bbox.max_longitude,
          query.type_id,
        ],
        |row| Ok((RawIncident::from_row(row, 0)?, row.get::<_, i64>(8)?)),
      )?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut candidates = Vec::with_capacity(rows.len());
    for (raw, count) in rows {
      let incident = raw.into_incident()?;
      let distance = query.center.distance_to(&incident.location());
      if distance <= query.radius_meters {
        candidates.push(NearbyIncident {
          incident,
          distance,
          interaction_count: usize::try_from(count).unwrap_or(0),
        });
      }
    }

    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    Ok(candidates)
  }

  fn set_updated_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
    self.conn.execute(
      "UPDATE incidents SET updated_at = ?2 WHERE incident_id = ?1",
      rusqlite::params![encode_uuid(id), encode_dt(at)],
    )?;
    Ok(())
  }

  fn set_deleted_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
    let changed = self.conn.execute(
      "UPDATE incidents SET deleted_at = ?2
       WHERE incident_id = ?1 AND deleted_at IS NULL",
      rusqlite::params![encode_uuid(id), encode_dt(at)],
    )?;
    Ok(changed == 1)
  }

  // ─── Interactions ───────────────────────────────────────────────────────────

  fn store_interaction(&self, interaction: &Interaction) -> Result<()> {
    self.conn.execute(
      "INSERT INTO incident_interactions (
         interaction_id, incident_id, user_id, is_still_present, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5)",
      rusqlite::params![
        encode_uuid(interaction.interaction_id),
        encode_uuid(interaction.incident_id),
        interaction.user_id,
        interaction.is_still_present,
        encode_dt(interaction.created_at),
      ],
    )?;
    Ok(())
  }
}

// ─── IncidentTx impl ──────────────────────────────────────────────────────────

impl IncidentTx for SqliteTx<'_> {
  fn list_types(&mut self) -> roadwatch_core::Result<Vec<IncidentType>> {
    Ok(self.load_types()?)
  }

  fn get_type(&mut self, id: TypeId) -> roadwatch_core::Result<Option<IncidentType>> {
    Ok(self.load_type_where("type_id = ?1", &id)?)
  }

  fn get_type_by_name(&mut self, name: &str) -> roadwatch_core::Result<Option<IncidentType>> {
    Ok(self.load_type_where("name = ?1", &name)?)
  }

  fn insert_type(&mut self, input: &NewIncidentType) -> roadwatch_core::Result<IncidentType> {
    Ok(self.store_type(input)?)
  }

  fn insert_incident(&mut self, incident: &Incident) -> roadwatch_core::Result<()> {
    Ok(self.store_incident(incident)?)
  }

  fn get_incident(&mut self, id: Uuid) -> roadwatch_core::Result<Option<IncidentView>> {
    Ok(self.load_view(id)?)
  }

  fn lock_incident(&mut self, id: Uuid) -> roadwatch_core::Result<Option<IncidentView>> {
    // The IMMEDIATE transaction already holds the write lock.
    Ok(self.load_view(id)?)
  }

  fn last_incident_by_user(&mut self, user: UserId) -> roadwatch_core::Result<Option<Incident>> {
    let mut found = self.query_incidents(
      &format!(
        "SELECT {INCIDENT_COLUMNS} FROM incidents
         WHERE user_id = ?1 ORDER BY created_at DESC LIMIT 1"
      ),
      [user],
    )?;
    Ok(found.pop())
  }

  fn retired_by_user(&mut self, user: UserId) -> roadwatch_core::Result<Vec<IncidentView>> {
    let incidents = self.query_incidents(
      &format!(
        "SELECT {INCIDENT_COLUMNS} FROM incidents
         WHERE user_id = ?1 AND deleted_at IS NOT NULL
         ORDER BY deleted_at DESC"
      ),
      [user],
    )?;
    Ok(self.with_details(incidents)?)
  }

  fn active_incident_ids(&mut self) -> roadwatch_core::Result<Vec<Uuid>> {
    Ok(self.load_active_ids()?)
  }

  fn find_nearby(&mut self, query: &ProximityQuery) -> roadwatch_core::Result<Vec<NearbyIncident>> {
    Ok(self.nearby(query)?)
  }

  fn touch_incident(&mut self, id: Uuid, at: DateTime<Utc>) -> roadwatch_core::Result<()> {
    Ok(self.set_updated_at(id, at)?)
  }

  fn retire_incident(&mut self, id: Uuid, at: DateTime<Utc>) -> roadwatch_core::Result<bool> {
    Ok(self.set_deleted_at(id, at)?)
  }

  fn insert_interaction(&mut self, interaction: &Interaction) -> roadwatch_core::Result<()> {
    Ok(self.store_interaction(interaction)?)
  }
}
