//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, TimeZone, Utc};
use roadwatch_core::{
  Error as CoreError,
  geo::Location,
  incident::{Incident, IncidentType, Interaction, NewIncidentType, ProximityQuery},
  store::IncidentStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn pothole() -> NewIncidentType {
  NewIncidentType {
    name:                          "Pothole".into(),
    description:                   Some("Damaged road surface".into()),
    lifetime_without_confirmation: 3600,
    global_lifetime:               86_400,
    negative_reports_threshold:    3,
    positive_reports_threshold:    0,
    need_recalculation:            false,
  }
}

fn at(lat: f64, lon: f64) -> Location { Location::new(lat, lon).unwrap() }

async fn seed_type(s: &SqliteStore, input: NewIncidentType) -> IncidentType {
  s.ensure_type(input).await.unwrap()
}

async fn insert(s: &SqliteStore, incident: Incident) -> Incident {
  let copy = incident.clone();
  s.transact(move |tx| tx.insert_incident(&copy)).await.unwrap();
  incident
}

// ─── Incident types ──────────────────────────────────────────────────────────

#[tokio::test]
async fn ensure_type_is_idempotent_by_name() {
  let s = store().await;
  let first = seed_type(&s, pothole()).await;
  let second = seed_type(&s, pothole()).await;
  assert_eq!(first.type_id, second.type_id);

  let all = s.list_types().await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].negative_reports_threshold, 3);
  assert_eq!(all[0].description.as_deref(), Some("Damaged road surface"));
}

#[tokio::test]
async fn list_types_orders_by_id() {
  let s = store().await;
  let a = seed_type(&s, NewIncidentType { name: "Accident".into(), ..pothole() }).await;
  let b = seed_type(&s, pothole()).await;

  let ids: Vec<_> = s.list_types().await.unwrap().into_iter().map(|t| t.type_id).collect();
  assert_eq!(ids, vec![a.type_id, b.type_id]);
}

#[tokio::test]
async fn get_type_missing_returns_none() {
  let s = store().await;
  assert!(s.get_type(404).await.unwrap().is_none());
}

// ─── Incidents ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_incident_roundtrip() {
  let s = store().await;
  let kind = seed_type(&s, pothole()).await;
  let now = Utc.with_ymd_and_hms(2025, 5, 1, 8, 30, 0).unwrap();

  let incident = insert(&s, Incident::new(kind.type_id, 7, at(48.8566, 2.3522), now)).await;

  let view = s.get_incident(incident.incident_id).await.unwrap().unwrap();
  assert_eq!(view.incident, incident);
  assert_eq!(view.incident_type, kind);
  assert!(view.interactions.is_empty());
  assert!(view.incident.deleted_at.is_none());
}

#[tokio::test]
async fn get_incident_missing_returns_none() {
  let s = store().await;
  assert!(s.get_incident(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn last_incident_by_user_picks_most_recent() {
  let s = store().await;
  let kind = seed_type(&s, pothole()).await;
  let t0 = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();

  insert(&s, Incident::new(kind.type_id, 7, at(1.0, 1.0), t0)).await;
  let newest =
    insert(&s, Incident::new(kind.type_id, 7, at(2.0, 2.0), t0 + Duration::seconds(30))).await;
  insert(&s, Incident::new(kind.type_id, 8, at(3.0, 3.0), t0 + Duration::seconds(60))).await;

  let last = s
    .transact(|tx| tx.last_incident_by_user(7))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(last.incident_id, newest.incident_id);

  let none = s.transact(|tx| tx.last_incident_by_user(99)).await.unwrap();
  assert!(none.is_none());
}

#[tokio::test]
async fn retire_is_idempotent() {
  let s = store().await;
  let kind = seed_type(&s, pothole()).await;
  let now = Utc::now();
  let incident = insert(&s, Incident::new(kind.type_id, 7, at(1.0, 1.0), now)).await;
  let id = incident.incident_id;

  let first = s
    .transact(move |tx| tx.retire_incident(id, now + Duration::minutes(1)))
    .await
    .unwrap();
  let second = s
    .transact(move |tx| tx.retire_incident(id, now + Duration::minutes(2)))
    .await
    .unwrap();
  assert!(first);
  assert!(!second);

  let view = s.get_incident(id).await.unwrap().unwrap();
  assert_eq!(
    view.incident.deleted_at.map(|d| d.timestamp()),
    Some((now + Duration::minutes(1)).timestamp())
  );
}

#[tokio::test]
async fn retire_leaves_updated_at_alone() {
  let s = store().await;
  let kind = seed_type(&s, pothole()).await;
  let created = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();
  let touched = created + Duration::minutes(10);
  let retired = created + Duration::hours(2);
  let incident = insert(&s, Incident::new(kind.type_id, 7, at(1.0, 1.0), created)).await;
  let id = incident.incident_id;

  s.transact(move |tx| {
    tx.touch_incident(id, touched)?;
    tx.retire_incident(id, retired)
  })
  .await
  .unwrap();

  let view = s.get_incident(id).await.unwrap().unwrap();
  assert_eq!(view.incident.updated_at, touched);
  assert_eq!(view.incident.deleted_at, Some(retired));
}

#[tokio::test]
async fn active_and_history_partition_by_retirement() {
  let s = store().await;
  let kind = seed_type(&s, pothole()).await;
  let now = Utc::now();
  let live = insert(&s, Incident::new(kind.type_id, 7, at(1.0, 1.0), now)).await;
  let gone = insert(&s, Incident::new(kind.type_id, 7, at(2.0, 2.0), now)).await;
  let other = insert(&s, Incident::new(kind.type_id, 8, at(3.0, 3.0), now)).await;

  let (gone_id, other_id) = (gone.incident_id, other.incident_id);
  s.transact(move |tx| {
    tx.retire_incident(gone_id, now)?;
    tx.retire_incident(other_id, now)
  })
  .await
  .unwrap();

  let active = s.transact(|tx| tx.active_incident_ids()).await.unwrap();
  assert_eq!(active, vec![live.incident_id]);

  let history = s.transact(|tx| tx.retired_by_user(7)).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].incident.incident_id, gone_id);
}

// ─── Interactions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn interactions_are_loaded_with_incident() {
  let s = store().await;
  let kind = seed_type(&s, pothole()).await;
  let now = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();
  let incident = insert(&s, Incident::new(kind.type_id, 7, at(1.0, 1.0), now)).await;
  let id = incident.incident_id;

  let yes = Interaction::new(id, 8, true, now + Duration::minutes(1));
  let no = Interaction::new(id, 9, false, now + Duration::minutes(2));
  let (yes_c, no_c) = (yes.clone(), no.clone());
  s.transact(move |tx| {
    tx.insert_interaction(&yes_c)?;
    tx.insert_interaction(&no_c)?;
    tx.touch_incident(id, no_c.created_at)
  })
  .await
  .unwrap();

  let view = s.get_incident(id).await.unwrap().unwrap();
  assert_eq!(view.interactions.len(), 2);
  assert!(view.interactions.contains(&yes));
  assert!(view.interactions.contains(&no));
  assert_eq!(view.incident.updated_at, no.created_at);
}

#[tokio::test]
async fn failed_transaction_rolls_back_everything() {
  let s = store().await;
  let kind = seed_type(&s, pothole()).await;
  let incident = Incident::new(kind.type_id, 7, at(1.0, 1.0), Utc::now());
  let id = incident.incident_id;

  let err = s
    .transact(move |tx| -> roadwatch_core::Result<()> {
      tx.insert_incident(&incident)?;
      Err(CoreError::Forbidden("abort".into()))
    })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(_)));
  assert!(s.get_incident(id).await.unwrap().is_none());
}

#[tokio::test]
async fn interaction_on_unknown_incident_is_a_storage_error() {
  let s = store().await;
  let orphan = Interaction::new(Uuid::new_v4(), 8, true, Utc::now());
  let err = s
    .transact(move |tx| tx.insert_interaction(&orphan))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Storage(_)));
}

// ─── Proximity ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_nearby_filters_by_exact_distance_and_orders() {
  let s = store().await;
  let kind = seed_type(&s, pothole()).await;
  let now = Utc::now();
  let center = at(48.8566, 2.3522);

  // ~55 m, ~22 m and ~155 m north of the center.
  let mid = insert(&s, Incident::new(kind.type_id, 1, at(48.8571, 2.3522), now)).await;
  let close = insert(&s, Incident::new(kind.type_id, 1, at(48.8568, 2.3522), now)).await;
  insert(&s, Incident::new(kind.type_id, 1, at(48.8580, 2.3522), now)).await;

  let query = ProximityQuery { center, radius_meters: 100.0, type_id: None };
  let found = s.transact(move |tx| tx.find_nearby(&query)).await.unwrap();

  let ids: Vec<_> = found.iter().map(|n| n.incident.incident_id).collect();
  assert_eq!(ids, vec![close.incident_id, mid.incident_id]);
  assert!(found.iter().all(|n| n.distance <= 100.0));
  assert!(found[0].distance < found[1].distance);
}

#[tokio::test]
async fn find_nearby_excludes_bbox_corners_beyond_radius() {
  let s = store().await;
  let kind = seed_type(&s, pothole()).await;
  let center = at(0.0, 0.0);

  // Inside the bounding box (both offsets < 100/111000 degrees) but ~127 m
  // away diagonally.
  insert(&s, Incident::new(kind.type_id, 1, at(0.0008, 0.0008), Utc::now())).await;

  let query = ProximityQuery { center, radius_meters: 100.0, type_id: None };
  let found = s.transact(move |tx| tx.find_nearby(&query)).await.unwrap();
  assert!(found.is_empty());
}

#[tokio::test]
async fn find_nearby_respects_type_and_retirement() {
  let s = store().await;
  let pothole = seed_type(&s, pothole()).await;
  let accident = seed_type(&s, NewIncidentType { name: "Accident".into(), ..self::pothole() }).await;
  let now = Utc::now();
  let center = at(10.0, 10.0);

  let keep = insert(&s, Incident::new(pothole.type_id, 1, center, now)).await;
  insert(&s, Incident::new(accident.type_id, 1, center, now)).await;
  let retired = insert(&s, Incident::new(pothole.type_id, 1, center, now)).await;
  let retired_id = retired.incident_id;
  s.transact(move |tx| tx.retire_incident(retired_id, now)).await.unwrap();

  let query = ProximityQuery { center, radius_meters: 50.0, type_id: Some(pothole.type_id) };
  let found = s.transact(move |tx| tx.find_nearby(&query)).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].incident.incident_id, keep.incident_id);

  let any_type = ProximityQuery { type_id: None, ..query };
  let found = s.transact(move |tx| tx.find_nearby(&any_type)).await.unwrap();
  assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn find_nearby_reports_interaction_counts() {
  let s = store().await;
  let kind = seed_type(&s, pothole()).await;
  let now = Utc::now();
  let center = at(10.0, 10.0);
  let incident = insert(&s, Incident::new(kind.type_id, 1, center, now)).await;
  let id = incident.incident_id;

  s.transact(move |tx| {
    tx.insert_interaction(&Interaction::new(id, 2, true, now))?;
    tx.insert_interaction(&Interaction::new(id, 3, false, now))
  })
  .await
  .unwrap();

  let query = ProximityQuery { center, radius_meters: 10.0, type_id: None };
  let found = s.transact(move |tx| tx.find_nearby(&query)).await.unwrap();
  assert_eq!(found[0].interaction_count, 2);
}
