//! SQL schema for the roadwatch SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

-- Admin-managed moderation policy. Never written by the lifecycle rules.
CREATE TABLE IF NOT EXISTS incident_types (
    type_id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    name                          TEXT NOT NULL UNIQUE,
    description                   TEXT,
    lifetime_without_confirmation INTEGER NOT NULL,   -- seconds
    global_lifetime               INTEGER NOT NULL,   -- seconds
    negative_reports_threshold    INTEGER NOT NULL,
    positive_reports_threshold    INTEGER NOT NULL DEFAULT 0,
    need_recalculation            INTEGER NOT NULL DEFAULT 0
);

-- Incidents are never deleted; retirement sets deleted_at exactly once.
CREATE TABLE IF NOT EXISTS incidents (
    incident_id TEXT PRIMARY KEY,
    type_id     INTEGER NOT NULL REFERENCES incident_types(type_id),
    user_id     INTEGER NOT NULL,
    latitude    REAL NOT NULL,
    longitude   REAL NOT NULL,
    created_at  TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    updated_at  TEXT NOT NULL,
    deleted_at  TEXT             -- NULL while active
);

-- Interactions are strictly append-only.
CREATE TABLE IF NOT EXISTS incident_interactions (
    interaction_id   TEXT PRIMARY KEY,
    incident_id      TEXT NOT NULL REFERENCES incidents(incident_id),
    user_id          INTEGER NOT NULL,
    is_still_present INTEGER NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS incidents_active_geo_idx
    ON incidents(type_id, latitude, longitude) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS incidents_user_idx
    ON incidents(user_id, created_at);
CREATE INDEX IF NOT EXISTS interactions_incident_idx
    ON incident_interactions(incident_id);

PRAGMA user_version = 1;
";
