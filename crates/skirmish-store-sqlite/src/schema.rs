//! SQL schema for the skirmish SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE … IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

-- Roster tables are maintained by the roster-management tool.
CREATE TABLE IF NOT EXISTS alias_groups (
    group_id    INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS identities (
    identity_id    INTEGER PRIMARY KEY,
    name           TEXT NOT NULL,
    faction        TEXT NOT NULL,   -- 'brahma' | 'vishnu' | 'shiva'
    job            TEXT NOT NULL DEFAULT '',
    alias_group_id INTEGER REFERENCES alias_groups(group_id),
    deleted_at     TEXT             -- RFC 3339; NULL while live
);

-- Display names are unique among live identities only.
CREATE UNIQUE INDEX IF NOT EXISTS identities_live_name_idx
    ON identities(name) WHERE deleted_at IS NULL;

-- One row per resolved kill. The only in-place update is `blessed`.
CREATE TABLE IF NOT EXISTS battle_records (
    record_id  INTEGER PRIMARY KEY,
    winner     TEXT NOT NULL,
    loser      TEXT NOT NULL,
    pos_x      INTEGER NOT NULL,
    pos_y      INTEGER NOT NULL,
    blessed    INTEGER NOT NULL DEFAULT 0 CHECK (blessed IN (0, 1)),
    fought_at  TEXT NOT NULL,       -- game-local 'YYYY-MM-DD HH:MM:SS'
    created_by INTEGER,             -- winner's identity_id
    import_id  TEXT,                -- UUID of the import run
    created_at TEXT NOT NULL,       -- RFC 3339 UTC; server-assigned
    deleted_at TEXT
);

-- The dedup key.
CREATE UNIQUE INDEX IF NOT EXISTS battle_records_dedup_idx
    ON battle_records(winner, loser, fought_at) WHERE deleted_at IS NULL;

CREATE INDEX IF NOT EXISTS battle_records_fought_idx ON battle_records(fought_at);
CREATE INDEX IF NOT EXISTS battle_records_winner_idx ON battle_records(winner, fought_at);
CREATE INDEX IF NOT EXISTS battle_records_loser_idx  ON battle_records(loser);

PRAGMA user_version = 1;
";
