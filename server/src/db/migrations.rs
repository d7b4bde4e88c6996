use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: session counters
-- One scalar row per session; the counter is the only persisted state.

CREATE TABLE session_counters (
    session_id TEXT PRIMARY KEY,
    counter INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);
",
    )])
}
