//! SQL migration definitions for the paperscout database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: judgment_cache, runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Memoized model-backed judgments, keyed by a deterministic fingerprint of
-- (paper identity, task discriminator, task parameters). Append-only: a key
-- is written once then only read; distinct parameters yield distinct keys.
CREATE TABLE IF NOT EXISTS judgment_cache (
    fingerprint TEXT PRIMARY KEY,
    task        TEXT NOT NULL,
    result_json TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_judgment_cache_task ON judgment_cache(task);

-- Filter/extraction run history with per-category error counts
CREATE TABLE IF NOT EXISTS runs (
    id          TEXT PRIMARY KEY,
    task        TEXT NOT NULL,
    run_key     TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_run_key ON runs(run_key);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
