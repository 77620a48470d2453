//! Durable storage for paperscout: the judgment cache, run history, and
//! file-backed dataset/partial-result artifacts.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the judgment
//! cache (memoized model judgments) and run bookkeeping. Enriched datasets
//! and partial results are line-delimited JSON files, see [`dataset`] and
//! [`partial`].

mod migrations;

pub mod dataset;
pub mod partial;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use paperscout_shared::{PaperIdentity, PaperScoutError, Result};

pub use partial::{JudgedOutcome, PartialEntry, PartialResult};

// ---------------------------------------------------------------------------
// Fingerprints
// ---------------------------------------------------------------------------

/// Compute the deterministic cache key for one (paper, task, parameters)
/// judgment request.
///
/// Inputs are length-delimited before hashing so distinct input tuples can
/// never collide by concatenation. The paper's normalized matching key is
/// used, so title casing and whitespace do not perturb the fingerprint.
pub fn judgment_fingerprint(identity: &PaperIdentity, task: &str, params: &[&str]) -> String {
    let mut parts = vec![identity.matching_key()];
    parts.push(task.to_string());
    parts.extend(params.iter().map(|p| p.to_string()));
    hash_parts(&parts)
}

/// Compute the key identifying a filter/extraction run by its parameters.
/// Runs with the same key share one partial-result file and can resume it.
pub fn run_key(task: &str, params: &[&str]) -> String {
    let mut parts = vec![task.to_string()];
    parts.extend(params.iter().map(|p| p.to_string()));
    hash_parts(&parts)
}

fn hash_parts(parts: &[String]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PaperScoutError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PaperScoutError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PaperScoutError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    PaperScoutError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Judgment cache operations
    // -----------------------------------------------------------------------

    /// Look up a cached judgment by fingerprint.
    ///
    /// Returns `Ok(None)` on a plain miss. An entry whose payload no longer
    /// deserializes yields [`PaperScoutError::CacheCorruption`]; callers
    /// treat that as a miss and rewrite the entry after re-computing.
    pub async fn get_judgment<T: DeserializeOwned>(
        &self,
        fingerprint: &str,
    ) -> Result<Option<T>> {
        let mut rows = self
            .conn
            .query(
                "SELECT result_json FROM judgment_cache WHERE fingerprint = ?1",
                params![fingerprint],
            )
            .await
            .map_err(|e| PaperScoutError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let result_json: String = row
                    .get(0)
                    .map_err(|e| PaperScoutError::Storage(e.to_string()))?;
                serde_json::from_str(&result_json).map(Some).map_err(|e| {
                    PaperScoutError::CacheCorruption(format!(
                        "entry {fingerprint} unreadable: {e}"
                    ))
                })
            }
            Ok(None) => Ok(None),
            Err(e) => Err(PaperScoutError::Storage(e.to_string())),
        }
    }

    /// Store a judgment in the cache.
    ///
    /// Idempotent: rewriting a fingerprint is an upsert, so a corrupt entry
    /// can be replaced and a same-value rewrite is observationally a no-op.
    /// The row is written in a single statement, so readers never observe a
    /// partially-written entry.
    pub async fn put_judgment<T: Serialize>(
        &self,
        fingerprint: &str,
        task: &str,
        value: &T,
    ) -> Result<()> {
        let result_json =
            serde_json::to_string(value).map_err(|e| PaperScoutError::Storage(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO judgment_cache (fingerprint, task, result_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(fingerprint) DO UPDATE SET
                   result_json = excluded.result_json,
                   created_at = excluded.created_at",
                params![fingerprint, task, result_json.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| PaperScoutError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Total number of cached judgments, optionally restricted to one task.
    pub async fn judgment_count(&self, task: Option<&str>) -> Result<u64> {
        let mut rows = match task {
            Some(task) => self
                .conn
                .query(
                    "SELECT COUNT(*) FROM judgment_cache WHERE task = ?1",
                    params![task],
                )
                .await,
            None => {
                self.conn
                    .query("SELECT COUNT(*) FROM judgment_cache", params![])
                    .await
            }
        }
        .map_err(|e| PaperScoutError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<u64>(0)
                .map_err(|e| PaperScoutError::Storage(e.to_string())),
            _ => Ok(0),
        }
    }

    // -----------------------------------------------------------------------
    // Run bookkeeping
    // -----------------------------------------------------------------------

    /// Record the start of a filter/extraction run. Returns the run id.
    pub async fn insert_run(&self, task: &str, run_key: &str) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO runs (id, task, run_key, started_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), task, run_key, now.as_str()],
            )
            .await
            .map_err(|e| PaperScoutError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Mark a run finished, recording its outcome counts as JSON.
    pub async fn finish_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(|e| PaperScoutError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperscout_shared::Venue;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct FakeJudgment {
        relevant: bool,
        rationale: String,
    }

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("ps_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn identity() -> PaperIdentity {
        PaperIdentity::new(Venue::Ccs, 2020, "Foo Bar")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("ps_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = judgment_fingerprint(&identity(), "relevance", &["privacy leaks", "gpt-4o-mini"]);
        let b = judgment_fingerprint(&identity(), "relevance", &["privacy leaks", "gpt-4o-mini"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // SHA-256 hex
    }

    #[test]
    fn fingerprint_differs_by_task_and_params() {
        let relevance = judgment_fingerprint(&identity(), "relevance", &["privacy leaks"]);
        let keywords = judgment_fingerprint(&identity(), "keywords", &["privacy leaks"]);
        assert_ne!(relevance, keywords);

        let other_query = judgment_fingerprint(&identity(), "relevance", &["fuzzing"]);
        assert_ne!(relevance, other_query);
    }

    #[test]
    fn fingerprint_uses_normalized_identity() {
        let messy = PaperIdentity::new(Venue::Ccs, 2020, "foo   bar.");
        let a = judgment_fingerprint(&identity(), "relevance", &["q"]);
        let b = judgment_fingerprint(&messy, "relevance", &["q"]);
        assert_eq!(a, b);
    }

    #[test]
    fn length_delimiting_prevents_concat_collisions() {
        let a = run_key("relevance", &["ab", "c"]);
        let b = run_key("relevance", &["a", "bc"]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn judgment_cache_miss_then_hit() {
        let storage = test_storage().await;
        let fp = judgment_fingerprint(&identity(), "relevance", &["q"]);

        let miss: Option<FakeJudgment> = storage.get_judgment(&fp).await.expect("miss");
        assert!(miss.is_none());

        let value = FakeJudgment {
            relevant: true,
            rationale: "on topic".into(),
        };
        storage.put_judgment(&fp, "relevance", &value).await.expect("put");

        let hit: Option<FakeJudgment> = storage.get_judgment(&fp).await.expect("hit");
        assert_eq!(hit, Some(value));
        assert_eq!(storage.judgment_count(Some("relevance")).await.unwrap(), 1);
        assert_eq!(storage.judgment_count(Some("keywords")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn put_twice_is_a_noop() {
        let storage = test_storage().await;
        let fp = judgment_fingerprint(&identity(), "keywords", &["m"]);
        let value = vec!["fuzzing".to_string(), "kernels".to_string()];

        storage.put_judgment(&fp, "keywords", &value).await.unwrap();
        storage.put_judgment(&fp, "keywords", &value).await.unwrap();

        assert_eq!(storage.judgment_count(None).await.unwrap(), 1);
        let hit: Option<Vec<String>> = storage.get_judgment(&fp).await.unwrap();
        assert_eq!(hit, Some(value));
    }

    #[tokio::test]
    async fn corrupt_entry_reports_cache_corruption() {
        let storage = test_storage().await;
        let fp = judgment_fingerprint(&identity(), "relevance", &["q"]);

        // A string payload where the caller expects a structured judgment.
        storage.put_judgment(&fp, "relevance", &"garbage").await.unwrap();

        let result: Result<Option<FakeJudgment>> = storage.get_judgment(&fp).await;
        assert!(matches!(result, Err(PaperScoutError::CacheCorruption(_))));

        // Rewriting repairs the entry.
        let value = FakeJudgment {
            relevant: false,
            rationale: "off topic".into(),
        };
        storage.put_judgment(&fp, "relevance", &value).await.unwrap();
        let hit: Option<FakeJudgment> = storage.get_judgment(&fp).await.unwrap();
        assert_eq!(hit, Some(value));
    }

    #[tokio::test]
    async fn run_lifecycle() {
        let storage = test_storage().await;
        let key = run_key("relevance", &["privacy leaks"]);

        let run_id = storage.insert_run("relevance", &key).await.expect("insert run");
        assert!(!run_id.is_empty());

        storage
            .finish_run(&run_id, r#"{"accepted": 2, "rejected": 1, "errors": 0}"#)
            .await
            .expect("finish run");
    }
}
