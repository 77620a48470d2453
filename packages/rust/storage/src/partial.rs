//! Resumable per-run result files.
//!
//! A run appends one [`PartialEntry`] per judged paper to
//! `<run_key>.partial.jsonl`. Re-opening the same run key reloads those
//! entries so an interrupted run picks up where it stopped, and
//! [`PartialResult::finalize`] renames the file to `<run_key>.jsonl` once the
//! run completes. With `save_partial` off, entries stay in memory and only
//! the final file is written.

use std::collections::HashSet;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use paperscout_shared::{PaperRecord, PaperScoutError, Result};
use serde::{Deserialize, Serialize};

/// What a run decided about one paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JudgedOutcome {
    /// Relevance filter: kept.
    Accepted,
    /// Relevance filter: dropped.
    Rejected,
    /// The judgment itself failed; never conflated with a rejection.
    Error { message: String },
    /// Keyword extraction result.
    Extracted { keywords: Vec<String> },
}

/// One line of a partial-result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialEntry {
    /// Matching key of the judged paper.
    pub key: String,
    /// Full record, carried for accepted papers so the final file is
    /// usable without re-joining against the dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<PaperRecord>,
    #[serde(flatten)]
    pub outcome: JudgedOutcome,
    pub judged_at: DateTime<Utc>,
}

impl PartialEntry {
    pub fn new(key: impl Into<String>, record: Option<PaperRecord>, outcome: JudgedOutcome) -> Self {
        Self {
            key: key.into(),
            record,
            outcome,
            judged_at: Utc::now(),
        }
    }
}

/// Append-only result sink for one run.
pub struct PartialResult {
    partial_path: PathBuf,
    final_path: PathBuf,
    entries: Vec<PartialEntry>,
    keys: HashSet<String>,
    writer: Option<BufWriter<std::fs::File>>,
    flush_interval: usize,
    unflushed: usize,
    resumed: usize,
}

impl PartialResult {
    /// Open (or resume) the run `run_key` under `dir`.
    ///
    /// When `save_partial` is set, existing entries in
    /// `<run_key>.partial.jsonl` are reloaded and new entries are appended to
    /// it, flushed every `flush_interval` entries. Lines that no longer parse
    /// are skipped with a warning; a partial file is scratch state, not an
    /// owned artifact.
    pub fn open(
        dir: &Path,
        run_key: &str,
        save_partial: bool,
        flush_interval: usize,
    ) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| PaperScoutError::io(dir, e))?;
        let partial_path = dir.join(format!("{run_key}.partial.jsonl"));
        let final_path = dir.join(format!("{run_key}.jsonl"));

        let mut entries = Vec::new();
        if save_partial && partial_path.exists() {
            let file =
                std::fs::File::open(&partial_path).map_err(|e| PaperScoutError::io(&partial_path, e))?;
            for (lineno, line) in BufReader::new(file).lines().enumerate() {
                let line = line.map_err(|e| PaperScoutError::io(&partial_path, e))?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<PartialEntry>(&line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => {
                        tracing::warn!(
                            path = %partial_path.display(),
                            line = lineno + 1,
                            error = %e,
                            "skipping unreadable partial entry"
                        );
                    }
                }
            }
            if !entries.is_empty() {
                tracing::info!(run_key, resumed = entries.len(), "resuming partial run");
            }
        }

        let writer = if save_partial {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&partial_path)
                .map_err(|e| PaperScoutError::io(&partial_path, e))?;
            Some(BufWriter::new(file))
        } else {
            None
        };

        let keys = entries.iter().map(|e| e.key.clone()).collect();
        let resumed = entries.len();
        Ok(Self {
            partial_path,
            final_path,
            entries,
            keys,
            writer,
            flush_interval: flush_interval.max(1),
            unflushed: 0,
            resumed,
        })
    }

    /// True if this run already holds an entry for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of entries reloaded from an earlier interrupted run.
    pub fn resumed_count(&self) -> usize {
        self.resumed
    }

    pub fn entries(&self) -> &[PartialEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records of entries with an [`JudgedOutcome::Accepted`] outcome, in
    /// judgment order.
    pub fn accepted_records(&self) -> Vec<&PaperRecord> {
        self.entries
            .iter()
            .filter(|e| e.outcome == JudgedOutcome::Accepted)
            .filter_map(|e| e.record.as_ref())
            .collect()
    }

    /// Append one judged entry, persisting it if partial saving is on.
    pub fn append(&mut self, entry: PartialEntry) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            let line = serde_json::to_string(&entry)
                .map_err(|e| PaperScoutError::Storage(format!("serialize partial entry: {e}")))?;
            writeln!(writer, "{line}").map_err(|e| PaperScoutError::io(&self.partial_path, e))?;
            self.unflushed += 1;
            if self.unflushed >= self.flush_interval {
                writer
                    .flush()
                    .map_err(|e| PaperScoutError::io(&self.partial_path, e))?;
                self.unflushed = 0;
            }
        }
        self.keys.insert(entry.key.clone());
        self.entries.push(entry);
        Ok(())
    }

    /// Complete the run: the partial file becomes `<run_key>.jsonl`.
    ///
    /// Returns the final path. After this the partial file no longer exists,
    /// so a re-run with the same key starts fresh.
    pub fn finalize(mut self) -> Result<PathBuf> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| PaperScoutError::io(&self.partial_path, e))?;
            drop(writer);
            std::fs::rename(&self.partial_path, &self.final_path)
                .map_err(|e| PaperScoutError::io(&self.final_path, e))?;
        } else {
            let tmp = self.final_path.with_extension("jsonl.tmp");
            {
                let file =
                    std::fs::File::create(&tmp).map_err(|e| PaperScoutError::io(&tmp, e))?;
                let mut writer = BufWriter::new(file);
                for entry in &self.entries {
                    let line = serde_json::to_string(entry).map_err(|e| {
                        PaperScoutError::Storage(format!("serialize partial entry: {e}"))
                    })?;
                    writeln!(writer, "{line}").map_err(|e| PaperScoutError::io(&tmp, e))?;
                }
                writer.flush().map_err(|e| PaperScoutError::io(&tmp, e))?;
            }
            std::fs::rename(&tmp, &self.final_path)
                .map_err(|e| PaperScoutError::io(&self.final_path, e))?;
        }
        tracing::debug!(path = %self.final_path.display(), "run results finalized");
        Ok(self.final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperscout_shared::{PaperIdentity, Venue};
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ps_partial_{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn record(title: &str) -> PaperRecord {
        PaperRecord::new(PaperIdentity::new(Venue::Ccs, 2020, title))
    }

    #[test]
    fn append_then_reopen_resumes() {
        let dir = temp_dir();
        let key = "testrun";

        let mut run = PartialResult::open(&dir, key, true, 1).unwrap();
        let a = record("Paper A");
        run.append(PartialEntry::new(
            a.matching_key(),
            Some(a.clone()),
            JudgedOutcome::Accepted,
        ))
        .unwrap();
        run.append(PartialEntry::new(
            record("Paper B").matching_key(),
            None,
            JudgedOutcome::Rejected,
        ))
        .unwrap();
        drop(run); // simulate interruption, no finalize

        let resumed = PartialResult::open(&dir, key, true, 1).unwrap();
        assert_eq!(resumed.resumed_count(), 2);
        assert!(resumed.contains(&a.matching_key()));
        assert!(!resumed.contains(&record("Paper C").matching_key()));
        assert_eq!(resumed.accepted_records(), vec![&a]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn finalize_renames_partial() {
        let dir = temp_dir();
        let key = "finalrun";

        let mut run = PartialResult::open(&dir, key, true, 1).unwrap();
        run.append(PartialEntry::new("k1", None, JudgedOutcome::Rejected))
            .unwrap();
        let final_path = run.finalize().unwrap();

        assert_eq!(final_path, dir.join("finalrun.jsonl"));
        assert!(final_path.exists());
        assert!(!dir.join("finalrun.partial.jsonl").exists());

        // A fresh open after finalize starts empty.
        let fresh = PartialResult::open(&dir, key, true, 1).unwrap();
        assert!(fresh.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn in_memory_mode_writes_only_final_file() {
        let dir = temp_dir();
        let key = "memrun";

        let mut run = PartialResult::open(&dir, key, false, 1).unwrap();
        run.append(PartialEntry::new(
            "k1",
            None,
            JudgedOutcome::Extracted {
                keywords: vec!["fuzzing".into()],
            },
        ))
        .unwrap();
        assert!(!dir.join("memrun.partial.jsonl").exists());

        let final_path = run.finalize().unwrap();
        let contents = std::fs::read_to_string(&final_path).unwrap();
        let entry: PartialEntry = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(
            entry.outcome,
            JudgedOutcome::Extracted {
                keywords: vec!["fuzzing".into()]
            }
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_partial_lines_are_skipped() {
        let dir = temp_dir();
        let key = "corrupt";
        let path = dir.join("corrupt.partial.jsonl");

        let good = PartialEntry::new("k1", None, JudgedOutcome::Accepted);
        let mut contents = serde_json::to_string(&good).unwrap();
        contents.push_str("\n{broken line\n");
        std::fs::write(&path, contents).unwrap();

        let run = PartialResult::open(&dir, key, true, 1).unwrap();
        assert_eq!(run.resumed_count(), 1);
        assert!(run.contains("k1"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
