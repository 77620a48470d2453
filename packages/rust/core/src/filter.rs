//! Cached relevance filtering over a candidate set.
//!
//! Candidates are judged in input order. Each (paper, query) pair is
//! fingerprinted against the judgment cache first; only misses reach the
//! model, and every fresh judgment is written back before it is used. The
//! run's outcomes stream into a resumable partial-result file, so an
//! interrupted run re-judges nothing on restart.

use std::path::{Path, PathBuf};

use paperscout_shared::{PaperRecord, PaperScoutError, Result};
use paperscout_storage::{
    JudgedOutcome, PartialEntry, PartialResult, Storage, judgment_fingerprint, run_key,
};

use crate::model::{ModelCollaborator, RelevanceJudgment};

const TASK: &str = "relevance";

/// Options for one filter run.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// The relevance query the model judges against.
    pub query: String,
    /// Extra run-scoping parameters (venue/year selectors), part of the
    /// run key so differently-scoped runs never share a partial file.
    pub scope: Vec<String>,
    /// Model identifier, part of every judgment fingerprint so switching
    /// models never replays another model's cached judgments.
    pub model: String,
    /// When off, every candidate is re-judged and the cache rewritten.
    pub use_cache: bool,
    pub save_partial: bool,
    pub flush_interval: usize,
}

impl FilterOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            scope: Vec::new(),
            model: String::new(),
            use_cache: true,
            save_partial: true,
            flush_interval: 1,
        }
    }
}

/// Counters reported at the end of a judgment run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Model failures, recorded as their own outcome, never as rejections.
    pub errors: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Candidates already judged by a resumed earlier run.
    pub skipped: usize,
    /// Cache entries that no longer deserialized and were recomputed.
    pub corrupt: usize,
}

impl RunSummary {
    pub fn stats_json(&self) -> serde_json::Value {
        serde_json::json!({
            "processed": self.processed,
            "accepted": self.accepted,
            "rejected": self.rejected,
            "errors": self.errors,
            "cache_hits": self.cache_hits,
            "cache_misses": self.cache_misses,
            "skipped": self.skipped,
            "corrupt": self.corrupt,
        })
    }
}

/// Progress callback for judgment runs.
pub trait RunProgress {
    fn begin(&self, total: usize, resumed: usize);
    fn judged(&self, title: &str, outcome: &JudgedOutcome);
    fn done(&self, summary: &RunSummary);
}

/// No-op reporter for headless/test usage.
pub struct SilentProgress;

impl RunProgress for SilentProgress {
    fn begin(&self, _total: usize, _resumed: usize) {}
    fn judged(&self, _title: &str, _outcome: &JudgedOutcome) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Judge every candidate against `query`, returning the summary and the
/// path of the finalized result file.
pub async fn run_filter(
    candidates: &[PaperRecord],
    options: &FilterOptions,
    model: &impl ModelCollaborator,
    storage: &Storage,
    runs_dir: &Path,
    progress: &impl RunProgress,
) -> Result<(RunSummary, PathBuf)> {
    let mut params: Vec<&str> = vec![options.query.as_str()];
    params.extend(options.scope.iter().map(String::as_str));
    let key = run_key(TASK, &params);
    let run_id = storage.insert_run(TASK, &key).await?;

    let mut partial = PartialResult::open(runs_dir, &key, options.save_partial, options.flush_interval)?;
    progress.begin(candidates.len(), partial.resumed_count());

    let mut summary = RunSummary::default();
    for candidate in candidates {
        let matching_key = candidate.matching_key();
        if partial.contains(&matching_key) {
            summary.skipped += 1;
            continue;
        }
        summary.processed += 1;

        let judgment = match cached_or_judge(candidate, options, model, storage, &mut summary).await
        {
            Ok(judgment) => judgment,
            Err(e) => {
                summary.errors += 1;
                tracing::error!(
                    title = candidate.identity.title,
                    error = %e,
                    "relevance judgment failed"
                );
                let entry = PartialEntry::new(
                    matching_key,
                    None,
                    JudgedOutcome::Error {
                        message: e.to_string(),
                    },
                );
                progress.judged(&candidate.identity.title, &entry.outcome);
                partial.append(entry)?;
                continue;
            }
        };

        let entry = if judgment.relevant {
            summary.accepted += 1;
            PartialEntry::new(matching_key, Some(candidate.clone()), JudgedOutcome::Accepted)
        } else {
            summary.rejected += 1;
            PartialEntry::new(matching_key, None, JudgedOutcome::Rejected)
        };
        progress.judged(&candidate.identity.title, &entry.outcome);
        partial.append(entry)?;
    }

    let final_path = partial.finalize()?;
    storage
        .finish_run(&run_id, &summary.stats_json().to_string())
        .await?;
    progress.done(&summary);
    Ok((summary, final_path))
}

/// Cache lookup, falling through to the model on a miss. A corrupt cache
/// entry is logged, counted, and treated as a miss; the fresh judgment
/// overwrites it.
async fn cached_or_judge(
    candidate: &PaperRecord,
    options: &FilterOptions,
    model: &impl ModelCollaborator,
    storage: &Storage,
    summary: &mut RunSummary,
) -> Result<RelevanceJudgment> {
    let fingerprint = judgment_fingerprint(
        &candidate.identity,
        TASK,
        &[options.query.as_str(), options.model.as_str()],
    );

    if options.use_cache {
        match storage.get_judgment::<RelevanceJudgment>(&fingerprint).await {
            Ok(Some(judgment)) => {
                summary.cache_hits += 1;
                return Ok(judgment);
            }
            Ok(None) => {}
            Err(PaperScoutError::CacheCorruption(msg)) => {
                summary.corrupt += 1;
                tracing::warn!(fingerprint, %msg, "corrupt cache entry, recomputing");
            }
            Err(e) => return Err(e),
        }
    }

    summary.cache_misses += 1;
    let judgment = model
        .judge_relevance(
            &candidate.identity.title,
            candidate.abstract_text.as_deref(),
            &options.query,
        )
        .await?;
    storage.put_judgment(&fingerprint, TASK, &judgment).await?;
    Ok(judgment)
}
