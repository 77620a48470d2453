//! Cached keyword extraction over an enriched dataset.
//!
//! Same control shape as the relevance filter: fingerprint → cache →
//! model → cache write → partial entry. The difference is the result:
//! extracted keyword lists are attached back onto the dataset records, and
//! every completed paper ends with a list, empty on total failure, never
//! absent.

use std::path::Path;

use paperscout_shared::{PaperScoutError, Result};
use paperscout_storage::{
    JudgedOutcome, PartialEntry, PartialResult, Storage, judgment_fingerprint, run_key,
};

use crate::filter::{RunProgress, RunSummary};
use crate::merge::EnrichedDataset;
use crate::model::{KeywordSet, ModelCollaborator};

const TASK: &str = "keywords";

/// Options for one keyword-extraction run.
#[derive(Debug, Clone)]
pub struct KeywordOptions {
    /// Run-scoping parameters (venue/year selectors), part of the run key.
    pub scope: Vec<String>,
    /// Model identifier, part of every judgment fingerprint so switching
    /// models never replays another model's cached extractions.
    pub model: String,
    pub use_cache: bool,
    pub save_partial: bool,
    pub flush_interval: usize,
}

impl Default for KeywordOptions {
    fn default() -> Self {
        Self {
            scope: Vec::new(),
            model: String::new(),
            use_cache: true,
            save_partial: true,
            flush_interval: 1,
        }
    }
}

/// Extract keywords for every record in the dataset, attaching the lists
/// onto the records in place. The caller persists the updated dataset.
///
/// In the summary, `accepted` counts papers that got a non-empty list and
/// `rejected` is always zero.
pub async fn run_keywords(
    dataset: &mut EnrichedDataset,
    options: &KeywordOptions,
    model: &impl ModelCollaborator,
    storage: &Storage,
    runs_dir: &Path,
    progress: &impl RunProgress,
) -> Result<RunSummary> {
    let params: Vec<&str> = options.scope.iter().map(String::as_str).collect();
    let key = run_key(TASK, &params);
    let run_id = storage.insert_run(TASK, &key).await?;

    let mut partial =
        PartialResult::open(runs_dir, &key, options.save_partial, options.flush_interval)?;
    progress.begin(dataset.len(), partial.resumed_count());

    // A resumed partial already holds keyword lists for the papers it
    // covers; re-attach them so the dataset is complete even for skips.
    let resumed: Vec<(String, Vec<String>)> = partial
        .entries()
        .iter()
        .filter_map(|entry| match &entry.outcome {
            JudgedOutcome::Extracted { keywords } => Some((entry.key.clone(), keywords.clone())),
            _ => None,
        })
        .collect();
    for (entry_key, keywords) in resumed {
        if let Some(record) = dataset
            .records_mut()
            .iter_mut()
            .find(|r| r.matching_key() == entry_key)
        {
            record.keywords = keywords;
        }
    }

    let mut summary = RunSummary::default();
    for i in 0..dataset.len() {
        let (matching_key, title, abstract_text, fingerprint) = {
            let record = &dataset.records()[i];
            (
                record.matching_key(),
                record.identity.title.clone(),
                record.abstract_text.clone(),
                judgment_fingerprint(&record.identity, TASK, &[options.model.as_str()]),
            )
        };
        if partial.contains(&matching_key) {
            summary.skipped += 1;
            continue;
        }
        summary.processed += 1;

        let keywords = match cached_or_extract(
            &fingerprint,
            &title,
            abstract_text.as_deref(),
            options,
            model,
            storage,
            &mut summary,
        )
        .await
        {
            Ok(set) => dedup_keywords(set.keywords),
            Err(e) => {
                summary.errors += 1;
                tracing::error!(title, error = %e, "keyword extraction failed");
                let entry = PartialEntry::new(
                    matching_key.clone(),
                    None,
                    JudgedOutcome::Error {
                        message: e.to_string(),
                    },
                );
                progress.judged(&title, &entry.outcome);
                partial.append(entry)?;
                // Failure still leaves a list, just an empty one.
                dataset.records_mut()[i].keywords = Vec::new();
                continue;
            }
        };

        if !keywords.is_empty() {
            summary.accepted += 1;
        }
        dataset.records_mut()[i].keywords = keywords.clone();

        let entry = PartialEntry::new(matching_key, None, JudgedOutcome::Extracted { keywords });
        progress.judged(&title, &entry.outcome);
        partial.append(entry)?;
    }

    partial.finalize()?;
    storage
        .finish_run(&run_id, &summary.stats_json().to_string())
        .await?;
    progress.done(&summary);
    Ok(summary)
}

async fn cached_or_extract(
    fingerprint: &str,
    title: &str,
    abstract_text: Option<&str>,
    options: &KeywordOptions,
    model: &impl ModelCollaborator,
    storage: &Storage,
    summary: &mut RunSummary,
) -> Result<KeywordSet> {
    if options.use_cache {
        match storage.get_judgment::<KeywordSet>(fingerprint).await {
            Ok(Some(set)) => {
                summary.cache_hits += 1;
                return Ok(set);
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
    let set = model.extract_keywords(title, abstract_text).await?;
    storage.put_judgment(fingerprint, TASK, &set).await?;
    Ok(set)
}

/// Trim, drop empties, and deduplicate case-insensitively keeping the
/// first occurrence's casing and position.
pub fn dedup_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        let keyword = keyword.trim().to_string();
        if keyword.is_empty() {
            continue;
        }
        if seen.insert(keyword.to_lowercase()) {
            out.push(keyword);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SilentProgress;
    use crate::filter::tests::{MockModel, paper, test_env};

    #[test]
    fn dedup_is_case_insensitive_first_occurrence() {
        let input = vec![
            "Fuzzing".to_string(),
            " fuzzing ".to_string(),
            "".to_string(),
            "Firmware".to_string(),
            "FIRMWARE".to_string(),
        ];
        assert_eq!(dedup_keywords(input), vec!["Fuzzing", "Firmware"]);
    }

    #[tokio::test]
    async fn every_record_ends_with_a_keyword_list() {
        let env = test_env().await;
        let (mut dataset, _) =
            EnrichedDataset::merge(vec![paper("Alpha"), paper("Beta")], &[]);
        let model = MockModel::new(&[]);
        let options = KeywordOptions::default();

        let summary = run_keywords(
            &mut dataset,
            &options,
            &model,
            &env.storage,
            &env.runs_dir,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.accepted, 2);
        for record in dataset.records() {
            // The mock returns a duplicated pair that dedup collapses.
            assert_eq!(record.keywords.len(), 2);
            assert!(record.keywords[0].starts_with("kw-"));
        }
    }

    #[tokio::test]
    async fn failure_attaches_an_empty_list() {
        let env = test_env().await;
        let (mut dataset, _) = EnrichedDataset::merge(vec![paper("Works"), paper("Fails")], &[]);
        let mut model = MockModel::new(&[]);
        model.fail_on = Some("Fails".into());

        let summary = run_keywords(
            &mut dataset,
            &KeywordOptions::default(),
            &model,
            &env.storage,
            &env.runs_dir,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.errors, 1);
        let failed = dataset
            .records()
            .iter()
            .find(|r| r.identity.title == "Fails")
            .unwrap();
        assert!(failed.keywords.is_empty());
        let worked = dataset
            .records()
            .iter()
            .find(|r| r.identity.title == "Works")
            .unwrap();
        assert!(!worked.keywords.is_empty());
    }

    #[tokio::test]
    async fn model_change_re_extracts_instead_of_replaying() {
        let env = test_env().await;
        let (mut dataset, _) = EnrichedDataset::merge(vec![paper("Portable")], &[]);

        let mut options = KeywordOptions::default();
        options.model = "model-a".into();
        let first = MockModel::new(&[]);
        run_keywords(
            &mut dataset,
            &options,
            &first,
            &env.storage,
            &env.runs_dir,
            &SilentProgress,
        )
        .await
        .unwrap();
        assert_eq!(first.call_count(), 1);

        options.model = "model-b".into();
        let second = MockModel::new(&[]);
        let summary = run_keywords(
            &mut dataset,
            &options,
            &second,
            &env.storage,
            &env.runs_dir,
            &SilentProgress,
        )
        .await
        .unwrap();
        assert_eq!(second.call_count(), 1);
        assert_eq!(summary.cache_hits, 0);
    }

    #[tokio::test]
    async fn warm_cache_extraction_invokes_model_zero_times() {
        let env = test_env().await;
        let (mut dataset, _) = EnrichedDataset::merge(vec![paper("Memoized")], &[]);
        let options = KeywordOptions::default();

        let first = MockModel::new(&[]);
        run_keywords(
            &mut dataset,
            &options,
            &first,
            &env.storage,
            &env.runs_dir,
            &SilentProgress,
        )
        .await
        .unwrap();
        assert_eq!(first.call_count(), 1);

        let second = MockModel::new(&[]);
        let summary = run_keywords(
            &mut dataset,
            &options,
            &second,
            &env.storage,
            &env.runs_dir,
            &SilentProgress,
        )
        .await
        .unwrap();
        assert_eq!(second.call_count(), 0);
        assert_eq!(summary.cache_hits, 1);
    }
}
