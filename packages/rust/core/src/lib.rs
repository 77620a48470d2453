//! Reconciliation, enrichment, and model-judgment flows for paperscout.
//!
//! This crate ties the source listings together into canonical datasets
//! (normalize + merge), runs cached model judgments over them (filter,
//! keywords), and summarizes abstract coverage (report).

pub mod filter;
pub mod keywords;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod report;

pub use filter::{FilterOptions, RunProgress, RunSummary, SilentProgress, run_filter};
pub use keywords::{KeywordOptions, dedup_keywords, run_keywords};
pub use merge::{EnrichReport, EnrichedDataset};
pub use model::{KeywordSet, ModelClient, ModelCollaborator, RelevanceJudgment};
pub use normalize::{SecondaryRecord, is_conference_paper, normalize_primary, normalize_secondary};
pub use report::{CoverageReport, CoverageRow, summarize};
