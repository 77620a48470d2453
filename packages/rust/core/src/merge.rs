//! Two-source reconciliation into an enriched dataset.
//!
//! Primary-catalog records are authoritative for identity and ordering;
//! secondary entries contribute abstracts and scholar IDs. The join is
//! one-to-at-most-one: a secondary entry matches by catalog key first, then
//! by normalized title, and the first candidate in source order wins. A
//! primary record with no match stays in the dataset unenriched.

use std::collections::HashMap;
use std::path::Path;

use paperscout_shared::{PaperRecord, Result, normalize_title};
use paperscout_storage::dataset;

use crate::normalize::SecondaryRecord;

/// Ordered collection of per-paper records, unique by matching key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnrichedDataset {
    records: Vec<PaperRecord>,
}

/// Counts produced by one merge pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnrichReport {
    pub total: usize,
    pub enriched: usize,
    pub unenriched: usize,
    /// Primary entries folded into an earlier record with the same key.
    pub duplicates: usize,
}

impl EnrichedDataset {
    pub fn from_records(records: Vec<PaperRecord>) -> Self {
        Self { records }
    }

    /// Join primary records against secondary entries.
    ///
    /// Order and identity come from the primary side; duplicate primary
    /// identities are merged into the first occurrence rather than appended.
    pub fn merge(primary: Vec<PaperRecord>, secondary: &[SecondaryRecord]) -> (Self, EnrichReport) {
        // First occurrence wins on both indexes.
        let mut by_catalog_key: HashMap<&str, &SecondaryRecord> = HashMap::new();
        let mut by_title: HashMap<String, &SecondaryRecord> = HashMap::new();
        for entry in secondary {
            if let Some(key) = entry.catalog_key.as_deref() {
                by_catalog_key.entry(key).or_insert(entry);
            }
            by_title.entry(normalize_title(&entry.title)).or_insert(entry);
        }

        let mut records: Vec<PaperRecord> = Vec::with_capacity(primary.len());
        let mut index_of: HashMap<String, usize> = HashMap::new();
        let mut duplicates = 0;

        for record in primary {
            let key = record.matching_key();
            match index_of.get(&key) {
                Some(&i) => {
                    duplicates += 1;
                    fold_duplicate(&mut records[i], record);
                }
                None => {
                    index_of.insert(key, records.len());
                    records.push(record);
                }
            }
        }

        for record in &mut records {
            let matched = record
                .catalog_key
                .as_deref()
                .and_then(|k| by_catalog_key.get(k))
                .or_else(|| by_title.get(&normalize_title(&record.identity.title)));
            if let Some(entry) = matched {
                apply_secondary(record, entry);
            }
        }

        let enriched = records.iter().filter(|r| r.abstract_text.is_some()).count();
        let report = EnrichReport {
            total: records.len(),
            enriched,
            unenriched: records.len() - enriched,
            duplicates,
        };
        tracing::info!(
            total = report.total,
            enriched = report.enriched,
            unenriched = report.unenriched,
            duplicates = report.duplicates,
            "merge complete"
        );
        (Self { records }, report)
    }

    pub fn records(&self) -> &[PaperRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [PaperRecord] {
        &mut self.records
    }

    pub fn into_records(self) -> Vec<PaperRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exactly the records still lacking an abstract.
    pub fn find_missing_abstracts(&self) -> Vec<&PaperRecord> {
        self.records
            .iter()
            .filter(|r| r.abstract_text.is_none())
            .collect()
    }

    /// Indices of records lacking an abstract, for in-place updates.
    pub fn missing_abstract_indices(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.abstract_text.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Write the dataset to `path` as JSONL.
    pub fn persist(&self, path: &Path) -> Result<()> {
        dataset::persist_dataset(&self.records, path)
    }

    /// Reload a dataset written by [`EnrichedDataset::persist`].
    pub fn reload(path: &Path) -> Result<Self> {
        Ok(Self {
            records: dataset::reload_dataset(path)?,
        })
    }
}

/// Fold a duplicate primary entry into the record that owns the key,
/// filling fields the first occurrence lacked.
fn fold_duplicate(target: &mut PaperRecord, dup: PaperRecord) {
    if target.catalog_key.is_none() {
        target.catalog_key = dup.catalog_key;
    }
    if target.url.is_none() {
        target.url = dup.url;
    }
    if target.authors.is_empty() {
        target.authors = dup.authors;
    }
    if let Some(text) = dup.abstract_text {
        target.set_abstract_if_absent(text);
    }
}

fn apply_secondary(record: &mut PaperRecord, entry: &SecondaryRecord) {
    if let Some(text) = entry.abstract_text.as_deref() {
        record.set_abstract_if_absent(text);
    }
    if record.scholar_id.is_none() {
        record.scholar_id = entry.scholar_id.clone();
    }
}
