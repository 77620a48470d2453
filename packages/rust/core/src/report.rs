//! Abstract-coverage reporting over enriched records.

use std::collections::BTreeMap;

use paperscout_shared::{PaperRecord, PaperScoutError, Result, Venue};

/// Per-(venue, year) coverage counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageRow {
    pub venue: Venue,
    pub year: u16,
    pub total: usize,
    pub missing_abstract: usize,
}

impl CoverageRow {
    pub fn missing_percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.missing_abstract as f64 / self.total as f64 * 100.0
        }
    }
}

/// Dataset-wide coverage summary.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageReport {
    pub total: usize,
    pub with_abstract: usize,
    /// Rows sorted by venue, then year.
    pub rows: Vec<CoverageRow>,
}

/// Summarize abstract coverage. Read-only; fails only on a malformed
/// record (empty title).
pub fn summarize(records: &[PaperRecord]) -> Result<CoverageReport> {
    let mut groups: BTreeMap<(Venue, u16), (usize, usize)> = BTreeMap::new();
    let mut with_abstract = 0;

    for record in records {
        if record.identity.title.trim().is_empty() {
            return Err(PaperScoutError::validation(format!(
                "record {}/{} has an empty title",
                record.identity.venue, record.identity.year
            )));
        }
        let entry = groups
            .entry((record.identity.venue, record.identity.year))
            .or_insert((0, 0));
        entry.0 += 1;
        if record.abstract_text.is_some() {
            with_abstract += 1;
        } else {
            entry.1 += 1;
        }
    }

    Ok(CoverageReport {
        total: records.len(),
        with_abstract,
        rows: groups
            .into_iter()
            .map(|((venue, year), (total, missing))| CoverageRow {
                venue,
                year,
                total,
                missing_abstract: missing,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperscout_shared::PaperIdentity;

    fn record(venue: Venue, year: u16, title: &str, with_abstract: bool) -> PaperRecord {
        let mut r = PaperRecord::new(PaperIdentity::new(venue, year, title));
        if with_abstract {
            r.abstract_text = Some("text".into());
        }
        r
    }

    #[test]
    fn groups_by_venue_and_year() {
        let records = vec![
            record(Venue::Ccs, 2020, "A", true),
            record(Venue::Ccs, 2020, "B", false),
            record(Venue::Ccs, 2021, "C", true),
            record(Venue::Uss, 2020, "D", false),
        ];
        let report = summarize(&records).unwrap();

        assert_eq!(report.total, 4);
        assert_eq!(report.with_abstract, 2);
        assert_eq!(report.rows.len(), 3);

        let ccs_2020 = &report.rows[0];
        assert_eq!((ccs_2020.venue, ccs_2020.year), (Venue::Ccs, 2020));
        assert_eq!(ccs_2020.total, 2);
        assert_eq!(ccs_2020.missing_abstract, 1);
        assert!((ccs_2020.missing_percentage() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rows_are_sorted() {
        let records = vec![
            record(Venue::Uss, 2022, "A", true),
            record(Venue::Ccs, 2023, "B", true),
            record(Venue::Ccs, 2019, "C", true),
        ];
        let report = summarize(&records).unwrap();
        let keys: Vec<_> = report.rows.iter().map(|r| (r.venue, r.year)).collect();
        assert_eq!(
            keys,
            vec![(Venue::Ccs, 2019), (Venue::Ccs, 2023), (Venue::Uss, 2022)]
        );
    }

    #[test]
    fn empty_title_is_a_validation_error() {
        let records = vec![record(Venue::Sp, 2020, "  ", false)];
        assert!(matches!(
            summarize(&records),
            Err(PaperScoutError::Validation { .. })
        ));
    }

    #[test]
    fn empty_dataset_summarizes_to_zero() {
        let report = summarize(&[]).unwrap();
        assert_eq!(report.total, 0);
        assert!(report.rows.is_empty());
    }
}
