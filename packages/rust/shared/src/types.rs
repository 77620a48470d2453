//! Core domain types for paperscout datasets.

use serde::{Deserialize, Serialize};

use crate::error::{PaperScoutError, Result};

// ---------------------------------------------------------------------------
// Venue
// ---------------------------------------------------------------------------

/// A supported publication venue. The lowercase short name doubles as the
/// primary catalog's stream key; `scholar_name` is the full venue string the
/// scholarly-metadata API indexes by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Ccs,
    Ndss,
    Sp,
    Uss,
}

impl Venue {
    /// All supported venues, in stable order.
    pub const ALL: [Venue; 4] = [Venue::Ccs, Venue::Ndss, Venue::Sp, Venue::Uss];

    /// Lowercase short name (also the catalog stream key).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ccs => "ccs",
            Self::Ndss => "ndss",
            Self::Sp => "sp",
            Self::Uss => "uss",
        }
    }

    /// Full venue name as known by the scholarly-metadata API.
    pub fn scholar_name(&self) -> &'static str {
        match self {
            Self::Ccs => "Conference on Computer and Communications Security",
            Self::Ndss => "Network and Distributed System Security Symposium",
            Self::Sp => "IEEE Symposium on Security and Privacy",
            Self::Uss => "USENIX Security Symposium",
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Venue {
    type Err = PaperScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ccs" => Ok(Self::Ccs),
            "ndss" => Ok(Self::Ndss),
            "sp" => Ok(Self::Sp),
            "uss" => Ok(Self::Uss),
            other => Err(PaperScoutError::validation(format!(
                "unknown venue '{other}': expected one of ccs, ndss, sp, uss"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// PaperIdentity
// ---------------------------------------------------------------------------

/// Stable identity of a paper: venue, year, and the display title.
///
/// Identity fields are immutable once assigned. Matching and deduplication
/// use [`PaperIdentity::matching_key`], never the display title directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperIdentity {
    pub venue: Venue,
    pub year: u16,
    /// Display title, original casing preserved.
    pub title: String,
}

impl PaperIdentity {
    pub fn new(venue: Venue, year: u16, title: impl Into<String>) -> Self {
        Self {
            venue,
            year,
            title: title.into(),
        }
    }

    /// Deterministic key used for matching and deduplication across sources.
    pub fn matching_key(&self) -> String {
        format!("{}/{}/{}", self.venue, self.year, normalize_title(&self.title))
    }
}

/// Normalize a title for identity matching: lowercase, collapse whitespace,
/// strip trailing punctuation. Never used for display.
pub fn normalize_title(title: &str) -> String {
    let collapsed = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(['.', ',', ':', ';', '!', '?'])
        .trim_end()
        .to_string()
}

// ---------------------------------------------------------------------------
// PaperRecord
// ---------------------------------------------------------------------------

/// One canonical per-paper record, merged from the primary catalog and
/// (best effort) the secondary metadata source.
///
/// `abstract_text` transitions from absent to present only; enrichment never
/// clears or replaces an abstract that is already set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub identity: PaperIdentity,

    /// Ordered author names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    /// Abstract, absent until enriched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,

    /// Primary catalog record key (e.g. `conf/ccs/Foo20`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_key: Option<String>,

    /// Secondary source paper identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scholar_id: Option<String>,

    /// Paper landing page URL from the primary catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Direct PDF URL, when a venue adapter found one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,

    /// Extracted keywords (empty until a keyword run attaches them).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Raw primary-source payload, retained for debugging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl PaperRecord {
    /// Minimal record with identity only, everything else absent.
    pub fn new(identity: PaperIdentity) -> Self {
        Self {
            identity,
            authors: Vec::new(),
            abstract_text: None,
            catalog_key: None,
            scholar_id: None,
            url: None,
            pdf_url: None,
            keywords: Vec::new(),
            raw: None,
        }
    }

    pub fn matching_key(&self) -> String {
        self.identity.matching_key()
    }

    /// Set the abstract if (and only if) none is present yet.
    pub fn set_abstract_if_absent(&mut self, text: impl Into<String>) -> bool {
        if self.abstract_text.is_none() {
            let text = text.into();
            if !text.trim().is_empty() {
                self.abstract_text = Some(text);
                return true;
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Year selectors
// ---------------------------------------------------------------------------

/// Default year window when no `--years` selector is given.
pub const DEFAULT_YEARS: std::ops::RangeInclusive<u16> = 2015..=2024;

/// Parse a year selector string like `"2015,2016,2018-2020"` into a sorted,
/// deduplicated list. Invalid parts are skipped with a warning; `None` yields
/// the default window.
pub fn parse_years(selector: Option<&str>) -> Vec<u16> {
    let Some(selector) = selector else {
        return DEFAULT_YEARS.collect();
    };

    let mut years = std::collections::BTreeSet::new();
    for part in selector.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            match (start.trim().parse::<u16>(), end.trim().parse::<u16>()) {
                (Ok(s), Ok(e)) if s <= e => years.extend(s..=e),
                (Ok(s), Ok(e)) => {
                    tracing::warn!(part, "year range start {s} is after end {e}, skipping");
                }
                _ => tracing::warn!(part, "invalid year range, skipping"),
            }
        } else {
            match part.parse::<u16>() {
                Ok(y) => {
                    years.insert(y);
                }
                Err(_) => tracing::warn!(part, "invalid year, skipping"),
            }
        }
    }
    years.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_roundtrip() {
        for venue in Venue::ALL {
            let parsed: Venue = venue.as_str().parse().expect("parse venue");
            assert_eq!(parsed, venue);
        }
        assert!("pets".parse::<Venue>().is_err());
    }

    #[test]
    fn venue_serde_is_lowercase() {
        let json = serde_json::to_string(&Venue::Ccs).unwrap();
        assert_eq!(json, r#""ccs""#);
        let parsed: Venue = serde_json::from_str(r#""uss""#).unwrap();
        assert_eq!(parsed, Venue::Uss);
    }

    #[test]
    fn title_normalization() {
        assert_eq!(normalize_title("Foo Bar"), "foo bar");
        assert_eq!(normalize_title("foo   bar"), "foo bar");
        assert_eq!(normalize_title("  Foo\tBar. "), "foo bar");
        assert_eq!(normalize_title("Privacy: A Survey?"), "privacy: a survey");
    }

    #[test]
    fn matching_key_ignores_case_and_whitespace() {
        let a = PaperIdentity::new(Venue::Ccs, 2020, "Foo Bar");
        let b = PaperIdentity::new(Venue::Ccs, 2020, "foo   bar");
        assert_eq!(a.matching_key(), b.matching_key());

        let other_year = PaperIdentity::new(Venue::Ccs, 2021, "Foo Bar");
        assert_ne!(a.matching_key(), other_year.matching_key());
    }

    #[test]
    fn record_serialization_roundtrip() {
        let mut record = PaperRecord::new(PaperIdentity::new(Venue::Ndss, 2023, "A Paper"));
        record.authors = vec!["Ada Lovelace".into(), "Alan Turing".into()];
        record.catalog_key = Some("conf/ndss/Lovelace23".into());
        record.abstract_text = Some("We study things.".into());

        let json = serde_json::to_string(&record).expect("serialize");
        let parsed: PaperRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, record);
    }

    #[test]
    fn abstract_transitions_absent_to_present_only() {
        let mut record = PaperRecord::new(PaperIdentity::new(Venue::Uss, 2022, "X"));
        assert!(record.set_abstract_if_absent("first"));
        assert!(!record.set_abstract_if_absent("second"));
        assert_eq!(record.abstract_text.as_deref(), Some("first"));
    }

    #[test]
    fn empty_abstract_is_not_set() {
        let mut record = PaperRecord::new(PaperIdentity::new(Venue::Uss, 2022, "X"));
        assert!(!record.set_abstract_if_absent("   "));
        assert!(record.abstract_text.is_none());
    }

    #[test]
    fn parse_years_selector() {
        assert_eq!(parse_years(Some("2016,2015,2016")), vec![2015, 2016]);
        assert_eq!(parse_years(Some("2018-2020")), vec![2018, 2019, 2020]);
        assert_eq!(
            parse_years(Some("2015, 2018-2019")),
            vec![2015, 2018, 2019]
        );
        // Reversed ranges and garbage are skipped, not fatal.
        assert_eq!(parse_years(Some("2020-2018,abc,2021")), vec![2021]);
        assert_eq!(parse_years(None).len(), DEFAULT_YEARS.count());
    }
}
