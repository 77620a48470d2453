//! Raw source entries → canonical [`PaperRecord`]s.
//!
//! The primary catalog wraps each paper in an `info` object whose author
//! field takes several shapes (a list, a single object, or plain strings)
//! and whose titles carry a trailing period. The secondary source is flat
//! JSON keyed by `paperId` with the catalog cross-reference under
//! `externalIds.DBLP`. Normalization is tolerant of every missing optional
//! field; only an absent title makes an entry unusable.

use paperscout_shared::{PaperIdentity, PaperRecord, PaperScoutError, Result, Venue};
use serde_json::Value;

/// True for entries that describe an actual paper rather than front matter
/// (proceedings editorship entries share the listing).
pub fn is_conference_paper(raw: &Value) -> bool {
    match raw.pointer("/info/type").and_then(Value::as_str) {
        Some(kind) => kind != "Editorship",
        None => true,
    }
}

/// Normalize one raw primary-catalog entry.
///
/// Fails with a validation error only when no usable title is present;
/// every other field is optional. The raw payload is retained on the record.
pub fn normalize_primary(venue: Venue, year: u16, raw: &Value) -> Result<PaperRecord> {
    let info = raw.get("info").unwrap_or(raw);

    let title = info
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PaperScoutError::validation("catalog entry has no title"))?;
    // Catalog titles end with a period that is not part of the title proper.
    let title = title.strip_suffix('.').unwrap_or(title);

    let mut record = PaperRecord::new(PaperIdentity::new(venue, year, title));
    record.authors = extract_authors(info);
    record.catalog_key = info
        .get("key")
        .and_then(Value::as_str)
        .map(str::to_string);
    record.url = info.get("ee").and_then(Value::as_str).map(str::to_string);
    record.raw = Some(raw.clone());
    Ok(record)
}

/// Author field shapes seen in the wild: `authors.author` as a list of
/// objects, a single object, or bare strings.
fn extract_authors(info: &Value) -> Vec<String> {
    let Some(author) = info.pointer("/authors/author") else {
        return Vec::new();
    };
    match author {
        Value::Array(entries) => entries.iter().filter_map(author_name).collect(),
        single => author_name(single).into_iter().collect(),
    }
}

fn author_name(entry: &Value) -> Option<String> {
    let name = match entry {
        Value::String(s) => s.as_str(),
        obj => obj.get("text").and_then(Value::as_str)?,
    };
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// A normalized secondary-source entry, pre-merge.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryRecord {
    pub title: String,
    pub abstract_text: Option<String>,
    pub scholar_id: Option<String>,
    /// Primary-catalog key from the external-ID cross-reference.
    pub catalog_key: Option<String>,
}

/// Normalize one raw secondary-source entry.
pub fn normalize_secondary(raw: &Value) -> Result<SecondaryRecord> {
    let title = raw
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PaperScoutError::validation("scholar entry has no title"))?;

    Ok(SecondaryRecord {
        title: title.to_string(),
        abstract_text: raw
            .get("abstract")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string),
        scholar_id: raw
            .get("paperId")
            .and_then(Value::as_str)
            .map(str::to_string),
        catalog_key: raw
            .pointer("/externalIds/DBLP")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primary_full_entry() {
        let raw = json!({
            "info": {
                "title": "A Careful Study of Widgets.",
                "key": "conf/ccs/Widget20",
                "ee": "https://doi.org/10.1145/1234",
                "type": "Conference and Workshop Papers",
                "authors": {"author": [
                    {"@pid": "1/1", "text": "Ada Lovelace"},
                    {"@pid": "2/2", "text": "Alan Turing"}
                ]}
            }
        });
        let record = normalize_primary(Venue::Ccs, 2020, &raw).unwrap();
        assert_eq!(record.identity.title, "A Careful Study of Widgets");
        assert_eq!(record.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(record.catalog_key.as_deref(), Some("conf/ccs/Widget20"));
        assert_eq!(record.url.as_deref(), Some("https://doi.org/10.1145/1234"));
        assert!(record.abstract_text.is_none());
        assert!(record.raw.is_some());
    }

    #[test]
    fn primary_single_author_object() {
        let raw = json!({
            "info": {
                "title": "Solo Work.",
                "authors": {"author": {"text": "Grace Hopper"}}
            }
        });
        let record = normalize_primary(Venue::Ndss, 2021, &raw).unwrap();
        assert_eq!(record.authors, vec!["Grace Hopper"]);
    }

    #[test]
    fn primary_plain_string_authors() {
        let raw = json!({
            "info": {
                "title": "Strings.",
                "authors": {"author": ["One Person", "Two Person"]}
            }
        });
        let record = normalize_primary(Venue::Sp, 2019, &raw).unwrap();
        assert_eq!(record.authors, vec!["One Person", "Two Person"]);
    }

    #[test]
    fn primary_missing_title_is_validation_error() {
        let raw = json!({"info": {"key": "conf/uss/NoTitle22"}});
        let result = normalize_primary(Venue::Uss, 2022, &raw);
        assert!(matches!(result, Err(PaperScoutError::Validation { .. })));
    }

    #[test]
    fn editorship_entries_are_flagged() {
        let paper = json!({"info": {"type": "Conference and Workshop Papers"}});
        let front_matter = json!({"info": {"type": "Editorship"}});
        let untyped = json!({"info": {"title": "X."}});
        assert!(is_conference_paper(&paper));
        assert!(!is_conference_paper(&front_matter));
        assert!(is_conference_paper(&untyped));
    }

    #[test]
    fn secondary_entry() {
        let raw = json!({
            "paperId": "abc123",
            "title": "A Careful Study of Widgets",
            "abstract": "We study widgets.",
            "externalIds": {"DBLP": "conf/ccs/Widget20", "DOI": "10.1145/1234"}
        });
        let record = normalize_secondary(&raw).unwrap();
        assert_eq!(record.title, "A Careful Study of Widgets");
        assert_eq!(record.abstract_text.as_deref(), Some("We study widgets."));
        assert_eq!(record.scholar_id.as_deref(), Some("abc123"));
        assert_eq!(record.catalog_key.as_deref(), Some("conf/ccs/Widget20"));
    }

    #[test]
    fn secondary_null_abstract_is_none() {
        let raw = json!({"paperId": "x", "title": "T", "abstract": null});
        let record = normalize_secondary(&raw).unwrap();
        assert!(record.abstract_text.is_none());
    }
}
