//! IEEE S&P adapter: Xplore paper pages.

use paperscout_shared::Venue;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

use super::{PaperPageInfo, VenueAdapter};

/// Extracts abstracts from IEEE Xplore paper pages.
///
/// Xplore embeds the full document metadata as a JSON blob in an inline
/// script; that is the reliable path. The rendered abstract markup is a
/// fallback for pages where the blob is absent.
pub struct SpAdapter;

fn metadata_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)xplGlobal\.document\.metadata=(\{.*?\});").unwrap())
}

impl VenueAdapter for SpAdapter {
    fn venue(&self) -> Venue {
        Venue::Sp
    }

    fn extract(&self, html: &str) -> Option<PaperPageInfo> {
        if let Some(caps) = metadata_regex().captures(html) {
            if let Ok(metadata) = serde_json::from_str::<serde_json::Value>(&caps[1]) {
                if let Some(text) = metadata.get("abstract").and_then(|v| v.as_str()) {
                    let text = text.trim();
                    if !text.is_empty() {
                        return Some(PaperPageInfo {
                            abstract_text: text.to_string(),
                            pdf_url: None,
                        });
                    }
                }
            }
        }

        let doc = Html::parse_document(html);
        let sel = Selector::parse("div.abstract-text div[xplmathjax]").unwrap();
        let text = doc.select(&sel).next()?.text().collect::<String>();
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(PaperPageInfo {
            abstract_text: text.to_string(),
            pdf_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_metadata_blob() {
        let html = concat!(
            "<html><head><script>",
            r#"xplGlobal.document.metadata={"title":"X","abstract":"We measure enclave leakage."};"#,
            "</script></head><body></body></html>",
        );
        let info = SpAdapter.extract(html).unwrap();
        assert_eq!(info.abstract_text, "We measure enclave leakage.");
    }

    #[test]
    fn falls_back_to_rendered_abstract() {
        let html = r#"
            <html><body>
              <div class="abstract-text">
                <div xplmathjax> Side channels considered. </div>
              </div>
            </body></html>
        "#;
        let info = SpAdapter.extract(html).unwrap();
        assert_eq!(info.abstract_text, "Side channels considered.");
    }

    #[test]
    fn blob_without_abstract_falls_through() {
        let html = concat!(
            "<html><head><script>",
            r#"xplGlobal.document.metadata={"title":"X"};"#,
            "</script></head><body></body></html>",
        );
        assert!(SpAdapter.extract(html).is_none());
    }
}
