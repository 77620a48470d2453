//! CCS adapter: papers live in the ACM Digital Library.

use paperscout_shared::Venue;
use scraper::{Html, Selector};

use super::{PaperPageInfo, VenueAdapter, collapse_whitespace};

/// Extracts abstracts from ACM DL paper pages.
///
/// Catalog landing URLs are DOI-resolver links; resolving through doi.org
/// triggers bot checks, so the DOI is rewritten straight to the DL URL.
pub struct CcsAdapter;

impl VenueAdapter for CcsAdapter {
    fn venue(&self) -> Venue {
        Venue::Ccs
    }

    fn page_url(&self, url: &str) -> String {
        match url.strip_prefix("https://doi.org/") {
            Some(doi) => format!("https://dl.acm.org/doi/{doi}"),
            None => url.to_string(),
        }
    }

    fn extract(&self, html: &str) -> Option<PaperPageInfo> {
        let doc = Html::parse_document(html);
        let sel = Selector::parse(r#"div#abstracts div[role="paragraph"]"#).unwrap();

        let text = doc.select(&sel).next()?.text().collect::<String>();
        let text = collapse_whitespace(&text);
        if text.is_empty() {
            return None;
        }
        // The DL offers no stable direct PDF link without authentication.
        Some(PaperPageInfo {
            abstract_text: text,
            pdf_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_doi_url_to_dl() {
        assert_eq!(
            CcsAdapter.page_url("https://doi.org/10.1145/3658644.3690269"),
            "https://dl.acm.org/doi/10.1145/3658644.3690269"
        );
        assert_eq!(
            CcsAdapter.page_url("https://dl.acm.org/doi/10.1145/1"),
            "https://dl.acm.org/doi/10.1145/1"
        );
    }

    #[test]
    fn extracts_abstract_paragraph() {
        let html = r#"
            <html><body>
              <div id="abstracts">
                <h2>Abstract</h2>
                <div role="paragraph">
                  We present   a system
                  for testing things.
                </div>
              </div>
            </body></html>
        "#;
        let info = CcsAdapter.extract(html).unwrap();
        assert_eq!(info.abstract_text, "We present a system for testing things.");
        assert!(info.pdf_url.is_none());
    }

    #[test]
    fn missing_abstract_section_is_none() {
        let html = "<html><body><div id='other'>text</div></body></html>";
        assert!(CcsAdapter.extract(html).is_none());
    }
}
