//! USENIX Security adapter: Drupal-generated presentation pages.

use paperscout_shared::Venue;
use scraper::{Html, Selector};

use super::{PaperPageInfo, VenueAdapter};

const BASE_URL: &str = "https://www.usenix.org";

/// Extracts abstracts and final-paper PDF links from USENIX pages.
pub struct UssAdapter;

impl VenueAdapter for UssAdapter {
    fn venue(&self) -> Venue {
        Venue::Uss
    }

    fn extract(&self, html: &str) -> Option<PaperPageInfo> {
        let doc = Html::parse_document(html);

        let abstract_sel =
            Selector::parse("div.field-name-field-paper-description div.field-item").unwrap();
        let abstract_text = doc
            .select(&abstract_sel)
            .next()?
            .text()
            .collect::<String>()
            .trim()
            .to_string();
        if abstract_text.is_empty() {
            return None;
        }

        let pdf_sel = Selector::parse("div.field-name-field-final-paper-pdf a").unwrap();
        let pdf_url = doc
            .select(&pdf_sel)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|href| {
                if href.starts_with("http") {
                    href.to_string()
                } else {
                    format!("{BASE_URL}{href}")
                }
            });

        Some(PaperPageInfo {
            abstract_text,
            pdf_url,
        })
    }
}
