//! NDSS adapter: symposium site, two page generations.

use paperscout_shared::Venue;
use scraper::{ElementRef, Html, Selector};

use super::{PaperPageInfo, VenueAdapter};

const BASE_URL: &str = "https://www.ndss-symposium.org";

/// Extracts abstracts and PDF links from NDSS paper pages.
///
/// Older pages carry a `div.paper-data` block whose third paragraph is the
/// abstract; newer pages use a `section.new-wrapper` with an `Abstract:`
/// heading followed by the abstract paragraph.
pub struct NdssAdapter;

impl VenueAdapter for NdssAdapter {
    fn venue(&self) -> Venue {
        Venue::Ndss
    }

    fn extract(&self, html: &str) -> Option<PaperPageInfo> {
        let doc = Html::parse_document(html);

        let (abstract_text, pdf_url) = if let Some(data) = first(&doc, "div.paper-data") {
            extract_legacy(&doc, data)?
        } else if let Some(wrapper) = first(&doc, "section.new-wrapper") {
            extract_current(wrapper)?
        } else {
            return None;
        };

        let pdf_url = match pdf_url.strip_prefix('/') {
            Some(rest) => format!("{BASE_URL}/{rest}"),
            None => pdf_url,
        };
        Some(PaperPageInfo {
            abstract_text,
            pdf_url: Some(pdf_url),
        })
    }
}

fn first<'a>(doc: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).unwrap();
    doc.select(&sel).next()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Older layout: the abstract is the third `<p>` of the paper-data block,
/// the PDF link is a dedicated button anywhere on the page.
fn extract_legacy(doc: &Html, data: ElementRef<'_>) -> Option<(String, String)> {
    let p_sel = Selector::parse("p").unwrap();
    let paragraphs: Vec<_> = data.select(&p_sel).collect();
    let abstract_text = element_text(*paragraphs.get(2)?);
    if abstract_text.is_empty() {
        return None;
    }

    let pdf_sel = Selector::parse("a.pdf-button").unwrap();
    let pdf_url = doc
        .select(&pdf_sel)
        .next()
        .and_then(|el| el.value().attr("href"))?
        .to_string();
    Some((abstract_text, pdf_url))
}

/// Newer layout: an `Abstract:` heading with the abstract in the following
/// paragraph, and a link labeled `Paper` pointing at the PDF.
fn extract_current(wrapper: ElementRef<'_>) -> Option<(String, String)> {
    let h2_sel = Selector::parse("h2").unwrap();
    let heading = wrapper
        .select(&h2_sel)
        .find(|el| element_text(*el) == "Abstract:")?;

    let abstract_text = heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "p")
        .map(element_text)?;
    if abstract_text.is_empty() {
        return None;
    }

    let a_sel = Selector::parse("a").unwrap();
    let pdf_url = wrapper
        .select(&a_sel)
        .find(|el| element_text(*el) == "Paper")
        .and_then(|el| el.value().attr("href"))?
        .to_string();
    Some((abstract_text, pdf_url))
}
