//! URL extraction: scans raw XML parts and structured run hyperlinks,
//! cleans XML-mangled matches, and classifies them into a [`LinkSet`].

use regex::Regex;
use slidelink_core::{classify, Link, LinkSet};
use slidelink_pptx::{DeckPackage, Document};
use std::sync::LazyLock;

/// URL grammar: scheme, then any run of characters that is not
/// whitespace, a quote, or an angle bracket, optionally continuing
/// through a query string and fragment.
static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"']+(?:\?[^\s<>"']*)?(?:#[^\s<>"']*)?"#).unwrap()
});

/// Hosts serving OOXML namespace and schema identifiers. Every part
/// declares several of these; they are markup plumbing, not content.
const INFRASTRUCTURE_HOSTS: &[&str] = &[
    "schemas.openxmlformats.org",
    "schemas.microsoft.com",
    "purl.org",
    "www.w3.org",
];

/// Extracts the deduplicated, classified link set from a deck.
#[derive(Debug, Clone, Default)]
pub struct LinkExtractor;

impl LinkExtractor {
    /// Create a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract links from every text part of the package and every
    /// structured run hyperlink of the document, merged into one set.
    ///
    /// Where a URL was found never affects accept/reject; both sources
    /// go through the same cleaning and classification.
    pub fn extract(&self, package: &DeckPackage, document: &Document) -> LinkSet {
        let mut links = LinkSet::new();

        for (path, content) in package.text_parts() {
            let before = links.len();
            self.scan_text(content, &mut links);
            let found = links.len() - before;
            if found > 0 {
                log::debug!("Found {} new link(s) in '{}'", found, path);
            }
        }

        for address in document.hyperlink_addresses() {
            self.consider(address, &mut links);
        }

        log::info!("Extracted {} clean URL(s): {:?}", links.len(), links.clean_urls());
        links
    }

    /// Scan one text blob for URL matches.
    pub fn scan_text(&self, text: &str, links: &mut LinkSet) {
        for m in URL_REGEX.find_iter(text) {
            self.consider(m.as_str(), links);
        }
    }

    fn consider(&self, raw: &str, links: &mut LinkSet) {
        if let Some(clean) = clean_extracted_url(raw) {
            if is_infrastructure_url(&clean) {
                return;
            }
            if let Some(category) = classify(&clean) {
                links.insert(Link::new(raw, clean, category));
            }
        }
    }
}

/// Whether a cleaned URL points at a namespace/schema host rather than
/// hosted content. Scanning raw XML parts surfaces the `xmlns` and
/// relationship-type URIs of every part; none of them is a conversion
/// target.
fn is_infrastructure_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    let rest = match lower.split_once("://") {
        Some((_, rest)) => rest,
        None => return false,
    };
    INFRASTRUCTURE_HOSTS.iter().any(|host| match rest.strip_prefix(host) {
        Some(tail) => tail.is_empty() || tail.starts_with('/') || tail.starts_with(':'),
        None => false,
    })
}

/// Clean a raw URL match of XML artifacts.
///
/// Trims quote characters and the literal `&quot;` from either end,
/// decodes the XML entities that survive into matches, truncates at the
/// first unescaped tag boundary, and re-validates the scheme.
pub fn clean_extracted_url(raw: &str) -> Option<String> {
    let mut url = raw.trim();

    loop {
        let before = url;
        url = url
            .strip_prefix("&quot;")
            .or_else(|| url.strip_prefix('"'))
            .or_else(|| url.strip_prefix('\''))
            .unwrap_or(url);
        url = url
            .strip_suffix("&quot;")
            .or_else(|| url.strip_suffix('"'))
            .or_else(|| url.strip_suffix('\''))
            .unwrap_or(url);
        if url == before {
            break;
        }
    }

    let mut url = url
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"");

    // A tag boundary leaking into the match ends the URL.
    if let Some(pos) = url.find(['<', '>']) {
        url.truncate(pos);
    }

    let lower = url.to_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return None;
    }

    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidelink_core::LinkCategory;

    #[test]
    fn cleans_quoted_urls_with_trailing_tags() {
        // A URL wrapped in &quot; with a stray tag boundary yields
        // exactly the clean URL.
        assert_eq!(
            clean_extracted_url("&quot;https://a.co/x.mp4&quot;"),
            Some("https://a.co/x.mp4".to_string())
        );
        assert_eq!(
            clean_extracted_url("https://a.co/x.mp4</a:t"),
            Some("https://a.co/x.mp4".to_string())
        );
        assert_eq!(
            clean_extracted_url("\"https://a.co/x.mp4\""),
            Some("https://a.co/x.mp4".to_string())
        );
    }

    #[test]
    fn decodes_xml_entities() {
        assert_eq!(
            clean_extracted_url("https://h/index.html?data_url=x&amp;v=1"),
            Some("https://h/index.html?data_url=x&v=1".to_string())
        );
    }

    #[test]
    fn rejects_non_http_results() {
        assert_eq!(clean_extracted_url("&quot;ftp://h/x&quot;"), None);
        assert_eq!(clean_extracted_url("&lt;https://never-starts"), None);
    }

    #[test]
    fn scan_finds_and_classifies_urls_in_a_blob() {
        let extractor = LinkExtractor::new();
        let mut links = LinkSet::new();
        let blob = r#"<a:t>listen &quot;https://a.co/x.mp4&quot;< and https://h/index.html?data_url=https://h/b.json</a:t>"#;
        extractor.scan_text(blob, &mut links);

        assert_eq!(links.len(), 2);
        let video = links.get("https://a.co/x.mp4").expect("video link");
        assert_eq!(video.category, LinkCategory::Video);
        let game = links
            .get("https://h/index.html?data_url=https://h/b.json")
            .expect("game link");
        assert_eq!(game.category, LinkCategory::Game);
    }

    #[test]
    fn scan_excludes_images_and_static_assets() {
        let extractor = LinkExtractor::new();
        let mut links = LinkSet::new();
        extractor.scan_text(
            "https://h/pic.png https://h/static/app https://h/page",
            &mut links,
        );
        assert_eq!(links.clean_urls(), vec!["https://h/page"]);
    }

    #[test]
    fn namespace_declarations_are_not_content_links() {
        let extractor = LinkExtractor::new();
        let mut links = LinkSet::new();
        let blob = r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><a:t>listen https://host/a.mp3</a:t></p:sld>"#;
        extractor.scan_text(blob, &mut links);
        assert_eq!(links.clean_urls(), vec!["https://host/a.mp3"]);
    }

    #[test]
    fn a_part_with_only_markup_plumbing_yields_no_links() {
        let extractor = LinkExtractor::new();
        let mut links = LinkSet::new();
        let blob = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/></Relationships><x a="http://www.w3.org/XML/1998/namespace" b="http://schemas.microsoft.com/office/drawing/2014/main" c="http://purl.org/dc/elements/1.1/"/>"#;
        extractor.scan_text(blob, &mut links);
        assert!(links.is_empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let extractor = LinkExtractor::new();
        let blob = "x https://a.co/x.mp4 y https://b.co/y.mp3 z";

        let mut first = LinkSet::new();
        extractor.scan_text(blob, &mut first);
        let mut second = LinkSet::new();
        extractor.scan_text(blob, &mut second);

        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_matches_are_deduplicated() {
        let extractor = LinkExtractor::new();
        let mut links = LinkSet::new();
        extractor.scan_text(
            "https://a.co/x.mp4 then &quot;https://a.co/x.mp4&quot; again",
            &mut links,
        );
        assert_eq!(links.len(), 1);
    }
}
