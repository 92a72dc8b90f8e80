//! Text-run rewriting: converts plain-text URL occurrences inside
//! paragraphs into hyperlink runs while preserving formatting.

use slidelink_core::{label, LinkSet};
use slidelink_pptx::{Document, FontProps, Paragraph, Run};

/// Rewrites a document's paragraphs against an extracted link set.
#[derive(Debug, Clone, Default)]
pub struct DocumentRewriter {
    use_labels: bool,
}

impl DocumentRewriter {
    /// Create a rewriter that keeps the URL as the visible text.
    pub fn new() -> Self {
        Self { use_labels: false }
    }

    /// Replace the hyperlink run's visible text with a category label.
    pub fn with_labels(mut self, use_labels: bool) -> Self {
        self.use_labels = use_labels;
        self
    }

    /// Rewrite matching paragraphs in place. Returns the number of
    /// conversions made.
    ///
    /// Paragraphs are visited in slide, then shape, then paragraph
    /// order, and processed independently: converting a link in one
    /// paragraph never affects matching in another. At most one
    /// conversion is applied per paragraph per pass; already-hyperlinked
    /// addresses are passed over, and the first remaining match in the
    /// set's deterministic order wins.
    pub fn rewrite(&self, document: &mut Document, links: &LinkSet) -> usize {
        let mut conversions = 0;

        for slide in &mut document.slides {
            let slide_number = slide.number;
            for (paragraph_index, paragraph) in slide.paragraphs_mut().enumerate() {
                if self.rewrite_paragraph(paragraph, links) {
                    conversions += 1;
                    log::info!(
                        "Converted URL to hyperlink in slide {}, paragraph {}",
                        slide_number,
                        paragraph_index + 1
                    );
                }
            }
        }

        conversions
    }

    /// Convert the first convertible link in one paragraph. Returns
    /// whether a conversion was made.
    fn rewrite_paragraph(&self, paragraph: &mut Paragraph, links: &LinkSet) -> bool {
        if paragraph.runs.is_empty() {
            return false;
        }

        let full_text = paragraph.text();
        if full_text.is_empty() {
            return false;
        }

        // Candidates whose address is already hyperlinked here are
        // passed over; the first remaining match wins and the rest are
        // ignored for this pass.
        let Some(link) = links
            .iter()
            .find(|l| full_text.contains(&l.clean) && !is_already_hyperlinked(paragraph, &l.clean))
        else {
            return false;
        };

        let start = match full_text.find(&link.clean) {
            Some(start) => start,
            None => return false,
        };
        let end = start + link.clean.len();

        let before = &full_text[..start];
        let matched = &full_text[start..end];
        let after = &full_text[end..];

        // Formatting template from the first existing run; absent
        // fields stay absent.
        let font = paragraph
            .runs
            .first()
            .map(|r| r.font.clone())
            .unwrap_or_else(FontProps::default);

        let visible = if self.use_labels {
            label(link.category).to_string()
        } else {
            matched.to_string()
        };

        let mut new_runs = Vec::with_capacity(3);
        if !before.is_empty() {
            new_runs.push(Run::new(before).with_font(font.clone()));
        }
        new_runs.push(
            Run::new(visible)
                .with_font(font.clone())
                .with_hyperlink(link.clean.clone()),
        );
        if !after.is_empty() {
            new_runs.push(Run::new(after).with_font(font));
        }

        paragraph.replace_runs(new_runs);
        true
    }
}

/// Whether the paragraph already hyperlinks this address: a run whose
/// address equals it, or a hyperlinked run whose text equals it.
fn is_already_hyperlinked(paragraph: &Paragraph, url: &str) -> bool {
    paragraph.runs.iter().any(|run| {
        run.hyperlink.as_deref() == Some(url) || (run.hyperlink.is_some() && run.text == url)
    })
}
