//! Rich-text document model for a slide deck.
//!
//! The shape mirrors the package structure: ordered slides, each with
//! ordered shapes, each optionally owning one text body of ordered
//! paragraphs of ordered runs.

use serde::{Deserialize, Serialize};

/// Formatting attributes carried by a run.
///
/// Every field is independently optional: absence means "inherit from
/// theme/placeholder", never "unset to default". No field is ever
/// fabricated when copying a template between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontProps {
    /// Typeface name (e.g. "Calibri").
    pub family_name: Option<String>,
    /// Size in points.
    pub size_points: Option<f32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    /// Solid fill color as an RRGGBB hex string.
    pub color_rgb: Option<String>,
}

/// Minimal span of text sharing one set of formatting attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Visible text of the run.
    pub text: String,
    /// Formatting attributes (optional fields, absence = inherit).
    pub font: FontProps,
    /// Hyperlink address, if the run is clickable.
    pub hyperlink: Option<String>,
}

impl Run {
    /// Create a plain run with no explicit formatting.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: FontProps::default(),
            hyperlink: None,
        }
    }

    /// Attach formatting attributes.
    pub fn with_font(mut self, font: FontProps) -> Self {
        self.font = font;
        self
    }

    /// Attach a hyperlink address.
    pub fn with_hyperlink(mut self, address: impl Into<String>) -> Self {
        self.hyperlink = Some(address.into());
        self
    }
}

/// Ordered sequence of runs forming one block of text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Runs in display order.
    pub runs: Vec<Run>,

    /// Ordinal of this paragraph among all `<a:p>` elements of its
    /// slide part, in document order. The saver uses it to splice
    /// rewritten runs back into the right element.
    pub(crate) ordinal: usize,

    /// Set when the run list has been replaced since load.
    pub(crate) modified: bool,
}

impl Paragraph {
    /// Create a paragraph from runs.
    pub fn new(runs: Vec<Run>) -> Self {
        Self {
            runs,
            ordinal: 0,
            modified: false,
        }
    }

    pub(crate) fn with_ordinal(runs: Vec<Run>, ordinal: usize) -> Self {
        Self {
            runs,
            ordinal,
            modified: false,
        }
    }

    /// Visible text: the concatenation of run texts in order.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Replace the run list, marking the paragraph as modified.
    pub fn replace_runs(&mut self, runs: Vec<Run>) {
        self.runs = runs;
        self.modified = true;
    }

    /// Whether the run list has been replaced since load.
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

/// Ordered sequence of paragraphs inside one shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBody {
    pub paragraphs: Vec<Paragraph>,
}

impl TextBody {
    pub fn new(paragraphs: Vec<Paragraph>) -> Self {
        Self { paragraphs }
    }
}

/// A shape on a slide, optionally carrying text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Text content, if the shape has any.
    pub text_body: Option<TextBody>,
}

impl Shape {
    pub fn with_text_body(body: TextBody) -> Self {
        Self {
            text_body: Some(body),
        }
    }
}

/// A single slide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based slide number.
    pub number: usize,
    /// Package member path of the slide part (e.g. "ppt/slides/slide1.xml").
    pub(crate) path: String,
    /// Shapes in document order.
    pub shapes: Vec<Shape>,
}

impl Slide {
    /// Create an empty slide with the given number.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            path: String::new(),
            shapes: Vec::new(),
        }
    }

    pub(crate) fn with_path(number: usize, path: impl Into<String>) -> Self {
        Self {
            number,
            path: path.into(),
            shapes: Vec::new(),
        }
    }

    /// Package member path of this slide's XML part.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Paragraphs of every shape with a text body, in document order.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.shapes
            .iter()
            .filter_map(|s| s.text_body.as_ref())
            .flat_map(|b| b.paragraphs.iter())
    }

    /// Mutable access to the paragraphs, in document order.
    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> {
        self.shapes
            .iter_mut()
            .filter_map(|s| s.text_body.as_mut())
            .flat_map(|b| b.paragraphs.iter_mut())
    }

    /// Whether any paragraph of this slide has been modified.
    pub fn is_modified(&self) -> bool {
        self.paragraphs().any(|p| p.is_modified())
    }
}

/// Ordered sequence of slides loaded from one package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub slides: Vec<Slide>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slide.
    pub fn add_slide(&mut self, slide: Slide) {
        self.slides.push(slide);
    }

    /// Whether any slide has modified paragraphs.
    pub fn is_modified(&self) -> bool {
        self.slides.iter().any(|s| s.is_modified())
    }

    /// Every structured hyperlink address present on any run.
    pub fn hyperlink_addresses(&self) -> Vec<&str> {
        self.slides
            .iter()
            .flat_map(|s| s.paragraphs())
            .flat_map(|p| p.runs.iter())
            .filter_map(|r| r.hyperlink.as_deref())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_text_concatenates_runs_in_order() {
        let p = Paragraph::new(vec![Run::new("see "), Run::new("this"), Run::new(" now")]);
        assert_eq!(p.text(), "see this now");
    }

    #[test]
    fn replace_runs_marks_paragraph_modified() {
        let mut p = Paragraph::new(vec![Run::new("old")]);
        assert!(!p.is_modified());
        p.replace_runs(vec![Run::new("new")]);
        assert!(p.is_modified());
        assert_eq!(p.text(), "new");
    }

    #[test]
    fn document_collects_hyperlink_addresses() {
        let mut slide = Slide::new(1);
        let para = Paragraph::new(vec![
            Run::new("click "),
            Run::new("here").with_hyperlink("https://a.co/x.mp4"),
        ]);
        slide.shapes.push(Shape::with_text_body(TextBody::new(vec![para])));

        let mut doc = Document::new();
        doc.add_slide(slide);
        assert_eq!(doc.hyperlink_addresses(), vec!["https://a.co/x.mp4"]);
    }
}
