//! PPTX (Office Open XML) container backend for hyperlink conversion.
//!
//! Opens .pptx packages (ZIP archives of XML parts), loads the slide
//! rich-text model, and saves a modified package with rewritten runs
//! and hyperlink relationships.

pub mod document;
pub mod package;
pub mod parser;

pub use document::{Document, FontProps, Paragraph, Run, Shape, Slide, TextBody};
pub use package::DeckPackage;
