//! Core domain types, link classification, and the error taxonomy
//! for PPTX hyperlink conversion.

pub mod classify;
pub mod error;
pub mod types;

pub use classify::{classify, label};
pub use error::{Error, Result};
pub use types::{Link, LinkCategory, LinkSet};
