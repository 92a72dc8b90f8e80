//! Link classification: decides whether a cleaned URL is a conversion
//! target and which category it belongs to.
//!
//! Check order matters: image exclusion and game detection take
//! precedence over extension-based media detection.

use crate::types::LinkCategory;

/// Image extensions that disqualify a URL outright.
const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp", ".ico",
];

/// Audio file extensions.
const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".ogg"];

/// Video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm"];

/// Path segments that mark static assets rather than content links.
const STATIC_PATH_SEGMENTS: &[&str] = &[
    "/static/", "/assets/", "/images/", "/img/", "/css/", "/js/",
];

/// Classify a cleaned URL. Returns `None` if the URL should not be
/// converted, otherwise the category to convert it as.
///
/// Matching is case-insensitive; the URL itself is never modified.
pub fn classify(url: &str) -> Option<LinkCategory> {
    let lower = url.to_lowercase();

    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return None;
    }

    if IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext)) {
        return None;
    }

    // Game links: index.html carrying a data_url parameter, in any order.
    if lower.contains("index.html") && lower.contains("data_url=") {
        return Some(LinkCategory::Game);
    }

    if AUDIO_EXTENSIONS.iter().any(|ext| lower.contains(ext)) {
        return Some(LinkCategory::Audio);
    }

    if VIDEO_EXTENSIONS.iter().any(|ext| lower.contains(ext)) {
        return Some(LinkCategory::Video);
    }

    if STATIC_PATH_SEGMENTS.iter().any(|seg| lower.contains(seg)) {
        return None;
    }

    Some(LinkCategory::Generic)
}

/// Fixed visible text for a hyperlink run in label mode.
///
/// Constant per category, independent of the URL.
pub fn label(category: LinkCategory) -> &'static str {
    match category {
        LinkCategory::Game => "open game",
        LinkCategory::Audio => "play audio",
        LinkCategory::Video => "play video",
        LinkCategory::Generic => "open link",
    }
}
