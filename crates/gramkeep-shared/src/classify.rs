//! Content classification and text extraction helpers.
//!
//! All functions here are pure: they look only at the message shape
//! already decoded into [`ContentKind`] and [`FavoriteContent`] and
//! never touch the network or the store.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{Category, ContentKind, FavoriteContent};

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("Invalid regex"));

static HASHTAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").expect("Invalid regex"));

/// Bucket a favorite into its display category.
///
/// Priority order: a MIME type wins over the declared kind, the declared
/// kind wins over text inspection.  Plain text that carries a URL is
/// filed as a link.
pub fn classify(kind: ContentKind, content: &FavoriteContent) -> Category {
    if let Some(mime) = content.mime_type.as_deref() {
        if mime.starts_with("image/") {
            return Category::Image;
        }
        if mime.starts_with("video/") {
            return Category::Video;
        }
        if mime.starts_with("audio/") {
            return Category::Audio;
        }
        if mime.contains("pdf") {
            return Category::Document;
        }
    }

    match kind {
        ContentKind::Photo => Category::Image,
        ContentKind::Video => Category::Video,
        ContentKind::Audio => Category::Audio,
        ContentKind::Document => Category::Document,
        ContentKind::Link => Category::Link,
        ContentKind::Text => {
            let text = content.text.as_deref().unwrap_or("");
            if URL_RE.is_match(text) {
                Category::Link
            } else {
                Category::Text
            }
        }
    }
}

/// First URL-looking token in `text`, if any.
pub fn find_url(text: &str) -> Option<&str> {
    URL_RE.find(text).map(|m| m.as_str())
}

/// Hashtag tokens in `text` without the leading `#`, deduplicated in
/// first-seen order.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for captures in HASHTAG_RE.captures_iter(text) {
        let tag = captures[1].to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}
