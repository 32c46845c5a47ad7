use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

/// What a saved message fundamentally is, decided once when the remote
/// message is decoded and never re-derived afterwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Photo,
    Video,
    Audio,
    Document,
    Link,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Photo => "photo",
            ContentKind::Video => "video",
            ContentKind::Audio => "audio",
            ContentKind::Document => "document",
            ContentKind::Link => "link",
        }
    }
}

impl std::str::FromStr for ContentKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentKind::Text),
            "photo" => Ok(ContentKind::Photo),
            "video" => Ok(ContentKind::Video),
            "audio" => Ok(ContentKind::Audio),
            "document" => Ok(ContentKind::Document),
            "link" => Ok(ContentKind::Link),
            other => Err(UnknownVariant {
                what: "content kind",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display bucket a favorite is filed under.  Derived from the content by
/// the classifier; stored denormalized so list queries can filter on it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Image,
    Video,
    Audio,
    Document,
    Link,
    Text,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Image => "image",
            Category::Video => "video",
            Category::Audio => "audio",
            Category::Document => "document",
            Category::Link => "link",
            Category::Text => "text",
            Category::Other => "other",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Category::Image),
            "video" => Ok(Category::Video),
            "audio" => Ok(Category::Audio),
            "document" => Ok(Category::Document),
            "link" => Ok(Category::Link),
            "text" => Ok(Category::Text),
            "other" => Ok(Category::Other),
            other => Err(UnknownVariant {
                what: "category",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-dependent payload of a favorite, stored as a JSON document.
///
/// Which fields are populated depends on the [`ContentKind`]: plain text
/// carries only `text`, media carries the file metadata plus an optional
/// `caption`, links carry `url` and the surrounding `text`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoriteContent {
    /// Message body for text/link favorites.
    pub text: Option<String>,
    /// Caption attached to a media message.
    pub caption: Option<String>,
    /// Remote file identifier, kept so media can be re-fetched later.
    pub file_id: Option<String>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    /// File size in bytes as reported by the remote side.
    pub file_size: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// Playback length in seconds for audio/video.
    pub duration: Option<i32>,
    /// Target URL for link favorites.
    pub url: Option<String>,
    /// Relative path of a locally stored thumbnail, if one exists.
    pub thumbnail: Option<String>,
}

/// Identity details reported by the remote side for the logged-in user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub remote_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub has_photo: bool,
}
