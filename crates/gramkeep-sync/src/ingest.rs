//! Message ingestion: dedup, decode, classify, mirror, persist.
//!
//! One call archives one remote message.  Ingestion is idempotent per
//! (owner, remote message id), and a failed media download degrades the
//! record to "not downloaded" instead of failing the whole message.
//! Later passes skip the record at the dedup check, so it keeps the
//! remote `file_id` for an explicit re-fetch.

use chrono::Utc;
use gramkeep_shared::classify;
use gramkeep_shared::{ContentKind, FavoriteContent};
use gramkeep_store::{Database, Favorite};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::media::{extension_for, MediaStore};
use crate::session::{RemoteMedia, RemoteMessage, RemoteSession};

/// What [`ingest`] did with one message.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// `false` when the message was already archived and nothing changed.
    pub created: bool,
    pub favorite: Favorite,
}

/// Archive one remote message for `owner`.
pub async fn ingest(
    db: &Database,
    media_store: &MediaStore,
    session: &dyn RemoteSession,
    owner: Uuid,
    message: &RemoteMessage,
) -> Result<IngestOutcome> {
    if let Some(existing) = db.find_favorite_by_remote_id(owner, message.id)? {
        debug!(owner = %owner, message = message.id, "Message already archived, skipping");
        return Ok(IngestOutcome {
            created: false,
            favorite: existing,
        });
    }

    let (kind, mut content) = decode_message(message);
    let tags = classify::extract_hashtags(message.text.as_deref().unwrap_or(""));
    let category = classify::classify(kind, &content);

    let mut local_path = None;
    if let Some(media) = &message.media {
        match download_media(media_store, session, owner, message.id, media).await {
            Ok(saved) => {
                content.thumbnail = saved.thumbnail;
                local_path = Some(saved.local_path);
            }
            Err(error) => {
                warn!(
                    owner = %owner,
                    message = message.id,
                    error = %error,
                    "Media download failed, archiving without file"
                );
            }
        }
    }

    let favorite = Favorite {
        id: Uuid::new_v4(),
        owner_id: owner,
        remote_message_id: message.id,
        kind,
        category,
        content,
        tags,
        saved_at: message.sent_at,
        is_downloaded: local_path.is_some(),
        local_path,
        created_at: Utc::now(),
    };
    db.insert_favorite(&favorite)?;

    for tag in &favorite.tags {
        db.apply_tag_delta(owner, tag, 1)?;
    }

    debug!(
        owner = %owner,
        message = message.id,
        kind = %favorite.kind,
        category = %favorite.category,
        tags = favorite.tags.len(),
        "Archived message"
    );

    Ok(IngestOutcome {
        created: true,
        favorite,
    })
}

/// Map the remote message shape to a content kind and payload.
///
/// Media variants carry the message body as caption; bare text that
/// contains a URL becomes a link favorite.
fn decode_message(message: &RemoteMessage) -> (ContentKind, FavoriteContent) {
    let Some(media) = &message.media else {
        let text = message.text.as_deref().unwrap_or("");
        if let Some(url) = classify::find_url(text) {
            return (
                ContentKind::Link,
                FavoriteContent {
                    url: Some(url.to_string()),
                    text: message.text.clone(),
                    ..Default::default()
                },
            );
        }
        return (
            ContentKind::Text,
            FavoriteContent {
                text: message.text.clone(),
                ..Default::default()
            },
        );
    };

    let file = media.file();
    let mut content = FavoriteContent {
        caption: message.text.clone(),
        file_id: Some(file.file_id.clone()),
        mime_type: file.mime_type.clone(),
        file_name: file.file_name.clone(),
        file_size: file.file_size,
        ..Default::default()
    };

    let kind = match media {
        RemoteMedia::Photo { width, height, .. } => {
            content.width = Some(*width);
            content.height = Some(*height);
            ContentKind::Photo
        }
        RemoteMedia::Video {
            duration,
            width,
            height,
            ..
        } => {
            content.duration = Some(*duration);
            content.width = Some(*width);
            content.height = Some(*height);
            ContentKind::Video
        }
        RemoteMedia::Audio { duration, .. } => {
            content.duration = Some(*duration);
            ContentKind::Audio
        }
        RemoteMedia::Document { .. } => ContentKind::Document,
    };

    (kind, content)
}

struct SavedMedia {
    local_path: String,
    thumbnail: Option<String>,
}

/// Fetch the message's media (and preview, when one is offered) into the
/// media store.  Returned paths are relative to the store root.
async fn download_media(
    store: &MediaStore,
    session: &dyn RemoteSession,
    owner: Uuid,
    message_id: i64,
    media: &RemoteMedia,
) -> Result<SavedMedia> {
    let file = media.file();
    let bytes = session.download_media(file).await?;

    let rel_path = format!("{}/{}{}", owner, message_id, extension_for(file));
    store.write(&rel_path, &bytes).await?;

    let thumbnail = match media {
        // a photo is its own preview
        RemoteMedia::Photo { .. } => Some(rel_path.clone()),
        RemoteMedia::Video {
            thumbnail: Some(thumb),
            ..
        } => {
            let thumb_bytes = session.download_media(thumb).await?;
            let thumb_path = format!("{}/{}_thumb{}", owner, message_id, extension_for(thumb));
            store.write(&thumb_path, &thumb_bytes).await?;
            Some(thumb_path)
        }
        _ => None,
    };

    Ok(SavedMedia {
        local_path: rel_path,
        thumbnail,
    })
}
