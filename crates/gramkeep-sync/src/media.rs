//! Local mirror for downloaded media.
//!
//! Files are laid out as `<owner>/<message-id><ext>` under the base
//! directory; video previews get a `_thumb` suffix.  The store never
//! deletes anything on its own: favorites reference these paths and a
//! re-sync simply overwrites.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::session::RemoteFile;

/// Verify that a resolved path stays within the expected base directory.
/// Prevents path traversal through hostile file names.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf> {
    // Canonicalize base; target may not exist yet so normalize manually
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(&canonical_base)
        .unwrap_or(target)
        .components()
    {
        match component {
            std::path::Component::Normal(c) => resolved.push(c),
            std::path::Component::ParentDir => {
                return Err(SyncError::Media("Path traversal detected".to_string()));
            }
            _ => {} // RootDir, CurDir, Prefix -- skip
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(SyncError::Media("Path traversal detected".to_string()));
    }
    Ok(resolved)
}

/// Filesystem store for downloaded media.
#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
    max_size: usize,
}

impl MediaStore {
    /// Create the store, making sure the base directory exists.
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            SyncError::Media(format!(
                "Failed to create media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write a file under the store root, creating intermediate
    /// directories.  Returns the absolute path written.
    pub async fn write(&self, rel_path: &str, data: &[u8]) -> Result<PathBuf> {
        if data.len() > self.max_size {
            return Err(SyncError::MediaTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let path = ensure_within(&self.base_path, &self.base_path.join(rel_path))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                SyncError::Media(format!(
                    "Failed to create media subdirectory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        fs::write(&path, data).await.map_err(|e| {
            SyncError::Media(format!("Failed to write '{}': {}", path.display(), e))
        })?;

        debug!(path = %path.display(), size = data.len(), "Stored media file");
        Ok(path)
    }

    /// Whether a previously written file is still on disk.
    pub async fn exists(&self, rel_path: &str) -> bool {
        match ensure_within(&self.base_path, &self.base_path.join(rel_path)) {
            Ok(path) => fs::metadata(&path).await.is_ok(),
            Err(_) => false,
        }
    }
}

/// File extension (with leading dot) for a remote file: known MIME types
/// first, then whatever extension the remote file name carries, then a
/// generic `.bin`.
pub fn extension_for(file: &RemoteFile) -> String {
    if let Some(mime) = file.mime_type.as_deref() {
        let known = match mime {
            "image/jpeg" => Some(".jpg"),
            "image/png" => Some(".png"),
            "image/gif" => Some(".gif"),
            "image/webp" => Some(".webp"),
            "video/mp4" => Some(".mp4"),
            "video/webm" => Some(".webm"),
            "video/quicktime" => Some(".mov"),
            "audio/mpeg" => Some(".mp3"),
            "audio/ogg" => Some(".ogg"),
            "audio/mp4" => Some(".m4a"),
            "application/pdf" => Some(".pdf"),
            "application/zip" => Some(".zip"),
            _ => None,
        };
        if let Some(ext) = known {
            return ext.to_string();
        }
    }

    if let Some(name) = file.file_name.as_deref() {
        if let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) {
            return format!(".{}", ext.to_ascii_lowercase());
        }
    }

    ".bin".to_string()
}
