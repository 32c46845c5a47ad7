//! Abstract remote session.
//!
//! The Telegram wire protocol stays behind these traits: the engine only
//! ever sees decoded [`RemoteMessage`] values and opaque file references,
//! so a real MTProto client and the in-memory fakes used by the test
//! suite are interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gramkeep_shared::UserProfile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a session implementation.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The remote endpoint could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The session secret was rejected.  Callers should prompt for
    /// re-authentication instead of retrying.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The remote side answered but the request itself failed.
    #[error("remote error: {0}")]
    Remote(String),

    /// A media payload could not be fetched.
    #[error("media download failed: {0}")]
    Media(String),
}

/// Opens authenticated sessions from stored credentials.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Establish a session.  Implementations must distinguish rejected
    /// credentials ([`SessionError::Auth`]) from unreachable servers
    /// ([`SessionError::Connection`]).
    async fn connect(
        &self,
        api_id: i32,
        api_hash: &str,
        session_secret: &str,
    ) -> Result<Box<dyn RemoteSession>, SessionError>;
}

/// One open connection to the remote account.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Profile of the logged-in user.
    async fn get_self(&self) -> Result<UserProfile, SessionError>;

    /// Most recent messages of the "saved messages" dialog, up to `limit`.
    async fn get_saved_messages(&self, limit: usize) -> Result<Vec<RemoteMessage>, SessionError>;

    /// Raw bytes of a media payload.
    async fn download_media(&self, file: &RemoteFile) -> Result<Vec<u8>, SessionError>;

    /// Close the connection.  Callers treat failures as best-effort.
    async fn disconnect(&self) -> Result<(), SessionError>;
}

/// A message as decoded from the remote dialog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMessage {
    /// Message id, unique within the dialog.
    pub id: i64,
    /// Message body, or the caption when media is attached.
    pub text: Option<String>,
    pub media: Option<RemoteMedia>,
    /// When the message was saved remotely.
    pub sent_at: DateTime<Utc>,
}

/// Media attached to a message, already decoded into a fixed set of
/// variants so no protocol types leak past the session boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RemoteMedia {
    Photo {
        file: RemoteFile,
        width: i32,
        height: i32,
    },
    Video {
        file: RemoteFile,
        duration: i32,
        width: i32,
        height: i32,
        /// Preview image offered by the remote side, when there is one.
        thumbnail: Option<RemoteFile>,
    },
    Audio {
        file: RemoteFile,
        duration: i32,
    },
    Document {
        file: RemoteFile,
    },
}

impl RemoteMedia {
    /// The primary file reference of this media.
    pub fn file(&self) -> &RemoteFile {
        match self {
            RemoteMedia::Photo { file, .. }
            | RemoteMedia::Video { file, .. }
            | RemoteMedia::Audio { file, .. }
            | RemoteMedia::Document { file } => file,
        }
    }
}

/// Opaque reference to a downloadable remote file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Identifier the session implementation can resolve back to the file.
    pub file_id: String,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    /// Size in bytes, when the remote side reports one.
    pub file_size: Option<i64>,
}
