//! # gramkeep-sync
//!
//! The sync engine.  It connects to a stored Telegram account through an
//! abstract [`SessionProvider`], pages the account's "saved messages"
//! dialog, and archives every message it has not seen before: decode,
//! classify, extract hashtags, mirror media into a local [`MediaStore`],
//! persist through `gramkeep-store`.
//!
//! The Telegram wire protocol itself is not implemented here.  Callers
//! plug a real client in behind the session traits; the test suite plugs
//! in fakes.

pub mod config;
pub mod ingest;
pub mod lock;
pub mod media;
pub mod orchestrator;
pub mod session;

mod error;

pub use config::SyncConfig;
pub use error::SyncError;
pub use ingest::{ingest, IngestOutcome};
pub use lock::{SyncGuard, SyncLock};
pub use media::MediaStore;
pub use orchestrator::{NewAccount, SyncEngine, SyncPhase, SyncReport};
pub use session::{
    RemoteFile, RemoteMedia, RemoteMessage, RemoteSession, SessionError, SessionProvider,
};
