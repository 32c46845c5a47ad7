//! End-to-end sync engine tests against an in-memory fake session.
//!
//! The fakes cover the full session surface, so these tests exercise the
//! real pipeline: vault decryption, paging, dedup, classification, media
//! mirroring, the tag ledger, and the per-account lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use gramkeep_shared::{vault, Category, ContentKind, UserProfile};
use gramkeep_store::{Database, ListOptions, StoreError, TelegramAccount};
use gramkeep_sync::{
    ingest, MediaStore, NewAccount, RemoteFile, RemoteMedia, RemoteMessage, RemoteSession,
    SessionError, SessionProvider, SyncConfig, SyncEngine, SyncError,
};
use tokio::sync::Semaphore;
use uuid::Uuid;

const SESSION_SECRET: &str = "1BVtsOKIBu63v2a0d8wiJ1Qc";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Two-sided gate that lets a test hold a sync pass inside paging.
struct Gate {
    entered: Arc<Semaphore>,
    release: Arc<Semaphore>,
}

/// State shared between the fake provider, its sessions, and the test
/// body, so call effects stay observable after the engine takes
/// ownership of the provider.
#[derive(Default)]
struct RemoteState {
    messages: Mutex<Vec<RemoteMessage>>,
    media: HashMap<String, Vec<u8>>,
    profile: UserProfile,
    fail_paging: bool,
    paging_gate: Option<Gate>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    last_secret: Mutex<Option<String>>,
}

struct FakeSession {
    state: Arc<RemoteState>,
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn get_self(&self) -> Result<UserProfile, SessionError> {
        Ok(self.state.profile.clone())
    }

    async fn get_saved_messages(&self, limit: usize) -> Result<Vec<RemoteMessage>, SessionError> {
        if let Some(gate) = &self.state.paging_gate {
            gate.entered.add_permits(1);
            let permit = gate
                .release
                .acquire()
                .await
                .map_err(|_| SessionError::Remote("gate closed".to_string()))?;
            permit.forget();
        }

        if self.state.fail_paging {
            return Err(SessionError::Remote("FLOOD_WAIT".to_string()));
        }

        let messages = self.state.messages.lock().unwrap();
        Ok(messages.iter().take(limit).cloned().collect())
    }

    async fn download_media(&self, file: &RemoteFile) -> Result<Vec<u8>, SessionError> {
        self.state
            .media
            .get(&file.file_id)
            .cloned()
            .ok_or_else(|| SessionError::Media(format!("no payload for {}", file.file_id)))
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// How the fake provider answers `connect`.
#[derive(Clone, Copy)]
enum ConnectMode {
    Accept,
    RejectAuth,
    RejectNetwork,
}

struct FakeProvider {
    mode: ConnectMode,
    state: Arc<RemoteState>,
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn connect(
        &self,
        _api_id: i32,
        _api_hash: &str,
        session_secret: &str,
    ) -> Result<Box<dyn RemoteSession>, SessionError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        *self.state.last_secret.lock().unwrap() = Some(session_secret.to_string());

        match self.mode {
            ConnectMode::Accept => Ok(Box::new(FakeSession {
                state: Arc::clone(&self.state),
            })),
            ConnectMode::RejectAuth => {
                Err(SessionError::Auth("AUTH_KEY_UNREGISTERED".to_string()))
            }
            ConnectMode::RejectNetwork => {
                Err(SessionError::Connection("connection refused".to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct TestBed {
    _tmp: tempfile::TempDir,
    db: Database,
    engine: Arc<SyncEngine>,
    media: MediaStore,
    state: Arc<RemoteState>,
    key: String,
    owner: Uuid,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn setup_with_page_size(
    state: RemoteState,
    mode: ConnectMode,
    page_size: usize,
) -> anyhow::Result<TestBed> {
    init_tracing();

    let tmp = tempfile::tempdir()?;
    let db = Database::open_at(&tmp.path().join("gramkeep.db"))?;
    let state = Arc::new(state);
    let key = vault::generate_key();

    let media = MediaStore::new(tmp.path().join("media"), 1024 * 1024).await?;
    let config = SyncConfig {
        session_key: key.clone(),
        page_size,
        ..Default::default()
    };
    let provider = FakeProvider {
        mode,
        state: Arc::clone(&state),
    };
    let engine = SyncEngine::new(Box::new(provider), media.clone(), config);

    Ok(TestBed {
        _tmp: tmp,
        db,
        engine: Arc::new(engine),
        media,
        state,
        key,
        owner: Uuid::new_v4(),
    })
}

async fn setup(state: RemoteState, mode: ConnectMode) -> anyhow::Result<TestBed> {
    let page_size = SyncConfig::default().page_size;
    setup_with_page_size(state, mode, page_size).await
}

/// Store an account with an encrypted session string, the way
/// `register_account` would have.
fn seed_account(bed: &TestBed) -> anyhow::Result<TelegramAccount> {
    let account = TelegramAccount {
        id: Uuid::new_v4(),
        owner_id: bed.owner,
        name: "primary".to_string(),
        api_id: 12345,
        api_hash: "0123456789abcdef".to_string(),
        session_cipher: vault::encrypt(&bed.key, SESSION_SECRET.as_bytes())?,
        is_active: false,
        remote_id: None,
        username: None,
        first_name: None,
        last_name: None,
        has_photo: false,
        last_sync: None,
        created_at: Utc::now(),
    };
    Ok(bed.db.insert_account(&account)?)
}

fn sent_at(id: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(id)
}

fn text_message(id: i64, text: &str) -> RemoteMessage {
    RemoteMessage {
        id,
        text: Some(text.to_string()),
        media: None,
        sent_at: sent_at(id),
    }
}

fn photo_message(id: i64, file_id: &str, caption: &str) -> RemoteMessage {
    RemoteMessage {
        id,
        text: Some(caption.to_string()),
        media: Some(RemoteMedia::Photo {
            file: RemoteFile {
                file_id: file_id.to_string(),
                mime_type: Some("image/jpeg".to_string()),
                file_name: None,
                file_size: None,
            },
            width: 800,
            height: 600,
        }),
        sent_at: sent_at(id),
    }
}

fn video_message(id: i64, file_id: &str, thumb_id: Option<&str>) -> RemoteMessage {
    RemoteMessage {
        id,
        text: None,
        media: Some(RemoteMedia::Video {
            file: RemoteFile {
                file_id: file_id.to_string(),
                mime_type: Some("video/mp4".to_string()),
                file_name: None,
                file_size: None,
            },
            duration: 42,
            width: 1280,
            height: 720,
            thumbnail: thumb_id.map(|id| RemoteFile {
                file_id: id.to_string(),
                mime_type: Some("image/jpeg".to_string()),
                file_name: None,
                file_size: None,
            }),
        }),
        sent_at: sent_at(id),
    }
}

// ---------------------------------------------------------------------------
// Sync passes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_archives_new_and_skips_already_archived() -> anyhow::Result<()> {
    let bed = setup(RemoteState::default(), ConnectMode::Accept).await?;
    seed_account(&bed)?;

    bed.state
        .messages
        .lock()
        .unwrap()
        .push(text_message(1, "plain note"));

    let first = bed.engine.sync_account(&bed.db, bed.owner).await?;
    assert_eq!((first.created, first.skipped, first.failed), (1, 0, 0));

    {
        let mut messages = bed.state.messages.lock().unwrap();
        messages.push(text_message(2, "learning #rust today"));
        messages.push(text_message(3, "more #rust and #sqlite"));
    }

    let second = bed.engine.sync_account(&bed.db, bed.owner).await?;
    assert_eq!((second.created, second.skipped, second.failed), (2, 1, 0));

    // the ledger reflects only the two new messages' hashtags
    let tags = bed.db.list_tags(bed.owner)?;
    let summary: Vec<(&str, i64)> = tags.iter().map(|t| (t.name.as_str(), t.count)).collect();
    assert_eq!(summary, vec![("rust", 2), ("sqlite", 1)]);

    Ok(())
}

#[tokio::test]
async fn resync_is_idempotent() -> anyhow::Result<()> {
    let state = RemoteState {
        messages: Mutex::new(vec![
            text_message(1, "keep #notes"),
            text_message(2, "https://example.com/post"),
        ]),
        ..Default::default()
    };
    let bed = setup(state, ConnectMode::Accept).await?;
    seed_account(&bed)?;

    let first = bed.engine.sync_account(&bed.db, bed.owner).await?;
    assert_eq!((first.created, first.skipped), (2, 0));

    let second = bed.engine.sync_account(&bed.db, bed.owner).await?;
    assert_eq!((second.created, second.skipped), (0, 2));

    let page = bed.db.list_favorites(bed.owner, &ListOptions::default())?;
    assert_eq!(page.total, 2);
    assert_eq!(bed.db.get_tag(bed.owner, "notes")?.unwrap().count, 1);

    Ok(())
}

#[tokio::test]
async fn page_size_bounds_the_fetch() -> anyhow::Result<()> {
    let state = RemoteState {
        messages: Mutex::new((1..=5).map(|id| text_message(id, "bulk")).collect()),
        ..Default::default()
    };
    let bed = setup_with_page_size(state, ConnectMode::Accept, 3).await?;
    seed_account(&bed)?;

    let report = bed.engine.sync_account(&bed.db, bed.owner).await?;
    assert_eq!(report.created, 3);

    Ok(())
}

#[tokio::test]
async fn successful_sync_records_last_sync_and_disconnects() -> anyhow::Result<()> {
    let state = RemoteState {
        messages: Mutex::new(vec![text_message(1, "hello")]),
        ..Default::default()
    };
    let bed = setup(state, ConnectMode::Accept).await?;
    let account = seed_account(&bed)?;
    assert!(account.last_sync.is_none());

    bed.engine.sync_account(&bed.db, bed.owner).await?;

    let account = bed.db.get_account(bed.owner, account.id)?;
    assert!(account.last_sync.is_some());
    assert_eq!(bed.state.connects.load(Ordering::SeqCst), 1);
    assert_eq!(bed.state.disconnects.load(Ordering::SeqCst), 1);
    // the provider saw the decrypted session string
    assert_eq!(
        bed.state.last_secret.lock().unwrap().as_deref(),
        Some(SESSION_SECRET)
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Media handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn media_is_mirrored_with_thumbnails() -> anyhow::Result<()> {
    let mut media = HashMap::new();
    media.insert("f-photo".to_string(), b"PHOTOBYTES".to_vec());
    media.insert("f-video".to_string(), b"VIDEOBYTES".to_vec());
    media.insert("f-thumb".to_string(), b"THUMBBYTES".to_vec());

    let state = RemoteState {
        messages: Mutex::new(vec![
            photo_message(1, "f-photo", "sunset #travel"),
            video_message(2, "f-video", Some("f-thumb")),
        ]),
        media,
        ..Default::default()
    };
    let bed = setup(state, ConnectMode::Accept).await?;
    seed_account(&bed)?;

    let report = bed.engine.sync_account(&bed.db, bed.owner).await?;
    assert_eq!((report.created, report.failed), (2, 0));

    let photo = bed.db.find_favorite_by_remote_id(bed.owner, 1)?.unwrap();
    let photo_path = format!("{}/1.jpg", bed.owner);
    assert!(photo.is_downloaded);
    assert_eq!(photo.local_path.as_deref(), Some(photo_path.as_str()));
    // a photo serves as its own preview
    assert_eq!(photo.content.thumbnail.as_deref(), Some(photo_path.as_str()));
    assert!(bed.media.exists(&photo_path).await);
    assert_eq!(
        tokio::fs::read(bed.media.base_path().join(&photo_path)).await?,
        b"PHOTOBYTES"
    );

    let video = bed.db.find_favorite_by_remote_id(bed.owner, 2)?.unwrap();
    let video_path = format!("{}/2.mp4", bed.owner);
    let thumb_path = format!("{}/2_thumb.jpg", bed.owner);
    assert_eq!(video.local_path.as_deref(), Some(video_path.as_str()));
    assert_eq!(video.content.thumbnail.as_deref(), Some(thumb_path.as_str()));
    assert!(bed.media.exists(&thumb_path).await);

    Ok(())
}

#[tokio::test]
async fn download_failure_degrades_to_undownloaded() -> anyhow::Result<()> {
    let state = RemoteState {
        messages: Mutex::new(vec![photo_message(1, "missing-file", "no bytes #pic")]),
        ..Default::default()
    };
    let bed = setup(state, ConnectMode::Accept).await?;
    seed_account(&bed)?;

    let report = bed.engine.sync_account(&bed.db, bed.owner).await?;
    assert_eq!((report.created, report.failed), (1, 0));

    let favorite = bed.db.find_favorite_by_remote_id(bed.owner, 1)?.unwrap();
    assert!(!favorite.is_downloaded);
    assert!(favorite.local_path.is_none());
    assert!(favorite.content.thumbnail.is_none());
    // classification and tagging still happened
    assert_eq!(favorite.kind, ContentKind::Photo);
    assert_eq!(favorite.category, Category::Image);
    assert_eq!(bed.db.get_tag(bed.owner, "pic")?.unwrap().count, 1);

    Ok(())
}

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_credentials_classify_as_auth() -> anyhow::Result<()> {
    let bed = setup(RemoteState::default(), ConnectMode::RejectAuth).await?;
    let account = seed_account(&bed)?;

    let err = bed.engine.sync_account(&bed.db, bed.owner).await.unwrap_err();
    assert!(matches!(err, SyncError::Auth(_)));

    // the pass never got far enough to touch last_sync or a session
    let account = bed.db.get_account(bed.owner, account.id)?;
    assert!(account.last_sync.is_none());
    assert_eq!(bed.state.disconnects.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn unreachable_server_classifies_as_connection() -> anyhow::Result<()> {
    let bed = setup(RemoteState::default(), ConnectMode::RejectNetwork).await?;
    seed_account(&bed)?;

    let err = bed.engine.sync_account(&bed.db, bed.owner).await.unwrap_err();
    assert!(matches!(err, SyncError::Connection(_)));

    Ok(())
}

#[tokio::test]
async fn paging_failure_still_releases_the_session() -> anyhow::Result<()> {
    let state = RemoteState {
        fail_paging: true,
        ..Default::default()
    };
    let bed = setup(state, ConnectMode::Accept).await?;
    let account = seed_account(&bed)?;

    let err = bed.engine.sync_account(&bed.db, bed.owner).await.unwrap_err();
    assert!(matches!(err, SyncError::Connection(_)));

    assert_eq!(bed.state.disconnects.load(Ordering::SeqCst), 1);
    let account = bed.db.get_account(bed.owner, account.id)?;
    assert!(account.last_sync.is_none());

    Ok(())
}

#[tokio::test]
async fn sync_without_an_account_is_not_found() -> anyhow::Result<()> {
    let bed = setup(RemoteState::default(), ConnectMode::Accept).await?;

    let err = bed.engine.sync_account(&bed.db, bed.owner).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(StoreError::NotFound)));

    Ok(())
}

#[tokio::test]
async fn concurrent_sync_for_one_account_is_rejected() -> anyhow::Result<()> {
    let entered = Arc::new(Semaphore::new(0));
    let release = Arc::new(Semaphore::new(0));

    let state = RemoteState {
        messages: Mutex::new(vec![text_message(1, "held")]),
        paging_gate: Some(Gate {
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        }),
        ..Default::default()
    };
    let bed = setup(state, ConnectMode::Accept).await?;
    seed_account(&bed)?;

    // rusqlite connections are not Sync, so the parked pass runs on a
    // LocalSet with its own handle onto the same database file
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let engine = Arc::clone(&bed.engine);
            let owner = bed.owner;
            let db_path = bed.db.path().expect("db path");
            let held = tokio::task::spawn_local(async move {
                let db = Database::open_at(&db_path).expect("reopen database");
                engine.sync_account(&db, owner).await
            });

            // wait until the first pass is parked inside paging
            let permit = entered.acquire().await?;
            permit.forget();

            let err = bed
                .engine
                .sync_account(&bed.db, bed.owner)
                .await
                .unwrap_err();
            assert!(matches!(err, SyncError::SyncInProgress));

            release.add_permits(1);
            let report = held.await??;
            assert_eq!(report.created, 1);

            anyhow::Ok(())
        })
        .await?;

    // with the first pass finished the lock is free again; pre-open the
    // gate so this pass does not park in paging
    release.add_permits(1);
    let report = bed.engine.sync_account(&bed.db, bed.owner).await?;
    assert_eq!(report.skipped, 1);

    Ok(())
}

// ---------------------------------------------------------------------------
// Direct ingestion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingesting_the_same_message_twice_is_a_noop() -> anyhow::Result<()> {
    let bed = setup(RemoteState::default(), ConnectMode::Accept).await?;
    let session = FakeSession {
        state: Arc::clone(&bed.state),
    };
    let message = text_message(9, "direct #call");

    let first = ingest(&bed.db, &bed.media, &session, bed.owner, &message).await?;
    assert!(first.created);

    let second = ingest(&bed.db, &bed.media, &session, bed.owner, &message).await?;
    assert!(!second.created);
    assert_eq!(second.favorite.id, first.favorite.id);
    assert_eq!(bed.db.get_tag(bed.owner, "call")?.unwrap().count, 1);

    Ok(())
}

// ---------------------------------------------------------------------------
// Account registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_account_encrypts_and_fetches_profile() -> anyhow::Result<()> {
    let state = RemoteState {
        profile: UserProfile {
            remote_id: 777,
            username: Some("kay".to_string()),
            first_name: Some("Kay".to_string()),
            last_name: None,
            has_photo: true,
        },
        ..Default::default()
    };
    let bed = setup(state, ConnectMode::Accept).await?;

    let account = bed
        .engine
        .register_account(
            &bed.db,
            bed.owner,
            NewAccount {
                name: None,
                api_id: 94114,
                api_hash: "beefcafe".to_string(),
                session_secret: SESSION_SECRET.to_string(),
            },
        )
        .await?;

    assert!(account.is_active);
    assert_eq!(account.name, "Account 1");
    assert_eq!(account.remote_id, Some(777));

    // the stored envelope is not the plaintext, but decrypts back to it
    let stored = bed.db.get_account(bed.owner, account.id)?;
    assert_ne!(stored.session_cipher, SESSION_SECRET);
    assert!(stored.session_cipher.contains(':'));
    assert_eq!(
        vault::decrypt_string(&bed.key, &stored.session_cipher)?,
        SESSION_SECRET
    );

    // the provider received the decrypted secret for verification
    assert_eq!(
        bed.state.last_secret.lock().unwrap().as_deref(),
        Some(SESSION_SECRET)
    );
    assert_eq!(stored.username.as_deref(), Some("kay"));
    assert!(stored.has_photo);
    assert_eq!(bed.state.disconnects.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn register_account_names_follow_registration_order() -> anyhow::Result<()> {
    let bed = setup(RemoteState::default(), ConnectMode::Accept).await?;

    let first = bed
        .engine
        .register_account(
            &bed.db,
            bed.owner,
            NewAccount {
                name: Some("Main".to_string()),
                api_id: 1,
                api_hash: "aa".to_string(),
                session_secret: SESSION_SECRET.to_string(),
            },
        )
        .await?;
    let second = bed
        .engine
        .register_account(
            &bed.db,
            bed.owner,
            NewAccount {
                name: None,
                api_id: 2,
                api_hash: "bb".to_string(),
                session_secret: SESSION_SECRET.to_string(),
            },
        )
        .await?;

    assert_eq!(first.name, "Main");
    assert!(first.is_active);
    assert_eq!(second.name, "Account 2");
    assert!(!second.is_active);

    Ok(())
}

#[tokio::test]
async fn failed_verification_keeps_the_registered_row() -> anyhow::Result<()> {
    let bed = setup(RemoteState::default(), ConnectMode::RejectAuth).await?;

    let err = bed
        .engine
        .register_account(
            &bed.db,
            bed.owner,
            NewAccount {
                name: None,
                api_id: 94114,
                api_hash: "beefcafe".to_string(),
                session_secret: SESSION_SECRET.to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Auth(_)));

    // the row was saved before verification and stays for a retry
    let accounts = bed.db.list_accounts(bed.owner)?;
    assert_eq!(accounts.len(), 1);
    assert!(accounts[0].is_active);
    assert!(accounts[0].remote_id.is_none());

    Ok(())
}

#[tokio::test]
async fn register_account_rejects_incomplete_credentials() -> anyhow::Result<()> {
    let bed = setup(RemoteState::default(), ConnectMode::Accept).await?;

    let err = bed
        .engine
        .register_account(
            &bed.db,
            bed.owner,
            NewAccount {
                name: None,
                api_id: 94114,
                api_hash: String::new(),
                session_secret: SESSION_SECRET.to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
    assert!(bed.db.list_accounts(bed.owner)?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_connection_refreshes_the_profile() -> anyhow::Result<()> {
    let state = RemoteState {
        profile: UserProfile {
            remote_id: 555,
            username: Some("fresh".to_string()),
            first_name: None,
            last_name: None,
            has_photo: false,
        },
        ..Default::default()
    };
    let bed = setup(state, ConnectMode::Accept).await?;
    let account = seed_account(&bed)?;

    let profile = bed
        .engine
        .test_connection(&bed.db, bed.owner, account.id)
        .await?;
    assert_eq!(profile.remote_id, 555);

    let stored = bed.db.get_account(bed.owner, account.id)?;
    assert_eq!(stored.remote_id, Some(555));
    assert_eq!(stored.username.as_deref(), Some("fresh"));
    assert_eq!(bed.state.disconnects.load(Ordering::SeqCst), 1);

    Ok(())
}
