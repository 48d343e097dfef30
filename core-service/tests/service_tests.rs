//! End-to-end tests of the service façade with a mocked backend.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::playback::{
    MediaEvent, PlaybackAdapter, PlaybackRequest, PlaybackSessionId, PreparedSession,
    SessionEvent,
};
use bridge_traits::storage::{BlobStore, MemoryBlobStore, StoredBlob};
use bytes::Bytes;
use core_library::models::{TrackId, TrackSummary};
use core_playback::PlaybackStatus;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, DownloadEvent, TrackSource};
use core_service::ui::{Key, KeyInput, SearchState};
use core_service::{CoreError, CoreService};
use mockall::mock;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

const BASE: &str = "http://music.test";
const SEARCH_BODY: &str = r#"[
    {"title": "Moonlight Sonata", "artist": "Beethoven", "album": null, "file_id": "f1"},
    {"title": "Moonlight Serenade", "artist": "Glenn Miller", "album": "Best Of", "file_id": "f2"}
]"#;

/// Backend that answers search, stream and download requests.
fn backend() -> MockHttpClient {
    let mut http = MockHttpClient::new();
    http.expect_execute().returning(|request| Ok(respond(&request)));
    http
}

fn respond(request: &HttpRequest) -> HttpResponse {
    let path = request.url.trim_start_matches(BASE);
    match path {
        p if p.starts_with("/api/search") => HttpResponse::new(200, SEARCH_BODY),
        "/stream/f1" => HttpResponse::new(200, Bytes::from_static(b"fLaC\0\0\0\x22one")),
        "/stream/f2" => HttpResponse::new(200, Bytes::from_static(b"ID3\x04two")),
        "/api/download/f1" => HttpResponse::new(200, Bytes::from_static(b"fLaC\0\0\0\x22one"))
            .with_header(
                "Content-Disposition",
                r#"attachment; filename="Moonlight Sonata.flac""#,
            ),
        "/api/download/f2" => HttpResponse::new(200, Bytes::from_static(b"ID3\x04two")),
        "/api/test" => HttpResponse::new(200, r#"{"status": "ok"}"#),
        _ => HttpResponse::new(400, r#"{"error": "File not found"}"#),
    }
}

/// Audio output that accepts everything and lets tests inject media events.
struct FakeOutput {
    events: broadcast::Sender<SessionEvent>,
    sessions: Mutex<Vec<PlaybackSessionId>>,
}

impl FakeOutput {
    fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            events,
            sessions: Mutex::new(Vec::new()),
        }
    }

    fn last_session(&self) -> PlaybackSessionId {
        *self.sessions.lock().last().unwrap()
    }

    fn emit(&self, session: PlaybackSessionId, event: MediaEvent) {
        self.events.send(SessionEvent::new(session, event)).unwrap();
    }
}

#[async_trait]
impl PlaybackAdapter for FakeOutput {
    async fn prepare(&self, _request: PlaybackRequest) -> BridgeResult<PreparedSession> {
        let id = PlaybackSessionId::new();
        self.sessions.lock().push(id);
        Ok(PreparedSession::new(id).with_duration(Duration::from_secs(120)))
    }

    async fn play(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }

    fn pause(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }

    fn stop(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }

    fn seek(&self, _session: PlaybackSessionId, _position: Duration) -> BridgeResult<()> {
        Ok(())
    }

    fn set_volume(&self, _session: PlaybackSessionId, _volume: f32) -> BridgeResult<()> {
        Ok(())
    }

    fn position(&self, _session: PlaybackSessionId) -> BridgeResult<Duration> {
        Ok(Duration::from_secs(10))
    }

    fn unload(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }

    fn media_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("flacstore-service-test-{}", uuid::Uuid::new_v4()))
}

fn config(http: MockHttpClient, store: Arc<MemoryBlobStore>) -> CoreConfig {
    CoreConfig::builder()
        .api_base_url(BASE)
        .cache_dir(temp_dir())
        .download_dir(temp_dir())
        .http_client(Arc::new(http))
        .blob_store(store)
        .build()
        .unwrap()
}

async fn service() -> (CoreService, Arc<FakeOutput>) {
    let output = Arc::new(FakeOutput::new());
    let core = CoreService::bootstrap(
        config(backend(), Arc::new(MemoryBlobStore::new())),
        output.clone(),
    )
    .await
    .unwrap();
    (core, output)
}

async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_health_check() {
    let (core, _) = service().await;
    assert!(core.check_health().await.is_ok());
}

#[tokio::test]
async fn test_configured_timeouts_reach_requests() {
    let seen: Arc<Mutex<Vec<(String, Option<Duration>)>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let mut http = MockHttpClient::new();
    http.expect_execute().returning(move |request| {
        recorded
            .lock()
            .push((request.url.trim_start_matches(BASE).to_string(), request.timeout));
        Ok(respond(&request))
    });

    let config = CoreConfig::builder()
        .api_base_url(BASE)
        .cache_dir(temp_dir())
        .download_dir(temp_dir())
        .request_timeout(Duration::from_secs(7))
        .stream_timeout(Duration::from_secs(45))
        .download_timeout(Duration::from_secs(90))
        .http_client(Arc::new(http))
        .blob_store(Arc::new(MemoryBlobStore::new()))
        .build()
        .unwrap();
    let core = CoreService::bootstrap(config, Arc::new(FakeOutput::new()))
        .await
        .unwrap();

    core.search("moonlight").await.unwrap();
    core.play(&TrackSummary::new("f1", "Moonlight Sonata"))
        .await
        .unwrap();
    let path = core.download(&TrackId::from("f1")).await.unwrap();

    let timeout_for = |prefix: &str| {
        seen.lock()
            .iter()
            .find(|(path, _)| path.starts_with(prefix))
            .and_then(|(_, timeout)| *timeout)
    };
    assert_eq!(timeout_for("/api/search"), Some(Duration::from_secs(7)));
    assert_eq!(timeout_for("/stream/f1"), Some(Duration::from_secs(45)));
    assert_eq!(timeout_for("/api/download/f1"), Some(Duration::from_secs(90)));

    tokio::fs::remove_file(&path).await.ok();
}

// ============================================================================
// Search and play
// ============================================================================

#[tokio::test]
async fn test_moonlight_search_and_replay() {
    let (core, _output) = service().await;

    let mut view = core.search_view();
    core.search_into(&mut view, "moonlight").await;
    let rows = view.rows().to_vec();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].download_url, "http://music.test/api/download/f1");

    let first = core.play(&rows[0].track).await.unwrap();
    assert_eq!(first.source, TrackSource::Network);

    let second = core.play(&rows[1].track).await.unwrap();
    assert_eq!(second.source, TrackSource::Network);

    let replay = core.play(&rows[0].track).await.unwrap();
    assert_eq!(replay.source, TrackSource::Cache);

    let snapshot = core.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Playing);
    assert_eq!(snapshot.track.unwrap().title, "Moonlight Sonata");
}

#[tokio::test]
async fn test_blank_query_sends_nothing() {
    let mut http = MockHttpClient::new();
    http.expect_execute().times(0);

    let core = CoreService::bootstrap(
        config(http, Arc::new(MemoryBlobStore::new())),
        Arc::new(FakeOutput::new()),
    )
    .await
    .unwrap();

    assert!(core.search("   ").await.unwrap().is_empty());

    let mut view = core.search_view();
    core.search_into(&mut view, "").await;
    assert_eq!(view.state(), &SearchState::Idle);
}

#[tokio::test]
async fn test_search_server_error_surfaces_message() {
    let mut http = MockHttpClient::new();
    http.expect_execute().returning(|_| {
        Ok(HttpResponse::new(
            500,
            r#"{"error": "Drive quota exceeded", "type": "HttpError"}"#,
        ))
    });
    let core = CoreService::bootstrap(
        config(http, Arc::new(MemoryBlobStore::new())),
        Arc::new(FakeOutput::new()),
    )
    .await
    .unwrap();

    let mut view = core.search_view();
    core.search_into(&mut view, "anything").await;
    assert_eq!(view.status_text(), Some("Drive quota exceeded"));
}

// ============================================================================
// Background wiring
// ============================================================================

#[tokio::test]
async fn test_media_events_reach_controller() {
    let (core, output) = service().await;
    let track = core.search("moonlight").await.unwrap().remove(0);
    core.play(&track).await.unwrap();

    output.emit(output.last_session(), MediaEvent::Ended);

    let controller = core.controller().clone();
    eventually(|| controller.status() == PlaybackStatus::Ended).await;
}

#[tokio::test]
async fn test_startup_evicts_stale_entries() {
    let store = Arc::new(MemoryBlobStore::new());
    let month_ago = chrono::Utc::now() - chrono::Duration::days(30);
    store
        .put(
            "tracks/stale",
            StoredBlob::new(Bytes::from_static(b"old"), month_ago),
        )
        .await
        .unwrap();
    store
        .put(
            "tracks/fresh",
            StoredBlob::new(Bytes::from_static(b"new"), chrono::Utc::now()),
        )
        .await
        .unwrap();

    let _core = CoreService::bootstrap(config(backend(), store.clone()), Arc::new(FakeOutput::new()))
        .await
        .unwrap();

    let watched = store.clone();
    eventually(move || watched.len() == 1).await;
    assert!(store.get("tracks/fresh").await.unwrap().is_some());
}

#[tokio::test]
async fn test_unavailable_storage_still_plays() {
    let output = Arc::new(FakeOutput::new());
    let core = CoreService::bootstrap(
        config(backend(), Arc::new(MemoryBlobStore::unavailable("read-only disk"))),
        output,
    )
    .await
    .unwrap();

    assert!(!core.cache().state().is_ready());
    let track = core.search("moonlight").await.unwrap().remove(0);
    let outcome = core.play(&track).await.unwrap();
    assert_eq!(outcome.source, TrackSource::Network);
    let again = core.play(&track).await.unwrap();
    assert_eq!(again.source, TrackSource::Network);
}

#[tokio::test]
async fn test_shutdown_returns_to_idle() {
    let (core, _output) = service().await;
    let track = core.search("moonlight").await.unwrap().remove(0);
    core.play(&track).await.unwrap();

    core.shutdown();
    assert_eq!(core.snapshot().status, PlaybackStatus::Idle);
}

// ============================================================================
// Keyboard
// ============================================================================

#[tokio::test]
async fn test_keyboard_shortcuts() {
    let (core, _output) = service().await;
    let track = core.search("moonlight").await.unwrap().remove(0);
    core.play(&track).await.unwrap();

    // Typing a space in the search box does nothing.
    assert!(!core
        .handle_key(KeyInput::in_text_input(Key::Space))
        .await
        .unwrap());
    assert_eq!(core.snapshot().status, PlaybackStatus::Playing);

    assert!(core.handle_key(KeyInput::new(Key::Space)).await.unwrap());
    assert_eq!(core.snapshot().status, PlaybackStatus::Paused);

    core.handle_key(KeyInput::new(Key::ArrowRight)).await.unwrap();
    assert_eq!(core.snapshot().position, Duration::from_secs(15));

    core.handle_key(KeyInput::new(Key::ArrowDown)).await.unwrap();
    assert_eq!(core.snapshot().volume, 0.9);

    core.handle_key(KeyInput::new(Key::Char('m'))).await.unwrap();
    assert!(core.snapshot().muted);
}

#[tokio::test]
async fn test_space_without_track_is_harmless() {
    let (core, _output) = service().await;
    assert!(core.handle_key(KeyInput::new(Key::Space)).await.unwrap());
    assert!(core.handle_key(KeyInput::new(Key::ArrowLeft)).await.unwrap());
    assert_eq!(core.snapshot().status, PlaybackStatus::Idle);
}

// ============================================================================
// Downloads
// ============================================================================

#[tokio::test]
async fn test_download_uses_server_file_name() {
    let (core, _output) = service().await;
    let mut events = core.events().subscribe();

    let path = core.download(&TrackId::from("f1")).await.unwrap();

    assert_eq!(path.file_name().unwrap(), "Moonlight Sonata.flac");
    assert_eq!(
        tokio::fs::read(&path).await.unwrap(),
        b"fLaC\0\0\0\x22one".to_vec()
    );

    let mut download_events = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Download(event) = event {
            download_events.push(event);
        }
    }
    assert_eq!(
        download_events,
        vec![
            DownloadEvent::Started {
                track_id: "f1".to_string()
            },
            DownloadEvent::Completed {
                track_id: "f1".to_string(),
                file_name: "Moonlight Sonata.flac".to_string(),
                bytes: 11,
            },
        ]
    );

    tokio::fs::remove_dir_all(&core.config().download_dir).await.ok();
}

#[tokio::test]
async fn test_download_falls_back_to_sniffed_extension() {
    let (core, _output) = service().await;
    let dir = temp_dir();

    let path = core
        .downloads()
        .download(&TrackId::from("f2"), &dir)
        .await
        .unwrap();
    assert_eq!(path, dir.join("f2.mp3"));

    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test]
async fn test_download_failure_is_reported() {
    let (core, _output) = service().await;
    let mut events = core.events().subscribe();

    let err = core.download(&TrackId::from("missing")).await.unwrap_err();
    assert!(matches!(err, CoreError::NetworkFailure(ref msg) if msg == "HTTP 400: File not found"));
    assert!(!core.config().download_dir.join("missing.bin").exists());

    let failed = std::iter::from_fn(|| events.try_recv().ok())
        .any(|event| matches!(event, CoreEvent::Download(DownloadEvent::Failed { .. })));
    assert!(failed);
}
