//! Pipeline flow tests against a local mock server
//!
//! These pin the externally observable contract: the poll loop's exact
//! request budget, cancellation promptness, progress clamping, and the
//! upload's delete-on-success / retain-on-failure file handling.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use duocap_core::{CameraFacing, DeviceId, FinishedRecording, MediaStore, PollPolicy, TransferPolicy};
use duocap_pipeline::{ReconstructionClient, ReconstructionEvent, ReconstructionOutcome, UploadClient};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct ServerCounters {
    status_checks: AtomicU32,
    downloads: AtomicU32,
    generations: AtomicU32,
}

/// Mock processing server: `completed_after` controls how many status
/// checks answer `processing` before `completed`; `None` never completes.
fn mock_server(counters: Arc<ServerCounters>, completed_after: Option<u32>) -> Router {
    #[derive(Clone)]
    struct AppState {
        counters: Arc<ServerCounters>,
        completed_after: Option<u32>,
    }

    async fn generate(State(state): State<AppState>) -> StatusCode {
        state.counters.generations.fetch_add(1, Ordering::SeqCst);
        StatusCode::OK
    }

    async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
        let n = state.counters.status_checks.fetch_add(1, Ordering::SeqCst) + 1;
        match state.completed_after {
            Some(limit) if n > limit => {
                Json(serde_json::json!({"status": "completed", "progress": 100}))
            }
            _ => Json(serde_json::json!({"status": "processing", "progress": 99})),
        }
    }

    async fn download(State(state): State<AppState>) -> Vec<u8> {
        state.counters.downloads.fetch_add(1, Ordering::SeqCst);
        b"glTF-binary-payload".to_vec()
    }

    Router::new()
        .route("/generate_map", post(generate))
        .route("/map_status", get(status))
        .route("/download_map", get(download))
        .with_state(AppState {
            counters,
            completed_after,
        })
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn test_store(name: &str) -> MediaStore {
    let root = std::env::temp_dir().join(format!("duocap-pipeline-{}-{}", name, std::process::id()));
    MediaStore::new(root)
}

fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(1),
        ..PollPolicy::default()
    }
}

fn reconstruction(base_url: &str, name: &str, policy: PollPolicy) -> ReconstructionClient {
    ReconstructionClient::new(base_url, test_store(name), policy, TransferPolicy::default())
        .unwrap()
}

// ============================================================================
// POLL BUDGET
// ============================================================================

#[tokio::test]
async fn test_completes_after_exactly_120_status_checks() {
    let counters = Arc::new(ServerCounters::default());
    // 119 processing answers, the 120th check sees completed
    let base = serve(mock_server(Arc::clone(&counters), Some(119))).await;
    let client = reconstruction(&base, "exact-budget", fast_policy());

    let outcome = client
        .run(DeviceId::Left, 1723000000000, &CancellationToken::new())
        .await
        .unwrap();

    let artifact = match outcome {
        ReconstructionOutcome::Completed { artifact } => artifact,
        other => panic!("expected completion, got {:?}", other),
    };
    assert_eq!(counters.status_checks.load(Ordering::SeqCst), 120);
    assert_eq!(counters.downloads.load(Ordering::SeqCst), 1);
    assert!(artifact.ends_with("map_LEFT_1723000000000.glb"));
    assert_eq!(std::fs::read(&artifact).unwrap(), b"glTF-binary-payload");
}

#[tokio::test]
async fn test_times_out_after_exactly_120_attempts() {
    let counters = Arc::new(ServerCounters::default());
    let base = serve(mock_server(Arc::clone(&counters), None)).await;
    let client = reconstruction(&base, "timeout", fast_policy());

    let outcome = client
        .run(DeviceId::Right, 42, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, ReconstructionOutcome::TimedOut { attempts: 120 });
    assert_eq!(counters.status_checks.load(Ordering::SeqCst), 120);
    assert_eq!(counters.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_status_checks_count_against_the_budget() {
    // Status endpoint answers 500 every time; each failed check still
    // consumes one attempt and the loop keeps going to its ceiling.
    let counters = Arc::new(ServerCounters::default());
    let app = Router::new()
        .route("/generate_map", post(|| async { StatusCode::OK }))
        .route("/map_status", {
            let counters = Arc::clone(&counters);
            get(move || {
                let counters = Arc::clone(&counters);
                async move {
                    counters.status_checks.fetch_add(1, Ordering::SeqCst);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            })
        });
    let base = serve(app).await;
    let policy = PollPolicy {
        interval: Duration::from_millis(1),
        max_attempts: 5,
        ..PollPolicy::default()
    };
    let client = reconstruction(&base, "status-errors", policy);

    let outcome = client
        .run(DeviceId::Left, 42, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, ReconstructionOutcome::TimedOut { attempts: 5 });
    assert_eq!(counters.status_checks.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_request_transport_error_aborts_flow() {
    // Reserve a port, then close the listener so the connection is refused
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = reconstruction(&base, "refused", fast_policy());
    let err = client
        .run(DeviceId::Left, 42, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "TRANSPORT_ERROR");
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[tokio::test]
async fn test_cancel_stops_polling_promptly() {
    let counters = Arc::new(ServerCounters::default());
    let base = serve(mock_server(Arc::clone(&counters), None)).await;
    let policy = PollPolicy {
        interval: Duration::from_millis(10),
        ..PollPolicy::default()
    };
    let client = reconstruction(&base, "cancel", policy);

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(35)).await;
        canceller.cancel();
    });

    let outcome = client.run(DeviceId::Left, 42, &cancel).await.unwrap();
    assert_eq!(outcome, ReconstructionOutcome::Cancelled);

    // No further status checks after the loop observed the flag
    let settled = counters.status_checks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(counters.status_checks.load(Ordering::SeqCst), settled);
    assert_eq!(counters.downloads.load(Ordering::SeqCst), 0);
}

// ============================================================================
// TERMINAL STATES AND PROGRESS
// ============================================================================

#[tokio::test]
async fn test_server_reported_failure_ends_the_flow() {
    async fn failing_status() -> Json<serde_json::Value> {
        Json(serde_json::json!({"status": "failed", "progress": 30}))
    }
    let app = Router::new()
        .route("/generate_map", post(|| async { StatusCode::OK }))
        .route("/map_status", get(failing_status));
    let base = serve(app).await;
    let client = reconstruction(&base, "failed", fast_policy());

    let outcome = client
        .run(DeviceId::Left, 42, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReconstructionOutcome::Failed {
            status: "failed".to_string()
        }
    );
}

#[tokio::test]
async fn test_rejected_generation_request_fails_without_polling() {
    let counters = Arc::new(ServerCounters::default());
    let app = Router::new()
        .route(
            "/generate_map",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
        .route("/map_status", {
            let counters = Arc::clone(&counters);
            get(move || {
                let counters = Arc::clone(&counters);
                async move {
                    counters.status_checks.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({"status": "processing"}))
                }
            })
        });
    let base = serve(app).await;
    let client = reconstruction(&base, "rejected", fast_policy());

    let outcome = client
        .run(DeviceId::Left, 42, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReconstructionOutcome::Failed {
            status: "rejected".to_string()
        }
    );
    assert_eq!(counters.status_checks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_progress_clamped_while_polling() {
    let counters = Arc::new(ServerCounters::default());
    // Server claims 99% while processing; three checks, then completed
    let base = serve(mock_server(Arc::clone(&counters), Some(3))).await;
    let client = reconstruction(&base, "clamp", fast_policy());
    let mut events = client.events();

    let outcome = client
        .run(DeviceId::Left, 42, &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, ReconstructionOutcome::Completed { .. }));

    let mut saw_polling_progress = false;
    while let Ok(ReconstructionEvent::Progress { percent, message }) = events.try_recv() {
        if message.contains("generating map (processing)") {
            saw_polling_progress = true;
            assert!(percent <= 85, "polling progress {} above cap", percent);
        }
    }
    assert!(saw_polling_progress);
}

// ============================================================================
// UPLOAD
// ============================================================================

fn finished_recording(name: &str) -> FinishedRecording {
    let store = test_store(name);
    store.ensure_root().unwrap();
    let path = store.root().join("video_LEFT_20260314_150926.mp4");
    std::fs::write(&path, b"not really mp4 but big enough").unwrap();
    FinishedRecording {
        path,
        device: DeviceId::Left,
        started_at_ms: 1723000000000,
        facing: CameraFacing::Back,
    }
}

#[tokio::test]
async fn test_accepted_upload_deletes_source_file() {
    let app = Router::new().route(
        "/upload_video",
        post(|_: axum::body::Bytes| async { StatusCode::OK }),
    );
    let base = serve(app).await;
    let client = UploadClient::new(base, TransferPolicy::default()).unwrap();

    let recording = finished_recording("upload-ok");
    client.upload(&recording).await.unwrap();
    assert!(!recording.path.exists());
}

#[tokio::test]
async fn test_rejected_upload_retains_source_file() {
    let app = Router::new().route(
        "/upload_video",
        post(|_: axum::body::Bytes| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = serve(app).await;
    let client = UploadClient::new(base, TransferPolicy::default()).unwrap();

    let recording = finished_recording("upload-rejected");
    let err = client.upload(&recording).await.unwrap_err();
    assert_eq!(err.error_code(), "SERVER_REJECTED");
    assert!(recording.path.exists());
}

#[tokio::test]
async fn test_upload_of_missing_file_errors() {
    let app = Router::new().route("/upload_video", post(|| async { StatusCode::OK }));
    let base = serve(app).await;
    let client = UploadClient::new(base, TransferPolicy::default()).unwrap();

    let mut recording = finished_recording("upload-missing");
    std::fs::remove_file(&recording.path).unwrap();
    recording.path = recording.path.with_file_name("gone.mp4");

    let err = client.upload(&recording).await.unwrap_err();
    assert_eq!(err.error_code(), "FILE_MISSING");
}
