//! # Integration Tests for pkgup-api
//!
//! Drives the full router against a temporary repository directory. The
//! index tool is an in-process stand-in that appends each artifact's file
//! name to the index, so the index contents show exactly which uploads were
//! accepted and in what order.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use bytes::Bytes;
use http_body::Frame;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use tempfile::TempDir;
use tower::ServiceExt;

use pkgup_api::AppState;
use pkgup_index::{IndexTool, Invocation, RepoSynchronizer, ToolOutput};

const INDEX: &str = "test.db";

/// Index tool stand-in. Artifacts whose file name contains `reject` fail
/// with exit status 1 and leave the index untouched.
#[derive(Debug, Clone, Default)]
struct FakeRepoAdd {
    reject: Option<&'static str>,
    artifacts: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl IndexTool for FakeRepoAdd {
    fn invoke(&self, invocation: &Invocation) -> std::io::Result<ToolOutput> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(30));
        let result = self.apply(invocation);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl FakeRepoAdd {
    fn apply(&self, invocation: &Invocation) -> std::io::Result<ToolOutput> {
        let mut index = std::fs::read_to_string(&invocation.index_path).unwrap_or_default();
        if let Some(artifact) = &invocation.artifact_path {
            let name = artifact.file_name().unwrap().to_string_lossy().into_owned();
            self.artifacts.lock().push(name.clone());
            if self.reject.is_some_and(|r| name.contains(r)) {
                return Ok(ToolOutput {
                    code: Some(1),
                    output: format!("==> ERROR: '{name}' is not a package file, skipping"),
                });
            }
            // The artifact must be complete on disk by the time the tool runs.
            assert!(artifact.is_file());
            index.push_str(&name);
            index.push('\n');
        }
        let tmp = invocation.index_path.with_extension("tmp");
        std::fs::write(&tmp, index)?;
        std::fs::rename(&tmp, &invocation.index_path)?;
        Ok(ToolOutput {
            code: Some(0),
            output: "==> Finished".into(),
        })
    }

    fn artifacts(&self) -> Vec<String> {
        self.artifacts.lock().clone()
    }
}

struct TestRepo {
    _dir: TempDir,
    dir: PathBuf,
    tool: FakeRepoAdd,
    state: AppState,
}

impl TestRepo {
    fn new(reject: Option<&'static str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        let tool = FakeRepoAdd {
            reject,
            ..FakeRepoAdd::default()
        };
        let sync = RepoSynchronizer::open(repo.join(INDEX), tool.clone()).unwrap();
        Self {
            _dir: dir,
            dir: repo,
            tool,
            state: AppState::new(sync),
        }
    }

    fn app(&self) -> axum::Router {
        pkgup_api::app(self.state.clone())
    }

    fn index(&self) -> String {
        std::fs::read_to_string(self.dir.join(INDEX)).unwrap()
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

/// Helper: build a request.
fn request(method: &str, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .unwrap()
}

/// Helper: read response body as bytes.
async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

/// Helper: read response body as string.
async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}

/// 1024 bytes of random payload.
fn random_payload() -> Vec<u8> {
    (0..64)
        .flat_map(|_| *uuid::Uuid::new_v4().as_bytes())
        .collect()
}

fn assert_absent(path: &Path) {
    assert!(!path.exists(), "{} should not exist", path.display());
}

/// A request body that delivers some data, then fails like a dropped
/// connection.
struct FailingBody {
    sent: bool,
}

impl http_body::Body for FailingBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, std::io::Error>>> {
        if self.sent {
            Poll::Ready(Some(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "client went away",
            ))))
        } else {
            self.sent = true;
            Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(b"partial")))))
        }
    }
}

// -- Liveness ---------------------------------------------------------------

#[tokio::test]
async fn test_ping() {
    let repo = TestRepo::new(None);
    let response = repo
        .app()
        .oneshot(request("GET", "/ping", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "pong\n");
}

#[tokio::test]
async fn test_ping_does_not_touch_the_repository() {
    let repo = TestRepo::new(None);
    std::fs::remove_file(repo.file(INDEX)).unwrap();

    let response = repo
        .app()
        .oneshot(request("GET", "/ping", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "pong\n");
}

#[tokio::test]
async fn test_ping_other_methods_not_found() {
    let repo = TestRepo::new(None);
    for method in ["POST", "DELETE"] {
        let response = repo
            .app()
            .oneshot(request(method, "/ping", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} /ping");
        assert_eq!(body_string(response).await, "Not Found\n");
    }
}

// -- Upload lifecycle -------------------------------------------------------

#[tokio::test]
async fn test_head_put_head_put() {
    let repo = TestRepo::new(None);
    let app = repo.app();
    let uri = "/foo-1.0-1-any.pkg.tar.zst";

    let response = app
        .clone()
        .oneshot(request("HEAD", uri, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(request("PUT", uri, "package bytes"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok\n");

    let response = app
        .clone()
        .oneshot(request("HEAD", uri, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_LENGTH).unwrap(),
        "13"
    );
    assert!(body_bytes(response).await.is_empty());

    let response = app
        .oneshot(request("PUT", uri, "other bytes"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_string(response).await, "package already exists\n");

    assert_eq!(repo.index(), "foo-1.0-1-any.pkg.tar.zst\n");
}

#[tokio::test]
async fn test_upload_round_trips_exact_bytes() {
    let repo = TestRepo::new(None);
    let payload = random_payload();
    assert_eq!(payload.len(), 1024);

    let response = repo
        .app()
        .oneshot(request("PUT", "/random.pkg", payload.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = repo
        .app()
        .oneshot(request("GET", "/random.pkg", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.as_ref(), payload.as_slice());
    assert_eq!(std::fs::read(repo.file("random.pkg")).unwrap(), payload);
}

#[tokio::test]
async fn test_conflict_preserves_original() {
    let repo = TestRepo::new(None);
    let app = repo.app();

    let response = app
        .clone()
        .oneshot(request("PUT", "/foo.pkg", "first"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request("PUT", "/foo.pkg", "second upload"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .oneshot(request("GET", "/foo.pkg", Body::empty()))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "first");
    // The tool never saw the rejected upload.
    assert_eq!(repo.tool.artifacts(), vec!["foo.pkg".to_string()]);
}

#[tokio::test]
async fn test_tool_failure_rolls_back() {
    let repo = TestRepo::new(Some("broken"));
    let app = repo.app();

    let response = app
        .clone()
        .oneshot(request("PUT", "/good.pkg", "good"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let index_before = std::fs::read(repo.file(INDEX)).unwrap();

    let response = app
        .clone()
        .oneshot(request("PUT", "/broken.pkg", "not a package"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "Internal Server Error\n");

    assert_absent(&repo.file("broken.pkg"));
    assert_eq!(std::fs::read(repo.file(INDEX)).unwrap(), index_before);

    let response = app
        .clone()
        .oneshot(request("GET", "/broken.pkg", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The name is free again after a rollback.
    let response = app
        .oneshot(request("PUT", "/broken.pkg", "still broken"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_interrupted_upload_leaves_nothing() {
    let repo = TestRepo::new(None);

    let body = Body::new(FailingBody { sent: false });
    let response = repo
        .app()
        .oneshot(request("PUT", "/partial.pkg", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert_absent(&repo.file("partial.pkg"));
    assert!(repo.tool.artifacts().is_empty());
    assert_eq!(repo.index(), "");
}

#[tokio::test]
async fn test_concurrent_uploads_are_serialized() {
    let repo = TestRepo::new(None);
    let app = repo.app();

    let (a, b) = tokio::join!(
        app.clone().oneshot(request("PUT", "/a.pkg", "aaaa")),
        app.clone().oneshot(request("PUT", "/b.pkg", "bbbb")),
    );
    assert_eq!(a.unwrap().status(), StatusCode::OK);
    assert_eq!(b.unwrap().status(), StatusCode::OK);

    let index = repo.index();
    let mut lines: Vec<&str> = index.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["a.pkg", "b.pkg"]);
    assert_eq!(repo.tool.max_in_flight.load(Ordering::SeqCst), 1);
}

// -- Names ------------------------------------------------------------------

#[tokio::test]
async fn test_name_too_long() {
    let repo = TestRepo::new(None);
    let uri = format!("/{}", "a".repeat(81));

    let response = repo
        .app()
        .oneshot(request("PUT", &uri, "x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "package name too long\n");

    let response = repo
        .app()
        .oneshot(request("GET", &uri, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(repo.tool.artifacts().is_empty());
}

#[tokio::test]
async fn test_name_at_limit_accepted() {
    let repo = TestRepo::new(None);
    let name = "a".repeat(80);

    let response = repo
        .app()
        .oneshot(request("PUT", &format!("/{name}"), "x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(repo.file(&name).is_file());
}

#[tokio::test]
async fn test_dot_dot_rejected() {
    let repo = TestRepo::new(None);

    let response = repo
        .app()
        .oneshot(request("PUT", "/repo/..", "escape"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "invalid package name\n");

    let response = repo
        .app()
        .oneshot(request("GET", "/repo/..", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(repo.tool.artifacts().is_empty());
}

#[tokio::test]
async fn test_nested_path_stores_final_segment() {
    let repo = TestRepo::new(None);

    let response = repo
        .app()
        .oneshot(request("PUT", "/x86_64/os/foo-1.0-1.pkg", "nested"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(repo.file("foo-1.0-1.pkg").is_file());
    assert_absent(&repo.dir.join("x86_64"));

    let response = repo
        .app()
        .oneshot(request("GET", "/anything/foo-1.0-1.pkg", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "nested");
}

// -- Static serving ---------------------------------------------------------

#[tokio::test]
async fn test_index_is_served() {
    let repo = TestRepo::new(None);
    repo.app()
        .oneshot(request("PUT", "/foo.pkg", "foo"))
        .await
        .unwrap();

    let response = repo
        .app()
        .oneshot(request("GET", &format!("/{INDEX}"), Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "foo.pkg\n");
}

#[tokio::test]
async fn test_range_request() {
    let repo = TestRepo::new(None);
    repo.app()
        .oneshot(request("PUT", "/range.pkg", "0123456789"))
        .await
        .unwrap();

    let response = repo
        .app()
        .oneshot(
            Request::builder()
                .uri("/range.pkg")
                .header(header::RANGE, "bytes=2-5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_string(response).await, "2345");
}

#[tokio::test]
async fn test_upload_in_progress_not_served() {
    let repo = TestRepo::new(None);
    let name = pkgup_core::ArtifactName::from_request_path("/slow.pkg").unwrap();
    let mut pending = repo.state.store.create(name).await.unwrap();
    pending
        .write_all(http_body_util::Full::new(Bytes::from_static(b"half")))
        .await
        .unwrap();

    for method in ["GET", "HEAD"] {
        let response = repo
            .app()
            .oneshot(request(method, "/slow.pkg", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method}");
    }

    let response = repo
        .app()
        .oneshot(request("PUT", "/slow.pkg", "competing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    drop(pending);
    assert_absent(&repo.file("slow.pkg"));
}

#[tokio::test]
async fn test_missing_artifact_not_found() {
    let repo = TestRepo::new(None);
    let response = repo
        .app()
        .oneshot(request("GET", "/missing.pkg", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_root_not_found() {
    let repo = TestRepo::new(None);
    let response = repo
        .app()
        .oneshot(request("GET", "/", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "Not Found\n");
}

#[tokio::test]
async fn test_unsupported_method_not_found() {
    let repo = TestRepo::new(None);
    for method in ["POST", "DELETE", "PATCH"] {
        let response = repo
            .app()
            .oneshot(request(method, "/foo.pkg", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method}");
        assert_eq!(body_string(response).await, "Not Found\n");
    }
}

// -- Metrics ----------------------------------------------------------------

#[tokio::test]
async fn test_metrics_endpoint() {
    let repo = TestRepo::new(Some("broken"));
    let metrics = repo.state.metrics.clone();

    repo.app()
        .oneshot(request("PUT", "/good.pkg", "good"))
        .await
        .unwrap();
    repo.app()
        .oneshot(request("PUT", "/broken.pkg", "bad"))
        .await
        .unwrap();

    let response = pkgup_api::metrics_app(metrics)
        .oneshot(request("GET", "/metrics", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("pkgup_http_requests_total"));
    assert!(body.contains("path=\"/{*path}\""));
    assert!(body.contains("pkgup_index_updates_total{outcome=\"incorporated\"} 1"));
    assert!(body.contains("pkgup_index_updates_total{outcome=\"rolled_back\"} 1"));
}

#[tokio::test]
async fn test_metrics_not_on_repository_router() {
    let repo = TestRepo::new(None);
    let response = repo
        .app()
        .oneshot(request("GET", "/metrics", Body::empty()))
        .await
        .unwrap();
    // `/metrics` is just an artifact name here.
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_bytes(response).await.is_empty());
}
