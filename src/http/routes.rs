use std::fmt;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;

use crate::analysis::{AnalysisCapability, AnalysisResult};
use crate::audio::SUPPORTED_EXTENSIONS;
use crate::config::ServerConfig;

/// Multipart field carrying the upload
pub const UPLOAD_FIELD: &str = "file";

/// Name prefix of staged upload files
pub const UPLOAD_PREFIX: &str = "beat-upload-";

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    capability: AnalysisCapability,
    max_upload_bytes: usize,
    service_name: Arc<str>,
    upload_dir: Option<Arc<Path>>,
}

impl AppState {
    pub fn new(capability: AnalysisCapability, config: &ServerConfig) -> Self {
        Self {
            capability,
            max_upload_bytes: config.max_upload_bytes,
            service_name: Arc::from(config.service_name.as_str()),
            upload_dir: config.upload_dir.as_deref().map(Arc::from),
        }
    }

    pub fn capability(&self) -> &AnalysisCapability {
        &self.capability
    }
}

/// HTTP error variants mapped to `{detail}` JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    BadRequest(String),
    Internal(String),
}

impl HttpServerError {
    fn too_large(max_upload_bytes: usize) -> Self {
        const MIB: usize = 1024 * 1024;
        let limit = if max_upload_bytes % MIB == 0 {
            format!("{}MB", max_upload_bytes / MIB)
        } else {
            format!("{} bytes", max_upload_bytes)
        };
        Self::BadRequest(format!("File too large (max {})", limit))
    }
}

impl fmt::Display for HttpServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "bad request: {}", msg),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for HttpServerError {}

impl From<MultipartError> for HttpServerError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Audio analysis failed: {}", msg),
            ),
        };

        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

/// Root endpoint response payload.
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub decoder_available: bool,
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub decoder_available: bool,
}

/// Build the Axum router with all handlers.
///
/// The default body limit is disabled; `analyze_audio` enforces the upload
/// cap itself while streaming.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/analyze-audio", post(analyze_audio))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// Run the HTTP server loop until Ctrl-C.
pub async fn run_http_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding HTTP listener on {}", addr))?;
    log::info!("[HTTP] Listening on http://{}", addr);
    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP router")?;
    log::info!("[HTTP] Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("[HTTP] Failed to install Ctrl-C handler: {}", err);
        std::future::pending::<()>().await;
    }
    log::info!("[HTTP] Shutdown requested");
}

pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "Beat Analysis API is running!",
        decoder_available: state.capability.is_available(),
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: state.service_name.to_string(),
        decoder_available: state.capability.is_available(),
    })
}

/// Accept one `audio/*` upload and return its tempo/key summary.
pub async fn analyze_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, HttpServerError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("audio/") {
            return Err(HttpServerError::BadRequest(
                "File must be an audio file".to_string(),
            ));
        }
        let file_name = field.file_name().unwrap_or_default().to_string();

        let content = read_capped(&mut field, state.max_upload_bytes).await?;
        log::info!(
            "[HTTP] Processing audio file: {}, size: {} bytes",
            file_name,
            content.len()
        );

        let capability = state.capability.clone();
        let upload_dir = state.upload_dir.clone();
        let span = tracing::info_span!("analyze_upload", file = %file_name, bytes = content.len());
        let result = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            analyze_upload(&capability, upload_dir.as_deref(), &file_name, &content)
        })
        .await
        .map_err(|err| HttpServerError::Internal(err.to_string()))?;

        return match result {
            Ok(analysis) => {
                log::info!(
                    "[HTTP] Analysis complete: {} BPM, {} ({:?})",
                    analysis.bpm,
                    analysis.key,
                    analysis.analysis_method
                );
                Ok(Json(analysis))
            }
            Err(err) => {
                log::error!("[HTTP] Error analyzing audio: {}", err);
                Err(err)
            }
        };
    }

    Err(HttpServerError::BadRequest("No file uploaded".to_string()))
}

/// Read a multipart field, failing once more than `max_bytes` arrive
async fn read_capped(field: &mut Field<'_>, max_bytes: usize) -> Result<Vec<u8>, HttpServerError> {
    let mut content = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if content.len() + chunk.len() > max_bytes {
            return Err(HttpServerError::too_large(max_bytes));
        }
        content.extend_from_slice(&chunk);
    }
    Ok(content)
}

/// Stage the upload in a temp file and analyse it
///
/// The temp file lives in `upload_dir` (system temp dir when `None`) and is
/// removed when it goes out of scope, on every path.
fn analyze_upload(
    capability: &AnalysisCapability,
    upload_dir: Option<&Path>,
    file_name: &str,
    content: &[u8],
) -> Result<AnalysisResult, HttpServerError> {
    let suffix = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();

    let mut builder = tempfile::Builder::new();
    builder.prefix(UPLOAD_PREFIX).suffix(&suffix);
    let mut staged = match upload_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|err| HttpServerError::Internal(err.to_string()))?;
    staged
        .write_all(content)
        .and_then(|_| staged.flush())
        .map_err(|err| HttpServerError::Internal(err.to_string()))?;

    capability
        .analyze_file(staged.path(), content.len() as u64)
        .map_err(|err| HttpServerError::Internal(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::http::{multipart_content_type, multipart_upload};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn make_router(capability: AnalysisCapability, max_upload_bytes: usize) -> Router {
        let config = ServerConfig {
            max_upload_bytes,
            ..ServerConfig::default()
        };
        build_router(AppState::new(capability, &config))
    }

    async fn response_json(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body bytes");
        let json = serde_json::from_slice::<Value>(&bytes).expect("JSON body");
        (status, json)
    }

    fn upload_request(field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/analyze-audio")
            .header("content-type", multipart_content_type())
            .body(Body::from(multipart_upload(field, "clip.mp3", content_type, data)))
            .expect("upload request")
    }

    #[tokio::test]
    async fn root_reports_capability() {
        let router = make_router(AnalysisCapability::unavailable(), 1024);
        let (status, json) = response_json(
            router
                .oneshot(Request::builder().uri("/").body(Body::empty()).expect("root request"))
                .await
                .expect("root call"),
        )
        .await;

        println!("[HTTP Smoke] / => {json}");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Beat Analysis API is running!");
        assert_eq!(json["decoder_available"], false);
    }

    #[tokio::test]
    async fn health_reports_service() {
        let router = make_router(AnalysisCapability::available(), 1024);
        let (status, json) = response_json(
            router
                .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("health request"))
                .await
                .expect("health call"),
        )
        .await;

        println!("[HTTP Smoke] /health => {json}");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "beat-analysis-api");
        assert_eq!(json["decoder_available"], true);
    }

    #[tokio::test]
    async fn rejects_non_audio_content_type() {
        let router = make_router(AnalysisCapability::unavailable(), 1024);
        let (status, json) = response_json(
            router
                .oneshot(upload_request("file", "text/plain", b"hello"))
                .await
                .expect("upload call"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["detail"], "File must be an audio file");
    }

    #[tokio::test]
    async fn rejects_missing_file_part() {
        let router = make_router(AnalysisCapability::unavailable(), 1024);
        let (status, json) = response_json(
            router
                .oneshot(upload_request("attachment", "audio/mpeg", b"abc"))
                .await
                .expect("upload call"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["detail"], "No file uploaded");
    }

    #[tokio::test]
    async fn upload_cap_is_inclusive() {
        let at_limit = make_router(AnalysisCapability::unavailable(), 1000);
        let (status, _) = response_json(
            at_limit
                .oneshot(upload_request("file", "audio/mpeg", &vec![7u8; 1000]))
                .await
                .expect("upload call"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let over_limit = make_router(AnalysisCapability::unavailable(), 1000);
        let (status, json) = response_json(
            over_limit
                .oneshot(upload_request("file", "audio/mpeg", &vec![7u8; 1001]))
                .await
                .expect("upload call"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["detail"].as_str().unwrap_or("").starts_with("File too large"));
    }

    #[tokio::test]
    async fn undecodable_upload_is_internal_error() {
        let router = make_router(AnalysisCapability::available(), 1024 * 1024);
        let (status, json) = response_json(
            router
                .oneshot(upload_request("file", "audio/mpeg", b"this is not an mp3 stream"))
                .await
                .expect("upload call"),
        )
        .await;

        println!("[HTTP Smoke] garbage upload => {json}");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["detail"]
            .as_str()
            .unwrap_or("")
            .starts_with("Audio analysis failed: "));
    }

    /// Decoder that records the staged path it was handed, then fails
    struct RecordingDecoder {
        seen: std::sync::Mutex<Vec<std::path::PathBuf>>,
    }

    impl crate::audio::AudioDecoder for RecordingDecoder {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn decode(
            &self,
            path: &Path,
            _options: &crate::audio::LoadOptions,
        ) -> Result<crate::audio::Waveform, crate::error::AudioError> {
            assert!(path.exists(), "staged upload missing during decode");
            self.seen.lock().unwrap().push(path.to_path_buf());
            Err(crate::error::AudioError::DecodeFailed {
                reason: "rejected by test decoder".to_string(),
            })
        }
    }

    fn staged_uploads(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .expect("read upload dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(UPLOAD_PREFIX))
            .collect()
    }

    fn router_with_upload_dir(capability: AnalysisCapability, dir: &Path) -> Router {
        let config = ServerConfig {
            max_upload_bytes: 1024 * 1024,
            upload_dir: Some(dir.to_path_buf()),
            ..ServerConfig::default()
        };
        build_router(AppState::new(capability, &config))
    }

    #[tokio::test]
    async fn staged_upload_is_removed_after_success() {
        let dir = tempfile::tempdir().expect("upload dir");
        let router = router_with_upload_dir(AnalysisCapability::unavailable(), dir.path());
        let (status, _) = response_json(
            router
                .oneshot(upload_request("file", "audio/mpeg", &vec![1u8; 4096]))
                .await
                .expect("upload call"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(staged_uploads(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn staged_upload_is_removed_after_decode_failure() {
        let dir = tempfile::tempdir().expect("upload dir");
        let decoder = Arc::new(RecordingDecoder {
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let router = router_with_upload_dir(AnalysisCapability::with_decoder(decoder.clone()), dir.path());
        let (status, json) = response_json(
            router
                .oneshot(upload_request("file", "audio/mpeg", b"not really audio"))
                .await
                .expect("upload call"),
        )
        .await;

        println!("[HTTP Smoke] failed upload => {json}");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let seen = decoder.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].parent(), Some(dir.path()));
        assert!(seen[0].to_string_lossy().ends_with(".mp3"));
        assert!(!seen[0].exists());
        assert!(staged_uploads(dir.path()).is_empty());
    }

    #[test]
    fn display_includes_message() {
        let err = HttpServerError::Internal("decoder exploded".to_string());
        assert_eq!(err.to_string(), "internal error: decoder exploded");
        let err = HttpServerError::BadRequest("No file uploaded".to_string());
        assert_eq!(format!("{}", err), "bad request: No file uploaded");
    }

    #[test]
    fn too_large_message_uses_megabytes() {
        match HttpServerError::too_large(crate::config::MAX_UPLOAD_BYTES) {
            HttpServerError::BadRequest(msg) => assert_eq!(msg, "File too large (max 50MB)"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
