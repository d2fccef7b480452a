//! HTTP surface of the proxy service.
//!
//! ```text
//! POST /api/ocr     multipart image=<file>
//!   200 { text, confidence, success: true }    text found
//!   200 { text: "" }                           nothing detected
//!   400 { error }                              no image part
//!   500 { error, details }                     detection failed
//! GET  /api/health  200 { status: "ok" }
//! ```

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::server::detector::{GoogleVisionDetector, TextDetector};

/// "An image file is required."
pub const IMAGE_REQUIRED: &str = "이미지 파일이 필요합니다.";

/// "An error occurred while processing the image."
pub const PROCESSING_FAILED: &str = "이미지 처리 중 오류가 발생했습니다.";

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
struct ProxyState {
    detector: Arc<dyn TextDetector>,
}

/// Build the proxy router around `detector`.
pub fn router(detector: Arc<dyn TextDetector>) -> Router {
    Router::new()
        .route("/api/ocr", post(ocr))
        .route("/api/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(ProxyState { detector })
}

/// Port precedence: command line, then `$PORT`, then configuration.
pub fn resolve_port(config: &ServerConfig, cli: Option<u16>, env: Option<&str>) -> u16 {
    cli.or_else(|| env.and_then(|p| p.trim().parse().ok()))
        .unwrap_or(config.port)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &ServerConfig, port: u16) -> anyhow::Result<()> {
    let detector = Arc::new(GoogleVisionDetector::from_config(config));
    let addr = format!("{}:{}", config.host, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!("server: listening on http://{addr}");

    axum::serve(listener, router(detector))
        .await
        .context("proxy server stopped")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn ocr(
    State(state): State<ProxyState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let image = match multipart {
        Ok(mut multipart) => match read_image_part(&mut multipart).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return image_required(),
            Err(e) => {
                log::warn!("server: malformed multipart body: {e}");
                return image_required();
            }
        },
        Err(e) => {
            log::warn!("server: not a multipart request: {e}");
            return image_required();
        }
    };

    match state.detector.detect(&image).await {
        Ok(Some(detection)) => {
            log::info!(
                "server: detected {} chars",
                detection.text.chars().count()
            );
            Json(json!({
                "text": detection.text,
                "confidence": detection.confidence,
                "success": true
            }))
            .into_response()
        }
        Ok(None) => {
            log::info!("server: no text detected");
            Json(json!({ "text": "" })).into_response()
        }
        Err(e) => {
            log::error!("server: text detection failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": PROCESSING_FAILED, "details": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn read_image_part(multipart: &mut Multipart) -> Result<Option<Bytes>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("image") {
            return Ok(Some(field.bytes().await?));
        }
    }
    Ok(None)
}

fn image_required() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": IMAGE_REQUIRED })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
