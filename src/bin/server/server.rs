//! HTTP server for OCR and structure analysis.

use crate::config::ServerConfig;
use crate::request::{ApiError, DrawResponse, UploadForm};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
};
use image::RgbImage;
use oar_structure::core::{
    ModelLoader, ModelRegistry, ModelStatus, OCRError, OcrResult, ProcessingStage, RenderSettings,
};
use oar_structure::oarocr::draw::draw_document_json;
use oar_structure::oarocr::{
    DocumentRun, OcrModelLoader, PageOrchestrator, SourceKind, StructureModelLoader, analyze_document,
    document_markdown, draw_ocr_document, draw_structure_document, ocr_document, ocr_json,
    ocr_text, structure_json, with_page_source,
};
use oar_structure::utils::encode_png;
use serde::Serialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
struct AppState {
    ocr: ModelRegistry<OcrModelLoader>,
    structure: ModelRegistry<StructureModelLoader>,
    render: RenderSettings,
}

type SharedState = Arc<AppState>;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Run the HTTP server
pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let manifest = config.models.manifest();
    let ort_config = config.models.ort_config()?;
    info!(
        models_dir = %manifest.models_dir.display(),
        layout = manifest.layout_variant.dir_name(),
        auto_load = config.auto_load,
        "configuring model groups"
    );

    let state = Arc::new(AppState {
        ocr: ModelRegistry::new(
            OcrModelLoader::new(manifest.clone(), ort_config.clone()),
            config.auto_load,
        ),
        structure: ModelRegistry::new(
            StructureModelLoader::new(manifest, ort_config),
            config.auto_load,
        ),
        render: config.models.render_settings(),
    });

    if config.preload {
        let preload = state.clone();
        tokio::task::spawn_blocking(move || -> OcrResult<()> {
            preload.ocr.load()?;
            preload.structure.load()?;
            Ok(())
        })
        .await??;
    }

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/ocr", post(ocr_handler))
        .route("/ocr/draw", post(ocr_draw_handler))
        .route("/ocr/text", post(ocr_text_handler))
        .route("/ocr/load", post(ocr_load_handler))
        .route("/ocr/unload", post(ocr_unload_handler))
        .route("/ocr/model_status", get(ocr_status_handler))
        .route("/structure", post(structure_handler))
        .route("/structure/draw", post(structure_draw_handler))
        .route("/structure/markdown", post(structure_markdown_handler))
        .route("/structure/load", post(structure_load_handler))
        .route("/structure/unload", post(structure_unload_handler))
        .route("/structure/model_status", get(structure_status_handler))
        .layer(DefaultBodyLimit::max(config.max_upload_mb * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    info!("Server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Runs pipeline work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> OcrResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("worker failed: {e}")))?
        .map_err(ApiError::from)
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn ocr_handler(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let form = UploadForm::read(multipart).await?;
    let params = form.ocr_params()?;
    info!(request_id = %request_id, bytes = form.file.len(), "Processing OCR request");

    let start = Instant::now();
    let value = blocking(move || {
        let engine = state.ocr.acquire()?;
        with_page_source(&form.file, &state.render, |source| {
            let run = ocr_document(&engine, source, PageOrchestrator::unlimited(), &params)?;
            Ok(ocr_json(&run))
        })
    })
    .await?;

    info!(request_id = %request_id, total_ms = start.elapsed().as_secs_f64() * 1000.0, "OCR completed");
    Ok(Json(value))
}

async fn ocr_text_handler(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let form = UploadForm::read(multipart).await?;
    let params = form.ocr_params()?;
    info!(request_id = %request_id, bytes = form.file.len(), "Processing OCR text request");

    let text = blocking(move || {
        let engine = state.ocr.acquire()?;
        with_page_source(&form.file, &state.render, |source| {
            let run = ocr_document(&engine, source, PageOrchestrator::unlimited(), &params)?;
            Ok(ocr_text(&run))
        })
    })
    .await?;
    Ok(Json(json!({ "text": text })))
}

async fn ocr_draw_handler(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<DrawResponse, ApiError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let form = UploadForm::read(multipart).await?;
    let params = form.ocr_params()?;
    let orchestrator = PageOrchestrator::with_max_pages(form.max_pages()?);
    let drop_score = form.drop_score()?;
    info!(request_id = %request_id, bytes = form.file.len(), "Processing OCR draw request");

    blocking(move || {
        let engine = state.ocr.acquire()?;
        with_page_source(&form.file, &state.render, |source| {
            let run = draw_ocr_document(&engine, source, orchestrator, &params, drop_score)?;
            draw_response(source.kind(), &run)
        })
    })
    .await
}

async fn structure_handler(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let form = UploadForm::read(multipart).await?;
    let params = form.structure_params()?;
    info!(request_id = %request_id, bytes = form.file.len(), "Processing structure request");

    let start = Instant::now();
    let value = blocking(move || {
        let analyzer = state.structure.acquire()?;
        with_page_source(&form.file, &state.render, |source| {
            let run = analyze_document(&analyzer, source, PageOrchestrator::unlimited(), &params)?;
            Ok(structure_json(&run))
        })
    })
    .await?;

    info!(
        request_id = %request_id,
        total_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Structure analysis completed"
    );
    Ok(Json(value))
}

async fn structure_draw_handler(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<DrawResponse, ApiError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let form = UploadForm::read(multipart).await?;
    let params = form.structure_params()?;
    let orchestrator = PageOrchestrator::with_max_pages(form.max_pages()?);
    info!(request_id = %request_id, bytes = form.file.len(), "Processing structure draw request");

    blocking(move || {
        let analyzer = state.structure.acquire()?;
        with_page_source(&form.file, &state.render, |source| {
            let run = draw_structure_document(&analyzer, source, orchestrator, &params)?;
            draw_response(source.kind(), &run)
        })
    })
    .await
}

async fn structure_markdown_handler(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let form = UploadForm::read(multipart).await?;
    let params = form.structure_params()?;
    let orchestrator = PageOrchestrator::with_max_pages(form.max_pages()?);
    info!(request_id = %request_id, bytes = form.file.len(), "Processing markdown request");

    let value = blocking(move || {
        let analyzer = state.structure.acquire()?;
        with_page_source(&form.file, &state.render, |source| {
            let run = analyze_document(&analyzer, source, orchestrator, &params)?;
            let artifact = document_markdown(&run)?;
            let mut value = serde_json::to_value(&artifact)
                .map_err(|e| OCRError::processing(ProcessingStage::Encoding, "serialize markdown", e))?;
            if source.kind() == SourceKind::Pdf {
                value["total_pages"] = json!(run.total_pages);
                value["processed_pages"] = json!(run.processed_pages);
                value["max_pages_limit"] = json!(run.max_pages_limit);
            }
            Ok(value)
        })
    })
    .await?;
    Ok(Json(value))
}

/// A single image draws to one PNG; a PDF to the page list envelope.
fn draw_response(
    kind: SourceKind,
    run: &DocumentRun<(usize, RgbImage)>,
) -> OcrResult<DrawResponse> {
    if kind == SourceKind::Image
        && let Some((_, image)) = run.pages().next()
    {
        return Ok(DrawResponse::Png(encode_png(image)?));
    }
    Ok(DrawResponse::Json(draw_document_json(run)?))
}

async fn ocr_load_handler(State(state): State<SharedState>) -> Result<Json<ModelStatus>, ApiError> {
    blocking(move || {
        state.ocr.load()?;
        Ok(state.ocr.status())
    })
    .await
    .map(Json)
}

async fn ocr_unload_handler(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    blocking(move || Ok(unload_response(&state.ocr))).await.map(Json)
}

async fn ocr_status_handler(State(state): State<SharedState>) -> Json<ModelStatus> {
    Json(state.ocr.status())
}

async fn structure_load_handler(
    State(state): State<SharedState>,
) -> Result<Json<ModelStatus>, ApiError> {
    blocking(move || {
        state.structure.load()?;
        Ok(state.structure.status())
    })
    .await
    .map(Json)
}

async fn structure_unload_handler(
    State(state): State<SharedState>,
) -> Result<Json<Value>, ApiError> {
    blocking(move || Ok(unload_response(&state.structure))).await.map(Json)
}

async fn structure_status_handler(State(state): State<SharedState>) -> Json<ModelStatus> {
    Json(state.structure.status())
}

fn unload_response<L: ModelLoader>(registry: &ModelRegistry<L>) -> Value {
    let unloaded = registry.unload();
    json!({
        "unloaded": unloaded,
        "status": registry.status(),
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
