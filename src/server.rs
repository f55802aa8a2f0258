use crate::acquisition::{CameraSource, ContentResolver, DirectoryResolver, GallerySource, SourceKind};
use crate::config::Config;
use crate::display::{DisplayView, WatchSurface};
use crate::error::ShellError;
use crate::frame;
use crate::permission::{Capability, PermissionGate, PermissionSet};
use crate::prompt::{PromptBroker, PromptInfo, PromptKind, PromptReply};
use crate::shell::{CycleRecord, Shell, ShellHandle, Sources};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::ValueEnum;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Response header carrying the generation of the displayed image
pub const GENERATION_HEADER: &str = "x-display-generation";
/// Response header naming the trigger that produced the displayed image
pub const SOURCE_HEADER: &str = "x-display-source";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub shell: ShellHandle,
    pub broker: PromptBroker,
    pub gate: Arc<PermissionGate>,
    pub resolver: Arc<DirectoryResolver>,
    pub display: DisplayView,
    pub config: Arc<Config>,
}

/// Trigger response
#[derive(Serialize)]
pub struct CycleStarted {
    pub cycle: u64,
    pub source: SourceKind,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub luma: String,
    pub gallery_dir: String,
    pub permissions: PermissionSet,
    pub max_file_size_bytes: usize,
}

/// Gallery listing response
#[derive(Serialize)]
pub struct GalleryItems {
    pub items: Vec<String>,
}

/// Wire the shell, its sources and the prompt broker together.
/// Must be called from within a tokio runtime.
pub fn build(config: Config) -> AppState {
    let broker = PromptBroker::new();
    let gate = Arc::new(PermissionGate::new(config.pre_granted, broker.clone()));
    let resolver = Arc::new(DirectoryResolver::new(config.gallery_dir.clone()));

    let sources = Sources {
        camera: Arc::new(CameraSource::new(broker.clone())),
        gallery: Arc::new(GallerySource::new(broker.clone(), resolver.clone())),
    };
    let (surface, display) = WatchSurface::new();
    let shell = Shell::spawn(
        gate.clone(),
        sources,
        surface,
        config.luma,
        config.startup_check,
    );

    AppState {
        shell,
        broker,
        gate,
        resolver,
        display,
        config: Arc::new(config),
    }
}

pub fn router(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;

    Router::new()
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/camera", post(handle_camera))
        .route("/gallery", post(handle_gallery))
        .route("/gallery/items", get(handle_gallery_items))
        .route("/cycles/:id", get(handle_cycle))
        .route("/prompts", get(handle_prompts))
        .route("/prompts/:id", post(handle_answer).delete(handle_dismiss))
        .route("/display", get(handle_display))
        .layer(DefaultBodyLimit::max(max_file_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP shell
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = router(build(config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Shell listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// "Use camera" trigger
async fn handle_camera(State(state): State<AppState>) -> Result<impl IntoResponse, ShellError> {
    start_cycle(&state, SourceKind::Camera).await
}

/// "Use gallery" trigger
async fn handle_gallery(State(state): State<AppState>) -> Result<impl IntoResponse, ShellError> {
    start_cycle(&state, SourceKind::Gallery).await
}

async fn start_cycle(
    state: &AppState,
    source: SourceKind,
) -> Result<(StatusCode, Json<CycleStarted>), ShellError> {
    let cycle = state.shell.trigger(source).await?;
    Ok((StatusCode::ACCEPTED, Json(CycleStarted { cycle, source })))
}

async fn handle_cycle(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<CycleRecord>, ShellError> {
    Ok(Json(state.shell.cycle(id)?))
}

async fn handle_gallery_items(
    State(state): State<AppState>,
) -> Result<Json<GalleryItems>, ShellError> {
    let items = state.resolver.list()?;
    Ok(Json(GalleryItems { items }))
}

async fn handle_prompts(State(state): State<AppState>) -> Json<Vec<PromptInfo>> {
    Json(state.broker.list())
}

/// Answer a prompt: `file` for the camera, `handle` for the gallery,
/// `granted` (comma separated, repeatable) for permissions
async fn handle_answer(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    mut multipart: Multipart,
) -> Result<StatusCode, ShellError> {
    let kind = state.broker.kind_of(id)?;

    let mut file_data: Option<Bytes> = None;
    let mut handle: Option<String> = None;
    let mut granted: Vec<Capability> = Vec::new();

    // Parse multipart form
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ShellError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                file_data = Some(field.bytes().await.map_err(|e| {
                    ShellError::InvalidRequest(format!("Failed to read file data: {}", e))
                })?);
            }
            "handle" => {
                handle = Some(field.text().await.map_err(|e| {
                    ShellError::InvalidRequest(format!("Invalid handle: {}", e))
                })?);
            }
            "granted" => {
                let text = field.text().await.map_err(|e| {
                    ShellError::InvalidRequest(format!("Invalid capability list: {}", e))
                })?;
                for cap in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    granted.push(Capability::from_str(cap, true).map_err(|_| {
                        ShellError::InvalidRequest(format!("Unknown capability: {}", cap))
                    })?);
                }
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let reply = match kind {
        PromptKind::Camera => {
            let data = file_data.ok_or_else(|| {
                ShellError::InvalidRequest("Missing file in camera reply".to_string())
            })?;
            if data.len() > state.config.max_file_size {
                return Err(ShellError::ImageTooLarge {
                    size: data.len(),
                    max: state.config.max_file_size,
                });
            }
            PromptReply::Frame(data.to_vec())
        }
        PromptKind::Gallery { .. } => PromptReply::Handle(handle.ok_or_else(|| {
            ShellError::InvalidRequest("Missing handle in gallery reply".to_string())
        })?),
        PromptKind::Permissions { .. } => PromptReply::Permissions(granted),
    };

    state.broker.respond(id, reply)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn handle_dismiss(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ShellError> {
    state.broker.dismiss(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current contents of the display area as PNG, 204 while blank
async fn handle_display(State(state): State<AppState>) -> Result<Response, ShellError> {
    let Some(shown) = state.display.snapshot() else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let image = shown.image.clone();
    let png = tokio::task::spawn_blocking(move || frame::encode_png(&image))
        .await
        .map_err(|e| ShellError::Internal(format!("Task join error: {}", e)))??;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                HeaderName::from_static(GENERATION_HEADER),
                shown.generation.to_string(),
            ),
            (
                HeaderName::from_static(SOURCE_HEADER),
                shown.source.as_str().to_string(),
            ),
        ],
        png,
    )
        .into_response())
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        luma: state.config.luma.as_str().to_string(),
        gallery_dir: state.resolver.root().display().to_string(),
        permissions: state.gate.snapshot(),
        max_file_size_bytes: state.config.max_file_size,
    })
}
