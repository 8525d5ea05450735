//! # Photo Map Organizer API
//!
//! HTTP surface for the photomap workspace.
//!
//! Handles:
//! - HTTP endpoints with axum (folder CRUD, uploads, image serving, pins)
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, multipart uploads,
//!   static file serving)
//!
//! Domain logic lives in `photomap-core`; this crate only marshals
//! requests, maps errors to status codes and wires configuration at
//! startup.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use photomap_core::{FolderStore, LocationKey, PinAggregator, StoreConfig, StoreError};

/// Request-body cap for the upload route. Axum's 2 MB default is far too
/// small for photos; this bounds one multipart batch.
const UPLOAD_BODY_LIMIT: usize = 256 * 1024 * 1024;

/// Application state shared across REST API handlers.
#[derive(Clone)]
struct AppState {
    cfg: Arc<StoreConfig>,
    store: Arc<FolderStore>,
    pins: Arc<PinAggregator>,
}

// Request/response DTOs. Field names mirror the wire contract the map
// frontend expects (camelCase where it uses camelCase).

/// Body for create-folder and sort-folder.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FolderReq {
    pub country: String,
    pub city: String,
    pub year: i32,
}

/// Body for move-image.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveImageReq {
    #[serde(rename = "imageId")]
    pub image_id: String,
    pub country: String,
    pub city: String,
    pub year: i32,
    #[serde(rename = "sourceFolder")]
    pub source_folder: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageRes {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FolderRes {
    pub success: bool,
    pub folder_path: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActionRes {
    pub success: bool,
    pub message: String,
}

/// One image file in a location folder.
#[derive(Debug, Serialize, ToSchema)]
pub struct ImageRes {
    /// The filename doubles as the image id.
    pub id: String,
    pub name: String,
    /// Relative serve-image URL resolving to the raw bytes.
    pub url: String,
    pub year: i32,
    /// City only; the country is not repeated here.
    pub location: String,
    pub file_size: u64,
    /// Last-modified timestamp, ISO 8601. The name is historical: the
    /// filesystem only tracks modification time.
    pub created_at: String,
}

/// One map pin summarising a location folder.
#[derive(Debug, Serialize, ToSchema)]
pub struct PinRes {
    pub id: String,
    pub country: String,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub year: i32,
    #[serde(rename = "imageCount")]
    pub image_count: usize,
}

impl From<photomap_core::Pin> for PinRes {
    fn from(pin: photomap_core::Pin) -> Self {
        Self {
            id: pin.id,
            country: pin.country,
            city: pin.city,
            lat: pin.lat,
            lng: pin.lng,
            year: pin.year,
            image_count: pin.image_count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadedFileRes {
    pub original_name: String,
    pub saved_as: String,
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadRes {
    pub success: bool,
    pub message: String,
    pub uploaded_files: Vec<UploadedFileRes>,
}

/// Error response carried by every non-2xx status: `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("store error: {err}");
        } else {
            tracing::debug!("request rejected: {err}");
        }
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        root,
        create_folder,
        get_images,
        move_image,
        sort_folder,
        upload_images,
        get_all_pins,
        serve_image,
    ),
    components(schemas(
        MessageRes,
        FolderReq,
        FolderRes,
        MoveImageReq,
        ActionRes,
        ImageRes,
        PinRes,
        UploadedFileRes,
        UploadRes,
    ))
)]
struct ApiDoc;

/// Build the application router over a storage configuration.
pub fn router(cfg: Arc<StoreConfig>) -> Router {
    let state = AppState {
        store: Arc::new(FolderStore::new(cfg.clone())),
        pins: Arc::new(PinAggregator::new(cfg.clone())),
        cfg,
    };
    Router::new()
        .route("/", get(root))
        .route("/api/create-folder", post(create_folder))
        .route("/api/get-images/:year/:country/:city", get(get_images))
        .route("/api/move-image", post(move_image))
        .route("/api/sort-folder", post(sort_folder))
        .route(
            "/api/upload-images",
            post(upload_images).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/get-all-pins", get(get_all_pins))
        .route(
            "/api/serve-image/:year/:country/:city/:filename",
            get(serve_image),
        )
        .nest_service("/static", ServeDir::new(state.cfg.static_dir()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Entry point shared by the `photomap-run` binary.
///
/// Resolves configuration from the environment once, prepares the storage
/// layout and serves the router until shutdown.
///
/// # Environment Variables
/// - `PHOTOMAP_ADDR`: bind address (default: "0.0.0.0:8000")
/// - `PHOTOMAP_DATA_DIR`: storage root (default: "./photo_data")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the storage layout cannot be created, or
/// - the server address cannot be bound.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("photomap=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("PHOTOMAP_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into());
    let data_dir = std::env::var("PHOTOMAP_DATA_DIR").unwrap_or_else(|_| "./photo_data".into());

    let cfg = Arc::new(StoreConfig::new(PathBuf::from(data_dir)));
    cfg.ensure_layout()?;

    tracing::info!("++ Starting Photo Map Organizer API on {}", addr);
    tracing::info!("++ Storage root: {}", cfg.storage_root().display());

    let app = router(cfg);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Health check response", body = MessageRes)
    )
)]
/// Health check endpoint.
async fn root() -> Json<MessageRes> {
    Json(MessageRes {
        message: "Photo Map Organizer API is running".into(),
    })
}

#[utoipa::path(
    post,
    path = "/api/create-folder",
    request_body = FolderReq,
    responses(
        (status = 200, description = "Folder created or already present", body = FolderRes),
        (status = 400, description = "Invalid country/city segment"),
        (status = 500, description = "Filesystem error")
    )
)]
/// Create the year/country/city folder chain for a location.
///
/// Idempotent: succeeds silently when the folder already exists.
async fn create_folder(
    State(state): State<AppState>,
    Json(req): Json<FolderReq>,
) -> Result<Json<FolderRes>, ApiError> {
    let key = LocationKey::new(req.year, req.country, req.city)?;
    let folder_path = state.store.create_folder(&key)?;
    Ok(Json(FolderRes {
        success: true,
        folder_path: folder_path.display().to_string(),
        message: format!(
            "Folder created successfully for {}, {} ({})",
            key.city(),
            key.country(),
            key.year()
        ),
    }))
}

#[utoipa::path(
    get,
    path = "/api/get-images/{year}/{country}/{city}",
    params(
        ("year" = i32, Path, description = "Year"),
        ("country" = String, Path, description = "Country name"),
        ("city" = String, Path, description = "City name")
    ),
    responses(
        (status = 200, description = "Images in the location folder", body = [ImageRes]),
        (status = 400, description = "Invalid country/city segment"),
        (status = 500, description = "Filesystem error")
    )
)]
/// List the images of one location.
///
/// Returns an empty array when the folder does not exist.
async fn get_images(
    State(state): State<AppState>,
    AxumPath((year, country, city)): AxumPath<(i32, String, String)>,
) -> Result<Json<Vec<ImageRes>>, ApiError> {
    let key = LocationKey::new(year, country, city)?;
    let entries = state.store.list_images(&key)?;
    let images = entries
        .into_iter()
        .map(|entry| ImageRes {
            id: entry.name.clone(),
            url: format!(
                "/api/serve-image/{}/{}/{}/{}",
                key.year(),
                key.country(),
                key.city(),
                entry.name
            ),
            name: entry.name,
            year: key.year(),
            location: key.city().to_string(),
            file_size: entry.size_bytes,
            created_at: entry
                .modified_at
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        })
        .collect();
    Ok(Json(images))
}

#[utoipa::path(
    post,
    path = "/api/move-image",
    request_body = MoveImageReq,
    responses(
        (status = 200, description = "Image moved; message names the final filename", body = ActionRes),
        (status = 400, description = "Invalid segment or source folder outside the storage root"),
        (status = 404, description = "Source file not found"),
        (status = 500, description = "Filesystem error")
    )
)]
/// Move an image into the folder for a location.
///
/// On a name conflict the file is stored with a `_{counter}` suffix before
/// its extension; the response message reports the final filename.
async fn move_image(
    State(state): State<AppState>,
    Json(req): Json<MoveImageReq>,
) -> Result<Json<ActionRes>, ApiError> {
    let key = LocationKey::new(req.year, req.country, req.city)?;
    let final_name =
        state
            .store
            .move_image(&req.image_id, Path::new(&req.source_folder), &key)?;
    Ok(Json(ActionRes {
        success: true,
        message: format!(
            "Successfully moved {} to {}, {} ({}) as {}",
            req.image_id,
            key.city(),
            key.country(),
            key.year(),
            final_name
        ),
    }))
}

#[utoipa::path(
    post,
    path = "/api/sort-folder",
    request_body = FolderReq,
    responses(
        (status = 200, description = "Folder sorted", body = ActionRes),
        (status = 400, description = "Invalid country/city segment"),
        (status = 404, description = "Folder not found"),
        (status = 500, description = "Filesystem error")
    )
)]
/// Sort a location folder by modification date.
///
/// Files are renamed with `001_`, `002_`, … prefixes in ascending mtime
/// order; re-sorting re-numbers rather than stacking prefixes.
async fn sort_folder(
    State(state): State<AppState>,
    Json(req): Json<FolderReq>,
) -> Result<Json<ActionRes>, ApiError> {
    let key = LocationKey::new(req.year, req.country, req.city)?;
    let dir = state.store.location_dir(&key);
    state.store.sort_by_date(&dir)?;
    Ok(Json(ActionRes {
        success: true,
        message: format!(
            "Successfully sorted images in {}, {} ({})",
            key.city(),
            key.country(),
            key.year()
        ),
    }))
}

#[utoipa::path(
    post,
    path = "/api/upload-images",
    responses(
        (status = 200, description = "Files stored under server-generated names", body = UploadRes),
        (status = 400, description = "Missing fields or malformed multipart body"),
        (status = 500, description = "Filesystem error")
    )
)]
/// Upload one or more images to a location.
///
/// Expects multipart fields `files` (repeatable), `country`, `city` and
/// `year`. Each file is stored under a random filename preserving only the
/// original extension; the destination folder is created lazily.
async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadRes>, ApiError> {
    let mut country: Option<String> = None;
    let mut city: Option<String> = None;
    let mut year: Option<i32> = None;
    let mut files: Vec<(String, axum::body::Bytes)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "country" => {
                country = Some(field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("invalid country field: {e}"))
                })?);
            }
            "city" => {
                city = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("invalid city field: {e}")))?,
                );
            }
            "year" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("invalid year field: {e}")))?;
                year = Some(
                    text.trim()
                        .parse()
                        .map_err(|_| ApiError::bad_request("year must be an integer"))?,
                );
            }
            "files" => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::bad_request(format!("failed to read uploaded file: {e}"))
                })?;
                files.push((original_name, bytes));
            }
            _ => {}
        }
    }

    let (Some(country), Some(city), Some(year)) = (country, city, year) else {
        return Err(ApiError::bad_request(
            "country, city and year fields are required",
        ));
    };
    if files.is_empty() {
        return Err(ApiError::bad_request("no files in upload"));
    }

    let key = LocationKey::new(year, country, city)?;
    let mut uploaded_files = Vec::with_capacity(files.len());
    for (original_name, bytes) in &files {
        let stored = state.store.save_upload(&key, original_name, bytes)?;
        uploaded_files.push(UploadedFileRes {
            original_name: stored.original_name,
            saved_as: stored.saved_as,
            path: stored.path,
        });
    }

    Ok(Json(UploadRes {
        success: true,
        message: format!(
            "Successfully uploaded {} images to {}, {} ({})",
            uploaded_files.len(),
            key.city(),
            key.country(),
            key.year()
        ),
        uploaded_files,
    }))
}

#[utoipa::path(
    get,
    path = "/api/get-all-pins",
    responses(
        (status = 200, description = "All location pins with file counts", body = [PinRes]),
        (status = 500, description = "Filesystem error")
    )
)]
/// Enumerate all location pins for the map view.
async fn get_all_pins(State(state): State<AppState>) -> Result<Json<Vec<PinRes>>, ApiError> {
    let pins = state.pins.list_all_pins()?;
    Ok(Json(pins.into_iter().map(PinRes::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/serve-image/{year}/{country}/{city}/{filename}",
    params(
        ("year" = i32, Path, description = "Year"),
        ("country" = String, Path, description = "Country name"),
        ("city" = String, Path, description = "City name"),
        ("filename" = String, Path, description = "Image filename")
    ),
    responses(
        (status = 200, description = "Raw image bytes, Content-Type from the file extension"),
        (status = 400, description = "Invalid segment"),
        (status = 404, description = "Image not found"),
        (status = 500, description = "Filesystem error")
    )
)]
/// Serve the raw bytes of one stored image.
async fn serve_image(
    State(state): State<AppState>,
    AxumPath((year, country, city, filename)): AxumPath<(i32, String, String, String)>,
) -> Result<Response, ApiError> {
    let key = LocationKey::new(year, country, city)?;
    let bytes = state.store.read_image(&key, &filename)?;
    let content_type = mime_guess::from_path(Path::new(&filename))
        .first_or_octet_stream()
        .to_string();
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
