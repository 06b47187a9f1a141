//! REST HTTP server.
//!
//! Translates requests into [`Store`] operations and store results into
//! JSON responses. Everything lives under `/api`; when a frontend build is
//! configured, other paths serve its files and fall back to `index.html`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Health check (returns version) |
//! | `POST` | `/api/units` | Create a unit |
//! | `GET`  | `/api/units?skip=&limit=` | List units with boxes and items |
//! | `GET`/`PUT`/`DELETE` | `/api/units/{id}` | Read, patch, delete a unit |
//! | `POST` | `/api/boxes` | Create a box |
//! | `GET`  | `/api/boxes?skip=&limit=` | List boxes with items |
//! | `GET`/`PUT`/`DELETE` | `/api/boxes/{id}` | Read, patch, delete a box |
//! | `GET`  | `/api/boxes/slug/{slug}` | Read a box by slug |
//! | `POST` | `/api/boxes/{id}/items` | Create an item in a box |
//! | `GET`  | `/api/boxes/{id}/qrcode` | PNG code image linking to the box |
//! | `GET`/`PUT`/`DELETE` | `/api/items/{id}` | Read, patch, delete an item |
//! | `POST` | `/api/items/{id}/photo` | Upload an item photo (multipart field `file`) |
//! | `GET`  | `/api/search?q=` | Search boxes and items |
//! | `GET`  | `/api/photos/{file}` | Stored photos |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "box not found: 7" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `parent_not_found`
//! (404), `conflict` (409), `photo_error` (500), `internal` (500).

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::db;
use crate::error::StoreError;
use crate::migrate;
use crate::models::{
    BoxDetail, Item, NewBox, NewItem, NewUnit, SearchResults, StorageBox, StorageUnit, UnitDetail,
};
use crate::patch::{BoxPatch, ItemPatch, UnitPatch};
use crate::photos::{JpegPhotoStore, PhotoStore};
use crate::qr;
use crate::store::Store;

const DEFAULT_PAGE_LIMIT: i64 = 100;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub photos: Arc<dyn PhotoStore>,
}

impl AppState {
    pub fn new(config: &Config, store: Store) -> Self {
        let photos = Arc::new(JpegPhotoStore::new(&config.photos));
        Self {
            config: Arc::new(config.clone()),
            store,
            photos,
        }
    }
}

/// Starts the HTTP server.
///
/// Connects to the database, applies migrations, and binds to
/// `[server].bind`. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    tokio::fs::create_dir_all(&config.photos.dir).await?;

    let state = AppState::new(config, Store::new(pool));
    let app = router(state);

    info!(bind = %config.server.bind, "whereisit listening");
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let photos_dir = state.config.photos.dir.clone();
    let upload_limit = state.config.photos.max_upload_bytes;
    let frontend = state.config.frontend.dist.clone();

    let api = Router::new()
        .route("/health", get(handle_health))
        .route("/units", post(create_unit).get(list_units))
        .route(
            "/units/{id}",
            get(get_unit).put(update_unit).delete(delete_unit),
        )
        .route("/boxes", post(create_box).get(list_boxes))
        .route("/boxes/{id}", get(get_box).put(update_box).delete(delete_box))
        .route("/boxes/slug/{slug}", get(get_box_by_slug))
        .route("/boxes/{id}/items", post(create_item))
        .route("/boxes/{id}/qrcode", get(box_qrcode))
        .route(
            "/items/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route(
            "/items/{id}/photo",
            post(upload_photo).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/search", get(search))
        .nest_service("/photos", ServeDir::new(photos_dir))
        .fallback(handle_api_not_found)
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new().nest("/api", api);
    if let Some(dist) = frontend {
        let index = ServeFile::new(dist.join("index.html"));
        app = app.fallback_service(ServeDir::new(dist).fallback(index));
    }

    app.layer(cors).layer(TraceLayer::new_for_http())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

/// Constructs a 404 Not Found error.
fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::NotFound { .. } => not_found(message),
            StoreError::ParentNotFound { .. } => {
                AppError::new(StatusCode::NOT_FOUND, "parent_not_found", message)
            }
            StoreError::DuplicateName(_) | StoreError::DuplicateSlug(_) => {
                AppError::new(StatusCode::CONFLICT, "conflict", message)
            }
            StoreError::Validation(_) => bad_request(message),
            StoreError::Database(e) => {
                error!(error = %e, "database error");
                AppError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal database error",
                )
            }
        }
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

fn deleted(entity: &str) -> Json<serde_json::Value> {
    Json(json!({ "message": format!("{} deleted successfully", entity) }))
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_api_not_found() -> AppError {
    not_found("Not Found")
}

/// `skip`/`limit` query parameters for list endpoints.
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

// ============ Units ============

async fn create_unit(
    State(state): State<AppState>,
    Json(new): Json<NewUnit>,
) -> ApiResult<StorageUnit> {
    Ok(Json(state.store.create_unit(&new).await?))
}

async fn list_units(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<UnitDetail>> {
    Ok(Json(state.store.list_units(page.skip, page.limit).await?))
}

async fn get_unit(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<UnitDetail> {
    Ok(Json(state.store.get_unit(id).await?))
}

async fn update_unit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<UnitPatch>,
) -> ApiResult<StorageUnit> {
    Ok(Json(state.store.update_unit(id, &patch).await?))
}

async fn delete_unit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.store.delete_unit(id).await?;
    Ok(deleted("Unit"))
}

// ============ Boxes ============

async fn create_box(
    State(state): State<AppState>,
    Json(new): Json<NewBox>,
) -> ApiResult<StorageBox> {
    Ok(Json(state.store.create_box(&new).await?))
}

async fn list_boxes(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<BoxDetail>> {
    Ok(Json(state.store.list_boxes(page.skip, page.limit).await?))
}

async fn get_box(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<BoxDetail> {
    Ok(Json(state.store.get_box(id).await?))
}

async fn get_box_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<BoxDetail> {
    Ok(Json(state.store.get_box_by_slug(&slug).await?))
}

async fn update_box(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<BoxPatch>,
) -> ApiResult<StorageBox> {
    Ok(Json(state.store.update_box(id, &patch).await?))
}

async fn delete_box(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.store.delete_box(id).await?;
    Ok(deleted("Box"))
}

/// Handler for `GET /api/boxes/{id}/qrcode`.
///
/// Encodes the box link built from `[qr].link_template` and returns it as
/// a PNG image.
async fn box_qrcode(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let detail = state.store.get_box(id).await?;
    let link = state.config.qr.link_for(&detail.storage_box.slug);
    let (scale, border) = (state.config.qr.scale, state.config.qr.border);

    let png = tokio::task::spawn_blocking(move || qr::render_png(&link, scale, border))
        .await
        .map_err(|e| internal(format!("qr worker failed: {}", e)))?
        .map_err(|e| internal(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

fn internal(message: String) -> AppError {
    error!(%message, "request failed");
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

// ============ Items ============

async fn create_item(
    State(state): State<AppState>,
    Path(box_id): Path<i64>,
    Json(new): Json<NewItem>,
) -> ApiResult<Item> {
    Ok(Json(state.store.create_item(box_id, &new).await?))
}

async fn get_item(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Item> {
    Ok(Json(state.store.get_item(id).await?))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<ItemPatch>,
) -> ApiResult<Item> {
    Ok(Json(state.store.update_item(id, &patch).await?))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.store.delete_item(id).await?;
    Ok(deleted("Item"))
}

/// Handler for `POST /api/items/{id}/photo`.
///
/// Expects a multipart body with an image in the `file` field. The item
/// must exist before anything is written. Returns the updated item.
async fn upload_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<Item> {
    state.store.get_item(id).await?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(bad_request("File must be an image"));
        }
        let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;
        upload = Some(bytes);
        break;
    }
    let bytes = upload.ok_or_else(|| bad_request("missing multipart field: file"))?;

    let reference = state.photos.store(bytes.to_vec()).await.map_err(|e| {
        error!(item = id, error = %e, "photo processing failed");
        AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "photo_error",
            format!("Failed to process image: {}", e),
        )
    })?;

    Ok(Json(
        state
            .store
            .update_item(id, &ItemPatch::photo(reference))
            .await?,
    ))
}

// ============ Search ============

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResults> {
    Ok(Json(state.store.search(&params.q).await?))
}
