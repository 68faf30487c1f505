use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use stride_core::backup::{Backup, RestoreSummary, validate_backup};
use stride_core::gate::{AdminGate, pin_matches};
use stride_core::models::{
    GalleryForm, GalleryImage, Recipe, RecipeForm, RoadbookEntry, RoadbookForm, ValidationError,
    WeightEntry,
};
use stride_core::progress::Progress;
use stride_core::service::StrideService;
use stride_core::store::{GuardError, Notice, Removal};

// Two embedded images of 2.5 MB each, base64 encoded, plus slack for backups
const BODY_LIMIT: usize = 16 * 1024 * 1024; // 16 MB

const PIN_HEADER: &str = "x-admin-pin";
const NOTICE_HEADER: &str = "x-stride-notice";
/// Sent when a notice message cannot be carried in a header value.
const FALLBACK_NOTICE: &str = "Changes could not be saved and are kept for this session only.";

#[derive(Clone)]
struct AppState {
    service: Arc<Mutex<StrideService>>,
}

impl AppState {
    fn lock(&self) -> MutexGuard<'_, StrideService> {
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

/// Weight as typed into the form, or a plain JSON number.
#[derive(Deserialize)]
#[serde(untagged)]
enum WeightInput {
    Text(String),
    Number(f64),
}

#[derive(Deserialize)]
struct CreateWeightRequest {
    weight: WeightInput,
}

#[derive(Deserialize)]
struct UnlockRequest {
    pin: String,
}

#[derive(Serialize)]
struct UnlockResponse {
    unlocked: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unauthorized(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(e) = err.downcast_ref::<ValidationError>() {
            return Self::BadRequest(e.to_string());
        }
        if let Some(e) = err.downcast_ref::<GuardError>() {
            return Self::from(e.clone());
        }
        Self::Internal(err)
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::LastElement => Self::Conflict(err.to_string()),
            GuardError::IndexOutOfRange { .. } => Self::NotFound(err.to_string()),
            GuardError::Rejected(_) => Self::BadRequest(err.to_string()),
        }
    }
}

/// Response headers carrying storage notices, one header value each.
fn notice_headers(notices: &[Notice]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for notice in notices {
        warn!(key = notice.key, "{notice}");
        let value = HeaderValue::from_str(&notice.message)
            .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_NOTICE));
        headers.append(NOTICE_HEADER, value);
    }
    headers
}

// --- Middleware ---

async fn require_pin(request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(PIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(pin_matches);

    if !authorized {
        return ApiError::Unauthorized("Invalid or missing admin PIN".to_string()).into_response();
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Weight handlers ---

async fn list_weights(State(state): State<AppState>) -> Json<Vec<WeightEntry>> {
    Json(state.lock().weights().to_vec())
}

async fn create_weight(
    State(state): State<AppState>,
    Json(req): Json<CreateWeightRequest>,
) -> Result<(StatusCode, HeaderMap, Json<WeightEntry>), ApiError> {
    let raw = match req.weight {
        WeightInput::Text(s) => s,
        WeightInput::Number(n) => n.to_string(),
    };

    let mut svc = state.lock();
    let entry = svc.add_weight(&raw)?;
    let headers = notice_headers(&svc.take_notices());
    Ok((StatusCode::CREATED, headers, Json(entry)))
}

async fn delete_weight(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<(StatusCode, HeaderMap), ApiError> {
    let mut svc = state.lock();
    // The request itself is the confirmation
    match svc.delete_weight(index, |_| true)? {
        Removal::Removed(_) => {
            let headers = notice_headers(&svc.take_notices());
            Ok((StatusCode::NO_CONTENT, headers))
        }
        Removal::Declined => Err(ApiError::Internal(anyhow::anyhow!(
            "unconditional delete was declined"
        ))),
    }
}

// --- Recipe / gallery / roadbook handlers ---

async fn list_recipes(State(state): State<AppState>) -> Json<Vec<Recipe>> {
    Json(state.lock().recipes().to_vec())
}

async fn create_recipe(
    State(state): State<AppState>,
    Json(form): Json<RecipeForm>,
) -> Result<(StatusCode, HeaderMap, Json<Recipe>), ApiError> {
    let mut svc = state.lock();
    let recipe = svc.add_recipe(&form)?;
    let headers = notice_headers(&svc.take_notices());
    Ok((StatusCode::CREATED, headers, Json(recipe)))
}

async fn list_gallery(State(state): State<AppState>) -> Json<Vec<GalleryImage>> {
    Json(state.lock().gallery().to_vec())
}

async fn create_gallery_image(
    State(state): State<AppState>,
    Json(form): Json<GalleryForm>,
) -> Result<(StatusCode, HeaderMap, Json<GalleryImage>), ApiError> {
    let mut svc = state.lock();
    let image = svc.add_gallery_image(&form)?;
    let headers = notice_headers(&svc.take_notices());
    Ok((StatusCode::CREATED, headers, Json(image)))
}

async fn list_roadbook(State(state): State<AppState>) -> Json<Vec<RoadbookEntry>> {
    Json(state.lock().roadbook().to_vec())
}

async fn create_roadbook_entry(
    State(state): State<AppState>,
    Json(form): Json<RoadbookForm>,
) -> Result<(StatusCode, HeaderMap, Json<RoadbookEntry>), ApiError> {
    let mut svc = state.lock();
    let entry = svc.add_roadbook_entry(&form)?;
    let headers = notice_headers(&svc.take_notices());
    Ok((StatusCode::CREATED, headers, Json(entry)))
}

// --- Progress / admin handlers ---

async fn get_progress(State(state): State<AppState>) -> Json<Progress> {
    Json(state.lock().progress())
}

async fn unlock(Json(req): Json<UnlockRequest>) -> Result<Json<UnlockResponse>, ApiError> {
    let mut gate = AdminGate::new();
    if gate.submit(&req.pin) {
        Ok(Json(UnlockResponse { unlocked: true }))
    } else {
        Err(ApiError::Unauthorized("Wrong PIN".to_string()))
    }
}

// --- Export / Import handlers ---

async fn export_data(State(state): State<AppState>) -> Json<Backup> {
    Json(state.lock().export_all())
}

async fn import_data(
    State(state): State<AppState>,
    Json(backup): Json<Backup>,
) -> Result<(HeaderMap, Json<RestoreSummary>), ApiError> {
    validate_backup(&backup).map_err(|e| ApiError::BadRequest(format!("{e:#}")))?;

    let mut svc = state.lock();
    let summary = svc.import_all(&backup)?;
    let headers = notice_headers(&svc.take_notices());
    Ok((headers, Json(summary)))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/weights", get(list_weights))
        .route("/api/recipes", get(list_recipes))
        .route("/api/gallery", get(list_gallery))
        .route("/api/roadbook", get(list_roadbook))
        .route("/api/progress", get(get_progress))
        .route("/api/admin/unlock", post(unlock));

    let admin = Router::new()
        .route("/api/weights", post(create_weight))
        .route("/api/weights/{index}", delete(delete_weight))
        .route("/api/recipes", post(create_recipe))
        .route("/api/gallery", post(create_gallery_image))
        .route("/api/roadbook", post(create_roadbook_entry))
        .route("/api/export", get(export_data))
        .route("/api/import", post(import_data))
        .route_layer(middleware::from_fn(require_pin));

    public
        .merge(admin)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(service: StrideService, port: u16, bind: &str) -> anyhow::Result<()> {
    let state = AppState {
        service: Arc::new(Mutex::new(service)),
    };

    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        eprintln!(
            "Warning: Listening on {bind}. The admin PIN is a shared static code, not real authentication."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    info!(%bind, port, "server started");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use stride_core::clock::SystemClock;
    use stride_core::progress::Goal;
    use stride_core::storage::MemoryStorage;
    use tower::ServiceExt;

    const PIN: &str = "1979";

    fn test_state() -> AppState {
        AppState {
            service: Arc::new(Mutex::new(StrideService::new_in_memory())),
        }
    }

    fn test_app() -> Router {
        build_router(test_state())
    }

    #[test]
    fn test_unencodable_notice_keeps_header() {
        let headers = notice_headers(&[
            Notice {
                key: "stride_gallery_v4",
                message: "Speicher voll:\nBild verworfen".to_string(),
            },
            Notice {
                key: "stride_weights_v4",
                message: "quota exceeded".to_string(),
            },
        ]);

        let values: Vec<&str> = headers
            .get_all(NOTICE_HEADER)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(values, vec![FALLBACK_NOTICE, "quota exceeded"]);
    }

    fn post_json(uri: &str, pin: Option<&str>, body: &serde_json::Value) -> Request<Body> {
        let mut builder = axum::http::Request::post(uri).header("content-type", "application/json");
        if let Some(pin) = pin {
            builder = builder.header(PIN_HEADER, pin);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn reads_need_no_pin() {
        let app = test_app();

        let response = app
            .oneshot(
                axum::http::Request::get("/api/weights")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json[0]["date"], "Start");
        assert_eq!(json[0]["weight"], 107.0);
    }

    #[tokio::test]
    async fn write_without_pin_returns_401() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = app
            .oneshot(post_json(
                "/api/weights",
                None,
                &serde_json::json!({ "weight": "72.5" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid or missing admin PIN");
        assert_eq!(state.lock().weights().len(), 1);
    }

    #[tokio::test]
    async fn write_with_wrong_pin_returns_401() {
        let app = test_app();

        let response = app
            .oneshot(post_json(
                "/api/weights",
                Some("1978"),
                &serde_json::json!({ "weight": "72.5" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_weight_with_pin() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = app
            .oneshot(post_json(
                "/api/weights",
                Some(PIN),
                &serde_json::json!({ "weight": "72,5" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get(NOTICE_HEADER).is_none());
        let json = body_json(response).await;
        assert_eq!(json["weight"], 72.5);

        let svc = state.lock();
        assert_eq!(svc.weights().len(), 2);
        assert!((svc.progress().fraction - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn create_weight_accepts_number() {
        let app = test_app();

        let response = app
            .oneshot(post_json(
                "/api/weights",
                Some(PIN),
                &serde_json::json!({ "weight": 99.4 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn invalid_weight_returns_400() {
        let app = test_app();

        let response = app
            .oneshot(post_json(
                "/api/weights",
                Some(PIN),
                &serde_json::json!({ "weight": "schwer" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_last_weight_returns_409() {
        let app = test_app();

        let response = app
            .oneshot(
                axum::http::Request::delete("/api/weights/0")
                    .header(PIN_HEADER, PIN)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn delete_weight_by_index() {
        let state = test_state();
        state.lock().add_weight("100").unwrap();

        let response = build_router(state.clone())
            .oneshot(
                axum::http::Request::delete("/api/weights/7")
                    .header(PIN_HEADER, PIN)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = build_router(state.clone())
            .oneshot(
                axum::http::Request::delete("/api/weights/1")
                    .header(PIN_HEADER, PIN)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.lock().weights().len(), 1);
    }

    #[tokio::test]
    async fn gallery_without_image_returns_400() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = app
            .oneshot(post_json(
                "/api/gallery",
                Some(PIN),
                &serde_json::json!({ "caption": "Tag 1", "date": "2026-01-18", "image": "" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "image must not be empty");
        assert!(state.lock().gallery().is_empty());
    }

    #[tokio::test]
    async fn create_recipe_and_list() {
        let state = test_state();

        let response = build_router(state.clone())
            .oneshot(post_json(
                "/api/recipes",
                Some(PIN),
                &serde_json::json!({
                    "title": "Skyr Bowl",
                    "tags": "Frühstück, High Protein",
                    "ingredients": "250g Skyr\nBeeren",
                    "steps": "Alles mischen"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["tags"][1], "High Protein");
        assert!(created.get("image").is_none());

        let response = build_router(state)
            .oneshot(
                axum::http::Request::get("/api/recipes")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[1]["title"], "Skyr Bowl");
    }

    #[tokio::test]
    async fn create_roadbook_entry_prepends() {
        let state = test_state();

        let response = build_router(state.clone())
            .oneshot(post_json(
                "/api/roadbook",
                Some(PIN),
                &serde_json::json!({
                    "title": "Woche 1",
                    "date": "2026-01-25",
                    "text": "Läuft."
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let svc = state.lock();
        assert_eq!(svc.roadbook()[0].title, "Woche 1");
        assert_eq!(svc.roadbook()[0].date, "25.01.2026");
    }

    #[tokio::test]
    async fn unlock_checks_pin() {
        let response = test_app()
            .oneshot(post_json(
                "/api/admin/unlock",
                None,
                &serde_json::json!({ "pin": "0000" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = test_app()
            .oneshot(post_json(
                "/api/admin/unlock",
                None,
                &serde_json::json!({ "pin": PIN }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["unlocked"], true);
    }

    #[tokio::test]
    async fn progress_reports_bmi() {
        let response = test_app()
            .oneshot(
                axum::http::Request::get("/api/progress")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["current_kg"], 107.0);
        assert_eq!(json["fraction"], 0.0);
        assert_eq!(json["bmi"]["category"], "obese");
    }

    #[tokio::test]
    async fn export_requires_pin() {
        let response = test_app()
            .oneshot(
                axum::http::Request::get("/api/export")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn export_then_import() {
        let source = test_state();
        source.lock().add_weight("95.5").unwrap();

        let response = build_router(source)
            .oneshot(
                axum::http::Request::get("/api/export")
                    .header(PIN_HEADER, PIN)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let backup = body_json(response).await;

        let target = test_state();
        let response = build_router(target.clone())
            .oneshot(post_json("/api/import", Some(PIN), &backup))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["weights"], 2);
        assert_eq!(target.lock().weights().len(), 2);
    }

    #[tokio::test]
    async fn import_invalid_backup_returns_400() {
        let state = test_state();
        let mut backup = serde_json::to_value(state.lock().export_all()).unwrap();
        backup["weights"] = serde_json::json!([]);

        let response = build_router(state.clone())
            .oneshot(post_json("/api/import", Some(PIN), &backup))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.lock().weights().len(), 1);
    }

    #[tokio::test]
    async fn full_storage_sets_notice_header() {
        let state = AppState {
            service: Arc::new(Mutex::new(StrideService::open(
                Box::new(MemoryStorage::with_quota(16)),
                Box::new(SystemClock),
                Goal::default(),
            ))),
        };

        let response = build_router(state.clone())
            .oneshot(post_json(
                "/api/weights",
                Some(PIN),
                &serde_json::json!({ "weight": "101" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let notice = response.headers().get(NOTICE_HEADER).unwrap();
        assert!(notice.to_str().unwrap().contains("Storage full"));
        // Still kept for the session
        assert_eq!(state.lock().weights().len(), 2);
    }

    #[tokio::test]
    async fn security_headers_present() {
        let response = test_app()
            .oneshot(
                axum::http::Request::get("/api/recipes")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn security_headers_on_auth_failure() {
        let response = test_app()
            .oneshot(post_json("/api/import", None, &serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let big_body = vec![0u8; BODY_LIMIT + 1];
        let response = test_app()
            .oneshot(
                axum::http::Request::post("/api/gallery")
                    .header("content-type", "application/json")
                    .header(PIN_HEADER, PIN)
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::Internal(anyhow::anyhow!("secret database path /home/user/stride.db"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert!(!json["error"].as_str().unwrap().contains("secret"));
    }
}
