mod rate_limit;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use tripwise_core::{NewPlace, PlanError, RawTripRequest};
use tripwise_observability::{AppMetrics, MetricsSnapshot};
use tripwise_planner::TripPlanner;
use tripwise_providers::{
    FallbackConfig, FallbackEngine, GeminiClient, GeocodeConfig, GeocodePool, NominatimClient,
};
use tripwise_storage::Store;

use crate::rate_limit::IpRateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub planner: Arc<TripPlanner<Store>>,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: IpRateLimiter,
    pub allowed_origins: Arc<Vec<String>>,
}

#[derive(Debug, serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
}

#[derive(Debug, Deserialize)]
struct RegenerateDayRequest {
    day: i64,
}

/// Wires providers, store and planner from process environment and returns
/// the ready router. All configuration reads are concentrated here.
pub async fn build_app() -> Result<Router> {
    let metrics = AppMetrics::shared();

    let store = if let Ok(database_url) = env::var("TRIPWISE_DATABASE_URL") {
        Store::sqlite(&database_url).await?
    } else {
        Store::memory()
    };

    let http_client = Client::builder()
        .connect_timeout(Duration::from_secs(6))
        .timeout(Duration::from_secs(60))
        .build()
        .context("failed to build HTTP client")?;

    let gemini_api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
    let gemini = GeminiClient::new(http_client.clone(), gemini_api_key);

    let mut fallback = FallbackConfig::default();
    if let Ok(raw_models) = env::var("TRIPWISE_GEMINI_MODELS") {
        let models: Vec<String> = raw_models
            .split(',')
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .map(ToString::to_string)
            .collect();
        if !models.is_empty() {
            fallback.models = models;
        }
    }

    let mut geocode = GeocodeConfig::default();
    if let Some(concurrency) = env::var("TRIPWISE_GEOCODE_CONCURRENCY")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
    {
        geocode.concurrency = concurrency.max(1);
    }

    let engine = FallbackEngine::new(fallback, Arc::new(gemini), metrics.clone());
    let pool = GeocodePool::new(
        geocode,
        Arc::new(NominatimClient::new(http_client)),
        metrics.clone(),
    );
    let planner = Arc::new(TripPlanner::new(
        engine,
        pool,
        Arc::new(store),
        metrics.clone(),
    ));

    let api_key = env::var("TRIPWISE_API_KEY").unwrap_or_else(|_| "dev-tripwise-key".to_string());
    let rate_limit_window = Duration::from_secs(
        env::var("TRIPWISE_RATE_LIMIT_WINDOW_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(60),
    );
    let rate_limit_max = env::var("TRIPWISE_RATE_LIMIT_MAX")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(80);
    let allowed_origins = env::var("TRIPWISE_ALLOWED_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    let state = ApiState {
        planner,
        metrics,
        api_key,
        limiter: IpRateLimiter::new(rate_limit_window, rate_limit_max),
        allowed_origins: Arc::new(allowed_origins),
    };

    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/trips", post(create_trip))
        .route("/v1/trips/:trip_id", get(get_trip))
        .route("/v1/trips/:trip_id/regenerate_day", post(regenerate_day))
        .route("/v1/trips/:trip_id/places", post(add_place))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn create_trip(
    State(state): State<ApiState>,
    Json(raw): Json<RawTripRequest>,
) -> Response {
    match state.planner.plan_trip(&raw).await {
        Ok(trip_id) => (StatusCode::CREATED, Json(json!({ "trip_id": trip_id }))).into_response(),
        Err(error) => plan_error_response(error),
    }
}

async fn get_trip(State(state): State<ApiState>, Path(trip_id): Path<String>) -> Response {
    match state.planner.get_trip(&trip_id).await {
        Ok(trip) => (StatusCode::OK, Json(trip)).into_response(),
        Err(error) => plan_error_response(error),
    }
}

async fn regenerate_day(
    State(state): State<ApiState>,
    Path(trip_id): Path<String>,
    Json(input): Json<RegenerateDayRequest>,
) -> Response {
    match state.planner.regenerate_day(&trip_id, input.day).await {
        Ok(updated_day) => (
            StatusCode::OK,
            Json(json!({
                "message": format!("Day {} regenerated successfully", updated_day.day),
                "updated_day": updated_day,
            })),
        )
            .into_response(),
        Err(error) => plan_error_response(error),
    }
}

async fn add_place(
    State(state): State<ApiState>,
    Path(trip_id): Path<String>,
    Json(place): Json<NewPlace>,
) -> Response {
    match state.planner.add_place(&trip_id, &place).await {
        Ok(places) => (
            StatusCode::CREATED,
            Json(json!({ "message": "Place added", "places": places })),
        )
            .into_response(),
        Err(error) => plan_error_response(error),
    }
}

/// Maps the planner taxonomy onto wire responses. Upstream and storage
/// details are logged here and never leak to the caller.
fn plan_error_response(error: PlanError) -> Response {
    match error {
        PlanError::Validation(problems) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Invalid input", "errors": problems })),
        )
            .into_response(),
        PlanError::BudgetTooLow { .. } => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": error.to_string() })),
        )
            .into_response(),
        PlanError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Trip not found" })),
        )
            .into_response(),
        PlanError::UpstreamOverloaded(detail) => {
            warn!(detail = %detail, "itinerary models overloaded");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "message": "AI is currently overloaded. Please try again in a few seconds."
                })),
            )
                .into_response()
        }
        PlanError::UpstreamFatal(detail) => {
            error!(detail = %detail, "itinerary provider failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "message": "Itinerary generation failed. Please try again." })),
            )
                .into_response()
        }
        PlanError::Persistence(source) => {
            error!(error = %source, "storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Internal server error" })),
            )
                .into_response()
        }
    }
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static("http://localhost:5173")]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}

fn is_public_endpoint(path: &str) -> bool {
    path == "/health"
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if header_key != state.api_key {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "unauthorized",
                "message": "missing or invalid x-api-key"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if !state.limiter.allow(&ip) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "rate_limited",
                "message": "rate limit exceeded for this IP"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
