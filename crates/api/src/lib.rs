//! Bin Telemetry Dashboard API Server
//!
//! REST API and server-sent event stream for the waste-bin dashboard.

use alerting::{AlertError, AlertEvaluator, AlertWorker, NotificationLog, UserSettings};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use feed::SubscriptionHub;
use insights::{GeminiSummarizer, InsightError};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use telemetry::{seed_bins, Clock, ExportError, StoreError, SystemClock, TelemetryStore};
use thiserror::Error;
use tokio::sync::watch;
use tower_governor::GovernorLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod rate_limit;
mod routes;

pub use config::{DashboardConfig, ServerConfig};
pub use rate_limit::{create_governor_config, RateLimitConfig};

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Settings(#[from] AlertError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Insight(#[from] InsightError),
    #[error("Notification not found: {0}")]
    NotificationNotFound(String),
    #[error("Invalid rate limit: {0}")]
    InvalidRateLimit(String),
    #[error("Metrics recorder error: {0}")]
    Metrics(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::NotFound(_)) | ApiError::NotificationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Store(StoreError::InvalidLocation(_)) | ApiError::Settings(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub hub: Arc<SubscriptionHub>,
    pub notifications: Arc<NotificationLog>,
    /// Current settings; the alert worker holds a receiver
    pub settings: watch::Sender<UserSettings>,
    pub summarizer: GeminiSummarizer,
    pub metrics: PrometheusHandle,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        hub: Arc<SubscriptionHub>,
        notifications: Arc<NotificationLog>,
        settings: watch::Sender<UserSettings>,
        summarizer: GeminiSummarizer,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            hub,
            notifications,
            settings,
            summarizer,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Seed the store and wire every component from configuration
    pub fn from_config(config: &DashboardConfig, metrics: PrometheusHandle) -> Result<Self, ApiError> {
        config.settings.validate()?;
        config.alerts.validate()?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut rng = StdRng::from_entropy();
        let bins = seed_bins(&config.bins, clock.now(), &mut rng);
        let store = TelemetryStore::new(bins, clock, rng, config.tick.clone());
        let hub = SubscriptionHub::new(Arc::new(store), config.driver.clone());

        let (settings, _) = watch::channel(config.settings.clone());
        let summarizer = GeminiSummarizer::from_config(config.insights.clone())?;

        Ok(Self::new(
            hub,
            Arc::new(NotificationLog::new()),
            settings,
            summarizer,
            metrics,
        ))
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
    pub metrics: SystemMetrics,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub simulation: ComponentHealth,
    pub summarizer: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub detail: Option<String>,
}

/// System metrics
#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    pub bin_count: usize,
    pub snapshot_version: u64,
    pub tick_count: u64,
    pub subscriber_count: usize,
    pub unread_notifications: usize,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>, rate_limit: &RateLimitConfig) -> Result<Router, ApiError> {
    let location = if rate_limit.enabled {
        let config = create_governor_config(rate_limit)?;
        put(routes::bins::update_location).layer(GovernorLayer { config })
    } else {
        put(routes::bins::update_location)
    };

    Ok(Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/bins", get(routes::bins::list_bins))
        .route("/api/v1/bins/stream", get(routes::bins::stream_bins))
        .route("/api/v1/bins/:id", get(routes::bins::get_bin))
        .route("/api/v1/bins/:id/location", location)
        .route("/api/v1/bins/:id/export", get(routes::bins::export_bin))
        .route("/api/v1/bins/:id/analysis", post(routes::bins::analyze))
        .route(
            "/api/v1/notifications",
            get(routes::notifications::list).delete(routes::notifications::clear_all),
        )
        .route("/api/v1/notifications/:id/read", post(routes::notifications::mark_read))
        .route("/api/v1/notifications/:id", delete(routes::notifications::dismiss))
        .route(
            "/api/v1/settings",
            get(routes::settings::get_settings).put(routes::settings::update_settings),
        )
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.hub.store().snapshot();
    let driver = state.hub.driver();

    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            simulation: ComponentHealth {
                status: if driver.is_running() { "running" } else { "idle" }.to_string(),
                detail: Some(format!("every {} ms", driver.config().tick_period_ms)),
            },
            summarizer: ComponentHealth {
                status: if state.summarizer.has_credentials() { "ok" } else { "unconfigured" }.to_string(),
                detail: None,
            },
        },
        metrics: SystemMetrics {
            bin_count: snapshot.len(),
            snapshot_version: snapshot.version(),
            tick_count: driver.tick_count(),
            subscriber_count: state.hub.subscriber_count(),
            unread_notifications: state.notifications.unread_count(),
        },
    };

    Json(response)
}

/// Prometheus scrape endpoint
async fn metrics_handler(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    (StatusCode::OK, state.metrics.render())
}

/// Initialize logging
pub fn init_logging(server: &ServerConfig) -> anyhow::Result<()> {
    let level: Level = server.log_level.parse().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    if server.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Run the server until it fails
pub async fn run_server(config: DashboardConfig) -> anyhow::Result<()> {
    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ApiError::Metrics(e.to_string()))?;
    let state = Arc::new(AppState::from_config(&config, metrics)?);

    // The worker's subscription also starts the simulation driver
    let evaluator = AlertEvaluator::new(config.alerts.clone(), state.hub.store().clock().clone());
    AlertWorker::new(evaluator, state.settings.subscribe(), state.notifications.clone())
        .spawn(state.hub.subscribe());

    let app = create_router(state, &config.rate_limit)?;

    info!("Starting API server on {}", config.server.addr);

    let listener = tokio::net::TcpListener::bind(&config.server.addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{AlertConfig, UserSettings};
    use axum::body::{to_bytes, Body};
    use axum::extract::ConnectInfo;
    use axum::http::{Method, Request};
    use chrono::TimeZone;
    use feed::DriverConfig;
    use futures::StreamExt;
    use insights::{InsightsConfig, MISSING_API_KEY};
    use serde_json::Value;
    use telemetry::{default_seeds, ManualClock, TickConfig};
    use tower::ServiceExt;

    fn test_state() -> (Arc<AppState>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap()));
        let bins = seed_bins(&default_seeds(), clock.now(), &mut StdRng::seed_from_u64(1));
        let tick = TickConfig {
            write_latency_ms: 0,
            ..Default::default()
        };
        let store = TelemetryStore::new(bins, clock.clone(), StdRng::seed_from_u64(2), tick);
        let hub = SubscriptionHub::new(Arc::new(store), DriverConfig::default());
        let (settings, _) = watch::channel(UserSettings::default());
        let summarizer = GeminiSummarizer::with_api_key(InsightsConfig::default(), None).unwrap();
        let metrics = PrometheusBuilder::new().build_recorder().handle();

        let state = AppState::new(hub, Arc::new(NotificationLog::new()), settings, summarizer, metrics);
        (Arc::new(state), clock)
    }

    fn app(state: &Arc<AppState>) -> Router {
        create_router(state.clone(), &RateLimitConfig::strict()).unwrap()
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let mut request = builder.body(body).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
        request
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = test_state();
        let (status, body) = send(&app(&state), request(Method::GET, "/api/v1/health", None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["metrics"]["bin_count"], 3);
        assert_eq!(body["components"]["simulation"]["status"], "idle");
        assert_eq!(body["components"]["summarizer"]["status"], "unconfigured");
    }

    #[tokio::test]
    async fn test_list_and_get_bins() {
        let (state, _) = test_state();
        let app = app(&state);

        let (status, body) = send(&app, request(Method::GET, "/api/v1/bins", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], 0);
        let bins = body["bins"].as_array().unwrap();
        assert_eq!(bins.len(), 3);
        assert_eq!(bins[0]["id"], "bin_001");
        assert!(bins[0]["fillPercentage"].as_u64().unwrap() <= 80);
        assert_eq!(bins[0]["distanceUnit"], "cm");

        let (status, body) = send(&app, request(Method::GET, "/api/v1/bins/bin_002", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Office Paper");
        assert_eq!(body["history"].as_array().unwrap().len(), 25);

        let (status, _) = send(&app, request(Method::GET, "/api/v1/bins/bin_999", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_inches_follow_settings() {
        let (state, _) = test_state();
        state.settings.send_modify(|s| s.unit = alerting::DistanceUnit::In);

        let (_, body) = send(&app(&state), request(Method::GET, "/api/v1/bins/bin_001", None)).await;
        let cm = body["currentDistanceCm"].as_f64().unwrap();
        let shown = body["displayDistance"].as_f64().unwrap();
        assert_eq!(body["distanceUnit"], "in");
        assert!((shown - cm / 2.54).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_update_location() {
        let (state, _) = test_state();
        let app = app(&state);
        let mut sub = state.hub.subscribe();
        sub.try_recv().unwrap();

        let (status, body) = send(
            &app,
            request(
                Method::PUT,
                "/api/v1/bins/bin_001/location",
                Some(json!({ "location": "Building D, Lobby" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["location"], "Building D, Lobby");
        assert_eq!(
            state.hub.store().snapshot().get("bin_001").unwrap().location,
            "Building D, Lobby"
        );
        // Listeners see the write
        assert_eq!(sub.recv().await.unwrap().get("bin_001").unwrap().location, "Building D, Lobby");

        let (status, _) = send(
            &app,
            request(
                Method::PUT,
                "/api/v1/bins/bin_001/location",
                Some(json!({ "location": "x".repeat(50) })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_location_writes_are_rate_limited() {
        let (state, _) = test_state();
        let app = app(&state);
        let write = || {
            request(
                Method::PUT,
                "/api/v1/bins/bin_404/location",
                Some(json!({ "location": "Annex" })),
            )
        };

        // Burst of two under the strict config
        assert_eq!(send(&app, write()).await.0, StatusCode::NOT_FOUND);
        assert_eq!(send(&app, write()).await.0, StatusCode::NOT_FOUND);
        assert_eq!(send(&app, write()).await.0, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_export_csv() {
        let (state, _) = test_state();
        let response = app(&state)
            .oneshot(request(Method::GET, "/api/v1/bins/bin_003/export", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/csv; charset=utf-8");
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=\"Cafeteria_Organic_history.csv\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("Timestamp,Date,Time,Distance (cm),Fill Percentage (%)\n"));
        assert_eq!(text.lines().count(), 26);
    }

    #[tokio::test]
    async fn test_analysis_without_key_falls_back() {
        let (state, _) = test_state();
        let app = app(&state);

        let (status, body) = send(&app, request(Method::POST, "/api/v1/bins/bin_001/analysis", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["binId"], "bin_001");
        assert_eq!(body["summary"], MISSING_API_KEY);

        let (status, _) = send(&app, request(Method::POST, "/api/v1/bins/nope/analysis", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notification_lifecycle() {
        let (state, clock) = test_state();
        let app = app(&state);
        state.settings.send_modify(|s| s.full_threshold = 0);

        let mut worker = AlertWorker::new(
            AlertEvaluator::new(AlertConfig::default(), clock),
            state.settings.subscribe(),
            state.notifications.clone(),
        );
        assert_eq!(worker.process(&state.hub.store().snapshot()), 3);

        let (status, body) = send(&app, request(Method::GET, "/api/v1/notifications", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 3);
        assert_eq!(body["unreadCount"], 3);
        let id = body["data"][0]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"][0]["type"], "warning");

        let read = format!("/api/v1/notifications/{}/read", id);
        assert_eq!(send(&app, request(Method::POST, &read, None)).await.0, StatusCode::NO_CONTENT);
        assert_eq!(state.notifications.unread_count(), 2);

        let one = format!("/api/v1/notifications/{}", id);
        assert_eq!(send(&app, request(Method::DELETE, &one, None)).await.0, StatusCode::NO_CONTENT);
        assert_eq!(send(&app, request(Method::DELETE, &one, None)).await.0, StatusCode::NOT_FOUND);
        assert_eq!(
            send(&app, request(Method::POST, "/api/v1/notifications/missing/read", None)).await.0,
            StatusCode::NOT_FOUND
        );

        assert_eq!(
            send(&app, request(Method::DELETE, "/api/v1/notifications", None)).await.0,
            StatusCode::NO_CONTENT
        );
        assert!(state.notifications.is_empty());
    }

    #[tokio::test]
    async fn test_settings_roundtrip_and_validation() {
        let (state, _) = test_state();
        let app = app(&state);

        let (status, body) = send(&app, request(Method::GET, "/api/v1/settings", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fullThreshold"], 80);
        assert_eq!(body["notificationsEnabled"], true);

        let (status, body) = send(
            &app,
            request(
                Method::PUT,
                "/api/v1/settings",
                Some(json!({ "darkMode": true, "unit": "in", "fullThreshold": 90 })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fullThreshold"], 90);
        assert_eq!(body["emptyThreshold"], 20);
        assert!(state.settings.borrow().dark_mode);

        let (status, _) = send(
            &app,
            request(Method::PUT, "/api/v1/settings", Some(json!({ "fullThreshold": 150 }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.settings.borrow().full_threshold, 90);
    }

    #[tokio::test]
    async fn test_stream_sends_current_snapshot_first() {
        let (state, _) = test_state();
        let response = app(&state)
            .oneshot(request(Method::GET, "/api/v1/bins/stream", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.hub.subscriber_count(), 1);

        let mut body = response.into_body().into_data_stream();
        let chunk = body.next().await.unwrap().unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(text.contains("event: snapshot"));
        assert!(text.contains("\"version\":0"));

        drop(body);
        assert_eq!(state.hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (state, _) = test_state();
        let response = app(&state)
            .oneshot(request(Method::GET, "/metrics", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_from_config_rejects_out_of_range_cooldown() {
        let mut config = DashboardConfig::default();
        config.alerts.cooldown_secs = u64::MAX;
        let metrics = PrometheusBuilder::new().build_recorder().handle();

        assert!(matches!(
            AppState::from_config(&config, metrics),
            Err(ApiError::Settings(AlertError::InvalidCooldown(u64::MAX)))
        ));
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError::from(StoreError::NotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::InvalidLocation("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StoreError::Backend("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
