//! 路由与中间件

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use cardgate_telemetry::PrometheusHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::handlers;
use crate::application::handlers::{
    CreateCardHandler, GetCardStatusHandler, RequestOtpHandler, VerifyOtpHandler,
};
use crate::domain::services::CardActivationService;
use crate::infrastructure::health::HealthIndicator;

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub create_card: Arc<CreateCardHandler>,
    pub request_otp: Arc<RequestOtpHandler>,
    pub verify_otp: Arc<VerifyOtpHandler>,
    pub card_status: Arc<GetCardStatusHandler>,
    pub health_checks: Arc<Vec<Arc<dyn HealthIndicator>>>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(service: Arc<CardActivationService>) -> Self {
        Self {
            create_card: Arc::new(CreateCardHandler::new(service.clone())),
            request_otp: Arc::new(RequestOtpHandler::new(service.clone())),
            verify_otp: Arc::new(VerifyOtpHandler::new(service.clone())),
            card_status: Arc::new(GetCardStatusHandler::new(service)),
            health_checks: Arc::new(Vec::new()),
            metrics: None,
        }
    }

    pub fn with_health_checks(mut self, checks: Vec<Arc<dyn HealthIndicator>>) -> Self {
        self.health_checks = Arc::new(checks);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// HTTP 层配置
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub cors_allowed_origins: Vec<String>,
    pub request_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            cors_allowed_origins: vec!["http://localhost:8081".to_string()],
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&cardgate_config::ServerConfig> for HttpOptions {
    fn from(config: &cardgate_config::ServerConfig) -> Self {
        Self {
            cors_allowed_origins: config.cors_allowed_origins.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// 构建完整路由
pub fn build_router(state: AppState, options: &HttpOptions) -> Router {
    let api = Router::new()
        .route("/cards/create", post(handlers::create_card))
        .route("/cards/request-otp", post(handlers::request_otp))
        .route("/cards/verify", post(handlers::verify_otp))
        .route("/cards/{token}/status", get(handlers::card_status));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(TimeoutLayer::new(options.request_timeout))
        .layer(cors_layer(&options.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
}
