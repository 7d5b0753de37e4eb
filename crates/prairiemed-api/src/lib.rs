//! PrairieMed 인증 게이트웨이.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API (로그인, 토큰 갱신, 로그아웃, 내 정보)
//! - Access/Refresh JWT 발급과 Refresh Token 회전
//! - 역할 기반 라우트 게이트
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 비밀번호, 토큰, 세션, 권한
//! - [`repository`]: 자격증명/세션 저장소
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, Router};
use prairiemed_core::ServerConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use auth::{AuthError, AuthService, Authenticated, Authorized, Capability, TokenService};
pub use error::{ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use routes::create_api_router;
pub use state::AppState;

#[cfg(test)]
pub use state::create_test_state;

/// CORS 미들웨어 구성.
///
/// origin 목록이 비어 있으면 개발 모드로 간주하여 모든 origin을 허용하고,
/// 이때는 자격 증명(쿠키)을 허용하지 않습니다.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<_> = origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let (allow_origin, credentials) = if parsed.is_empty() {
        if !origins.is_empty() {
            warn!("server.cors_origins contains no valid origins, allowing any");
        }
        (AllowOrigin::any(), false)
    } else {
        info!("CORS configured with {} allowed origins", parsed.len());
        (AllowOrigin::list(parsed), true)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(credentials)
        .max_age(Duration::from_secs(3600))
}

/// 전체 애플리케이션 라우터 생성 (`/metrics` 제외).
pub fn create_router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    create_api_router(state.clone())
        .with_state(state)
        // OpenAPI 문서 및 Swagger UI
        .merge(openapi::swagger_ui_router())
        // 메트릭 미들웨어 (모든 요청에 적용)
        .layer(axum::middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(server.request_timeout_secs),
        ))
        .layer(cors_layer(&server.cors_origins))
}
