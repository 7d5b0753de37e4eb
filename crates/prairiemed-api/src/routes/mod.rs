//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/v1/auth` - 로그인, 토큰 갱신, 로그아웃, 내 정보
//! - `/api/v1/admin` - 권한 조회, 세션 관리

pub mod admin;
pub mod auth;
pub mod health;

pub use admin::{admin_router, CapabilitiesResponse, RevokeSessionsResponse};
pub use auth::{
    auth_router, ClientInfo, LoginRequest, LoginResponse, LogoutResponse, MeResponse,
    RefreshRequest, RefreshResponse,
};
pub use health::{health_router, ComponentStatus, HealthResponse};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
///
/// 게이트 미들웨어가 상태를 필요로 하므로 상태를 받습니다.
pub fn create_api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        // 헬스 체크 엔드포인트
        .nest("/health", health_router())
        // API v1 엔드포인트
        .nest("/api/v1/auth", auth_router(state))
        .nest("/api/v1/admin", admin_router())
}
