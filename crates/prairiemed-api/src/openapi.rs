//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::UserView;
use crate::error::ApiErrorResponse;
use crate::routes::{
    CapabilitiesResponse, ComponentStatus, HealthResponse, LoginRequest, LoginResponse,
    LogoutResponse, MeResponse, RefreshRequest, RefreshResponse, RevokeSessionsResponse,
};

/// `bearer_auth` 보안 스키마 등록.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

// ==================== OpenAPI 문서 정의 ====================

/// PrairieMed 인증 API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "PrairieMed Auth API",
        version = "0.1.0",
        description = r#"
# PrairieMed 관리자 인증 API

병원 관리 콘솔의 로그인, 세션, 역할 기반 접근 제어를 담당합니다.

## 토큰

- **Access Token**: 15분, `Authorization: Bearer <token>` 또는 `access_token` 쿠키
- **Refresh Token**: 30일, `refresh_token` HttpOnly 쿠키. 한 번 사용하면 회전됩니다.

이미 사용된 Refresh Token을 다시 제시하면 `SESSION_REVOKED`로 거부됩니다.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    servers(
        (url = "http://localhost:4000", description = "로컬 개발 서버"),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 로그인, 토큰 갱신, 로그아웃"),
        (name = "admin", description = "관리 - 권한 조회, 세션 폐기")
    ),
    // ==================== 스키마 등록 ====================
    components(
        schemas(
            // ===== Health =====
            HealthResponse,
            ComponentStatus,

            // ===== Common =====
            ApiErrorResponse,

            // ===== Auth =====
            LoginRequest,
            LoginResponse,
            RefreshRequest,
            RefreshResponse,
            LogoutResponse,
            MeResponse,
            UserView,

            // ===== Admin =====
            CapabilitiesResponse,
            RevokeSessionsResponse,
        )
    ),
    // ==================== 경로 등록 ====================
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::logout,
        crate::routes::auth::me,

        // ===== Admin =====
        crate::routes::admin::my_capabilities,
        crate::routes::admin::revoke_user_sessions,
    )
)]
pub struct ApiDoc;

// ==================== Swagger UI 라우터 ====================

/// Swagger UI 라우터 생성.
///
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_valid() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&spec).unwrap();

        assert!(json.contains("PrairieMed Auth API"));

        assert!(json.contains("/health/ready"));
        assert!(json.contains("/api/v1/auth/login"));
        assert!(json.contains("/api/v1/auth/refresh"));
        assert!(json.contains("/api/v1/auth/logout"));
        assert!(json.contains("/api/v1/auth/me"));
        assert!(json.contains("/api/v1/admin/users/{user_id}/sessions/revoke"));
    }

    #[test]
    fn test_openapi_registers_bearer_scheme() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("bearer_auth"));
        assert!(json.contains("LoginRequest"));
        assert!(json.contains("ApiErrorResponse"));
    }

    #[test]
    fn test_refresh_and_logout_document_optional_body() {
        let spec = serde_json::to_value(ApiDoc::openapi()).unwrap();
        for path in ["/api/v1/auth/refresh", "/api/v1/auth/logout"] {
            let schema = &spec["paths"][path]["post"]["requestBody"]["content"]["application/json"]
                ["schema"]["$ref"];
            assert_eq!(
                schema.as_str(),
                Some("#/components/schemas/RefreshRequest"),
                "{path}"
            );
        }
    }

    #[test]
    fn test_swagger_ui_router_creates() {
        let _router: Router<()> = swagger_ui_router();
    }
}
