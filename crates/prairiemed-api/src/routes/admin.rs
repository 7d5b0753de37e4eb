//! 관리 endpoint.
//!
//! - `GET /api/v1/admin/capabilities` - 호출자가 가진 권한 목록
//! - `POST /api/v1/admin/users/{user_id}/sessions/revoke` - 사용자 세션 일괄 폐기

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{Authenticated, Authorized, Capability, ManageSessions};
use crate::error::{ApiErrorResponse, ApiResult};
use crate::state::AppState;

/// 호출자 권한 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CapabilitiesResponse {
    pub user_id: Uuid,
    pub roles: Vec<String>,
    /// 허용된 권한 이름 (예: `VIEW_PATIENT`)
    pub capabilities: Vec<String>,
}

/// 세션 폐기 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RevokeSessionsResponse {
    pub user_id: Uuid,
    /// 이번 요청으로 폐기된 세션 수
    pub revoked: u64,
}

/// 호출자가 가진 권한 목록.
#[utoipa::path(
    get,
    path = "/api/v1/admin/capabilities",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "권한 목록", body = CapabilitiesResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse)
    )
)]
pub async fn my_capabilities(Authenticated(caller): Authenticated) -> Json<CapabilitiesResponse> {
    let capabilities = Capability::ALL
        .iter()
        .filter(|c| c.permits(&caller.roles))
        .map(|c| c.name().to_string())
        .collect();

    Json(CapabilitiesResponse {
        user_id: caller.user_id,
        roles: caller.roles.to_vec(),
        capabilities,
    })
}

/// 사용자의 모든 활성 세션 폐기.
///
/// 이미 폐기된 세션은 세지 않으므로 두 번째 호출은 `revoked: 0`입니다.
#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{user_id}/sessions/revoke",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("user_id" = Uuid, Path, description = "대상 사용자 ID")),
    responses(
        (status = 200, description = "폐기 완료", body = RevokeSessionsResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 403, description = "MANAGE_SESSIONS 권한 없음", body = ApiErrorResponse)
    )
)]
pub async fn revoke_user_sessions(
    State(state): State<Arc<AppState>>,
    Authorized(caller, ..): Authorized<ManageSessions>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<RevokeSessionsResponse>> {
    let revoked = state.auth.revoke_user_sessions(&caller, user_id).await?;
    Ok(Json(RevokeSessionsResponse { user_id, revoked }))
}

/// 관리 라우터 생성.
pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/capabilities", get(my_capabilities))
        .route("/users/{user_id}/sessions/revoke", post(revoke_user_sessions))
}
