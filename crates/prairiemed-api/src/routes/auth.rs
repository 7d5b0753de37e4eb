//! 인증 endpoint.
//!
//! - `POST /api/v1/auth/login` - 로그인, 토큰 쿠키 발급
//! - `POST /api/v1/auth/refresh` - Refresh Token 회전
//! - `POST /api/v1/auth/logout` - 세션 폐기 (항상 성공)
//! - `GET /api/v1/auth/me` - 내 프로필과 역할

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prairiemed_core::ClientMeta;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::cookies::{read_cookie, REFRESH_COOKIE};
use crate::auth::{AuthError, Authenticated, Cookie, SetCookies, UserView};
use crate::error::{invalid_payload, ApiErrorResponse, ApiResult};
use crate::state::AppState;

// ==================== 요청/응답 타입 ====================

/// 로그인 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// 이메일 (대소문자 무시)
    #[validate(email)]
    pub email: String,
    /// 비밀번호 (6자 이상)
    #[validate(length(min = 6))]
    pub password: String,
}

/// Refresh/Logout 요청 본문. 쿠키가 없는 클라이언트용.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// 로그인 응답.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserView,
}

/// 토큰 갱신 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// 내 정보 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: UserView,
}

/// 로그아웃 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    pub ok: bool,
}

// ==================== 요청 메타데이터 ====================

/// 세션에 기록할 클라이언트 정보 추출기.
///
/// IP는 `X-Forwarded-For`의 첫 번째 값, 없으면 연결 주소를 사용합니다.
#[derive(Debug, Clone)]
pub struct ClientInfo(pub ClientMeta);

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty());

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let user_agent = parts
            .headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        Ok(ClientInfo(ClientMeta {
            ip: forwarded.or(peer),
            user_agent,
        }))
    }
}

/// `refresh_token` 쿠키, 없으면 본문의 `refreshToken`.
///
/// 본문은 선택이며 형식이 틀려도 무시합니다.
fn presented_refresh_token(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    read_cookie(headers, REFRESH_COOKIE).or_else(|| {
        serde_json::from_slice::<RefreshRequest>(body)
            .ok()
            .and_then(|req| req.refresh_token)
            .filter(|t| !t.is_empty())
    })
}

// ==================== 핸들러 ====================

/// 로그인.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공. access_token, refresh_token, pm_locale 쿠키 설정", body = LoginResponse),
        (status = 400, description = "요청 형식 오류", body = ApiErrorResponse),
        (status = 401, description = "자격증명 오류", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientInfo(meta): ClientInfo,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload.map_err(|e| {
        debug!(error = %e, "Malformed login body");
        invalid_payload(validator::ValidationErrors::new())
    })?;
    request.validate().map_err(invalid_payload)?;

    let outcome = state
        .auth
        .login(&request.email, &request.password, meta)
        .await?;

    let secure = state.secure_cookies;
    let cookies = SetCookies::new()
        .with(Cookie::refresh(
            &outcome.refresh.token,
            outcome.refresh.expires_at,
            secure,
        ))
        .with(Cookie::locale(&outcome.locale, secure))
        .with(Cookie::access(
            &outcome.access_token,
            state.auth.tokens().access_ttl_secs(),
            secure,
        ));

    Ok((
        cookies,
        Json(LoginResponse {
            access_token: outcome.access_token,
            user: outcome.user,
        }),
    )
        .into_response())
}

/// Refresh Token 회전.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body(content = RefreshRequest, description = "쿠키가 없을 때만 사용"),
    responses(
        (status = 200, description = "새 토큰 발급. 쿠키 갱신", body = RefreshResponse),
        (status = 401, description = "유효하지 않거나 폐기/만료된 Refresh Token", body = ApiErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ClientInfo(meta): ClientInfo,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let token = presented_refresh_token(&headers, &body).ok_or(AuthError::InvalidToken)?;

    let outcome = state.auth.refresh(&token, meta).await?;

    let secure = state.secure_cookies;
    let cookies = SetCookies::new()
        .with(Cookie::refresh(
            &outcome.refresh.token,
            outcome.refresh.expires_at,
            secure,
        ))
        .with(Cookie::access(
            &outcome.access_token,
            state.auth.tokens().access_ttl_secs(),
            secure,
        ));

    Ok((
        cookies,
        Json(RefreshResponse {
            access_token: outcome.access_token,
        }),
    )
        .into_response())
}

/// 로그아웃. 항상 `{ "ok": true }`.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    request_body(content = RefreshRequest, description = "쿠키가 없을 때만 사용. 생략 가능"),
    responses((status = 200, description = "토큰 쿠키 삭제", body = LogoutResponse))
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let token = presented_refresh_token(&headers, &body);
    state.auth.logout(token.as_deref()).await;

    (
        SetCookies::cleared(state.secure_cookies),
        Json(LogoutResponse { ok: true }),
    )
        .into_response()
}

/// 내 프로필과 현재 역할.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "프로필", body = MeResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse)
    )
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Json<MeResponse>> {
    let user = state.auth.me(&caller).await?;
    Ok(Json(MeResponse { user }))
}

/// 인증 라우터 생성.
///
/// `/me`는 게이트 미들웨어 뒤에 있습니다.
pub fn auth_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/me", get(me))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            crate::auth::route_gate,
        ));

    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .merge(protected)
}
