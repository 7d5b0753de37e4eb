//! Axum용 라우트 게이트.
//!
//! 요청마다 Access Token을 검증하고 호출자 정보를 요청 확장에 붙입니다.
//! 권한 목록이 선언된 작업은 [`Capability`]로 역할을 확인합니다.
//! 이 단계는 세션 저장소를 건드리지 않습니다.
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn list_patients(Authorized(caller, ..): Authorized<ViewPatient>) -> impl IntoResponse {
//!     format!("caller {} may view patients", caller.user_id)
//! }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prairiemed_core::{authorize, MatchMode, RoleSet};
use tracing::{debug, error};
use uuid::Uuid;

use super::cookies::{read_cookie, ACCESS_COOKIE};
use super::error::AuthError;
use super::jwt::JwtError;
use super::roles::Capability;
use crate::state::AppState;

/// 검증된 호출자 정보.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub roles: RoleSet,
}

/// `Authorization: Bearer` 헤더, 없으면 `access_token` 쿠키에서 토큰을 꺼냅니다.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            scheme
                .eq_ignore_ascii_case("bearer")
                .then(|| token.trim().to_string())
        })
        .filter(|token| !token.is_empty());

    from_header.or_else(|| read_cookie(headers, ACCESS_COOKIE))
}

/// 토큰을 검증해 호출자 정보를 만듭니다.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::Unauthenticated)?;

    let claims = state
        .auth
        .tokens()
        .verify_access_token(&token)
        .await
        .map_err(|e| {
            match &e {
                JwtError::KeySetUnavailable(_) => error!(error = %e, "Access token check failed"),
                _ => debug!(error = %e, "Access token rejected"),
            }
            AuthError::Unauthenticated
        })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::Unauthenticated)?;
    Ok(AuthContext {
        user_id,
        roles: claims.role_set(),
        email: claims.email,
    })
}

/// 인증 미들웨어.
///
/// 토큰을 검증하고 [`AuthContext`]를 요청 확장에 넣습니다. 실패하면 401.
pub async fn route_gate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// 인증 추출기.
///
/// 게이트 미들웨어가 이미 검증했다면 그 결과를 재사용합니다.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthContext);

impl<S> FromRequestParts<S> for Authenticated
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<AuthContext>() {
            return Ok(Authenticated(context.clone()));
        }

        let app = Arc::<AppState>::from_ref(state);
        let context = authenticate(&app, &parts.headers).await?;
        parts.extensions.insert(context.clone());
        Ok(Authenticated(context))
    }
}

/// 라우트가 요구하는 권한.
pub trait RequiredCapability: Send + Sync + 'static {
    const CAPABILITY: Capability;
}

/// 호출자 역할이 권한을 만족하는지 확인. 부족하면 `Forbidden`.
pub fn require_capability(capability: Capability, caller: &AuthContext) -> Result<(), AuthError> {
    if capability.permits(&caller.roles) {
        Ok(())
    } else {
        debug!(
            user_id = %caller.user_id,
            capability = capability.name(),
            roles = %caller.roles,
            "Access denied"
        );
        Err(AuthError::Forbidden)
    }
}

/// 임의의 허용 역할 목록으로 확인합니다.
pub fn require_roles(
    caller: &AuthContext,
    allowed: &RoleSet,
    mode: MatchMode,
) -> Result<(), AuthError> {
    if authorize(&caller.roles, allowed, mode) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// 권한 추출기. 인증 실패는 401, 권한 부족은 403.
#[derive(Debug, Clone)]
pub struct Authorized<C: RequiredCapability>(pub AuthContext, pub PhantomData<C>);

impl<S, C> FromRequestParts<S> for Authorized<C>
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
    C: RequiredCapability,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(context) = Authenticated::from_request_parts(parts, state).await?;
        require_capability(C::CAPABILITY, &context)?;
        Ok(Authorized(context, PhantomData))
    }
}

macro_rules! capability_markers {
    ($($(#[$doc:meta])* $marker:ident => $capability:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy)]
            pub struct $marker;

            impl RequiredCapability for $marker {
                const CAPABILITY: Capability = Capability::$capability;
            }
        )*
    };
}

capability_markers! {
    /// 환자 조회
    ViewPatient => ViewPatient,
    /// 환자 수정
    EditPatient => EditPatient,
    /// 환자 삭제
    DeletePatient => DeletePatient,
    /// 보험 조회
    ViewInsurance => ViewInsurance,
    /// 보험 수정
    EditInsurance => EditInsurance,
    /// 동의서 조회
    ViewConsents => ViewConsents,
    /// 동의서 수정
    EditConsents => EditConsents,
    /// 세션 관리
    ManageSessions => ManageSessions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn context(roles: &[&str]) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            email: None,
            roles: roles.iter().collect(),
        }
    }

    #[test]
    fn test_bearer_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("access_token=from-cookie"),
        );
        assert_eq!(bearer_token(&headers).as_deref(), Some("from-cookie"));

        // 헤더가 쿠키보다 우선
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer from-header"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("from-header"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(bearer_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_require_capability() {
        assert!(require_capability(Capability::DeletePatient, &context(&["himmanager"])).is_ok());
        assert_eq!(
            require_capability(Capability::DeletePatient, &context(&["nurse"])),
            Err(AuthError::Forbidden)
        );
        assert!(require_capability(Capability::ManageSessions, &context(&["OrgAdmin"])).is_ok());
    }

    #[test]
    fn test_require_roles_all_of() {
        let required: RoleSet = ["doctor", "chargenurse"].iter().collect();
        assert!(require_roles(&context(&["doctor", "chargenurse"]), &required, MatchMode::AllOf).is_ok());
        assert!(require_roles(&context(&["doctor"]), &required, MatchMode::AllOf).is_err());
        assert!(require_roles(&context(&["doctor"]), &required, MatchMode::AnyOf).is_ok());
    }

    #[test]
    fn test_markers_map_to_capabilities() {
        assert_eq!(ManageSessions::CAPABILITY, Capability::ManageSessions);
        assert_eq!(ViewConsents::CAPABILITY, Capability::ViewConsents);
    }
}
