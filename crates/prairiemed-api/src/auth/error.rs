//! 인증/권한 에러.
//!
//! 클라이언트에는 네 가지 범주(자격증명 오류, 인증 실패, 권한 부족, 서버 오류)만
//! 드러나며 내부 상세는 서버 로그에만 남습니다.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::jwt::JwtError;
use crate::error::ApiErrorResponse;
use crate::repository::StoreError;

/// 인증 에러.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// 이메일 또는 비밀번호 불일치. 사용자 존재 여부를 드러내지 않습니다.
    #[error("이메일 또는 비밀번호가 올바르지 않습니다")]
    InvalidCredentials,
    /// 형식 오류, 서명 오류, 만료된 토큰
    #[error("유효하지 않은 토큰")]
    InvalidToken,
    /// 폐기되었거나 존재하지 않는 Refresh 세션 (재사용 의심)
    #[error("세션이 폐기되었습니다")]
    SessionRevoked,
    /// 만료된 Refresh 세션
    #[error("세션이 만료되었습니다")]
    SessionExpired,
    /// 토큰 없음 또는 검증 실패
    #[error("인증이 필요합니다")]
    Unauthenticated,
    /// 인증은 되었으나 역할 부족
    #[error("권한이 부족합니다")]
    Forbidden,
    /// 저장소 I/O 실패
    #[error("서버 내부 오류")]
    StoreUnavailable,
    /// 그 외 내부 오류
    #[error("서버 내부 오류")]
    Internal,
}

impl AuthError {
    /// HTTP 상태 코드.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::SessionRevoked
            | AuthError::SessionExpired
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::StoreUnavailable | AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 응답 에러 코드.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::SessionRevoked => "SESSION_REVOKED",
            AuthError::SessionExpired => "SESSION_EXPIRED",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::StoreUnavailable | AuthError::Internal => "INTERNAL_ERROR",
        }
    }

    /// 메트릭 레이블용 이름.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InvalidToken => "invalid_token",
            AuthError::SessionRevoked => "session_revoked",
            AuthError::SessionExpired => "session_expired",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Forbidden => "forbidden",
            AuthError::StoreUnavailable => "store_unavailable",
            AuthError::Internal => "internal",
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Encoding(_) => AuthError::Internal,
            _ => AuthError::InvalidToken,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(_: StoreError) -> Self {
        AuthError::StoreUnavailable
    }
}

impl From<AuthError> for (StatusCode, Json<ApiErrorResponse>) {
    fn from(err: AuthError) -> Self {
        (
            err.status(),
            Json(ApiErrorResponse::new(err.code(), err.to_string())),
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        <(StatusCode, Json<ApiErrorResponse>)>::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_responses() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidToken, StatusCode::UNAUTHORIZED),
            (AuthError::SessionRevoked, StatusCode::UNAUTHORIZED),
            (AuthError::SessionExpired, StatusCode::UNAUTHORIZED),
            (AuthError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AuthError::Forbidden, StatusCode::FORBIDDEN),
            (AuthError::StoreUnavailable, StatusCode::INTERNAL_SERVER_ERROR),
            (AuthError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_internal_errors_share_generic_shape() {
        let (_, Json(store)) = <(StatusCode, Json<ApiErrorResponse>)>::from(AuthError::StoreUnavailable);
        let (_, Json(internal)) = <(StatusCode, Json<ApiErrorResponse>)>::from(AuthError::Internal);
        assert_eq!(store.code, internal.code);
        assert_eq!(store.error, internal.error);
    }

    #[test]
    fn test_jwt_errors_map_to_invalid_token() {
        assert_eq!(AuthError::from(JwtError::Expired), AuthError::InvalidToken);
        assert_eq!(
            AuthError::from(JwtError::KeySetUnavailable("down".into())),
            AuthError::InvalidToken
        );
        assert_eq!(AuthError::from(StoreError::Timeout), AuthError::StoreUnavailable);
    }
}
