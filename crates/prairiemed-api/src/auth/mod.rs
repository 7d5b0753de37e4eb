//! 인증 및 권한 부여.
//!
//! JWT 기반 인증, Refresh Token 회전, 역할 기반 접근 제어(RBAC)를 제공합니다.
//!
//! # 구성 요소
//!
//! - [`password`]: Argon2id 검증과 레거시 평문 비밀번호 마이그레이션
//! - [`TokenService`]: Access/Refresh Token 발급 및 검증 (HS256, JWKS 기반 RS256)
//! - [`AuthService`]: 로그인, 갱신, 로그아웃, 내 정보 조회
//! - [`Capability`]: 이름 붙은 허용 역할 목록
//! - [`Authenticated`], [`Authorized`], [`route_gate`]: Axum 라우트 게이트
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn protected_handler(Authenticated(caller): Authenticated) -> impl IntoResponse {
//!     format!("Hello, {}!", caller.user_id)
//! }
//! ```

pub mod cookies;
mod error;
mod jwks;
mod jwt;
mod middleware;
pub mod password;
mod roles;
mod service;

pub use cookies::{Cookie, SetCookies};
pub use error::AuthError;
pub use jwks::JwksCache;
pub use jwt::{
    AccessClaims, Audience, IssuedRefreshToken, JwtError, RefreshClaims, TokenService,
    ACCESS_TOKEN_TYPE, REFRESH_TOKEN_TYPE,
};
pub use middleware::{
    bearer_token, require_capability, require_roles, route_gate, AuthContext, Authenticated,
    Authorized, DeletePatient, EditConsents, EditInsurance, EditPatient, ManageSessions,
    RequiredCapability, ViewConsents, ViewInsurance, ViewPatient,
};
pub use password::{hash_password, verify_or_migrate, PasswordCheck, PasswordError};
pub use roles::Capability;
pub use service::{AuthService, LoginOutcome, RefreshOutcome, UserView};
