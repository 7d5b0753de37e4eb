//! 인증 도메인 모델.
//!
//! - [`role`]: 정규화된 역할 집합과 접근 판정
//! - [`user`]: 사용자 레코드와 공개 프로필
//! - [`session`]: Refresh 세션

pub mod role;
pub mod session;
pub mod user;

pub use role::{authorize, can_access, can_access_all, MatchMode, RoleSet, BYPASS_ROLES};
pub use session::{ClientMeta, NewSession, RefreshSession, SessionState};
pub use user::{PublicProfile, UserRecord, DEFAULT_LOCALE, SUPPORTED_LOCALES};
