//! # PrairieMed Core
//!
//! PrairieMed 인증 게이트웨이의 공통 타입을 제공합니다.
//!
//! 이 크레이트는 API 서버가 사용하는 기본 구성 요소를 제공합니다:
//! - 설정 관리 (`AppConfig`, `AuthConfig`)
//! - 로깅 인프라
//! - 인증 도메인 모델 (사용자, 세션, 역할 집합)
//! - 역할 기반 접근 판정 (`can_access`, `can_access_all`)

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
