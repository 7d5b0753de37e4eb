//! 코어 에러 타입.

use thiserror::Error;

/// 코어 에러.
///
/// 시작 시점의 설정 문제만 다루며, 어느 쪽이든 프로세스를 띄우지 않습니다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 값 검증 실패
    #[error("설정 에러: {0}")]
    Config(String),

    /// 설정 소스 로드 실패
    #[error("설정 로드 실패: {0}")]
    ConfigSource(#[from] config::ConfigError),
}

/// 코어 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;
