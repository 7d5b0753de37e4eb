//! tracing 기반 로깅 초기화.
//!
//! `[logging]` 설정의 형식 문자열에 따라 출력 레이어를 고릅니다.
//! - **pretty**: 개발용
//! - **json**: 운영 환경 로그 수집용
//! - **compact**: 한 줄 형식
//!
//! 비밀번호, 서명 키, 토큰 원문은 어떤 레벨에서도 필드로 기록하지 않습니다.

use tracing::Subscriber;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// 레벨 필터 (예: "info,prairiemed_api=debug"). 비어 있으면 "info"
    pub level: String,
    pub format: LogFormat,
    /// 파일명과 줄 번호 포함 여부
    pub include_location: bool,
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// 애플리케이션 설정의 `[logging]` 섹션에서 생성합니다.
    ///
    /// 알 수 없는 형식 문자열은 pretty로 처리합니다.
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        Self {
            level: settings.level.clone(),
            format: settings.format.parse().unwrap_or_default(),
            include_location: settings.include_location,
        }
    }

    /// `RUST_LOG`가 있으면 그것을, 없으면 설정된 레벨을 사용한다.
    fn env_filter(&self) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
        let level = if self.level.trim().is_empty() {
            "info"
        } else {
            self.level.as_str()
        };
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_target(true);

        match self.format {
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
        }
    }
}

/// 주어진 설정으로 전역 subscriber를 설치합니다.
///
/// ```no_run
/// use prairiemed_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("debug").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(config.fmt_layer())
        .try_init()?;

    tracing::info!(format = ?config.format, level = %config.level, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_config_from_settings() {
        let settings = LoggingConfig {
            level: "prairiemed_api=debug".to_string(),
            format: "json".to_string(),
            include_location: true,
        };
        let config = LogConfig::from_settings(&settings);
        assert_eq!(config.level, "prairiemed_api=debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.include_location);

        let unknown = LoggingConfig {
            format: "fancy".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(LogConfig::from_settings(&unknown).format, LogFormat::Pretty);
    }

    #[test]
    fn test_blank_level_builds_a_filter() {
        assert!(LogConfig::new("   ").env_filter().is_ok());
        assert!(LogConfig::default().env_filter().is_ok());
    }
}
