//! 인증 쿠키 전송.
//!
//! - `access_token`: HttpOnly, SameSite=Lax, Max-Age = Access TTL
//! - `refresh_token`: HttpOnly, SameSite=Lax, Expires = Refresh Token 만료 시각
//! - `pm_locale`: 클라이언트가 읽을 수 있는 로케일 쿠키 (1년)

use axum::http::{header::COOKIE, header::SET_COOKIE, HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use chrono::{DateTime, Utc};

use super::error::AuthError;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const LOCALE_COOKIE: &str = "pm_locale";

const LOCALE_MAX_AGE_SECS: i64 = 365 * 24 * 60 * 60;
const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// 요청의 `Cookie` 헤더에서 값을 찾습니다.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` 헤더 하나.
#[derive(Debug, Clone)]
pub struct Cookie {
    name: &'static str,
    value: String,
    http_only: bool,
    secure: bool,
    max_age: Option<i64>,
    expires: Option<String>,
}

impl Cookie {
    fn new(name: &'static str, value: impl Into<String>, secure: bool) -> Self {
        Self {
            name,
            value: value.into(),
            http_only: true,
            secure,
            max_age: None,
            expires: None,
        }
    }

    /// Access Token 쿠키.
    pub fn access(token: &str, max_age_secs: i64, secure: bool) -> Self {
        Self {
            max_age: Some(max_age_secs),
            ..Self::new(ACCESS_COOKIE, token, secure)
        }
    }

    /// Refresh Token 쿠키. 만료 시각은 토큰의 `exp`와 같습니다.
    pub fn refresh(token: &str, expires_at: DateTime<Utc>, secure: bool) -> Self {
        Self {
            expires: Some(expires_at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()),
            ..Self::new(REFRESH_COOKIE, token, secure)
        }
    }

    /// 로케일 쿠키. 클라이언트 스크립트가 읽을 수 있습니다.
    pub fn locale(locale: &str, secure: bool) -> Self {
        Self {
            http_only: false,
            max_age: Some(LOCALE_MAX_AGE_SECS),
            ..Self::new(LOCALE_COOKIE, locale, secure)
        }
    }

    /// 쿠키 삭제.
    pub fn cleared(name: &'static str, secure: bool) -> Self {
        Self {
            max_age: Some(0),
            expires: Some(EPOCH_EXPIRES.to_string()),
            ..Self::new(name, "", secure)
        }
    }

    fn header_value(&self) -> Result<HeaderValue, AuthError> {
        let mut cookie = format!("{}={}; Path=/; SameSite=Lax", self.name, self.value);
        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={}", max_age));
        }
        if let Some(expires) = &self.expires {
            cookie.push_str(&format!("; Expires={}", expires));
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).map_err(|_| AuthError::Internal)
    }
}

impl std::fmt::Display for Cookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.header_value() {
            Ok(value) => write!(f, "{}", value.to_str().unwrap_or_default()),
            Err(_) => write!(f, "{}=<invalid>", self.name),
        }
    }
}

/// 응답에 추가할 `Set-Cookie` 헤더 모음.
#[derive(Debug, Clone, Default)]
pub struct SetCookies(Vec<Cookie>);

impl SetCookies {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, cookie: Cookie) -> Self {
        self.0.push(cookie);
        self
    }

    /// 로그아웃용: 두 토큰 쿠키를 모두 지웁니다.
    pub fn cleared(secure: bool) -> Self {
        Self::new()
            .with(Cookie::cleared(ACCESS_COOKIE, secure))
            .with(Cookie::cleared(REFRESH_COOKIE, secure))
    }
}

impl IntoResponseParts for SetCookies {
    type Error = AuthError;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        for cookie in &self.0 {
            res.headers_mut().append(SET_COOKIE, cookie.header_value()?);
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("pm_locale=fr; refresh_token=abc.def.ghi; access_token="),
        );

        assert_eq!(read_cookie(&headers, REFRESH_COOKIE).as_deref(), Some("abc.def.ghi"));
        assert_eq!(read_cookie(&headers, LOCALE_COOKIE).as_deref(), Some("fr"));
        // 빈 값은 없는 것으로 본다
        assert_eq!(read_cookie(&headers, ACCESS_COOKIE), None);
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_access_cookie_attributes() {
        let cookie = Cookie::access("tok", 900, true).to_string();
        assert!(cookie.starts_with("access_token=tok;"));
        assert!(cookie.contains("Max-Age=900"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Secure"));
    }

    #[test]
    fn test_refresh_cookie_expires_at_token_exp() {
        let exp = Utc.with_ymd_and_hms(2030, 3, 4, 5, 6, 7).unwrap();
        let cookie = Cookie::refresh("tok", exp, false).to_string();
        assert!(cookie.contains("Expires=Mon, 04 Mar 2030 05:06:07 GMT"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_locale_cookie_is_readable() {
        let cookie = Cookie::locale("fr", false).to_string();
        assert!(cookie.starts_with("pm_locale=fr;"));
        assert!(!cookie.contains("HttpOnly"));
    }

    #[test]
    fn test_cleared_cookies() {
        let cleared = SetCookies::cleared(false);
        let rendered: Vec<String> = cleared.0.iter().map(ToString::to_string).collect();
        assert_eq!(rendered.len(), 2);
        assert!(rendered.iter().all(|c| c.contains("Max-Age=0")));
        assert!(rendered[0].starts_with("access_token=;"));
        assert!(rendered[1].starts_with("refresh_token=;"));
    }
}
