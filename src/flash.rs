//! One-shot notices carried across a redirect in a short-lived cookie.

use axum::http::HeaderValue;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const FLASH_COOKIE: &str = "roster_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
    Info,
    Warning,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
            FlashKind::Info => "info",
            FlashKind::Warning => "warning",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "success" => Some(FlashKind::Success),
            "error" => Some(FlashKind::Error),
            "info" => Some(FlashKind::Info),
            "warning" => Some(FlashKind::Warning),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn new(kind: FlashKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Warning, message)
    }

    fn encode(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.message)
    }

    fn decode(raw: &str) -> Option<Self> {
        let (kind, message) = raw.split_once(':')?;
        Some(Self::new(FlashKind::parse(kind)?, message))
    }

    fn cookie(&self) -> Cookie<'static> {
        Cookie::build((FLASH_COOKIE, self.encode()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }

    /// `Set-Cookie` value, for responses built without a `CookieJar`.
    pub fn set_cookie_header(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.cookie().encoded().to_string()).ok()
    }
}

/// Queue a notice for the next page.
pub fn set(jar: CookieJar, flash: Flash) -> CookieJar {
    jar.add(flash.cookie())
}

/// Read the pending notice and remove it.
pub fn take(jar: CookieJar) -> (CookieJar, Option<Flash>) {
    let flash = jar.get(FLASH_COOKIE).and_then(|c| Flash::decode(c.value()));
    match flash {
        Some(_) => (jar.remove(Cookie::build((FLASH_COOKIE, "")).path("/")), flash),
        None => (jar, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(value: &str) -> CookieJar {
        let mut headers = axum::http::HeaderMap::new();
        let cookie = Cookie::new(FLASH_COOKIE, value.to_string());
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_str(&cookie.encoded().to_string()).unwrap(),
        );
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn take_reads_and_clears_the_notice() {
        let jar = incoming("warning:No users selected: try again");
        let (jar, flash) = take(jar);
        assert_eq!(flash, Some(Flash::warning("No users selected: try again")));
        assert!(jar.get(FLASH_COOKIE).is_none());
    }

    #[test]
    fn set_queues_a_notice() {
        let jar = set(CookieJar::new(), Flash::info("You are already verified"));
        let cookie = jar.get(FLASH_COOKIE).expect("flash cookie");
        assert_eq!(cookie.value(), "info:You are already verified");
    }

    #[test]
    fn malformed_flash_is_ignored() {
        let jar = CookieJar::new().add(Cookie::new(FLASH_COOKIE, "shout:hello"));
        assert_eq!(take(jar).1, None);
        assert_eq!(Flash::decode("no separator"), None);
    }

    #[test]
    fn header_value_percent_encodes_message() {
        let header = Flash::error("An unexpected error occurred. Please try again.")
            .set_cookie_header()
            .expect("header");
        let text = header.to_str().unwrap();
        assert!(text.starts_with("roster_flash=error"));
        assert!(text.contains("Path=/"));
        assert!(text.contains("HttpOnly"));
    }
}
