use std::time::Duration;

use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::{SessionConfig, AppConfig},
    state::AppState,
    users::repo_types::User,
};

const CSRF_TOKEN_LEN: usize = 32;

/// Identity claims carried by the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub uid: i64,
    pub name: String,
    pub email: String,
    /// Status label at login time.
    pub status: String,
    /// Anti-forgery token bound to this session.
    pub csrf: String,
    /// Session id, for log correlation.
    pub sid: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

/// The authenticated caller, as established by the session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub status: String,
    pub csrf_token: String,
    pub session_id: Uuid,
}

impl CurrentUser {
    pub fn csrf_matches(&self, submitted: &str) -> bool {
        !submitted.is_empty()
            && constant_time_eq(submitted.as_bytes(), self.csrf_token.as_bytes())
    }
}

impl From<SessionClaims> for CurrentUser {
    fn from(c: SessionClaims) -> Self {
        Self {
            id: c.uid,
            name: c.name,
            email: c.email,
            status: c.status,
            csrf_token: c.csrf,
            session_id: c.sid,
        }
    }
}

/// Signing material and cookie settings for sessions.
#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
    pub cookie_name: String,
    pub secure_cookie: bool,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        SessionKeys::from_config(&state.config)
    }
}

impl SessionKeys {
    pub fn from_config(config: &AppConfig) -> Self {
        let SessionConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
            cookie_name,
            secure_cookie,
        } = config.session.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_minutes.max(1) as u64) * 60),
            cookie_name,
            secure_cookie,
        }
    }

    pub fn sign(&self, user: &User, csrf: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = SessionClaims {
            uid: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            status: user.status_label().to_string(),
            csrf: csrf.to_string(),
            sid: Uuid::new_v4(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = user.id, session_id = %claims.sid, "session signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<SessionClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Caller identity from the request cookies, if a valid session is present.
    pub fn read(&self, jar: &CookieJar) -> Option<CurrentUser> {
        let cookie = jar.get(&self.cookie_name)?;
        match self.verify(cookie.value()) {
            Ok(claims) => Some(claims.into()),
            Err(e) => {
                debug!(error = %e, "ignoring invalid session cookie");
                None
            }
        }
    }

    /// Attach a persistent session cookie.
    pub fn store(&self, jar: CookieJar, token: String) -> CookieJar {
        let cookie = Cookie::build((self.cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .max_age(TimeDuration::seconds(self.ttl.as_secs() as i64));
        jar.add(cookie)
    }

    /// Remove the session cookie.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build((self.cookie_name.clone(), "")).path("/"))
    }
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

pub fn new_csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::Status;

    fn user() -> User {
        User {
            id: 42,
            name: "Grace".into(),
            email: "grace@example.com".into(),
            password_hash: "x".into(),
            created_at: OffsetDateTime::now_utc(),
            status: Status::Verified,
            is_blocked: false,
            last_logged_in_at: None,
            last_activity_at: None,
        }
    }

    fn keys(secret: &str, issuer: &str) -> SessionKeys {
        let mut config = (*AppState::fake().config).clone();
        config.session.secret = secret.into();
        config.session.issuer = issuer.into();
        SessionKeys::from_config(&config)
    }

    #[test]
    fn sign_and_verify_carries_identity() {
        let keys = keys("dev-secret", "test-issuer");
        let token = keys.sign(&user(), "tok").expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.uid, 42);
        assert_eq!(claims.name, "Grace");
        assert_eq!(claims.email, "grace@example.com");
        assert_eq!(claims.status, "Verified");
        assert_eq!(claims.csrf, "tok");
    }

    #[test]
    fn verify_rejects_other_secret_or_issuer() {
        let token = keys("one", "iss").sign(&user(), "tok").unwrap();
        assert!(keys("two", "iss").verify(&token).is_err());
        assert!(keys("one", "other-iss").verify(&token).is_err());
    }

    #[test]
    fn read_ignores_garbage_cookie() {
        let keys = keys("dev-secret", "iss");
        let jar = CookieJar::new().add(Cookie::new(keys.cookie_name.clone(), "not-a-jwt"));
        assert!(keys.read(&jar).is_none());

        let token = keys.sign(&user(), "tok").unwrap();
        let jar = keys.store(CookieJar::new(), token);
        let caller = keys.read(&jar).expect("session");
        assert_eq!(caller.id, 42);
    }

    #[test]
    fn csrf_tokens_are_random_and_checked() {
        let a = new_csrf_token();
        let b = new_csrf_token();
        assert_eq!(a.len(), CSRF_TOKEN_LEN);
        assert_ne!(a, b);

        let token = keys("s", "iss").sign(&user(), &a).unwrap();
        let caller: CurrentUser = keys("s", "iss").verify(&token).unwrap().into();
        assert!(caller.csrf_matches(&a));
        assert!(!caller.csrf_matches(&b));
        assert!(!caller.csrf_matches(""));
        assert!(!caller.csrf_matches(&a[..CSRF_TOKEN_LEN - 1]));
    }

    #[test]
    fn constant_time_eq_compares_whole_input() {
        assert!(constant_time_eq(b"token", b"token"));
        assert!(!constant_time_eq(b"token", b"tokeN"));
        assert!(!constant_time_eq(b"Token", b"token"));
        assert!(!constant_time_eq(b"tok", b"token"));
    }
}
