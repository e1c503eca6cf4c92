use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts, response::Redirect};
use tracing::debug;

use super::session::CurrentUser;

pub const LOGIN_PATH: &str = "/Auth/Login";

/// Requires a session. The identity is attached to the request by the
/// activity monitor; without one the caller is sent to the login page.
#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentUser>() {
            Some(caller) => Ok(caller.clone()),
            None => {
                debug!(uri = %parts.uri, "no session; redirecting to login");
                Err(Redirect::to(LOGIN_PATH))
            }
        }
    }
}
