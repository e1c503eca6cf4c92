use axum::{
    extract::{FromRef, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use time::OffsetDateTime;
use tracing::{debug, error, warn};

use super::session::SessionKeys;
use crate::state::AppState;

pub const BLOCKED_LOGIN_PATH: &str = "/Auth/Login?blocked=true";

/// Per-request session gate.
///
/// With a valid session cookie the caller's record is re-read: a blocked
/// caller is signed out and sent to the login page, anyone else gets
/// `last_activity_at` refreshed. Store failures here are logged and never
/// fail the request. The caller identity is attached to the request for
/// the `CurrentUser` extractor.
pub async fn track_activity(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let keys = SessionKeys::from_ref(&state);
    let Some(caller) = keys.read(&jar) else {
        return next.run(req).await;
    };

    match state.store.find_by_id(caller.id).await {
        Ok(Some(user)) if user.is_blocked => {
            warn!(user_id = user.id, email = %user.email, "blocked user attempted to access the application");
            return (keys.clear(jar), Redirect::to(BLOCKED_LOGIN_PATH)).into_response();
        }
        Ok(Some(user)) => {
            if let Err(e) = state
                .store
                .touch_activity(user.id, OffsetDateTime::now_utc())
                .await
            {
                warn!(error = %e, user_id = user.id, "failed to update last_activity_at");
            }
        }
        Ok(None) => {
            debug!(user_id = caller.id, "session user not found in store");
        }
        Err(e) => {
            error!(error = %e, user_id = caller.id, "activity check failed");
        }
    }

    req.extensions_mut().insert(caller);
    next.run(req).await
}
