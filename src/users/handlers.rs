use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::{cookie::CookieJar, Form};
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::{
    auth::{
        extractors::LOGIN_PATH,
        session::{CurrentUser, SessionKeys},
    },
    error::AppError,
    flash::{self, Flash},
    state::AppState,
    users::services::{apply_bulk, verify_self, BulkAction, RosterError, VerifyOutcome},
    views,
};

const ROSTER_PATH: &str = "/";

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route(ROSTER_PATH, get(roster))
        .route("/VerifyMe", post(verify_me))
        .route("/BlockUsers", post(block_users))
        .route("/UnblockUsers", post(unblock_users))
        .route("/DeleteUsers", post(delete_users))
}

#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    #[serde(default)]
    pub csrf_token: String,
}

/// Checkbox selections arrive as repeated `user_ids` fields. They are kept
/// as text so a malformed id reaches the handler instead of failing the
/// extractor.
#[derive(Debug, Deserialize)]
pub struct BulkForm {
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub csrf_token: String,
}

impl BulkForm {
    fn parse_ids(&self) -> Option<Vec<i64>> {
        self.user_ids
            .iter()
            .map(|raw| raw.trim().parse::<i64>().ok())
            .collect()
    }
}

const INVALID_SELECTION: &str = "Invalid user selection";

fn require_csrf(caller: &CurrentUser, submitted: &str) -> Result<(), AppError> {
    if caller.csrf_matches(submitted) {
        Ok(())
    } else {
        warn!(user_id = caller.id, "anti-forgery token mismatch");
        Err(AppError::InvalidCsrf)
    }
}

fn back_to_roster(jar: CookieJar, notice: Flash) -> Response {
    (flash::set(jar, notice), Redirect::to(ROSTER_PATH)).into_response()
}

#[instrument(skip_all, fields(user_id = caller.id))]
pub async fn roster(
    State(state): State<AppState>,
    caller: CurrentUser,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let users = state.store.list_by_last_login().await?;
    let (jar, notice) = flash::take(jar);
    Ok((jar, views::roster_page(&caller, &users, notice.as_ref())).into_response())
}

#[instrument(skip_all, fields(user_id = caller.id))]
pub async fn verify_me(
    State(state): State<AppState>,
    caller: CurrentUser,
    jar: CookieJar,
    Form(form): Form<VerifyForm>,
) -> Result<Response, AppError> {
    require_csrf(&caller, &form.csrf_token)?;

    let notice = match verify_self(state.store.as_ref(), &caller).await? {
        VerifyOutcome::Verified => Flash::success("Your account has been verified successfully!"),
        VerifyOutcome::AlreadyVerified => Flash::info("You are already verified"),
        VerifyOutcome::Blocked => Flash::error("Cannot verify a blocked account"),
        VerifyOutcome::NotFound => Flash::error("User not found"),
    };
    Ok(back_to_roster(jar, notice))
}

pub async fn block_users(
    State(state): State<AppState>,
    caller: CurrentUser,
    jar: CookieJar,
    Form(form): Form<BulkForm>,
) -> Result<Response, AppError> {
    bulk(state, caller, jar, form, BulkAction::Block).await
}

pub async fn unblock_users(
    State(state): State<AppState>,
    caller: CurrentUser,
    jar: CookieJar,
    Form(form): Form<BulkForm>,
) -> Result<Response, AppError> {
    bulk(state, caller, jar, form, BulkAction::Unblock).await
}

pub async fn delete_users(
    State(state): State<AppState>,
    caller: CurrentUser,
    jar: CookieJar,
    Form(form): Form<BulkForm>,
) -> Result<Response, AppError> {
    bulk(state, caller, jar, form, BulkAction::Delete).await
}

#[instrument(skip_all, fields(user_id = caller.id, action = ?action))]
async fn bulk(
    state: AppState,
    caller: CurrentUser,
    jar: CookieJar,
    form: BulkForm,
    action: BulkAction,
) -> Result<Response, AppError> {
    require_csrf(&caller, &form.csrf_token)?;

    let Some(ids) = form.parse_ids() else {
        warn!(user_ids = ?form.user_ids, "malformed user ids in bulk request");
        return Ok(back_to_roster(jar, Flash::error(INVALID_SELECTION)));
    };

    let outcome = match apply_bulk(state.store.as_ref(), &caller, action, &ids).await {
        Ok(outcome) => outcome,
        Err(RosterError::NoSelection) => {
            return Ok(back_to_roster(jar, Flash::error("No users selected")));
        }
        // Already logged with the requested ids.
        Err(RosterError::Store(_)) => {
            return Ok(back_to_roster(jar, Flash::error(action.failure_notice())));
        }
    };

    if outcome.is_empty() {
        return Ok(back_to_roster(jar, Flash::warning(action.nothing_done_notice())));
    }

    let done = action.past_tense();
    let n = outcome.count();
    if outcome.logout_caller {
        let jar = SessionKeys::from_ref(&state).clear(jar);
        let jar = flash::set(
            jar,
            Flash::success(format!(
                "{n} user(s) {done}. You {done} yourself and will be logged out."
            )),
        );
        return Ok((jar, Redirect::to(LOGIN_PATH)).into_response());
    }

    Ok(back_to_roster(
        jar,
        Flash::success(format!("{n} user(s) {done} successfully")),
    ))
}
