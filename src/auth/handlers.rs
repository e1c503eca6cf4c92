use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::CookieJar;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{FieldErrors, LoginForm, LoginQuery, RegisterForm, FORM_LEVEL},
        extractors::LOGIN_PATH,
        password::{hash_password, verify_decoy, verify_password},
        services::{
            validate_login, validate_registration, ACCOUNT_BLOCKED, EMAIL_TAKEN,
            INVALID_CREDENTIALS,
        },
        session::{new_csrf_token, SessionKeys},
    },
    error::AppError,
    flash::{self, Flash},
    state::AppState,
    users::{
        repo::StoreError,
        repo_types::{NewUser, User},
    },
    views,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/Auth/Register", get(register_page).post(register))
        .route("/Auth/Login", get(login_page).post(login))
        .route("/Auth/Logout", get(logout).post(logout))
}

pub async fn register_page(jar: CookieJar) -> impl IntoResponse {
    let (jar, notice) = flash::take(jar);
    (
        jar,
        views::register_page("", "", &FieldErrors::new(), notice.as_ref()),
    )
}

#[instrument(skip(state, jar, form))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(mut form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let mut errors = validate_registration(&mut form);
    if !errors.is_empty() {
        warn!(email = %form.email, "registration rejected by validation");
        return Ok(views::register_page(&form.name, &form.email, &errors, None).into_response());
    }

    let password_hash = hash_password(&form.password)?;
    let new_user = NewUser {
        name: form.name.clone(),
        email: form.email.clone(),
        password_hash,
        created_at: OffsetDateTime::now_utc(),
    };

    match state.store.create(new_user).await {
        Ok(user) => {
            info!(user_id = user.id, email = %user.email, "user registered");
            let jar = flash::set(
                jar,
                Flash::success("Registration successful! Please login to continue."),
            );
            Ok((jar, Redirect::to(LOGIN_PATH)).into_response())
        }
        Err(StoreError::EmailTaken) => {
            warn!(email = %form.email, "email already registered");
            errors.add("email", EMAIL_TAKEN);
            Ok(views::register_page(
                &form.name,
                &form.email,
                &errors,
                Some(&Flash::error(EMAIL_TAKEN)),
            )
            .into_response())
        }
        Err(e) => {
            error!(error = %e, email = %form.email, "database error during registration");
            Ok(views::register_page(
                &form.name,
                &form.email,
                &errors,
                Some(&Flash::error("Unable to complete registration. Please try again.")),
            )
            .into_response())
        }
    }
}

pub async fn login_page(jar: CookieJar, Query(query): Query<LoginQuery>) -> impl IntoResponse {
    let (jar, notice) = flash::take(jar);
    let notice = if query.blocked {
        Some(Flash::error(ACCOUNT_BLOCKED))
    } else {
        notice
    };
    (jar, views::login_page("", &FieldErrors::new(), notice.as_ref()))
}

fn rejected_login(email: &str, message: &str) -> Response {
    let mut errors = FieldErrors::new();
    errors.add(FORM_LEVEL, message);
    views::login_page(email, &errors, None).into_response()
}

fn password_matches(user: &User, password: &str) -> bool {
    match verify_password(password, &user.password_hash) {
        Ok(ok) => ok,
        Err(e) => {
            error!(error = %e, user_id = user.id, "stored password hash is unreadable");
            false
        }
    }
}

#[instrument(skip(state, jar, form))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(mut form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let errors = validate_login(&mut form);
    if !errors.is_empty() {
        return Ok(views::login_page(&form.email, &errors, None).into_response());
    }

    let user = match state.store.find_by_email(&form.email).await {
        Ok(user) => user,
        Err(e) => {
            error!(error = %e, email = %form.email, "unexpected error during login");
            return Ok(views::login_page(
                &form.email,
                &FieldErrors::new(),
                Some(&Flash::error("An error occurred during login. Please try again.")),
            )
            .into_response());
        }
    };

    let authenticated = match user {
        Some(user) if password_matches(&user, &form.password) => Some(user),
        Some(_) => None,
        None => {
            verify_decoy(&form.password);
            None
        }
    };
    let Some(user) = authenticated else {
        warn!(email = %form.email, "login with invalid credentials");
        return Ok(rejected_login(&form.email, INVALID_CREDENTIALS));
    };

    if user.is_blocked {
        warn!(user_id = user.id, email = %user.email, "login attempt by blocked user");
        return Ok(rejected_login(&form.email, ACCOUNT_BLOCKED));
    }

    // Timestamps are best-effort; login proceeds regardless.
    if let Err(e) = state
        .store
        .record_login(user.id, OffsetDateTime::now_utc())
        .await
    {
        warn!(error = %e, user_id = user.id, "failed to update last login time");
    }

    let keys = SessionKeys::from_ref(&state);
    let token = keys.sign(&user, &new_csrf_token())?;
    let jar = keys.store(jar, token);
    let jar = flash::set(jar, Flash::success(format!("Welcome back, {}!", user.name)));

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok((jar, Redirect::to("/")).into_response())
}

#[instrument(skip(state, jar))]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let keys = SessionKeys::from_ref(&state);
    if let Some(caller) = keys.read(&jar) {
        info!(user_id = caller.id, session_id = %caller.session_id, "user logged out");
    }
    let jar = keys.clear(jar);
    let jar = flash::set(jar, Flash::info("You have been logged out successfully."));
    (jar, Redirect::to(LOGIN_PATH)).into_response()
}
