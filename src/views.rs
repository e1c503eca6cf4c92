//! Minimal HTML pages for the register, login and roster screens.

use std::fmt::Write;

use axum::response::Html;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    auth::{dto::FieldErrors, session::CurrentUser},
    flash::Flash,
    users::repo_types::User,
};

pub(crate) fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

fn layout(title: &str, flash: Option<&Flash>, body: &str) -> Html<String> {
    let notice = flash
        .map(|f| {
            format!(
                r#"<div class="notice notice-{}" role="status">{}</div>"#,
                f.kind.as_str(),
                escape(&f.message)
            )
        })
        .unwrap_or_default();
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
{notice}
{body}
</body>
</html>"#,
        title = escape(title),
    ))
}

fn field_error(errors: &FieldErrors, field: &str) -> String {
    errors
        .get(field)
        .map(|m| format!(r#"<span class="field-error">{}</span>"#, escape(m)))
        .unwrap_or_default()
}

fn timestamp(at: Option<OffsetDateTime>) -> String {
    at.and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| "never".to_string())
}

pub fn register_page(
    name: &str,
    email: &str,
    errors: &FieldErrors,
    flash: Option<&Flash>,
) -> Html<String> {
    let body = format!(
        r#"<h1>Register</h1>
<form method="post" action="/Auth/Register">
  <label>Name <input name="name" value="{name}" maxlength="100"></label> {name_err}
  <label>Email <input name="email" type="email" value="{email}" maxlength="255"></label> {email_err}
  <label>Password <input name="password" type="password"></label> {password_err}
  <label>Confirm Password <input name="confirm_password" type="password"></label> {confirm_err}
  <button type="submit">Register</button>
</form>
<p><a href="/Auth/Login">Already registered? Log in</a></p>"#,
        name = escape(name),
        email = escape(email),
        name_err = field_error(errors, "name"),
        email_err = field_error(errors, "email"),
        password_err = field_error(errors, "password"),
        confirm_err = field_error(errors, "confirm_password"),
    );
    layout("Register", flash, &body)
}

pub fn login_page(email: &str, errors: &FieldErrors, flash: Option<&Flash>) -> Html<String> {
    let body = format!(
        r#"<h1>Log in</h1>
<div class="form-error">{form_err}</div>
<form method="post" action="/Auth/Login">
  <label>Email <input name="email" type="email" value="{email}"></label> {email_err}
  <label>Password <input name="password" type="password"></label> {password_err}
  <button type="submit">Log in</button>
</form>
<p><a href="/Auth/Register">Create an account</a></p>"#,
        form_err = field_error(errors, crate::auth::dto::FORM_LEVEL),
        email = escape(email),
        email_err = field_error(errors, "email"),
        password_err = field_error(errors, "password"),
    );
    layout("Log in", flash, &body)
}

pub fn roster_page(caller: &CurrentUser, users: &[User], flash: Option<&Flash>) -> Html<String> {
    let csrf = escape(&caller.csrf_token);
    let mut rows = String::new();
    for u in users {
        let _ = write!(
            rows,
            r#"<tr><td><input type="checkbox" name="user_ids" value="{id}" form="bulk"></td><td>{name}</td><td>{email}</td><td>{status}</td><td>{login}</td><td>{activity}</td></tr>
"#,
            id = u.id,
            name = escape(&u.name),
            email = escape(&u.email),
            status = u.status_label(),
            login = timestamp(u.last_logged_in_at),
            activity = timestamp(u.last_activity_at),
        );
    }
    let body = format!(
        r#"<header>Signed in as {name} ({email}, {status}) <a href="/Auth/Logout">Log out</a></header>
<form method="post" action="/VerifyMe">
  <input type="hidden" name="csrf_token" value="{csrf}">
  <button type="submit">Verify me</button>
</form>
<form id="bulk" method="post" action="/BlockUsers">
  <input type="hidden" name="csrf_token" value="{csrf}">
  <button type="submit" formaction="/BlockUsers">Block</button>
  <button type="submit" formaction="/UnblockUsers">Unblock</button>
  <button type="submit" formaction="/DeleteUsers">Delete</button>
</form>
<table>
<thead><tr><th></th><th>Name</th><th>Email</th><th>Status</th><th>Last login</th><th>Last activity</th></tr></thead>
<tbody>
{rows}</tbody>
</table>"#,
        name = escape(&caller.name),
        email = escape(&caller.email),
        status = escape(&caller.status),
    );
    layout("Users", flash, &body)
}

/// Last-resort page when redirecting would loop back to the failing request.
pub fn error_page(message: &str) -> Html<String> {
    layout(
        "Error",
        None,
        &format!(
            r#"<h1>Something went wrong</h1><p>{}</p><p><a href="/Auth/Login">Back to login</a></p>"#,
            escape(message)
        ),
    )
}
