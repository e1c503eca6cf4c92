use axum::{
    extract::Request,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::error;

use crate::{flash::Flash, users::repo::StoreError, views};

pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid anti-forgery token")]
    InvalidCsrf,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidCsrf => {
                (StatusCode::BAD_REQUEST, "invalid anti-forgery token").into_response()
            }
            AppError::Store(e) => {
                error!(error = %e, "store failure");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Same-origin path from the `Referer` header, or `/`.
fn return_path(headers: &HeaderMap) -> String {
    let Some(referer) = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Uri>().ok())
    else {
        return "/".to_string();
    };
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    let same_origin = match referer.authority() {
        None => true,
        Some(authority) => Some(authority.as_str()) == host,
    };
    match referer.path_and_query() {
        Some(pq) if same_origin && pq.as_str().starts_with('/') => pq.as_str().to_string(),
        _ => "/".to_string(),
    }
}

/// Outermost guard: any 5xx (including a caught panic) becomes a redirect
/// back to where the user came from with a generic notice.
pub async fn error_boundary(req: Request, next: Next) -> Response {
    let target = return_path(req.headers());
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;
    let status = response.status();
    if !status.is_server_error() {
        return response;
    }

    error!(%method, %uri, %status, "unhandled failure in request pipeline");
    if method == Method::GET && uri.path_and_query().map(|pq| pq.as_str()) == Some(target.as_str())
    {
        return (StatusCode::INTERNAL_SERVER_ERROR, views::error_page(UNEXPECTED_ERROR))
            .into_response();
    }

    let mut redirect = Redirect::to(&target).into_response();
    if let Some(cookie) = Flash::error(UNEXPECTED_ERROR).set_cookie_header() {
        redirect.headers_mut().append(header::SET_COOKIE, cookie);
    }
    redirect
}
