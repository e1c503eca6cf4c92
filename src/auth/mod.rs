use crate::state::AppState;
use axum::Router;

pub mod activity;
pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod password;
pub mod services;
pub mod session;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
