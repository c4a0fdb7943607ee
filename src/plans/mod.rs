use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod prompts;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::plan_routes()
}
