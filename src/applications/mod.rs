mod dto;
pub mod handlers;
pub mod repo;
pub mod workflow;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::application_routes())
        .merge(handlers::upload_routes())
}
