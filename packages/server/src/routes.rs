use crate::state::AppState;
use axum::Router;

mod session;

pub fn create_routes(state: AppState) -> Router {
    Router::new().nest("/api/sessions", session::routes(state))
}
