//! API routes

pub mod logs;
pub mod ops;
pub mod server;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the complete router
pub fn build_router(state: AppState) -> Router {
    let server_routes = server::routes().merge(logs::routes());

    Router::new()
        .merge(ops::routes())
        .nest("/api/server", server_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
