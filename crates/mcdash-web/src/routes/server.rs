//! Server control

use axum::Router;
use axum::extract::State;
use axum::routing::post;

use crate::auth::AuthorizedUser;
use crate::error::Result;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/restart", post(restart_server))
}

async fn restart_server(
    State(state): State<AppState>,
    user: AuthorizedUser,
) -> Result<&'static str> {
    tracing::info!(user = %user.email(), "server restart requested");
    state.restarter.restart().await?;
    Ok("Server restart triggered")
}
