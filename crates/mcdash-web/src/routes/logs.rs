//! Live log stream
//!
//! `GET /api/server/logs?level=INFO|WARN|ERROR|ALL` opens one subscription
//! and relays it as server-sent events until the client goes away.

use std::convert::Infallible;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::StreamExt;
use serde::Deserialize;

use mcdash_tail::{LevelFilter, StreamUnit, subscribe};
use mcdash_types::ParseLevelFilterError;

use crate::auth::AuthorizedUser;
use crate::error::{ApiError, Result};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/logs", get(stream_logs))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub level: Option<String>,
}

impl LogsQuery {
    /// Requested filter; absent or blank means INFO
    pub fn filter(&self) -> Result<LevelFilter> {
        match self.level.as_deref().map(str::trim) {
            None | Some("") => Ok(LevelFilter::default()),
            Some(raw) => raw
                .parse()
                .map_err(|e: ParseLevelFilterError| ApiError::BadRequest(e.to_string())),
        }
    }
}

/// Render one unit as an SSE frame
pub fn to_event(unit: StreamUnit) -> Event {
    match unit {
        StreamUnit::Record(record) => Event::default().data(record.payload()),
        StreamUnit::Heartbeat => Event::default().comment("keep-alive"),
    }
}

async fn stream_logs(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Query(query): Query<LogsQuery>,
) -> Result<Response> {
    let filter = query.filter()?;

    match tokio::fs::metadata(&state.tail.path).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!(
                "Log file not found: {}",
                state.tail.path.display()
            )));
        }
        Err(e) => {
            return Err(ApiError::internal(format!(
                "Failed to open log file {}: {e}",
                state.tail.path.display()
            )));
        }
    }

    let subscription = subscribe(&state.registry, user.email(), filter, &state.tail)?;
    let events = subscription.map(|unit| Ok::<_, Infallible>(to_event(unit)));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (header::CONTENT_ENCODING, "identity"),
        ],
        Sse::new(events),
    )
        .into_response())
}
