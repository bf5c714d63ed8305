//! HTTP surface for mcdash
//!
//! Serves the live log stream, the restart action and a health check on
//! axum. Authentication is terminated upstream; the allow-list check lives
//! in [`auth`].

pub mod auth;
pub mod error;
pub mod restart;
pub mod routes;
pub mod state;

pub use auth::{AllowList, AuthorizedUser};
pub use error::{ApiError, Result};
pub use restart::{ContainerRestarter, RestartError, Restarter};
pub use routes::build_router;
pub use state::{AppState, DEFAULT_IDENTITY_HEADER};
