//! Application state
//!
//! Shared state for handlers: the subscription registry, the tail settings
//! every new stream uses, the auth gate and the restart collaborator.

use std::sync::Arc;

use axum::http::HeaderName;

use mcdash_tail::{SubscriptionRegistry, TailConfig};

use crate::auth::AllowList;
use crate::restart::Restarter;

/// Header carrying the identity established by the authenticating proxy
pub const DEFAULT_IDENTITY_HEADER: &str = "x-forwarded-email";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SubscriptionRegistry>,
    pub tail: Arc<TailConfig>,
    pub allow_list: Arc<AllowList>,
    pub identity_header: HeaderName,
    pub restarter: Arc<dyn Restarter>,
}

impl AppState {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        tail: TailConfig,
        allow_list: AllowList,
        restarter: Arc<dyn Restarter>,
    ) -> Self {
        Self {
            registry,
            tail: Arc::new(tail),
            allow_list: Arc::new(allow_list),
            identity_header: HeaderName::from_static(DEFAULT_IDENTITY_HEADER),
            restarter,
        }
    }

    pub fn with_identity_header(mut self, header: HeaderName) -> Self {
        self.identity_header = header;
        self
    }
}
