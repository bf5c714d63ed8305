//! Shared fixtures for HTTP integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request};
use futures::future::BoxFuture;

use mcdash_tail::{SubscriptionRegistry, TailConfig};
use mcdash_web::{AllowList, AppState, RestartError, Restarter, build_router};

pub const OPERATOR: &str = "op@example.com";

/// Restarter that records calls instead of touching a container
#[derive(Default)]
pub struct MockRestarter {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl Restarter for MockRestarter {
    fn restart(&self) -> BoxFuture<'_, Result<(), RestartError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(RestartError::Failed {
                    status: "exit status: 1".into(),
                    stderr: "No such container: paper-mc".into(),
                });
            }
            Ok(())
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub registry: Arc<SubscriptionRegistry>,
    pub restarter: Arc<MockRestarter>,
}

pub fn test_app(log_file: &Path) -> TestApp {
    let registry = Arc::new(SubscriptionRegistry::default());
    let restarter = Arc::new(MockRestarter::default());
    let tail = TailConfig::new(log_file)
        .with_poll_interval(Duration::from_millis(20))
        .with_keepalive_interval(Duration::from_secs(3600));

    let state = AppState::new(
        Arc::clone(&registry),
        tail,
        AllowList::from_csv(OPERATOR),
        restarter.clone(),
    );

    TestApp {
        router: build_router(state),
        registry,
        restarter,
    }
}

pub fn request(method: Method, uri: &str, email: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(email) = email {
        builder = builder.header("x-forwarded-email", email);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}
