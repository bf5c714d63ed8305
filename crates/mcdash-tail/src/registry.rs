use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mcdash_types::LevelFilter;

use crate::error::{Result, TailError};

/// Default cap on concurrently open subscriptions
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 64;

/// Counter that keeps ids unique within the same millisecond
static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Opaque id, stable for the lifetime of one connection
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Build a fresh id from the subscriber identity and filter
    pub fn new(identity: &str, filter: LevelFilter) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let seq = NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed);
        let identity = if identity.is_empty() {
            "anonymous"
        } else {
            identity
        };
        Self(format!("{identity}-{filter}-{millis}-{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Timers and task owned by one subscription
struct Entry {
    /// Cancels both the poll and the keep-alive timer
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Entry {
    fn stop(self) {
        self.cancel.cancel();
        if let Some(task) = self.task {
            task.abort();
        }
    }
}

/// Table of live subscriptions
///
/// Membership is exactly the set of subscriptions with live timers: removing
/// an id cancels its token and aborts its task under the same write lock, so
/// no tick can start for an id that is gone. Shared explicitly as an `Arc`
/// between the endpoint and every tail loop.
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<SubscriptionId, Entry>>,
    max_subscriptions: usize,
}

impl SubscriptionRegistry {
    pub fn new(max_subscriptions: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_subscriptions: max_subscriptions.max(1),
        }
    }

    /// Register a subscription and hand back the token governing its timers
    pub fn register(&self, id: SubscriptionId, filter: LevelFilter) -> Result<CancellationToken> {
        let mut entries = self.entries.write();

        if entries.contains_key(&id) {
            return Err(TailError::DuplicateSubscription(id));
        }
        if entries.len() >= self.max_subscriptions {
            return Err(TailError::TooManySubscriptions {
                max: self.max_subscriptions,
            });
        }

        let cancel = CancellationToken::new();
        entries.insert(
            id.clone(),
            Entry {
                cancel: cancel.clone(),
                task: None,
            },
        );
        tracing::debug!(subscription = %id, %filter, "subscription registered");
        Ok(cancel)
    }

    /// Attach the spawned tail task to its entry
    ///
    /// If the id was removed before the task could be attached, the task is
    /// aborted on the spot.
    pub fn attach(&self, id: &SubscriptionId, task: JoinHandle<()>) {
        let mut entries = self.entries.write();
        match entries.get_mut(id) {
            Some(entry) => entry.task = Some(task),
            None => task.abort(),
        }
    }

    pub fn is_active(&self, id: &SubscriptionId) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Remove a subscription and stop its timers
    ///
    /// Idempotent: returns false if the id was not registered.
    pub fn unregister(&self, id: &SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        match entries.remove(id) {
            Some(entry) => {
                entry.stop();
                tracing::debug!(subscription = %id, "subscription unregistered");
                true
            }
            None => false,
        }
    }

    /// Stop every subscription, returning how many were live
    pub fn unregister_all(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        for (id, entry) in entries.drain() {
            entry.stop();
            tracing::debug!(subscription = %id, "subscription unregistered");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SUBSCRIPTIONS)
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("active", &self.len())
            .field("max_subscriptions", &self.max_subscriptions)
            .finish()
    }
}
