use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use mcdash_types::{LevelFilter, StreamUnit};

use crate::error::Result;
use crate::registry::{SubscriptionId, SubscriptionRegistry};
use crate::tail::{TailConfig, TailLoop};

/// Open a subscription: register it, start its tail loop, and return the
/// receiving end
///
/// Must be called from within a tokio runtime. If registration fails nothing
/// is spawned.
pub fn subscribe(
    registry: &Arc<SubscriptionRegistry>,
    identity: &str,
    filter: LevelFilter,
    config: &TailConfig,
) -> Result<Subscription> {
    let id = SubscriptionId::new(identity, filter);
    let cancel = registry.register(id.clone(), filter)?;

    let (tx, receiver) = mpsc::channel(config.channel_capacity.max(1));
    let tail = TailLoop::new(
        id.clone(),
        filter,
        config.clone(),
        Arc::clone(registry),
        cancel,
        tx,
    );
    let task = tokio::spawn(tail.run());
    registry.attach(&id, task);

    tracing::info!(subscription = %id, %filter, path = %config.path.display(), "client subscribed");

    Ok(Subscription {
        id,
        registry: Arc::clone(registry),
        receiver,
    })
}

/// Receiving end of one subscription
///
/// Yields records and heartbeats in emission order. Dropping it (for example
/// when the client disconnects and the response body is dropped) unregisters
/// the subscription before `drop` returns.
pub struct Subscription {
    id: SubscriptionId,
    registry: Arc<SubscriptionRegistry>,
    receiver: mpsc::Receiver<StreamUnit>,
}

impl Subscription {
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.registry.is_active(&self.id)
    }

    /// Receive the next unit, `None` once the subscription has stopped
    pub async fn recv(&mut self) -> Option<StreamUnit> {
        self.receiver.recv().await
    }

    /// Stop the subscription; later calls are no-ops
    pub fn close(&mut self) {
        if self.registry.unregister(&self.id) {
            tracing::info!(subscription = %self.id, "client disconnected");
        }
    }
}

impl Stream for Subscription {
    type Item = StreamUnit;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish()
    }
}
