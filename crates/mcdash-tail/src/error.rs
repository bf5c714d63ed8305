use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::registry::SubscriptionId;

/// Errors raised by the tail engine
///
/// Per-tick failures never end a subscription; the tail loop reports them to
/// the subscriber as notices and keeps polling.
#[derive(Debug, Error)]
pub enum TailError {
    /// The log file does not exist right now
    #[error("log file not found: {}", .0.display())]
    SourceUnavailable(PathBuf),

    /// Any I/O failure while reading a chunk
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A subscription with this id is already registered
    #[error("subscription '{0}' is already active")]
    DuplicateSubscription(SubscriptionId),

    /// The registry is at capacity
    #[error("too many active subscriptions (max {max})")]
    TooManySubscriptions { max: usize },

    /// A blocking read task panicked or was cancelled
    #[error("read task failed: {0}")]
    Task(String),
}

impl TailError {
    pub(crate) fn from_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::SourceUnavailable(path)
        } else {
            Self::Read { path, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, TailError>;
