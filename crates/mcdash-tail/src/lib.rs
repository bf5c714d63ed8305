//! Log tail streaming engine for mcdash
//!
//! This crate turns an append-only, externally written log file into live,
//! filtered, per-subscriber feeds. Every subscription owns an independent
//! tail loop reading from its own cursor, tolerating truncation, rotation
//! and transient read failures.

mod classify;
mod cursor;
mod error;
mod reader;
mod registry;
mod subscription;
mod tail;

pub use classify::{accepts, classify, escape_newlines, filter_line, filter_lines};
pub use cursor::{Cursor, Observation};
pub use error::{Result, TailError};
pub use reader::{Chunk, file_size, read_chunk};
pub use registry::{DEFAULT_MAX_SUBSCRIPTIONS, SubscriptionId, SubscriptionRegistry};
pub use subscription::{Subscription, subscribe};
pub use tail::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_INITIAL_WINDOW, DEFAULT_KEEPALIVE_INTERVAL,
    DEFAULT_POLL_INTERVAL, MISSING_NOTICE, ROTATED_NOTICE, TailConfig, WAITING_NOTICE,
    read_error_notice,
};

// Re-export types used in our public API
pub use mcdash_types::{LevelFilter, LogRecord, Severity, StreamUnit};
