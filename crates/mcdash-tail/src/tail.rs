use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use mcdash_types::{LevelFilter, LogRecord, StreamUnit};

use crate::classify::filter_lines;
use crate::cursor::{Cursor, Observation};
use crate::error::{Result, TailError};
use crate::reader::{Chunk, file_size, read_chunk};
use crate::registry::{SubscriptionId, SubscriptionRegistry};

/// Default interval between file polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default interval between keep-alive comments
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Default backlog a new subscriber gets, in bytes
pub const DEFAULT_INITIAL_WINDOW: u64 = 50_000;

/// Default per-subscription delivery buffer, in units
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

pub const WAITING_NOTICE: &str = "Waiting for new log entries...";
pub const MISSING_NOTICE: &str = "Log file no longer exists. Waiting for it to be created...";
pub const ROTATED_NOTICE: &str = "Log file was rotated or truncated. Starting from beginning.";

/// Notice sent for a failed tick
pub fn read_error_notice(err: &TailError) -> LogRecord {
    LogRecord::system(format!("Error reading log file: {err}"))
}

/// Tail loop settings shared by every subscription
#[derive(Clone, Debug)]
pub struct TailConfig {
    pub path: PathBuf,
    pub poll_interval: Duration,
    pub keepalive_interval: Duration,
    pub initial_window: u64,
    pub channel_capacity: usize,
}

impl TailConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            initial_window: DEFAULT_INITIAL_WINDOW,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_initial_window(mut self, bytes: u64) -> Self {
        self.initial_window = bytes;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

/// One subscription's polling task
///
/// Starting: seed the cursor a window before the end and send the backlog.
/// If the size cannot be taken yet, seeding waits for the first tick that
/// can.
/// Polling: on every poll tick, handle a missing file, a rotation, or new
/// bytes. Each tick runs to completion (offset advance included) before the
/// next poll is awaited, so ticks of one subscription never overlap.
/// Stopped: the registry entry is gone; nothing more is sent.
pub(crate) struct TailLoop {
    id: SubscriptionId,
    filter: LevelFilter,
    config: TailConfig,
    registry: Arc<SubscriptionRegistry>,
    cancel: CancellationToken,
    cursor: Cursor,
    /// Set once the cursor has been placed for the first time
    seeded: bool,
    tx: mpsc::Sender<StreamUnit>,
}

impl TailLoop {
    pub(crate) fn new(
        id: SubscriptionId,
        filter: LevelFilter,
        config: TailConfig,
        registry: Arc<SubscriptionRegistry>,
        cancel: CancellationToken,
        tx: mpsc::Sender<StreamUnit>,
    ) -> Self {
        Self {
            id,
            filter,
            config,
            registry,
            cancel,
            cursor: Cursor::new(),
            seeded: false,
            tx,
        }
    }

    pub(crate) async fn run(mut self) {
        let poll_every = self.config.poll_interval.max(Duration::from_millis(1));
        let keepalive_every = self.config.keepalive_interval.max(Duration::from_millis(1));

        let mut poll = interval_at(Instant::now() + poll_every, poll_every);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut keepalive = interval_at(Instant::now() + keepalive_every, keepalive_every);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if self.start().await.is_continue() {
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = poll.tick() => {
                        if self.tick().await.is_break() {
                            break;
                        }
                    }
                    _ = keepalive.tick() => {
                        if self.emit(StreamUnit::Heartbeat).await.is_break() {
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!(
            subscription = %self.id,
            offset = self.cursor.offset(),
            rotations = self.cursor.rotations(),
            "tail loop stopped"
        );
        self.registry.unregister(&self.id);
    }

    async fn start(&mut self) -> ControlFlow<()> {
        match self.size().await {
            Ok(Some(size)) => self.seed(size).await,
            Ok(None) => {
                self.seeded = true;
                self.emit(LogRecord::system(MISSING_NOTICE).into()).await
            }
            Err(e) => self.report(&e).await,
        }
    }

    /// Place the cursor a window before the end and send the backlog
    async fn seed(&mut self, size: u64) -> ControlFlow<()> {
        self.cursor = Cursor::seeded(size, self.config.initial_window);
        self.seeded = true;
        tracing::debug!(
            subscription = %self.id,
            size,
            offset = self.cursor.offset(),
            "tail loop started"
        );
        if self.read_and_emit().await? == Some(0) {
            self.emit(LogRecord::system(WAITING_NOTICE).into()).await?;
        }
        ControlFlow::Continue(())
    }

    async fn tick(&mut self) -> ControlFlow<()> {
        let size = match self.size().await {
            Ok(Some(size)) => size,
            Ok(None) => return self.emit(LogRecord::system(MISSING_NOTICE).into()).await,
            Err(e) => return self.report(&e).await,
        };

        if !self.seeded {
            return self.seed(size).await;
        }

        match self.cursor.observe(size) {
            Observation::Unchanged => return ControlFlow::Continue(()),
            Observation::Rotated => {
                tracing::info!(
                    subscription = %self.id,
                    size,
                    path = %self.config.path.display(),
                    "log file rotated or truncated"
                );
                self.emit(LogRecord::system(ROTATED_NOTICE).into()).await?;
                if size == 0 {
                    return ControlFlow::Continue(());
                }
            }
            Observation::Grown => {}
        }

        self.read_and_emit().await?;
        ControlFlow::Continue(())
    }

    /// Read from the cursor, send accepted lines, then advance the cursor
    ///
    /// The cursor advances even when nothing passed the filter. Yields the
    /// number of records sent, `None` if the read failed.
    async fn read_and_emit(&mut self) -> ControlFlow<(), Option<usize>> {
        let chunk = match self.read(self.cursor.offset()).await {
            Ok(chunk) => chunk,
            Err(TailError::SourceUnavailable(_)) => {
                self.emit(LogRecord::system(MISSING_NOTICE).into()).await?;
                return ControlFlow::Continue(None);
            }
            Err(e) => {
                self.report(&e).await?;
                return ControlFlow::Continue(None);
            }
        };

        let records = filter_lines(&chunk.lines, self.filter);
        let delivered = records.len();
        for record in records {
            self.emit(record.into()).await?;
        }
        self.cursor.advance(chunk.new_offset);

        if chunk.bytes_read > 0 {
            tracing::trace!(
                subscription = %self.id,
                bytes = chunk.bytes_read,
                lines = chunk.lines.len(),
                delivered,
                offset = self.cursor.offset(),
                "chunk delivered"
            );
        }
        ControlFlow::Continue(Some(delivered))
    }

    async fn report(&self, err: &TailError) -> ControlFlow<()> {
        tracing::warn!(subscription = %self.id, error = %err, "error polling log file");
        self.emit(read_error_notice(err).into()).await
    }

    /// Push one unit, unless the subscription has been removed
    async fn emit(&self, unit: StreamUnit) -> ControlFlow<()> {
        if !self.registry.is_active(&self.id) {
            return ControlFlow::Break(());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => ControlFlow::Break(()),
            sent = self.tx.send(unit) => match sent {
                Ok(()) => ControlFlow::Continue(()),
                Err(_) => ControlFlow::Break(()),
            },
        }
    }

    async fn size(&self) -> Result<Option<u64>> {
        let path = self.config.path.clone();
        blocking(move || file_size(&path)).await
    }

    async fn read(&self, offset: u64) -> Result<Chunk> {
        let path = self.config.path.clone();
        blocking(move || read_chunk(&path, offset)).await
    }
}

/// Run blocking file I/O off the async workers
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TailError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcdash_types::Severity;

    #[test]
    fn test_config_defaults() {
        let config = TailConfig::new("latest.log");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.keepalive_interval, Duration::from_secs(25));
        assert_eq!(config.initial_window, 50_000);
        assert_eq!(config.channel_capacity, 1000);
    }

    #[test]
    fn test_read_error_notice_is_system() {
        let err = TailError::Read {
            path: PathBuf::from("latest.log"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let notice = read_error_notice(&err);
        assert_eq!(notice.severity, Severity::System);
        assert_eq!(notice.text, "Error reading log file: failed to read latest.log: denied");
    }

    #[tokio::test]
    async fn test_tick_advances_past_filtered_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.log");
        std::fs::write(&path, "").unwrap();

        let registry = Arc::new(SubscriptionRegistry::default());
        let id = SubscriptionId::from("offsets");
        let cancel = registry.register(id.clone(), LevelFilter::Error).unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let mut tail = TailLoop::new(
            id,
            LevelFilter::Error,
            TailConfig::new(&path),
            registry,
            cancel,
            tx,
        );

        assert!(tail.start().await.is_continue());
        assert_eq!(
            rx.recv().await.unwrap(),
            StreamUnit::Record(LogRecord::system(WAITING_NOTICE))
        );

        let content = "[a/INFO]: one\n[b/WARN]: two\n";
        std::fs::write(&path, content).unwrap();
        assert!(tail.tick().await.is_continue());
        assert_eq!(tail.cursor.offset(), content.len() as u64);
        assert!(rx.try_recv().is_err());

        // Nothing new: offset stays, nothing sent
        assert!(tail.tick().await.is_continue());
        assert_eq!(tail.cursor.offset(), content.len() as u64);
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_start_seeds_on_first_successful_size() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("logs");
        // A regular file where a directory should be makes the size check fail
        std::fs::write(&parent, "not a directory").unwrap();
        let path = parent.join("latest.log");

        let registry = Arc::new(SubscriptionRegistry::default());
        let id = SubscriptionId::from("late-seed");
        let cancel = registry.register(id.clone(), LevelFilter::Info).unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let mut tail = TailLoop::new(
            id,
            LevelFilter::Info,
            TailConfig::new(&path).with_initial_window(19),
            registry,
            cancel,
            tx,
        );

        assert!(tail.start().await.is_continue());
        match rx.try_recv().unwrap() {
            StreamUnit::Record(record) => {
                assert!(record.is_system());
                assert!(record.text.starts_with("Error reading log file"));
            }
            other => panic!("unexpected unit: {other:?}"),
        }
        assert!(rx.try_recv().is_err());

        std::fs::remove_file(&parent).unwrap();
        std::fs::create_dir(&parent).unwrap();
        let mut content = "[old/INFO]: stale\n".repeat(10);
        content.push_str("[new/INFO]: recent\n");
        std::fs::write(&path, &content).unwrap();

        // Only the backlog window is sent, not the whole file
        assert!(tail.tick().await.is_continue());
        assert_eq!(
            rx.try_recv().unwrap(),
            StreamUnit::Record(LogRecord::new(Severity::Info, "[new/INFO]: recent"))
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(tail.cursor.offset(), content.len() as u64);
    }

    #[tokio::test]
    async fn test_emit_stops_after_unregister() {
        let registry = Arc::new(SubscriptionRegistry::default());
        let id = SubscriptionId::from("gone");
        let cancel = registry.register(id.clone(), LevelFilter::All).unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let tail = TailLoop::new(
            id.clone(),
            LevelFilter::All,
            TailConfig::new("latest.log"),
            Arc::clone(&registry),
            cancel,
            tx,
        );

        assert!(tail.emit(StreamUnit::Heartbeat).await.is_continue());
        registry.unregister(&id);
        assert!(tail.emit(StreamUnit::Heartbeat).await.is_break());
        assert_eq!(rx.recv().await, Some(StreamUnit::Heartbeat));
        assert!(rx.try_recv().is_err());
    }
}
