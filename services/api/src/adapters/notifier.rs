//! services/api/src/adapters/notifier.rs
//!
//! Fire-and-forget delivery of `refresh_stories` events to the background
//! worker over a bounded channel, plus the supervisor that keeps the
//! consuming task alive.

use async_trait::async_trait;
use newswatcher_core::domain::WorkerEvent;
use newswatcher_core::ports::NotificationService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pause before a crashed consumer is started again.
const RESTART_DELAY: Duration = Duration::from_millis(200);

//=========================================================================================
// Producer Side
//=========================================================================================

/// Implements `NotificationService` with a non-blocking `try_send`.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<WorkerEvent>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiving end for the worker.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<WorkerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl NotificationService for ChannelNotifier {
    fn notify(&self, event: WorkerEvent) {
        match self.tx.try_send(event) {
            Ok(()) => debug!("Queued worker event"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Worker queue is full, dropping refresh event")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Worker queue is closed, dropping refresh event")
            }
        }
    }
}

//=========================================================================================
// Consumer Side
//=========================================================================================

/// Processes one worker event. The story indexer sits behind this seam.
#[async_trait]
pub trait RefreshHandler: Send + Sync {
    async fn handle(&self, event: WorkerEvent);
}

/// Default handler: records the request for the external indexer.
pub struct LoggingRefreshHandler;

#[async_trait]
impl RefreshHandler for LoggingRefreshHandler {
    async fn handle(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::RefreshStories { document } => info!(
                user_id = %document.id,
                filters = document.news_filters.len(),
                "Story refresh requested"
            ),
        }
    }
}

/// Spawns the consumer under a supervisor that restarts it after a panic.
///
/// The supervisor exits when `shutdown` is cancelled or every sender is gone.
pub fn spawn_worker(
    rx: mpsc::Receiver<WorkerEvent>,
    handler: Arc<dyn RefreshHandler>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let rx = Arc::new(Mutex::new(rx));
    tokio::spawn(async move {
        loop {
            let consumer = tokio::spawn(consume(rx.clone(), handler.clone(), shutdown.clone()));
            match consumer.await {
                Ok(()) => break,
                Err(e) if e.is_panic() => {
                    error!("Refresh worker crashed, restarting");
                    tokio::time::sleep(RESTART_DELAY).await;
                }
                Err(e) => {
                    warn!("Refresh worker was cancelled: {}", e);
                    break;
                }
            }
        }
        info!("Refresh worker stopped");
    })
}

async fn consume(
    rx: Arc<Mutex<mpsc::Receiver<WorkerEvent>>>,
    handler: Arc<dyn RefreshHandler>,
    shutdown: CancellationToken,
) {
    let mut rx = rx.lock().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            event = rx.recv() => match event {
                Some(event) => handler.handle(event).await,
                None => return,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use newswatcher_core::domain::{Settings, User};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn event() -> WorkerEvent {
        WorkerEvent::RefreshStories {
            document: User {
                id: Uuid::new_v4(),
                display_name: "bob".into(),
                email: "bob@example.com".into(),
                date: Utc::now(),
                settings: Settings::default(),
                news_filters: vec![],
                saved_stories: vec![],
            },
        }
    }

    /// Panics on the first event, counts the rest.
    #[derive(Default)]
    struct FlakyHandler {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl RefreshHandler for FlakyHandler {
        async fn handle(&self, _event: WorkerEvent) {
            if self.seen.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("indexer fell over");
            }
        }
    }

    #[test]
    fn full_queue_does_not_block_or_fail() {
        let (notifier, _rx) = ChannelNotifier::new(1);
        notifier.notify(event());
        notifier.notify(event());
    }

    #[test]
    fn closed_queue_is_ignored() {
        let (notifier, rx) = ChannelNotifier::new(1);
        drop(rx);
        notifier.notify(event());
    }

    #[tokio::test]
    async fn worker_is_restarted_after_a_panic() {
        let (notifier, rx) = ChannelNotifier::new(8);
        let handler = Arc::new(FlakyHandler::default());
        let shutdown = CancellationToken::new();
        let worker = spawn_worker(rx, handler.clone(), shutdown.clone());

        notifier.notify(event());
        notifier.notify(event());
        notifier.notify(event());

        for _ in 0..50 {
            if handler.seen.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(handler.seen.load(Ordering::SeqCst), 3);

        shutdown.cancel();
        worker.await.unwrap();
    }
}
