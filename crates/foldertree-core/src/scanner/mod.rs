/// Scanner module — background producers.
///
/// Every producer runs on its own named thread, walks the tree with the
/// shared [`walker::DirectoryWalker`], and streams immutable events to the
/// consumer through a bounded crossbeam channel:
///
/// - [`sizes`] — cumulative folder sizes (walk, then depth-ordered rollup).
/// - [`search`] — case-insensitive substring search over entry names.
/// - [`enumerate`] — directory paths feeding the "expand all" queue.
///
/// Producers never touch consumer state. Cancellation is cooperative via a
/// [`CancellationToken`], and every producer sends exactly one terminal
/// `Done` event however it ends, so a consumer waiting for it cannot hang.
pub mod enumerate;
pub mod precount;
pub mod progress;
pub mod search;
pub mod sizes;
pub mod walker;

use crate::error::ScanError;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum number of events that may queue up in a producer channel.
///
/// The consumer drains a bounded number of events per tick. If it falls
/// behind, the producer blocks on `send` briefly rather than consuming
/// unbounded heap.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// How long a replaced producer is given to reach its terminal state.
pub const STOP_TIMEOUT: Duration = Duration::from_millis(500);

/// How long producers are given to finish when the engine shuts down.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared cooperative-cancellation flag.
///
/// Cloning yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Handle to a running or finished producer thread.
///
/// Dropping the handle cancels the producer; its thread drains into a
/// disconnected channel and exits on its own.
pub struct ProducerHandle<E> {
    /// Events from the producer, in emission order.
    pub events: Receiver<E>,
    root: PathBuf,
    cancel: CancellationToken,
    thread: Option<thread::JoinHandle<()>>,
}

impl<E> ProducerHandle<E> {
    /// Root directory this producer is bound to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Request the producer to stop as soon as possible. Non-blocking.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once the producer thread has returned.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Cancel, then wait up to `timeout` for the thread to exit.
    ///
    /// Pending events are discarded while waiting so a producer blocked on a
    /// full channel can make progress to its terminal state. Returns `true`
    /// if the thread finished within the timeout.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.cancel();
        let deadline = Instant::now() + timeout;
        loop {
            loop {
                match self.events.try_recv() {
                    Ok(_) => continue,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
            if self.is_finished() {
                if let Some(t) = self.thread.take() {
                    let _ = t.join();
                }
                debug!("Producer for {} stopped", self.root.display());
                return true;
            }
            if Instant::now() >= deadline {
                warn!(
                    "Producer for {} did not stop within {timeout:?}; detaching",
                    self.root.display()
                );
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl<E> Drop for ProducerHandle<E> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn `body` on a named background thread with a fresh channel and token.
pub(crate) fn spawn_producer<E, F>(
    name: &'static str,
    root: PathBuf,
    body: F,
) -> Result<ProducerHandle<E>, ScanError>
where
    E: Send + 'static,
    F: FnOnce(Sender<E>, CancellationToken) + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded::<E>(PROGRESS_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let thread = thread::Builder::new()
        .name(format!("foldertree-{name}"))
        .spawn(move || body(tx, cancel_clone))
        .map_err(|source| ScanError::Spawn { name, source })?;

    Ok(ProducerHandle {
        events: rx,
        root,
        cancel,
        thread: Some(thread),
    })
}
