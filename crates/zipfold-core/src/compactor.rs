//! Background thread that periodically shrinks the file caches.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use tracing::{debug, info, warn};

use crate::service::CacheService;

/// Runs [`CacheService::compact`] every `interval` until dropped.
///
/// Dropping the handle signals the thread and joins it. A compaction pass
/// that is blocked on a borrowed entry delays the join until that borrow ends.
#[derive(Debug)]
pub struct Compactor {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Compactor {
    pub fn spawn(cache: Arc<CacheService>, interval: Duration, target_ratio: f64) -> io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("zipfold-compactor".into())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) if cache.is_disposed() => break,
                        Err(RecvTimeoutError::Timeout) => match cache.compact(target_ratio) {
                            Ok(evicted) => debug!(evicted, target_ratio, "Periodic compaction"),
                            Err(e) => {
                                warn!(error = %e, "Periodic compaction stopped");
                                break;
                            }
                        },
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Compactor exiting");
            })?;
        info!(interval = ?interval, target_ratio, "Started cache compactor");
        Ok(Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Signals the thread and waits for it to finish.
    pub fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("Compactor thread panicked");
        }
    }
}

impl Drop for Compactor {
    fn drop(&mut self) {
        self.stop();
    }
}
