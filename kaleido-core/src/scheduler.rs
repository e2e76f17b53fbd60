use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{trace, warn};

/// What the task should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

/// Cancellable fixed-delay repeating task running on its own thread.
///
/// The first tick runs immediately; each later tick starts `interval` after
/// the previous one finished, so ticks never overlap.
pub struct RepeatingTask {
    cancelled: Arc<AtomicBool>,
    // Dropping the sender wakes the worker out of its wait.
    wake: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTask {
    pub fn spawn<F>(name: String, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> TickOutcome + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = bounded::<()>(0);
        let worker_cancelled = Arc::clone(&cancelled);
        let thread_name = name.clone();

        let spawned = thread::Builder::new().name(name).spawn(move || {
            loop {
                if worker_cancelled.load(Ordering::Acquire) {
                    break;
                }
                if tick() == TickOutcome::Stop {
                    break;
                }
                match wake_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            trace!("Repeating task '{}' exited", thread_name);
        });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to spawn repeating task thread: {}", e);
                cancelled.store(true, Ordering::Release);
                None
            }
        };

        Self {
            cancelled,
            wake: Some(wake_tx),
            handle,
        }
    }

    /// Stops the task. Safe to call any number of times, including from the
    /// task's own thread. Does not wait for an in-flight tick to finish.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.wake.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
