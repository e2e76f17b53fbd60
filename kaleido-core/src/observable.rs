use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::error;

/// Callback invoked with the value that changed.
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by `subscribe`, used to remove that registration later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Capability of anything that can be watched for changes.
///
/// Subscriptions are additive: registering the same observer twice yields two
/// ids and two calls per change.
pub trait Observable<T: ?Sized> {
    fn subscribe(&self, observer: Observer<T>) -> SubscriptionId;

    /// Returns false if the id was not (or no longer) registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Ordered subscriber list with snapshot-based delivery.
pub struct NotificationHub<T: ?Sized> {
    subscribers: Mutex<Vec<(SubscriptionId, Observer<T>)>>,
    next_id: AtomicU64,
}

impl<T: ?Sized> NotificationHub<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    // A panicking observer never runs while the lock is held, so poisoning
    // cannot leave the list half-updated.
    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Observer<T>)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Invokes every observer registered at call time, in registration order.
    ///
    /// The list is copied before delivery, so observers may subscribe or
    /// unsubscribe from inside a callback; such changes take effect on the
    /// next notification. A panicking observer is logged and skipped.
    /// Returns how many observers completed normally.
    pub fn notify(&self, subject: &T) -> usize {
        let snapshot: Vec<(SubscriptionId, Observer<T>)> = self.lock().clone();

        let mut delivered = 0;
        for (id, observer) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| observer(subject))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    error!(
                        "Observer {:?} panicked during notification: {}",
                        id,
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        delivered
    }
}

impl<T: ?Sized> Observable<T> for NotificationHub<T> {
    fn subscribe(&self, observer: Observer<T>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, observer));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }
}

impl<T: ?Sized> Default for NotificationHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
