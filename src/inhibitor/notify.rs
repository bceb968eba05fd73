//! Edge-consumed change notification.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Single-slot "state changed" signal.
///
/// `signal` sets the slot and wakes every parked waiter — broadcast, not a
/// counting semaphore. `wait` returns once the slot is set; consumers call
/// `clear` after reacting, which turns the level-set slot into an
/// edge-triggered signal.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    flag: AtomicBool,
    notify: Notify,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slot. Idempotent; wakes all current waiters.
    pub fn signal(&self) {
        self.flag.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Clear the slot so the next `wait` parks until a fresh signal.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Whether the slot is currently set.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Wait until the slot is set; returns immediately if it already is.
    pub async fn wait(&self) {
        loop {
            if self.is_set() {
                return;
            }
            let notified = self.notify.notified();
            // A signal may land between the check above and registering
            // the waiter; re-check before parking.
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_wait_returns_immediately_when_set() {
        let notifier = ChangeNotifier::new();
        notifier.signal();
        notifier.wait().await;
        assert!(notifier.is_set());
    }

    #[test]
    fn test_wait_parks_until_signal() {
        let notifier = ChangeNotifier::new();
        let mut waiter = task::spawn(notifier.wait());
        assert_pending!(waiter.poll());

        notifier.signal();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn test_signal_wakes_all_waiters() {
        let notifier = ChangeNotifier::new();
        let mut first = task::spawn(notifier.wait());
        let mut second = task::spawn(notifier.wait());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        notifier.signal();
        assert_ready!(first.poll());
        assert_ready!(second.poll());
    }

    #[test]
    fn test_clear_rearms_the_edge() {
        let notifier = ChangeNotifier::new();
        notifier.signal();
        notifier.signal(); // idempotent
        assert!(notifier.is_set());

        notifier.clear();
        assert!(!notifier.is_set());
        let mut waiter = task::spawn(notifier.wait());
        assert_pending!(waiter.poll());

        notifier.signal();
        assert_ready!(waiter.poll());
    }
}
