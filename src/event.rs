//! One-shot wake event used for executor parking.
//!
//! Each parked executor owns one event for the lifetime of a single
//! rendezvous. Signalling is idempotent and sticky: a wait that starts after
//! the signal returns immediately, so a wake-up cannot be lost across the
//! window where the queue monitor is released before the wait begins.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A latch that can be signalled once and waited on with or without a
/// timeout.
///
/// Unlike a bare `Condvar`, the signal is remembered: `wait` called after
/// `signal` does not block. The event cannot be reset; it is discarded
/// together with the parking slot that owns it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use forge_queue::event::OneShotEvent;
///
/// let event = Arc::new(OneShotEvent::new());
/// let waiter = Arc::clone(&event);
///
/// let handle = thread::spawn(move || waiter.wait());
/// event.signal();
/// handle.join().unwrap();
/// assert!(event.is_signaled());
/// ```
#[derive(Debug, Default)]
pub struct OneShotEvent {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl OneShotEvent {
    /// Creates an unsignalled event.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Fires the event, waking every current and future waiter.
    ///
    /// Calling this more than once is a no-op.
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock();
        if !*signaled {
            *signaled = true;
            self.cond.notify_all();
        }
    }

    /// Returns true once `signal` has been called.
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }

    /// Blocks until the event fires. Returns immediately if it already has.
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.cond.wait(&mut signaled);
        }
    }

    /// Blocks until the event fires or `timeout` elapses.
    ///
    /// Returns true if the event fired, false on timeout.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut signaled = self.signaled.lock();
        if *signaled {
            return true;
        }
        // A single timed wait is not enough: the Condvar can wake spuriously,
        // so keep waiting on whatever remains of the deadline.
        let deadline = std::time::Instant::now() + timeout;
        while !*signaled {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let result = self.cond.wait_for(&mut signaled, deadline - now);
            if result.timed_out() {
                return *signaled;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_signal_then_wait_returns_immediately() {
        let event = OneShotEvent::new();
        event.signal();
        event.wait();
        assert!(event.is_signaled());
    }

    #[test]
    fn test_signal_is_idempotent() {
        let event = OneShotEvent::new();
        event.signal();
        event.signal();
        assert!(event.wait_for(Duration::from_millis(1)));
    }

    #[test]
    fn test_wait_blocks_until_signal() {
        let event = Arc::new(OneShotEvent::new());
        let event2 = Arc::clone(&event);

        let handle = thread::spawn(move || {
            event2.wait();
            true
        });

        thread::sleep(Duration::from_millis(10));
        event.signal();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_wait_for_times_out() {
        let event = OneShotEvent::new();
        assert!(!event.wait_for(Duration::from_millis(20)));
        assert!(!event.is_signaled());
    }

    #[test]
    fn test_wait_for_observes_late_signal() {
        let event = Arc::new(OneShotEvent::new());
        let event2 = Arc::clone(&event);

        let handle = thread::spawn(move || event2.wait_for(Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(10));
        event.signal();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_multiple_waiters_all_wake() {
        let event = Arc::new(OneShotEvent::new());
        let mut handles = vec![];

        for _ in 0..5 {
            let event = Arc::clone(&event);
            handles.push(thread::spawn(move || event.wait()));
        }

        thread::sleep(Duration::from_millis(10));
        event.signal();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
