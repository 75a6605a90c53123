//! # Drain Counter
//!
//! Bounded-wait counter of in-flight operations on one connection.
//!
//! The read loop increments it before processing a frame and decrements it
//! once the reply has been written. A close waits for it to reach zero, but
//! never longer than its timeout, so a socket is not closed under a pending
//! write unless that write is pathologically slow.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct DrainCounter {
    count: AtomicUsize,
    zero: Notify,
}

impl DrainCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement the counter, waking waiters when it reaches zero.
    ///
    /// # Panics
    /// Panics if the counter is already zero. An unmatched decrement is a
    /// contract violation and is never clamped.
    pub fn decrement(&self) {
        let previous = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match previous {
            Ok(1) => self.zero.notify_waiters(),
            Ok(_) => {}
            Err(_) => panic!("drain counter decremented below zero"),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Wait for the counter to reach zero.
    ///
    /// Returns `true` if it did before `limit` elapsed, `false` otherwise.
    pub async fn wait_until_zero(&self, limit: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.zero.notified();
                tokio::pin!(notified);
                // Register before checking so a concurrent final decrement is not missed
                notified.as_mut().enable();

                if self.count() == 0 {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(limit, drained).await.is_ok()
    }

    /// Increment now and decrement when the returned guard drops
    pub fn enter(&self) -> DrainGuard<'_> {
        self.increment();
        DrainGuard { counter: self }
    }
}

/// RAII handle for one in-flight operation
#[must_use = "the operation is only tracked while the guard is alive"]
pub struct DrainGuard<'a> {
    counter: &'a DrainCounter,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.counter.decrement();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn tracks_increments_and_decrements() {
        let counter = DrainCounter::new();
        counter.increment();
        counter.increment();
        assert_eq!(counter.count(), 2);

        counter.decrement();
        counter.decrement();
        assert_eq!(counter.count(), 0);
    }

    #[test]
    #[should_panic(expected = "drain counter decremented below zero")]
    fn unmatched_decrement_panics() {
        let counter = DrainCounter::new();
        counter.decrement();
    }

    #[test]
    fn guard_decrements_on_drop() {
        let counter = DrainCounter::new();
        {
            let _a = counter.enter();
            let _b = counter.enter();
            assert_eq!(counter.count(), 2);
        }
        assert_eq!(counter.count(), 0);
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_idle() {
        let counter = DrainCounter::new();
        assert!(counter.wait_until_zero(Duration::from_millis(10)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_while_busy() {
        let counter = DrainCounter::new();
        counter.increment();

        let start = tokio::time::Instant::now();
        assert!(!counter.wait_until_zero(Duration::from_secs(10)).await);
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert_eq!(counter.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_wakes_on_final_decrement() {
        let counter = Arc::new(DrainCounter::new());
        counter.increment();
        counter.increment();

        let worker = {
            let counter = counter.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                counter.decrement();
                tokio::time::sleep(Duration::from_secs(1)).await;
                counter.decrement();
            })
        };

        let start = tokio::time::Instant::now();
        assert!(counter.wait_until_zero(Duration::from_secs(10)).await);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(10));
        worker.await.unwrap();
    }
}
