//! Counting semaphore built on `parking_lot`.

use parking_lot::{Condvar, Mutex};

/// A classic counting semaphore.
///
/// Grid nodes use one each: a node takes one permit per predecessor before
/// it runs, and every finished predecessor hands out one permit. Starting
/// from zero, the semaphore is back at zero after each batch.
#[derive(Debug, Default)]
pub struct CountingSemaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl CountingSemaphore {
    /// Create a semaphore holding `permits`.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Block until one permit is available and take it.
    pub fn acquire(&self) {
        self.acquire_many(1);
    }

    /// Block until `n` permits are available and take them all at once.
    pub fn acquire_many(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut permits = self.permits.lock();
        while *permits < n {
            self.available.wait(&mut permits);
        }
        *permits -= n;
    }

    /// Take one permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Return `n` permits and wake the waiters.
    pub fn release(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut permits = self.permits.lock();
        *permits += n;
        drop(permits);
        self.available.notify_all();
    }

    /// Permits currently held.
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}
