use std::{thread, time::Duration};

/// Blocking delay source. Swapped out in tests to record waits instead of sleeping.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Bounded polling: up to `attempts` checks with `delay` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Run `check` until it returns true. Returns the 1-based attempt that
    /// succeeded, or `None` once attempts are exhausted. No delay follows the
    /// final attempt. A zero attempt count still checks once.
    pub fn poll<F>(&self, sleeper: &dyn Sleeper, mut check: F) -> Option<u32>
    where
        F: FnMut(u32) -> bool,
    {
        let attempts = self.attempts.max(1);
        for attempt in 1..=attempts {
            if check(attempt) {
                return Some(attempt);
            }
            if attempt < attempts {
                sleeper.sleep(self.delay);
            }
        }
        None
    }
}
