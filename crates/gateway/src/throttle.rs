//! Minimum spacing between outbound calls.
//!
//! One shared "next allowed instant" per gateway. The lock is held only for
//! the compare-and-advance, never while sleeping or sending.

use crate::context::CallContext;
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};
use tokio::time::Instant;
use wolt_types::ContextError;

#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl Throttle {
    /// A zero interval disables the throttle.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: Mutex::new(None),
        }
    }

    /// Builds a throttle from a signed millisecond count; values `<= 0` disable it.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Self::new(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Waits for the next slot and claims it.
    ///
    /// # Errors
    ///
    /// Returns the context's error if it finishes before a slot frees up; no
    /// slot is consumed in that case.
    pub async fn acquire(&self, ctx: &CallContext) -> Result<(), ContextError> {
        if !self.is_enabled() {
            return Ok(());
        }
        loop {
            let wait = match self.try_claim(Instant::now()) {
                None => return Ok(()),
                Some(wait) => wait,
            };
            tracing::trace!(wait_ms = wait.as_millis(), "throttle slot busy");
            tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                () = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Claims the slot if `now` has reached it, otherwise returns the
    /// remaining wait.
    fn try_claim(&self, now: Instant) -> Option<Duration> {
        let mut next = self
            .next_allowed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *next {
            Some(at) if at > now => Some(at - now),
            _ => {
                *next = Some(now + self.interval);
                None
            }
        }
    }
}
