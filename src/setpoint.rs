//! Setpoint convergence polling.
//!
//! After a set command is issued, the poller repeatedly reads the value back
//! and compares it with the requested target until they are equal, sleeping
//! a fixed interval between polls. The comparison is EXACT floating-point
//! equality: the instrument reports values at the commanded precision, and a
//! tolerance band would change which setpoints are considered reached. Any
//! rounding or unit mismatch between the commanded and read-back value makes
//! convergence never detected, which is why the optional poll cap exists.
//!
//! The read happens before any sleep, so a target that is already reached is
//! confirmed on the first poll without waiting.

use crate::error::{AppResult, CommError};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::sleep;

/// Boxed read-back future, borrowing the caller's client for one poll.
pub type ReadbackFuture<'a> = Pin<Box<dyn Future<Output = Option<f64>> + Send + 'a>>;

/// Timing and bounds for one convergence wait.
#[derive(Clone, Copy, Debug)]
pub struct SetpointPoller {
    interval: Duration,
    max_polls: Option<u64>,
}

impl Default for SetpointPoller {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_polls: None,
        }
    }
}

impl SetpointPoller {
    pub fn new(interval: Duration, max_polls: Option<u64>) -> Self {
        Self {
            interval,
            max_polls,
        }
    }

    /// Polls `read_back` until it returns a value equal to `target`.
    ///
    /// A failed read (`None`) counts as "not converged yet" and the loop
    /// keeps going. Without a poll cap this waits forever for an instrument
    /// that never reports exact equality. Returns the number of polls it
    /// took to confirm the setpoint.
    pub async fn wait_until<C, F>(&self, target: f64, ctx: &mut C, mut read_back: F) -> AppResult<u64>
    where
        C: Send,
        F: for<'a> FnMut(&'a mut C) -> ReadbackFuture<'a> + Send,
    {
        let mut polls: u64 = 0;
        loop {
            polls += 1;
            if let Some(value) = read_back(ctx).await {
                #[allow(clippy::float_cmp)]
                if value == target {
                    return Ok(polls);
                }
            }
            if let Some(cap) = self.max_polls {
                if polls >= cap {
                    return Err(CommError::ConvergenceTimeout { target, polls });
                }
            }
            sleep(self.interval).await;
        }
    }
}
