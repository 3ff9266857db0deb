//! Bounded polling with exponential backoff.
//!
//! Used wherever a migration has to wait for the data plane to catch up
//! with the control plane. The number of polls is capped; running out
//! of attempts is an error for the caller to report, never a hang.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use l3ha_core::ControlPlaneError;

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("condition not met after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("poll failed: {0}")]
    ControlPlane(#[from] ControlPlaneError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Polls before giving up. At least one poll always happens.
    pub max_attempts: u32,
    /// Sleep after the first unsuccessful poll.
    pub initial_interval: Duration,
    /// Upper bound for the doubled interval.
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Poll up to `max_attempts` times without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
        }
    }

    /// Poll up to `max_attempts` times, sleeping `interval` between
    /// polls.
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            initial_interval: interval,
            max_interval: interval,
        }
    }

        /// Sleep before poll number `attempt + 1` (zero-based `attempt`).
    pub fn interval(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_interval
            .saturating_mul(factor)
            .min(self.max_interval)
    }

    /// Call `condition` until it returns `Ok(true)`, sleeping between
    /// polls. Returns the number of polls made. A control-plane error
    /// from `condition` aborts the wait.
    pub fn wait_until<F>(&self, mut condition: F) -> Result<u32, WaitError>
    where
        F: FnMut(u32) -> Result<bool, ControlPlaneError>,
    {
        let attempts = self.max_attempts.max(1);
        for attempt in 0..attempts {
            if condition(attempt)? {
                return Ok(attempt + 1);
            }
            if attempt + 1 < attempts {
                let delay = self.interval(attempt);
                debug!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "condition not met, backing off");
                std::thread::sleep(delay);
            }
        }
        Err(WaitError::Exhausted { attempts })
    }
}
