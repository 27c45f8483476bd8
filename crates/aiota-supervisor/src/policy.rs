//! Restart bookkeeping for one handle.

use std::time::Duration;

use aiota_core::RestartOn;

use crate::descriptor::RestartPolicy;

/// What to do after a child exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start the child again after `delay`.
    Restart { delay: Duration },
    /// No restarts left (or the run is not eligible): stop for good.
    Exhausted,
}

/// Counts restarts across the lifetime of a handle.
///
/// The counter only grows. A long healthy run does not give restarts back.
#[derive(Debug, Clone)]
pub struct RestartTracker {
    policy: RestartPolicy,
    restarts: u32,
}

impl RestartTracker {
    pub fn new(policy: RestartPolicy) -> Self {
        Self { policy, restarts: 0 }
    }

    /// Restarts consumed so far.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Whether a run of this length counts as spinning.
    pub fn is_spinning(&self, uptime: Duration) -> bool {
        uptime < self.policy.min_uptime
    }

    /// Record an exit after `uptime` and decide what happens next.
    pub fn on_exit(&mut self, uptime: Duration) -> Decision {
        let eligible = match self.policy.restart_on {
            RestartOn::Always => true,
            RestartOn::MinUptime => !self.is_spinning(uptime),
        };

        if eligible && self.restarts < self.policy.max_restarts {
            self.restarts += 1;
            Decision::Restart {
                delay: self.policy.spin_sleep,
            }
        } else {
            Decision::Exhausted
        }
    }
}
