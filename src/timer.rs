//! Remaining-time reconciliation against the service clock.
//!
//! Remaining time is always derived from `start_time + time_limit - now`,
//! never held as an independently ticking counter, so a missed tick or a
//! drifting local interval self-corrects on the next evaluation. The
//! reconciler also guarantees the expiry notification fires exactly once
//! per poll no matter how many evaluations land at or past zero.

use crate::model::Poll;

/// Seconds left on `poll` at `now_ms`, rounded up.
///
/// `ceil(max(0, time_limit - (now - start_time) / 1000))`; an inactive
/// poll always reads zero.
pub fn remaining_secs(poll: &Poll, now_ms: u64) -> u64 {
    if !poll.is_active {
        return 0;
    }
    let elapsed_ms = now_ms.saturating_sub(poll.start_time);
    let remaining_ms = poll.time_limit.saturating_mul(1000).saturating_sub(elapsed_ms);
    remaining_ms.div_ceil(1000)
}

/// Render seconds as an `MM:SS` clock.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Result of one timer evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerReading {
    pub remaining: u64,
    /// True exactly once per poll: the evaluation that observed the
    /// transition to zero. The periodic schedule should stop after this.
    pub expired_now: bool,
}

/// Tracks which poll is being timed and whether its expiry already fired.
#[derive(Debug, Default)]
pub struct TimerReconciler {
    poll_id: Option<String>,
    expiry_fired: bool,
}

impl TimerReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the timer for `poll` at `now_ms`.
    ///
    /// Call this on the 1 s cadence and once immediately whenever the poll
    /// reference changes; a changed poll id resets the expiry latch so the
    /// new poll gets its own single notification.
    pub fn evaluate(&mut self, poll: &Poll, now_ms: u64) -> TimerReading {
        if self.poll_id.as_deref() != Some(poll.id.as_str()) {
            self.poll_id = Some(poll.id.clone());
            self.expiry_fired = false;
        }

        let remaining = remaining_secs(poll, now_ms);
        let expired_now = remaining == 0 && !self.expiry_fired;
        if expired_now {
            self.expiry_fired = true;
        }
        TimerReading { remaining, expired_now }
    }

    /// True once this poll's expiry notification has been raised.
    pub fn expired(&self) -> bool {
        self.expiry_fired
    }

    /// Forget the tracked poll (view teardown).
    pub fn clear(&mut self) {
        self.poll_id = None;
        self.expiry_fired = false;
    }
}
