//! Exam countdown.
//!
//! The timer does not own a clock. The scheduling environment calls `tick()`
//! once per second; the timer counts down and reports expiry exactly once.

use std::fmt;

/// Callback fired when the countdown reaches zero.
pub type ExpiryCallback = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Idle,
    Running,
    Expired,
    Cancelled,
}

/// Result of a single `tick()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Counted down one second; time remains.
    Running { remaining_secs: u64 },
    /// This tick reached zero. Returned once per timer.
    Expired,
    /// The timer is not running (never started, cancelled or already expired).
    Inactive,
}

/// Countdown from a configured duration.
pub struct Timer {
    remaining_secs: u64,
    state: TimerState,
    on_expire: Option<ExpiryCallback>,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            remaining_secs: 0,
            state: TimerState::Idle,
            on_expire: None,
        }
    }

    /// Register the expiry callback. Replaces any previous one.
    pub fn on_expire(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_expire = Some(Box::new(callback));
    }

    /// Start counting down from `duration_secs`.
    ///
    /// Starting at zero expires immediately. Has no effect once the timer has
    /// expired or been cancelled.
    pub fn start(&mut self, duration_secs: u64) {
        if matches!(self.state, TimerState::Expired | TimerState::Cancelled) {
            return;
        }
        self.remaining_secs = duration_secs;
        self.state = TimerState::Running;
        if duration_secs == 0 {
            self.expire();
        }
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> Tick {
        if self.state != TimerState::Running {
            return Tick::Inactive;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.expire();
            Tick::Expired
        } else {
            Tick::Running {
                remaining_secs: self.remaining_secs,
            }
        }
    }

    /// Stop future ticks. Idempotent; does not fire the expiry callback.
    pub fn cancel(&mut self) {
        if self.state == TimerState::Running || self.state == TimerState::Idle {
            self.state = TimerState::Cancelled;
        }
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn is_expired(&self) -> bool {
        self.state == TimerState::Expired
    }

    fn expire(&mut self) {
        self.state = TimerState::Expired;
        if let Some(callback) = self.on_expire.take() {
            callback();
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("remaining_secs", &self.remaining_secs)
            .field("state", &self.state)
            .field("on_expire", &self.on_expire.is_some())
            .finish()
    }
}

/// Format seconds as `MM:SS` (minutes may exceed 59).
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting_timer() -> (Timer, Arc<AtomicU32>) {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timer = Timer::new();
        let counter = Arc::clone(&fired);
        timer.on_expire(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (timer, fired)
    }

    #[test]
    fn counts_down_and_expires_once() {
        let (mut timer, fired) = counting_timer();
        timer.start(3);
        assert_eq!(timer.tick(), Tick::Running { remaining_secs: 2 });
        assert_eq!(timer.tick(), Tick::Running { remaining_secs: 1 });
        assert_eq!(timer.tick(), Tick::Expired);
        assert_eq!(timer.tick(), Tick::Inactive);
        assert_eq!(timer.tick(), Tick::Inactive);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.remaining_secs(), 0);
    }

    #[test]
    fn cancel_is_idempotent_and_silent() {
        let (mut timer, fired) = counting_timer();
        timer.start(2);
        timer.cancel();
        timer.cancel();
        assert_eq!(timer.tick(), Tick::Inactive);
        assert!(!timer.is_running());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timer.remaining_secs(), 2);
    }

    #[test]
    fn start_at_zero_expires_immediately() {
        let (mut timer, fired) = counting_timer();
        timer.start(0);
        assert!(timer.is_expired());
        assert_eq!(timer.tick(), Tick::Inactive);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn restart_after_expiry_is_ignored() {
        let (mut timer, fired) = counting_timer();
        timer.start(1);
        assert_eq!(timer.tick(), Tick::Expired);
        timer.start(10);
        assert_eq!(timer.tick(), Tick::Inactive);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(3600), "60:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(0), "00:00");
    }
}
