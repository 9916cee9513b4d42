//! Clock-driven timers
//!
//! Nothing here sleeps or spawns. The host passes the current time in
//! milliseconds (`Date.now()` in the browser) and the timers answer whether
//! they are due. This keeps every scheduling decision deterministic.

/// A single cancellable deadline. Fires at most once per arming.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline {
    due_at: Option<u64>,
}

impl Deadline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) to fire `delay_ms` after `now`
    pub fn arm(&mut self, now: u64, delay_ms: u64) {
        self.due_at = Some(now.saturating_add(delay_ms));
    }

    /// Disarm. Returns whether it was armed.
    pub fn cancel(&mut self) -> bool {
        self.due_at.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.due_at.is_some()
    }

    pub fn due_at(&self) -> Option<u64> {
        self.due_at
    }

    /// True exactly once when `now` reaches the deadline; disarms on firing.
    pub fn fire(&mut self, now: u64) -> bool {
        match self.due_at {
            Some(due) if now >= due => {
                self.due_at = None;
                true
            }
            _ => false,
        }
    }
}

/// Cancel-and-reschedule debouncer: a burst of triggers collapses into one
/// firing `window_ms` after the last trigger.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window_ms: u64,
    deadline: Deadline,
    triggers: u64,
    firings: u64,
}

impl Debouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            deadline: Deadline::new(),
            triggers: 0,
            firings: 0,
        }
    }

    pub fn trigger(&mut self, now: u64) {
        self.triggers += 1;
        self.deadline.arm(now, self.window_ms);
    }

    pub fn poll(&mut self, now: u64) -> bool {
        let fired = self.deadline.fire(now);
        if fired {
            self.firings += 1;
        }
        fired
    }

    pub fn cancel(&mut self) -> bool {
        self.deadline.cancel()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_armed()
    }

    pub fn triggers(&self) -> u64 {
        self.triggers
    }

    pub fn firings(&self) -> u64 {
        self.firings
    }
}

/// Fixed-period timer. A late poll fires once and reschedules from `now`
/// rather than replaying every missed period.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period_ms: u64,
    next_due: Option<u64>,
}

impl IntervalTimer {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            next_due: None,
        }
    }

    pub fn start(&mut self, now: u64) {
        self.next_due = Some(now.saturating_add(self.period_ms));
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn poll(&mut self, now: u64) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now.saturating_add(self.period_ms));
                true
            }
            _ => false,
        }
    }
}
