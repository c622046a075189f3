//! Single-threaded host event loop.
//!
//! Time is a virtual millisecond counter that only moves when the owner
//! advances it, which keeps playback deterministic under test and lets the
//! command line drive the same loop in real time.

use std::{cell::Cell, rc::Rc};

/// Shared handle to the loop's millisecond clock. Clones observe the same
/// time, so transports can read it without owning the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    /// Moves the clock forward. The clock never runs backwards.
    pub fn set_ms(&self, now_ms: u64) {
        self.now_ms.set(self.now_ms.get().max(now_ms));
    }
}

/// What a repeating timer drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Autoplay advancement of the time index.
    Tick,
    /// Audio transport progress poll.
    AudioPoll,
    /// Cosmetic wave animation frame.
    Frame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A timer firing, stamped with the epoch it was armed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub id: TimerId,
    pub kind: TimerKind,
    pub epoch: u64,
    pub at_ms: u64,
}

#[derive(Debug, Clone)]
struct Timer {
    id: TimerId,
    kind: TimerKind,
    epoch: u64,
    period_ms: u64,
    due_ms: u64,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    clock: ManualClock,
    timers: Vec<Timer>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Arms a timer that first fires one period from now and then every
    /// period after that until cancelled.
    pub fn schedule_repeating(&mut self, kind: TimerKind, period_ms: u64, epoch: u64) -> TimerId {
        let period_ms = period_ms.max(1);
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            kind,
            epoch,
            period_ms,
            due_ms: self.now_ms() + period_ms,
        });
        id
    }

    /// Removes a timer. Returns whether it was still armed.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        before != self.timers.len()
    }

    pub fn armed(&self) -> usize {
        self.timers.len()
    }

    /// Earliest pending deadline, if any timer is armed.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.iter().map(|timer| timer.due_ms).min()
    }

    /// Pops the single most overdue timer and re-arms it for its next
    /// period. Callers handle each event before asking for the next one.
    pub fn poll_due(&mut self) -> Option<TimerEvent> {
        let now = self.now_ms();
        let timer = self
            .timers
            .iter_mut()
            .filter(|timer| timer.due_ms <= now)
            .min_by_key(|timer| (timer.due_ms, timer.id))?;

        let event = TimerEvent {
            id: timer.id,
            kind: timer.kind,
            epoch: timer.epoch,
            at_ms: timer.due_ms,
        };
        timer.due_ms += timer.period_ms;
        Some(event)
    }

    /// Moves the clock to `at_ms` without firing anything.
    pub fn set_time(&mut self, at_ms: u64) {
        self.clock.set_ms(at_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let mut scheduler = Scheduler::new();
        let slow = scheduler.schedule_repeating(TimerKind::Tick, 100, 0);
        let fast = scheduler.schedule_repeating(TimerKind::Frame, 30, 0);

        scheduler.set_time(100);
        let fired: Vec<TimerId> = std::iter::from_fn(|| scheduler.poll_due())
            .map(|event| event.id)
            .collect();

        assert_eq!(fired, vec![fast, fast, fast, slow]);
        assert_eq!(scheduler.next_deadline(), Some(120));
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut scheduler = Scheduler::new();
        let tick = scheduler.schedule_repeating(TimerKind::Tick, 10, 3);

        scheduler.set_time(50);
        let first = scheduler.poll_due().unwrap();
        assert_eq!(first.epoch, 3);
        assert_eq!(first.at_ms, 10);

        assert!(scheduler.cancel(tick));
        assert!(scheduler.poll_due().is_none());
        assert!(!scheduler.cancel(tick));
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn clock_handles_share_time() {
        let scheduler = Scheduler::new();
        let clock = scheduler.clock();

        clock.set_ms(250);
        assert_eq!(scheduler.now_ms(), 250);

        clock.set_ms(100);
        assert_eq!(scheduler.now_ms(), 250);
    }
}
