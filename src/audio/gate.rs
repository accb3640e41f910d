//! Microphone gate that keeps the assistant from hearing itself.
//!
//! The gate is raised for the whole of every speak invocation, including the
//! settle delay after audio output, and the capture callback drops every frame
//! that arrives while it is raised.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Process-wide "system is speaking" flag, shared by `Arc`.
///
/// Not a semaphore: there are no waiters, only a flag the capture side polls.
#[derive(Debug)]
pub struct AudioGate {
    raised: AtomicBool,
    settle: Duration,
    cycles: AtomicU64,
}

impl AudioGate {
    /// Creates a lowered gate with the given settle delay.
    pub fn new(settle: Duration) -> Self {
        Self {
            raised: AtomicBool::new(false),
            settle,
            cycles: AtomicU64::new(0),
        }
    }

    /// Raises the gate. Frames delivered from now on are dropped.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Waits out the settle delay, then lowers the gate.
    ///
    /// Call this once audio output has completed (or timed out).
    pub fn lower(&self) {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
        self.raised.store(false, Ordering::Release);
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns true while the system is speaking or settling.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Settle delay applied by [`lower`](Self::lower).
    pub fn settle_delay(&self) -> Duration {
        self.settle
    }

    /// Number of completed raise/lower cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }
}

impl Default for AudioGate {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::defaults::SETTLE_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn starts_lowered() {
        let gate = AudioGate::default();
        assert!(!gate.is_raised());
        assert_eq!(gate.cycles(), 0);
    }

    #[test]
    fn raise_then_lower_round_trip() {
        let gate = AudioGate::new(Duration::ZERO);
        gate.raise();
        assert!(gate.is_raised());
        gate.lower();
        assert!(!gate.is_raised());
        assert_eq!(gate.cycles(), 1);
    }

    #[test]
    fn lower_waits_for_settle_delay() {
        let gate = AudioGate::new(Duration::from_millis(60));
        gate.raise();
        let start = Instant::now();
        gate.lower();
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert!(!gate.is_raised());
    }

    #[test]
    fn stays_raised_while_settling() {
        let gate = Arc::new(AudioGate::new(Duration::from_millis(200)));
        gate.raise();

        let lowering = {
            let gate = gate.clone();
            thread::spawn(move || gate.lower())
        };

        thread::sleep(Duration::from_millis(50));
        assert!(gate.is_raised(), "gate must stay raised during settle delay");

        lowering.join().unwrap();
        assert!(!gate.is_raised());
    }

    #[test]
    fn default_settle_is_configured_minimum() {
        let gate = AudioGate::default();
        assert_eq!(gate.settle_delay(), Duration::from_millis(300));
    }
}
