//! Stall detection for the frame source.
//!
//! Some platforms silently cancel the camera feed (notably after a
//! completed file download). The watchdog compares the frame sequence
//! counter against the value seen at the previous tick; an unchanged
//! counter means the feed has stalled and should be reacquired.

/// Outcome of a watchdog tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// Frames advanced since the last tick.
    Healthy,
    /// No frame arrived since the last tick; the source should be reacquired.
    Stalled,
}

/// Detects a stalled frame source.
///
/// Idempotent: a feed that stays stalled produces `Stalled` on every
/// tick, and reacquisition is safe to retrigger.
#[derive(Debug, Default)]
pub struct CaptureWatchdog {
    /// Sequence counter observed at the previous tick.
    last_sequence: Option<u64>,
    /// Total stalls detected.
    stall_count: u64,
}

impl CaptureWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether the frame counter advanced since the last tick.
    pub fn tick(&mut self, current_sequence: u64) -> WatchdogVerdict {
        let verdict = match self.last_sequence {
            Some(prev) if prev == current_sequence => {
                self.stall_count += 1;
                tracing::warn!(
                    sequence = current_sequence,
                    stalls = self.stall_count,
                    "frame source stalled"
                );
                WatchdogVerdict::Stalled
            }
            _ => WatchdogVerdict::Healthy,
        };
        self.last_sequence = Some(current_sequence);
        verdict
    }

    /// Total stalls detected so far.
    pub fn stall_count(&self) -> u64 {
        self.stall_count
    }

    /// Forgets the observed counter (e.g. after an explicit restart).
    pub fn reset(&mut self) {
        self.last_sequence = None;
    }
}
