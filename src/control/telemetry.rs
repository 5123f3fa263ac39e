use core::sync::atomic::{AtomicU32, Ordering};

use crate::control::axis::AxisShared;

/// Latest-value-wins tick notification.
///
/// The control tick bumps the sequence after publishing its atomics; a
/// diagnostic consumer polls for a newer sequence. Unconsumed ticks are
/// overwritten, never queued, and the loop does not depend on anyone
/// reading this.
pub struct TickNotifier {
    seq: AtomicU32,
}

impl TickNotifier {
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
        }
    }

    pub(crate) fn notify(&self) {
        self.seq.fetch_add(1, Ordering::Release);
    }

    pub fn current(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }
}

impl Default for TickNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot a diagnostic consumer gets for a tick it has not seen yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub seq: u32,
    pub position: i32,
    pub compare_value: u32,
}

/// Task-side poller over the tick notification.
pub struct TickListener<'a> {
    shared: &'a AxisShared,
    last_seen: u32,
}

impl<'a> TickListener<'a> {
    pub fn new(shared: &'a AxisShared) -> Self {
        Self {
            last_seen: shared.tick_notifier().current(),
            shared,
        }
    }

    /// Returns a report if at least one tick completed since the last poll.
    /// Intermediate ticks collapse into the latest published values.
    pub fn poll(&mut self) -> Option<TickReport> {
        let seq = self.shared.tick_notifier().current();
        if seq == self.last_seen {
            return None;
        }
        self.last_seen = seq;
        Some(TickReport {
            seq,
            position: self.shared.position(),
            compare_value: self.shared.compare_value(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_unconsumed_ticks() {
        let shared = AxisShared::new();
        let mut listener = TickListener::new(&shared);
        assert_eq!(listener.poll(), None);

        shared.publish_tick(100, 1_000);
        shared.publish_tick(140, 1_200);

        let report = listener.poll().expect("tick pending");
        assert_eq!(report.position, 140);
        assert_eq!(report.compare_value, 1_200);
        assert_eq!(listener.poll(), None);
    }
}
