//! Rate limiting for gesture-driven parameter writes.
//!
//! Pointer hardware samples at several hundred Hz; the audio engine only
//! needs a parameter write per display frame. [`UpdateThrottle`] lets one
//! value through per interval and drops the rest. Dropped values are never
//! replayed later: the next submission supersedes them, and the gesture's
//! final value is delivered through [`UpdateThrottle::flush`], which
//! ignores the interval.

use std::time::{Duration, Instant};

/// One display frame at 60 Hz.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// One display frame at 30 Hz.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Debug, Clone)]
pub struct UpdateThrottle<T> {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<T>,
}

impl<T: Copy> UpdateThrottle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `Some(value)` when the interval since the previous emission
    /// has elapsed, otherwise remembers it as pending and returns `None`.
    pub fn submit(&mut self, value: T, now: Instant) -> Option<T> {
        let open = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };

        if open {
            self.last_emit = Some(now);
            self.pending = None;
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// Mandatory final emission: always returns `value`.
    pub fn flush(&mut self, value: T, now: Instant) -> T {
        self.last_emit = Some(now);
        self.pending = None;
        value
    }

    /// The newest value that was held back by the gate, if any.
    pub fn pending(&self) -> Option<T> {
        self.pending
    }

    pub fn reset(&mut self) {
        self.last_emit = None;
        self.pending = None;
    }
}

impl<T: Copy> Default for UpdateThrottle<T> {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}
