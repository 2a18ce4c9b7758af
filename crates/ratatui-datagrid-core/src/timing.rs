//! Frame throttling and trailing-edge debouncing.
//!
//! Both are clock-agnostic: the caller passes `Instant`s (or frame ticks) in, which keeps them
//! deterministic under test and independent of any runtime.

use std::time::Duration;
use std::time::Instant;

/// Trailing-edge debounce: only the last value pushed within the window is emitted, once the
/// window has elapsed without another push.
#[derive(Clone, Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Schedules `value`, cancelling any unfired predecessor.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// Emits the pending value once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if now >= *deadline => self.pending.take().map(|(v, _)| v),
            _ => None,
        }
    }

    /// Emits the pending value immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(v, _)| v)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Collapses bursts of requests into one per frame: every request overwrites the pending value
/// and [`FrameThrottle::on_frame`] hands out the latest at most once.
#[derive(Clone, Debug, Default)]
pub struct FrameThrottle<T> {
    pending: Option<T>,
    requests: u64,
    flushes: u64,
}

impl<T> FrameThrottle<T> {
    pub fn new() -> Self {
        Self {
            pending: None,
            requests: 0,
            flushes: 0,
        }
    }

    pub fn request(&mut self, value: T) {
        self.requests += 1;
        self.pending = Some(value);
    }

    pub fn on_frame(&mut self) -> Option<T> {
        let v = self.pending.take();
        if v.is_some() {
            self.flushes += 1;
        }
        v
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn peek(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    /// `(requests, flushes)` since creation.
    pub fn counts(&self) -> (u64, u64) {
        (self.requests, self.flushes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debouncer_emits_only_the_last_value_after_the_window() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.push("a", t0);
        d.push("ab", t0 + Duration::from_millis(50));
        assert_eq!(d.poll(t0 + Duration::from_millis(120)), None);
        assert_eq!(d.poll(t0 + Duration::from_millis(150)), Some("ab"));
        assert_eq!(d.poll(t0 + Duration::from_millis(500)), None);
    }

    #[test]
    fn debouncer_cancel_drops_pending() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(10));
        d.push(1, t0);
        d.cancel();
        assert_eq!(d.poll(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn throttle_batches_to_latest_per_frame() {
        let mut t = FrameThrottle::new();
        for y in 0..50u64 {
            t.request(y);
        }
        assert_eq!(t.on_frame(), Some(49));
        assert_eq!(t.on_frame(), None);
        assert_eq!(t.counts(), (50, 1));
    }
}
