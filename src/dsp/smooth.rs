//! Zipper-free parameter changes.
//!
//! Control writes arrive at frame rate (every 16–33 ms); applying them as a
//! step produces an audible click. [`SmoothedParam`] glides towards each new
//! target with a one-pole lowpass:
//!
//! ```text
//! y[n] = y[n-1] + coeff * (target - y[n-1])
//! coeff = 1 - exp(-1 / (tau * sample_rate))
//! ```
//!
//! After 5·tau the value is within 1% of the target.

/// Relative gap below which a glide is considered finished.
pub const SETTLE_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    coeff: f32,
}

impl SmoothedParam {
    /// Starts settled at `initial`.
    pub fn new(initial: f32, sample_rate: f32, smoothing_ms: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: coefficient(sample_rate, smoothing_ms),
        }
    }

    /// No smoothing: every target is applied on the next sample.
    pub fn instant(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: 1.0,
        }
    }

    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.current = value;
    }

    /// Steps once towards the target. Snaps onto it once the remaining gap
    /// is below [`SETTLE_EPSILON`] or the step no longer changes the value in
    /// f32, so the glide always ends.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let next = self.current + self.coeff * (self.target - self.current);
        if next == self.current || self.within_epsilon(next) {
            self.current = self.target;
        } else {
            self.current = next;
        }
        self.current
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    #[inline]
    fn within_epsilon(&self, value: f32) -> bool {
        (value - self.target).abs() <= SETTLE_EPSILON * self.target.abs().max(1.0)
    }

    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }
}

fn coefficient(sample_rate: f32, smoothing_ms: f32) -> f32 {
    if smoothing_ms <= 0.0 || sample_rate <= 0.0 {
        return 1.0;
    }
    let samples = smoothing_ms / 1000.0 * sample_rate;
    1.0 - (-1.0 / samples).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_jumps_on_next_sample() {
        let mut p = SmoothedParam::instant(0.0);
        p.set_target(1.0);
        assert_eq!(p.advance(), 1.0);
        assert!(p.is_settled());
    }

    #[test]
    fn glides_monotonically_towards_target() {
        let mut p = SmoothedParam::new(0.0, 48_000.0, 10.0);
        p.set_target(1.0);

        let mut previous = 0.0;
        for _ in 0..480 {
            let v = p.advance();
            assert!(v > previous && v < 1.0);
            previous = v;
        }
        // one time constant
        assert!((previous - 0.632).abs() < 0.01, "got {previous}");

        for _ in 0..48_000 {
            p.advance();
        }
        assert!(p.is_settled());
    }

    #[test]
    fn wide_glide_settles_exactly_on_target() {
        let mut p = SmoothedParam::new(1_000.0, 48_000.0, 20.0);
        p.set_target(20_000.0);

        let mut steps = 0;
        while !p.is_settled() && steps < 48_000 {
            p.advance();
            steps += 1;
        }
        assert!(p.is_settled(), "still at {} after {steps} samples", p.get());
        assert_eq!(p.get(), 20_000.0);
        // about 12 time constants for a 1e-4 relative gap
        assert!(steps < 15_000, "took {steps} samples");
    }

    #[test]
    fn set_immediate_skips_glide() {
        let mut p = SmoothedParam::new(0.0, 48_000.0, 50.0);
        p.set_immediate(0.7);
        assert_eq!(p.get(), 0.7);
        assert_eq!(p.advance(), 0.7);
    }
}
