//! Interval timing driven by host frame deltas

use std::time::Duration;

/// Fires at most once per `interval` of accumulated frame time.
///
/// The host feeds frame deltas through [`Cadence::advance`]. Sub-interval
/// leftovers carry over to the next period; a stall longer than two
/// intervals fires once and drops the backlog.
#[derive(Clone, Debug)]
pub struct Cadence {
    interval: Duration,
    elapsed: Duration,
    fired: u64,
}

impl Cadence {
    /// Create a cadence with the given interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
            fired: 0,
        }
    }

    /// Create a cadence from seconds (negative or non-finite values clamp to zero)
    pub fn from_secs_f32(secs: f32) -> Self {
        let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
        Self::new(Duration::from_secs_f32(secs))
    }

    /// Advance by `dt`, returning true when an interval boundary was crossed
    pub fn advance(&mut self, dt: Duration) -> bool {
        self.elapsed += dt;
        if self.elapsed < self.interval {
            return false;
        }

        self.elapsed -= self.interval;
        if self.elapsed >= self.interval {
            self.elapsed = Duration::ZERO;
        }
        self.fired += 1;
        true
    }

    /// Make the next `advance` fire regardless of `dt`
    pub fn prime(&mut self) {
        self.elapsed = self.interval;
    }

    /// Discard accumulated time
    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    /// Configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of times this cadence has fired
    pub fn fired_count(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_fires_on_interval() {
        let mut cadence = Cadence::new(ms(500));

        assert!(!cadence.advance(ms(200)));
        assert!(!cadence.advance(ms(200)));
        assert!(cadence.advance(ms(200))); // 600ms, 100ms carried
        assert!(!cadence.advance(ms(300)));
        assert!(cadence.advance(ms(100)));
        assert_eq!(cadence.fired_count(), 2);
    }

    #[test]
    fn test_long_stall_fires_once() {
        let mut cadence = Cadence::new(ms(500));

        assert!(cadence.advance(ms(2000)));
        assert!(!cadence.advance(Duration::ZERO));
        assert_eq!(cadence.fired_count(), 1);
    }

    #[test]
    fn test_zero_interval_fires_every_advance() {
        let mut cadence = Cadence::new(Duration::ZERO);
        assert!(cadence.advance(Duration::ZERO));
        assert!(cadence.advance(ms(1)));
    }

    #[test]
    fn test_prime_and_reset() {
        let mut cadence = Cadence::from_secs_f32(0.5);
        assert_eq!(cadence.interval(), ms(500));

        cadence.prime();
        assert!(cadence.advance(Duration::ZERO));

        cadence.advance(ms(400));
        cadence.reset();
        assert!(!cadence.advance(ms(400)));
    }

    #[test]
    fn test_from_secs_clamps_invalid() {
        assert_eq!(Cadence::from_secs_f32(-1.0).interval(), Duration::ZERO);
        assert_eq!(Cadence::from_secs_f32(f32::NAN).interval(), Duration::ZERO);
    }
}
