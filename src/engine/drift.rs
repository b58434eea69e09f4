//! Slow baseline re-centering against long-term sensor drift.
//!
//! MQ elements age and ambient conditions shift; over hours the clean-air
//! reading walks away from the calibrated baseline.  Left uncorrected that
//! inflates (or deflates) every ratio test.  The corrector nudges the
//! baseline toward the current smoothed estimate on a minutes-scale
//! interval — slow enough that a genuine gas event, which plays out in
//! seconds, can never be absorbed into the reference.

use crate::timebase::elapsed_ms;

/// Per-channel drift corrector.  Runs only in RUN and only while the
/// owning channel is not hazardous.
#[derive(Debug, Clone, Copy)]
pub struct DriftCorrector {
    last_correction_ms: u32,
}

impl DriftCorrector {
    pub fn new(now_ms: u32) -> Self {
        Self {
            last_correction_ms: now_ms,
        }
    }

    /// Restart the interval (hazard occurrence, stage change).
    pub fn reset(&mut self, now_ms: u32) {
        self.last_correction_ms = now_ms;
    }

    /// Apply one correction step if the interval has elapsed.
    ///
    /// While `hazard` is true the interval timer is pinned to `now`, so
    /// re-centering never immediately follows a real excursion.  Returns
    /// `true` when the baseline was adjusted.
    pub fn tick(
        &mut self,
        baseline: &mut f32,
        smoothed: f32,
        hazard: bool,
        interval_ms: u32,
        blend: f32,
        now_ms: u32,
    ) -> bool {
        if hazard {
            self.last_correction_ms = now_ms;
            return false;
        }
        if elapsed_ms(now_ms, self.last_correction_ms) < interval_ms {
            return false;
        }
        *baseline += blend * (smoothed - *baseline);
        self.last_correction_ms = now_ms;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: u32 = 120_000;
    const BLEND: f32 = 0.10;

    #[test]
    fn no_correction_before_interval() {
        let mut drift = DriftCorrector::new(0);
        let mut baseline = 100.0;
        assert!(!drift.tick(&mut baseline, 110.0, false, INTERVAL, BLEND, INTERVAL - 1));
        assert_eq!(baseline, 100.0);
    }

    #[test]
    fn blends_toward_smoothed_after_interval() {
        let mut drift = DriftCorrector::new(0);
        let mut baseline = 100.0;
        assert!(drift.tick(&mut baseline, 110.0, false, INTERVAL, BLEND, INTERVAL));
        assert!((baseline - 101.0).abs() < 1e-4); // 100 + 0.1*(110-100)
    }

    #[test]
    fn interval_restarts_after_correction() {
        let mut drift = DriftCorrector::new(0);
        let mut baseline = 100.0;
        drift.tick(&mut baseline, 110.0, false, INTERVAL, BLEND, INTERVAL);
        let b = baseline;
        assert!(!drift.tick(&mut baseline, 110.0, false, INTERVAL, BLEND, INTERVAL + 1_000));
        assert_eq!(baseline, b);
        assert!(drift.tick(&mut baseline, 110.0, false, INTERVAL, BLEND, 2 * INTERVAL));
    }

    #[test]
    fn hazard_pins_the_timer() {
        let mut drift = DriftCorrector::new(0);
        let mut baseline = 100.0;
        // Hazard right before the interval would have elapsed.
        assert!(!drift.tick(&mut baseline, 400.0, true, INTERVAL, BLEND, INTERVAL - 10));
        assert_eq!(baseline, 100.0);
        // Cleared: the full interval must elapse again from the hazard.
        assert!(!drift.tick(&mut baseline, 105.0, false, INTERVAL, BLEND, INTERVAL + 10));
        assert!(drift.tick(
            &mut baseline,
            105.0,
            false,
            INTERVAL,
            BLEND,
            INTERVAL - 10 + INTERVAL
        ));
    }

    #[test]
    fn correction_survives_wraparound() {
        let start = u32::MAX - 1_000;
        let mut drift = DriftCorrector::new(start);
        let mut baseline = 100.0;
        assert!(drift.tick(
            &mut baseline,
            120.0,
            false,
            INTERVAL,
            BLEND,
            start.wrapping_add(INTERVAL)
        ));
    }
}
