//! Per-channel hysteresis hazard detector.
//!
//! Combines two signals per evaluation cycle:
//!
//! - **analog ratio** — smoothed estimate over the calibrated baseline,
//!   optionally gated by an absolute-excursion floor so a ratio spike over a
//!   near-zero baseline cannot assert on noise;
//! - **digital threshold** — the module comparator's debounced DO level.
//!
//! Both directions are debounced in time: a candidate assert/clear condition
//! must hold *continuously* for the configured hold duration before the
//! latch flips, and a minimum-on time blocks clearing entirely while it
//! runs.  Assert-hold is shorter than clear-hold: react fast, recover
//! conservatively.
//!
//! ```text
//!  NOT_HAZARD ──[assert condition held ≥ assert_hold]──▶ HAZARD
//!  HAZARD ──[min_on elapsed AND clear condition held ≥ clear_hold]──▶ NOT_HAZARD
//! ```
//!
//! No other transitions exist.  The detector is inert outside RUN — the
//! engine simply does not evaluate it in earlier stages.

use log::{info, warn};

use crate::config::ChannelConfig;
use crate::timebase::elapsed_ms;

/// Inputs sampled once per evaluation cycle.
#[derive(Debug, Clone, Copy)]
pub struct HazardInputs {
    /// EMA-smoothed analog estimate (ADC counts).
    pub smoothed: f32,
    /// Calibrated baseline, guaranteed > 0 by the stage controller.
    pub baseline: f32,
    /// Debounced digital-threshold level.
    pub digital: bool,
}

/// Latch transition reported to the engine for event emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardTransition {
    Asserted,
    Cleared,
}

/// One hazard detector instance per sensor channel; the smoke and gas
/// channels run the identical algorithm with channel-specific constants.
pub struct HazardDetector {
    name: &'static str,
    cfg: ChannelConfig,
    hazard: bool,
    /// Start of the continuously-true assert condition, unset otherwise.
    assert_since_ms: Option<u32>,
    /// Start of the continuously-true clear condition, unset otherwise.
    clear_since_ms: Option<u32>,
    /// Timestamp the hazard latched; meaningful only while `hazard`.
    on_since_ms: u32,
}

impl HazardDetector {
    pub fn new(name: &'static str, cfg: ChannelConfig) -> Self {
        Self {
            name,
            cfg,
            hazard: false,
            assert_since_ms: None,
            clear_since_ms: None,
            on_since_ms: 0,
        }
    }

    /// Current latch state.
    pub fn is_hazard(&self) -> bool {
        self.hazard
    }

    /// Timestamp the hazard asserted, while latched.
    pub fn on_since_ms(&self) -> Option<u32> {
        self.hazard.then_some(self.on_since_ms)
    }

    /// Drop the latch and all hold timers (recalibration path).
    pub fn reset(&mut self) {
        self.hazard = false;
        self.assert_since_ms = None;
        self.clear_since_ms = None;
    }

    /// Evaluate one cycle.  Returns `Some` when the latch flipped.
    pub fn evaluate(&mut self, inputs: &HazardInputs, now_ms: u32) -> Option<HazardTransition> {
        let ratio = inputs.smoothed / inputs.baseline;
        let excursion = inputs.smoothed - inputs.baseline;

        let floor_ok = self
            .cfg
            .absolute_floor
            .is_none_or(|floor| excursion >= floor);
        let analog_assert = ratio >= self.cfg.rise_ratio && floor_ok;
        let assert_cond = analog_assert || inputs.digital;
        let clear_cond = ratio <= self.cfg.fall_ratio && !inputs.digital;

        if !self.hazard {
            self.clear_since_ms = None;
            if assert_cond {
                let since = *self.assert_since_ms.get_or_insert(now_ms);
                if elapsed_ms(now_ms, since) >= self.cfg.assert_hold_ms {
                    self.hazard = true;
                    self.on_since_ms = now_ms;
                    self.assert_since_ms = None;
                    warn!(
                        "HAZARD {}: asserted (ratio={:.2}, excursion={:.0}, do={})",
                        self.name, ratio, excursion, inputs.digital
                    );
                    return Some(HazardTransition::Asserted);
                }
            } else {
                // Any interruption restarts the hold from scratch.
                self.assert_since_ms = None;
            }
        } else {
            self.assert_since_ms = None;
            if clear_cond {
                let since = *self.clear_since_ms.get_or_insert(now_ms);
                let held_long_enough = elapsed_ms(now_ms, since) >= self.cfg.clear_hold_ms;
                let min_on_elapsed = elapsed_ms(now_ms, self.on_since_ms) >= self.cfg.min_on_ms;
                if held_long_enough && min_on_elapsed {
                    self.hazard = false;
                    self.clear_since_ms = None;
                    info!("HAZARD {}: cleared (ratio={:.2})", self.name, ratio);
                    return Some(HazardTransition::Cleared);
                }
            } else {
                self.clear_since_ms = None;
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ChannelConfig {
        ChannelConfig {
            ema_alpha: 0.15,
            rise_ratio: 1.25,
            fall_ratio: 1.12,
            absolute_floor: Some(150.0),
            assert_hold_ms: 500,
            clear_hold_ms: 2_500,
            min_on_ms: 5_000,
        }
    }

    fn quiet() -> HazardInputs {
        HazardInputs {
            smoothed: 100.0,
            baseline: 100.0,
            digital: false,
        }
    }

    fn elevated() -> HazardInputs {
        // ratio 2.6 ≥ 1.25, excursion 160 ≥ 150
        HazardInputs {
            smoothed: 260.0,
            baseline: 100.0,
            digital: false,
        }
    }

    /// Drive the detector to a latched hazard at t=assert_hold.
    fn latch(det: &mut HazardDetector) -> u32 {
        assert_eq!(det.evaluate(&elevated(), 0), None);
        let t = cfg().assert_hold_ms;
        assert_eq!(
            det.evaluate(&elevated(), t),
            Some(HazardTransition::Asserted)
        );
        t
    }

    #[test]
    fn assert_requires_continuous_hold() {
        let mut det = HazardDetector::new("smoke", cfg());
        assert_eq!(det.evaluate(&elevated(), 0), None);
        assert_eq!(det.evaluate(&elevated(), 250), None);
        assert_eq!(
            det.evaluate(&elevated(), 500),
            Some(HazardTransition::Asserted)
        );
        assert!(det.is_hazard());
    }

    #[test]
    fn interrupted_hold_does_not_assert() {
        let mut det = HazardDetector::new("smoke", cfg());
        assert_eq!(det.evaluate(&elevated(), 0), None);
        assert_eq!(det.evaluate(&elevated(), 499), None);
        // One quiet cycle resets the hold timer entirely.
        assert_eq!(det.evaluate(&quiet(), 510), None);
        assert_eq!(det.evaluate(&elevated(), 520), None);
        assert_eq!(det.evaluate(&elevated(), 900), None);
        assert_eq!(
            det.evaluate(&elevated(), 1020),
            Some(HazardTransition::Asserted)
        );
    }

    #[test]
    fn digital_alone_asserts_after_hold() {
        let mut det = HazardDetector::new("gas", cfg());
        let inputs = HazardInputs {
            digital: true,
            ..quiet()
        };
        assert_eq!(det.evaluate(&inputs, 0), None);
        assert_eq!(det.evaluate(&inputs, 500), Some(HazardTransition::Asserted));
    }

    #[test]
    fn ratio_spike_below_absolute_floor_is_ignored() {
        let mut det = HazardDetector::new("smoke", cfg());
        // Tiny baseline: ratio 2.0 but excursion only 60 counts.
        let inputs = HazardInputs {
            smoothed: 120.0,
            baseline: 60.0,
            digital: false,
        };
        for t in (0..10_000).step_by(20) {
            assert_eq!(det.evaluate(&inputs, t), None);
        }
        assert!(!det.is_hazard());
    }

    #[test]
    fn no_floor_configured_ratio_alone_asserts() {
        let mut det = HazardDetector::new("smoke", ChannelConfig {
            absolute_floor: None,
            ..cfg()
        });
        let inputs = HazardInputs {
            smoothed: 120.0,
            baseline: 60.0,
            digital: false,
        };
        det.evaluate(&inputs, 0);
        assert_eq!(det.evaluate(&inputs, 500), Some(HazardTransition::Asserted));
    }

    #[test]
    fn clear_blocked_until_min_on_elapses() {
        let mut det = HazardDetector::new("smoke", cfg());
        let t_on = latch(&mut det);

        // Immediately quiet again; clear-hold (2.5 s) is satisfied long
        // before min-on (5 s) — the latch must stay up until min-on.
        let mut t = t_on;
        while elapsed_ms(t, t_on) < cfg().min_on_ms {
            assert_eq!(det.evaluate(&quiet(), t), None, "cleared early at t={t}");
            assert!(det.is_hazard());
            t += 100;
        }
        assert_eq!(det.evaluate(&quiet(), t), Some(HazardTransition::Cleared));
    }

    #[test]
    fn clear_requires_digital_low() {
        let mut det = HazardDetector::new("gas", cfg());
        let t_on = latch(&mut det);

        // Analog is quiet but the comparator still trips: no clear, ever.
        let inputs = HazardInputs {
            digital: true,
            ..quiet()
        };
        for dt in (0..20_000u32).step_by(100) {
            assert_eq!(det.evaluate(&inputs, t_on + dt), None);
        }
        assert!(det.is_hazard());
    }

    #[test]
    fn clear_hold_restarts_on_interruption() {
        let mut det = HazardDetector::new("smoke", cfg());
        let t_on = latch(&mut det);
        let after_min_on = t_on + cfg().min_on_ms;

        // Quiet for 2.4 s (just under clear-hold), blip, then quiet again.
        assert_eq!(det.evaluate(&quiet(), after_min_on), None);
        assert_eq!(det.evaluate(&quiet(), after_min_on + 2_400), None);
        assert_eq!(det.evaluate(&elevated(), after_min_on + 2_420), None);
        assert_eq!(det.evaluate(&quiet(), after_min_on + 2_440), None);
        // Fresh 2.5 s of quiet required from the blip.
        assert_eq!(det.evaluate(&quiet(), after_min_on + 4_900), None);
        assert_eq!(
            det.evaluate(&quiet(), after_min_on + 2_440 + 2_500),
            Some(HazardTransition::Cleared)
        );
    }

    #[test]
    fn reset_drops_latch_and_timers() {
        let mut det = HazardDetector::new("smoke", cfg());
        latch(&mut det);
        det.reset();
        assert!(!det.is_hazard());
        assert_eq!(det.on_since_ms(), None);
        // A fresh assert needs the full hold again.
        assert_eq!(det.evaluate(&elevated(), 100_000), None);
    }

    #[test]
    fn ratio_and_floor_both_satisfied_asserts_immediately() {
        // baseline=100, rise=1.25, floor=150, smoothed=260:
        // ratio 2.6 ≥ 1.25 and excursion 160 ≥ 150 ⇒ assert condition true.
        let mut det = HazardDetector::new("smoke", ChannelConfig {
            assert_hold_ms: 0,
            ..cfg()
        });
        assert_eq!(
            det.evaluate(&elevated(), 0),
            Some(HazardTransition::Asserted)
        );
    }
}
