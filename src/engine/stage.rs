//! Lifecycle stage controller: WARMUP → CALIBRATE → RUN.
//!
//! MQ heaters need tens of seconds before their resistance settles; the
//! controller holds the engine in WARMUP for that long, then accumulates a
//! clean-air baseline during CALIBRATE, then locks into RUN for the rest of
//! the power cycle.  Automatic transitions are strictly forward — only the
//! explicit recalibration command can restart the CALIBRATE phase.

use log::{info, warn};

use crate::config::SystemConfig;
use crate::error::CalibrationError;
use crate::timebase::elapsed_ms;

/// Process-wide lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Warmup,
    Calibrate,
    Run,
}

/// Transient per-channel sample accumulator, alive only during CALIBRATE.
/// Zeroed on CALIBRATE entry and consumed exactly once at the RUN
/// transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalibrationAccumulator {
    sum: u64,
    count: u32,
}

impl CalibrationAccumulator {
    pub fn reset(&mut self) {
        self.sum = 0;
        self.count = 0;
    }

    pub fn add(&mut self, raw: u16) {
        self.sum += u64::from(raw);
        self.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Mean of accumulated samples, `None` when empty.
    pub fn mean(&self) -> Option<f32> {
        (self.count > 0).then(|| self.sum as f32 / self.count as f32)
    }
}

/// Per-channel output of a completed calibration.
#[derive(Debug, Clone, Copy)]
pub struct ChannelBaseline {
    /// Floored mean (or default) — always > 0.
    pub baseline: f32,
    /// Set when recovery kicked in (empty accumulator or floored mean).
    pub anomaly: Option<CalibrationError>,
}

/// Both channels' baselines, produced once at CALIBRATE → RUN.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationResult {
    pub smoke: ChannelBaseline,
    pub gas: ChannelBaseline,
}

/// Stage change reported to the engine for filter resets and event emission.
#[derive(Debug, Clone, Copy)]
pub enum StageChange {
    EnteredCalibrate,
    EnteredRun(CalibrationResult),
}

/// Owns the stage, its entry timestamp, and the calibration accumulators.
pub struct StageController {
    stage: Stage,
    entered_at_ms: u32,
    smoke_accum: CalibrationAccumulator,
    gas_accum: CalibrationAccumulator,
}

impl StageController {
    /// Begin the lifecycle in WARMUP at `now_ms`.
    pub fn new(now_ms: u32) -> Self {
        info!("stage: WARMUP (heater settle)");
        Self {
            stage: Stage::Warmup,
            entered_at_ms: now_ms,
            smoke_accum: CalibrationAccumulator::default(),
            gas_accum: CalibrationAccumulator::default(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Milliseconds spent in the current stage (wraparound-safe).
    pub fn elapsed_in_stage_ms(&self, now_ms: u32) -> u32 {
        elapsed_ms(now_ms, self.entered_at_ms)
    }

    /// Feed one cycle's raw samples into the accumulators.
    /// No-op outside CALIBRATE.
    pub fn accumulate(&mut self, smoke_raw: u16, gas_raw: u16) {
        if self.stage == Stage::Calibrate {
            self.smoke_accum.add(smoke_raw);
            self.gas_accum.add(gas_raw);
        }
    }

    /// Evaluate the stage timers.  Returns `Some` when a transition fired;
    /// the caller resets filters on `EnteredCalibrate` and installs
    /// baselines on `EnteredRun`.
    pub fn advance(&mut self, cfg: &SystemConfig, now_ms: u32) -> Option<StageChange> {
        match self.stage {
            Stage::Warmup => {
                if self.elapsed_in_stage_ms(now_ms) >= cfg.warmup_duration_ms {
                    self.enter_calibrate(now_ms);
                    Some(StageChange::EnteredCalibrate)
                } else {
                    None
                }
            }
            Stage::Calibrate => {
                if self.elapsed_in_stage_ms(now_ms) >= cfg.calib_duration_ms {
                    let result = CalibrationResult {
                        smoke: Self::finish_channel("smoke", &self.smoke_accum, cfg),
                        gas: Self::finish_channel("gas", &self.gas_accum, cfg),
                    };
                    self.smoke_accum.reset();
                    self.gas_accum.reset();
                    self.stage = Stage::Run;
                    self.entered_at_ms = now_ms;
                    info!(
                        "stage: RUN (baselines smoke={:.1} gas={:.1})",
                        result.smoke.baseline, result.gas.baseline
                    );
                    Some(StageChange::EnteredRun(result))
                } else {
                    None
                }
            }
            // RUN is terminal for the power cycle.
            Stage::Run => None,
        }
    }

    /// Operator-commanded recalibration: restart the CALIBRATE phase.
    /// Only honoured from RUN — during WARMUP/CALIBRATE it would just
    /// corrupt the timers.
    pub fn restart_calibration(&mut self, now_ms: u32) -> bool {
        if self.stage != Stage::Run {
            return false;
        }
        info!("stage: recalibration requested, re-entering CALIBRATE");
        self.enter_calibrate(now_ms);
        true
    }

    fn enter_calibrate(&mut self, now_ms: u32) {
        self.stage = Stage::Calibrate;
        self.entered_at_ms = now_ms;
        self.smoke_accum.reset();
        self.gas_accum.reset();
        info!("stage: CALIBRATE (accumulating clean-air baseline)");
    }

    /// Baseline from a finished accumulator: mean floored to the configured
    /// minimum, or the documented default when nothing was accumulated.
    /// Never fails — degraded values are logged, not propagated.
    fn finish_channel(
        name: &'static str,
        accum: &CalibrationAccumulator,
        cfg: &SystemConfig,
    ) -> ChannelBaseline {
        match accum.mean() {
            None => {
                warn!(
                    "calibration {}: no samples, falling back to default baseline {:.1}",
                    name, cfg.default_baseline
                );
                ChannelBaseline {
                    baseline: cfg.default_baseline,
                    anomaly: Some(CalibrationError::EmptyAccumulator),
                }
            }
            Some(mean) if !mean.is_finite() || mean < cfg.baseline_floor => {
                warn!(
                    "calibration {}: mean {:.1} below floor, clamping to {:.1}",
                    name, mean, cfg.baseline_floor
                );
                ChannelBaseline {
                    baseline: cfg.baseline_floor,
                    anomaly: Some(CalibrationError::DegenerateBaseline),
                }
            }
            Some(mean) => ChannelBaseline {
                baseline: mean,
                anomaly: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SystemConfig {
        SystemConfig::default()
    }

    #[test]
    fn starts_in_warmup() {
        let ctrl = StageController::new(0);
        assert_eq!(ctrl.stage(), Stage::Warmup);
    }

    #[test]
    fn warmup_holds_until_duration() {
        let mut ctrl = StageController::new(0);
        let c = cfg();
        assert!(ctrl.advance(&c, c.warmup_duration_ms - 1).is_none());
        assert_eq!(ctrl.stage(), Stage::Warmup);
        assert!(matches!(
            ctrl.advance(&c, c.warmup_duration_ms),
            Some(StageChange::EnteredCalibrate)
        ));
        assert_eq!(ctrl.stage(), Stage::Calibrate);
    }

    #[test]
    fn full_lifecycle_is_forward_only() {
        let mut ctrl = StageController::new(0);
        let c = cfg();
        let t_cal = c.warmup_duration_ms;
        ctrl.advance(&c, t_cal);
        for i in 0..100u16 {
            ctrl.accumulate(400 + i, 800 + i);
            assert!(ctrl.advance(&c, t_cal + u32::from(i) * 20).is_none());
        }
        let t_run = t_cal + c.calib_duration_ms;
        let change = ctrl.advance(&c, t_run);
        assert!(matches!(change, Some(StageChange::EnteredRun(_))));
        assert_eq!(ctrl.stage(), Stage::Run);

        // RUN is terminal: no input makes the controller move on its own.
        for dt in [0u32, 1, 1_000_000, u32::MAX / 2] {
            assert!(ctrl.advance(&c, t_run.wrapping_add(dt)).is_none());
            assert_eq!(ctrl.stage(), Stage::Run);
        }
    }

    #[test]
    fn baseline_is_accumulator_mean() {
        let mut ctrl = StageController::new(0);
        let c = cfg();
        ctrl.advance(&c, c.warmup_duration_ms);
        // 100 samples of 500 and 100 of 700 → mean 600.
        for _ in 0..100 {
            ctrl.accumulate(500, 700);
        }
        let t_run = c.warmup_duration_ms + c.calib_duration_ms;
        let Some(StageChange::EnteredRun(result)) = ctrl.advance(&c, t_run) else {
            panic!("expected RUN transition");
        };
        assert!((result.smoke.baseline - 500.0).abs() < 0.01);
        assert!((result.gas.baseline - 700.0).abs() < 0.01);
        assert!(result.smoke.anomaly.is_none());
    }

    #[test]
    fn empty_accumulator_falls_back_to_default() {
        let mut ctrl = StageController::new(0);
        let c = cfg();
        ctrl.advance(&c, c.warmup_duration_ms);
        let t_run = c.warmup_duration_ms + c.calib_duration_ms;
        let Some(StageChange::EnteredRun(result)) = ctrl.advance(&c, t_run) else {
            panic!("expected RUN transition");
        };
        assert_eq!(result.smoke.baseline, c.default_baseline);
        assert_eq!(
            result.smoke.anomaly,
            Some(CalibrationError::EmptyAccumulator)
        );
    }

    #[test]
    fn low_mean_is_floored() {
        let mut ctrl = StageController::new(0);
        let c = cfg();
        ctrl.advance(&c, c.warmup_duration_ms);
        for _ in 0..50 {
            ctrl.accumulate(3, 3); // far below baseline_floor (50)
        }
        let t_run = c.warmup_duration_ms + c.calib_duration_ms;
        let Some(StageChange::EnteredRun(result)) = ctrl.advance(&c, t_run) else {
            panic!("expected RUN transition");
        };
        assert_eq!(result.gas.baseline, c.baseline_floor);
        assert_eq!(
            result.gas.anomaly,
            Some(CalibrationError::DegenerateBaseline)
        );
    }

    #[test]
    fn accumulate_outside_calibrate_is_ignored() {
        let mut ctrl = StageController::new(0);
        ctrl.accumulate(4_000, 4_000); // still WARMUP
        let c = cfg();
        ctrl.advance(&c, c.warmup_duration_ms);
        let t_run = c.warmup_duration_ms + c.calib_duration_ms;
        let Some(StageChange::EnteredRun(result)) = ctrl.advance(&c, t_run) else {
            panic!("expected RUN transition");
        };
        // The warmup-time sample must not have leaked into the baseline.
        assert_eq!(
            result.smoke.anomaly,
            Some(CalibrationError::EmptyAccumulator)
        );
    }

    #[test]
    fn restart_calibration_only_from_run() {
        let mut ctrl = StageController::new(0);
        let c = cfg();
        assert!(!ctrl.restart_calibration(100)); // WARMUP: refused
        ctrl.advance(&c, c.warmup_duration_ms);
        assert!(!ctrl.restart_calibration(100)); // CALIBRATE: refused
        let t_run = c.warmup_duration_ms + c.calib_duration_ms;
        ctrl.advance(&c, t_run);
        assert!(ctrl.restart_calibration(t_run + 60_000));
        assert_eq!(ctrl.stage(), Stage::Calibrate);
        assert_eq!(ctrl.elapsed_in_stage_ms(t_run + 60_000), 0);
    }

    #[test]
    fn stage_entry_survives_counter_wraparound() {
        let start = u32::MAX - 1_000;
        let mut ctrl = StageController::new(start);
        let c = cfg();
        // warmup_duration past the wrap point
        let t = start.wrapping_add(c.warmup_duration_ms);
        assert!(matches!(
            ctrl.advance(&c, t),
            Some(StageChange::EnteredCalibrate)
        ));
    }
}
