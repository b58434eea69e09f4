//! The calibration and hysteresis alarm engine.
//!
//! [`AlarmEngine`] is the single object owning every piece of mutable alarm
//! state — lifecycle stage, per-channel filters, baselines, hazard latches,
//! drift timers and the fitted gas curve.  The main loop advances it with
//! one explicit call per evaluation cycle:
//!
//! ```text
//!   SampleSnapshot ──▶ tick(snapshot, now_ms) ──▶ EngineOutputs
//! ```
//!
//! No ambient globals: everything the engine knows arrives through `tick`
//! arguments, and everything collaborators need leaves through the returned
//! outputs.  Time is a caller-supplied monotonic millisecond counter; all
//! internal comparisons are wraparound-safe.

pub mod alert;
pub mod curve;
pub mod drift;
pub mod filter;
pub mod hazard;
pub mod stage;

use log::warn;

use crate::config::SystemConfig;
use crate::error::CalibrationError;

use alert::AlertSignal;
use curve::GasCurve;
use drift::DriftCorrector;
use filter::Ema;
use hazard::{HazardDetector, HazardInputs, HazardTransition};
use stage::{Stage, StageChange, StageController};

// ---------------------------------------------------------------------------
// Inputs / outputs
// ---------------------------------------------------------------------------

/// Raw sensor readings for one evaluation cycle, produced by the sensor hub.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleSnapshot {
    /// MQ-2 analog reading (ADC counts).
    pub smoke_raw: u16,
    /// MQ-6 analog reading (ADC counts).
    pub gas_raw: u16,
    /// MQ-2 digital-threshold level (debounced).
    pub smoke_do: bool,
    /// MQ-6 digital-threshold level (debounced).
    pub gas_do: bool,
    /// Ambient temperature (°C); NaN until the first good DHT read.
    pub temperature_c: f32,
}

/// Externally visible per-channel state.
#[derive(Debug, Clone, Copy)]
pub struct ChannelStatus {
    /// Smoothed estimate; `None` until the filter has seen a sample.
    pub smoothed: Option<f32>,
    /// Calibrated baseline; `None` until RUN begins.
    pub baseline: Option<f32>,
    /// Hazard latch state (always false before RUN).
    pub hazard: bool,
}

/// Where the clean-air reference resistance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R0Source {
    /// Computed from this calibration's baseline — persist it.
    Fresh,
    /// Fresh value was degenerate; fell back to the stored reference.
    StoredFallback,
    /// Degenerate and nothing stored; floored to the configured minimum.
    Floored,
}

/// Summary of a completed calibration, reported once on the RUN transition.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationOutcome {
    pub smoke_baseline: f32,
    pub gas_baseline: f32,
    pub smoke_anomaly: Option<CalibrationError>,
    pub gas_anomaly: Option<CalibrationError>,
    pub r0_ohm: f32,
    pub r0_source: R0Source,
}

/// Everything collaborators consume after one evaluation cycle.
#[derive(Debug, Clone, Copy)]
pub struct EngineOutputs {
    pub stage: Stage,
    pub elapsed_in_stage_ms: u32,
    pub smoke: ChannelStatus,
    pub gas: ChannelStatus,
    /// LPG concentration estimate (gas channel only); `None` before RUN.
    pub lpg_ppm: Option<f32>,
    pub alert: AlertSignal,
    /// Stage entered this cycle, if any.
    pub stage_entered: Option<Stage>,
    /// Calibration summary, present only on the cycle entering RUN.
    pub calibration: Option<CalibrationOutcome>,
    pub smoke_transition: Option<HazardTransition>,
    pub gas_transition: Option<HazardTransition>,
}

// ---------------------------------------------------------------------------
// Per-channel pipeline
// ---------------------------------------------------------------------------

/// Filter + detector + drift state for one sensor line.
struct ChannelPipeline {
    filter: Ema,
    detector: HazardDetector,
    drift: DriftCorrector,
    baseline: Option<f32>,
}

impl ChannelPipeline {
    fn new(name: &'static str, cfg: &crate::config::ChannelConfig, now_ms: u32) -> Self {
        Self {
            filter: Ema::new(cfg.ema_alpha),
            detector: HazardDetector::new(name, *cfg),
            drift: DriftCorrector::new(now_ms),
            baseline: None,
        }
    }

    fn status(&self) -> ChannelStatus {
        ChannelStatus {
            smoothed: self.filter.value(),
            baseline: self.baseline,
            hazard: self.detector.is_hazard(),
        }
    }
}

// ---------------------------------------------------------------------------
// AlarmEngine
// ---------------------------------------------------------------------------

pub struct AlarmEngine {
    config: SystemConfig,
    stage: StageController,
    smoke: ChannelPipeline,
    gas: ChannelPipeline,
    curve: GasCurve,
    /// Clean-air reference resistance; `None` until first calibration.
    r0_ohm: Option<f32>,
    /// Reference loaded from persistent storage at boot, if any.
    stored_r0: Option<f32>,
}

impl AlarmEngine {
    /// Construct the engine in WARMUP at `now_ms`.
    pub fn new(config: SystemConfig, now_ms: u32) -> Self {
        let curve = GasCurve::fit(
            config.curve_p1_ppm,
            config.curve_r1_ratio,
            config.curve_p2_ppm,
            config.curve_r2_ratio,
        );
        let smoke = ChannelPipeline::new("smoke", &config.smoke, now_ms);
        let gas = ChannelPipeline::new("gas", &config.gas, now_ms);
        Self {
            config,
            stage: StageController::new(now_ms),
            smoke,
            gas,
            curve,
            r0_ohm: None,
            stored_r0: None,
        }
    }

    /// Install a reference resistance loaded from persistent storage.
    /// Used only as a fallback when a fresh calibration is degenerate.
    pub fn set_stored_reference(&mut self, r0_ohm: f32) {
        if r0_ohm.is_finite() && r0_ohm > 0.0 {
            self.stored_r0 = Some(r0_ohm);
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage.stage()
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Replace the configuration.  The gas curve refits immediately;
    /// channel filters and detector constants are rebuilt on the next
    /// calibration so an in-flight hazard latch is never disturbed.
    pub fn update_config(&mut self, config: SystemConfig) {
        self.curve = GasCurve::fit(
            config.curve_p1_ppm,
            config.curve_r1_ratio,
            config.curve_p2_ppm,
            config.curve_r2_ratio,
        );
        self.config = config;
    }

    /// Operator-commanded recalibration (the in-band routine used when no
    /// persisted reference exists, or after sensor replacement).  Returns
    /// false outside RUN.
    pub fn request_recalibration(&mut self, now_ms: u32) -> bool {
        if !self.stage.restart_calibration(now_ms) {
            return false;
        }
        self.reset_channels(now_ms);
        true
    }

    /// Advance the engine by one evaluation cycle.
    pub fn tick(&mut self, snapshot: &SampleSnapshot, now_ms: u32) -> EngineOutputs {
        // 1. Smooth the raw stream (runs in every stage so the estimate is
        //    settled by the time detection starts).
        let smoke_smoothed = self.smoke.filter.update(f32::from(snapshot.smoke_raw));
        let gas_smoothed = self.gas.filter.update(f32::from(snapshot.gas_raw));

        // 2. Accumulate calibration samples (no-op outside CALIBRATE).
        self.stage.accumulate(snapshot.smoke_raw, snapshot.gas_raw);

        // 3. Stage timers.
        let mut stage_entered = None;
        let mut calibration = None;
        match self.stage.advance(&self.config, now_ms) {
            Some(StageChange::EnteredCalibrate) => {
                stage_entered = Some(Stage::Calibrate);
                self.reset_channels(now_ms);
            }
            Some(StageChange::EnteredRun(result)) => {
                stage_entered = Some(Stage::Run);
                let outcome = self.install_calibration(&result, now_ms);
                calibration = Some(outcome);
            }
            None => {}
        }

        // 4. Detection — RUN only; the detectors are inert before that.
        let mut smoke_transition = None;
        let mut gas_transition = None;
        let mut lpg_ppm = None;
        let mut alert_sig = AlertSignal::silent();

        if self.stage.stage() == Stage::Run {
            let smoke_baseline = self.smoke.baseline.unwrap_or(self.config.default_baseline);
            let gas_baseline = self.gas.baseline.unwrap_or(self.config.default_baseline);

            smoke_transition = self.smoke.detector.evaluate(
                &HazardInputs {
                    smoothed: smoke_smoothed,
                    baseline: smoke_baseline,
                    digital: snapshot.smoke_do,
                },
                now_ms,
            );
            gas_transition = self.gas.detector.evaluate(
                &HazardInputs {
                    smoothed: gas_smoothed,
                    baseline: gas_baseline,
                    digital: snapshot.gas_do,
                },
                now_ms,
            );

            // 5. Baseline drift correction, per channel, only while safe.
            for (pipeline, smoothed) in [
                (&mut self.smoke, smoke_smoothed),
                (&mut self.gas, gas_smoothed),
            ] {
                if let Some(baseline) = pipeline.baseline.as_mut() {
                    pipeline.drift.tick(
                        baseline,
                        smoothed,
                        pipeline.detector.is_hazard(),
                        self.config.drift_interval_ms,
                        self.config.drift_blend,
                        now_ms,
                    );
                }
            }

            // 6. Concentration estimate from the gas channel's Rs/R0.
            if let Some(r0) = self.r0_ohm {
                let v = curve::counts_to_volts(
                    gas_smoothed,
                    self.config.adc_full_scale,
                    self.config.adc_vref,
                );
                let rs = curve::sensor_resistance(
                    v,
                    self.config.sensor_supply_v,
                    self.config.load_resistor_ohm,
                );
                lpg_ppm = Some(self.curve.evaluate(rs / r0, self.config.ppm_ceiling));
            }

            // 7. Alert intensity from the hazardous channels' excursions.
            let smoke_exc = self
                .smoke
                .detector
                .is_hazard()
                .then(|| smoke_smoothed - self.smoke.baseline.unwrap_or(smoke_smoothed));
            let gas_exc = self
                .gas
                .detector
                .is_hazard()
                .then(|| gas_smoothed - self.gas.baseline.unwrap_or(gas_smoothed));
            alert_sig = alert::map_alert(
                smoke_exc,
                gas_exc,
                self.config.alert_base_hz,
                self.config.alert_slope_hz,
                self.config.alert_max_hz,
            );
        }

        EngineOutputs {
            stage: self.stage.stage(),
            elapsed_in_stage_ms: self.stage.elapsed_in_stage_ms(now_ms),
            smoke: self.smoke.status(),
            gas: self.gas.status(),
            lpg_ppm,
            alert: alert_sig,
            stage_entered,
            calibration,
            smoke_transition,
            gas_transition,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    /// Rebuild both channel pipelines from the current config.  Run on
    /// CALIBRATE entry so stale filter history and hazard latches never
    /// survive into a fresh baseline.
    fn reset_channels(&mut self, now_ms: u32) {
        self.smoke = ChannelPipeline::new("smoke", &self.config.smoke, now_ms);
        self.gas = ChannelPipeline::new("gas", &self.config.gas, now_ms);
    }

    /// Install baselines from a finished calibration and derive R0.
    fn install_calibration(
        &mut self,
        result: &stage::CalibrationResult,
        now_ms: u32,
    ) -> CalibrationOutcome {
        self.smoke.baseline = Some(result.smoke.baseline);
        self.gas.baseline = Some(result.gas.baseline);
        self.smoke.drift.reset(now_ms);
        self.gas.drift.reset(now_ms);

        // R0 from the clean-air baseline voltage via the divider law.
        let v_base = curve::counts_to_volts(
            result.gas.baseline,
            self.config.adc_full_scale,
            self.config.adc_vref,
        );
        let fresh = curve::sensor_resistance(
            v_base,
            self.config.sensor_supply_v,
            self.config.load_resistor_ohm,
        );

        let (r0, source) = if fresh.is_finite() && fresh >= self.config.r0_floor_ohm {
            (fresh, R0Source::Fresh)
        } else if let Some(stored) = self.stored_r0 {
            warn!(
                "calibration: degenerate R0 {:.2}Ω, using stored reference {:.1}Ω",
                fresh, stored
            );
            (stored, R0Source::StoredFallback)
        } else {
            warn!(
                "calibration: degenerate R0 {:.2}Ω, flooring to {:.1}Ω",
                fresh, self.config.r0_floor_ohm
            );
            (self.config.r0_floor_ohm, R0Source::Floored)
        };
        self.r0_ohm = Some(r0);
        if source == R0Source::Fresh {
            self.stored_r0 = Some(r0);
        }

        CalibrationOutcome {
            smoke_baseline: result.smoke.baseline,
            gas_baseline: result.gas.baseline,
            smoke_anomaly: result.smoke.anomaly,
            gas_anomaly: result.gas.anomaly,
            r0_ohm: r0,
            r0_source: source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_snapshot() -> SampleSnapshot {
        SampleSnapshot {
            smoke_raw: 500,
            gas_raw: 800,
            smoke_do: false,
            gas_do: false,
            temperature_c: 25.0,
        }
    }

    /// Tick the engine at the configured cadence until `until_ms`.
    fn run_until(
        engine: &mut AlarmEngine,
        snapshot: SampleSnapshot,
        from_ms: u32,
        until_ms: u32,
    ) -> (EngineOutputs, u32) {
        let step = engine.config().tick_interval_ms;
        let mut t = from_ms;
        let mut out = engine.tick(&snapshot, t);
        while t < until_ms {
            t += step;
            out = engine.tick(&snapshot, t);
        }
        (out, t)
    }

    /// Bring a fresh engine through warmup + calibration into RUN.
    fn engine_in_run() -> (AlarmEngine, u32) {
        let config = SystemConfig::default();
        let boot = config.warmup_duration_ms + config.calib_duration_ms + 100;
        let mut engine = AlarmEngine::new(config, 0);
        let (out, t) = run_until(&mut engine, quiet_snapshot(), 0, boot);
        assert_eq!(out.stage, Stage::Run);
        (engine, t)
    }

    #[test]
    fn lifecycle_reaches_run_with_baselines() {
        let (engine, _) = engine_in_run();
        let smoke = engine.smoke.baseline.unwrap();
        let gas = engine.gas.baseline.unwrap();
        assert!((smoke - 500.0).abs() < 1.0);
        assert!((gas - 800.0).abs() < 1.0);
        assert!(engine.r0_ohm.is_some());
    }

    #[test]
    fn no_hazard_or_ppm_before_run() {
        let config = SystemConfig::default();
        let mut engine = AlarmEngine::new(config, 0);
        // Screaming inputs during warmup must be ignored.
        let hot = SampleSnapshot {
            smoke_raw: 4_000,
            gas_raw: 4_000,
            smoke_do: true,
            gas_do: true,
            temperature_c: 25.0,
        };
        let out = engine.tick(&hot, 0);
        assert_eq!(out.stage, Stage::Warmup);
        assert!(!out.smoke.hazard && !out.gas.hazard);
        assert!(out.lpg_ppm.is_none());
        assert!(!out.alert.active);
    }

    #[test]
    fn calibration_outcome_reported_once() {
        let config = SystemConfig::default();
        let boot = config.warmup_duration_ms + config.calib_duration_ms + 1_000;
        let mut engine = AlarmEngine::new(config.clone(), 0);
        let step = config.tick_interval_ms;
        let mut outcomes = 0;
        let mut t = 0;
        while t <= boot {
            let out = engine.tick(&quiet_snapshot(), t);
            if out.calibration.is_some() {
                outcomes += 1;
                assert_eq!(out.stage_entered, Some(Stage::Run));
            }
            t += step;
        }
        assert_eq!(outcomes, 1);
    }

    #[test]
    fn smoke_hazard_asserts_and_drives_alert() {
        let (mut engine, t0) = engine_in_run();
        let smoky = SampleSnapshot {
            smoke_raw: 2_000,
            ..quiet_snapshot()
        };
        // Hold time + EMA settle: a few seconds of elevated input.
        let (out, _) = run_until(&mut engine, smoky, t0, t0 + 10_000);
        assert!(out.smoke.hazard);
        assert!(!out.gas.hazard);
        assert!(out.alert.active && out.alert.smoke && !out.alert.gas);
        assert!(out.alert.frequency_hz >= engine.config().alert_base_hz);
    }

    #[test]
    fn digital_line_alone_asserts_gas() {
        let (mut engine, t0) = engine_in_run();
        let tripped = SampleSnapshot {
            gas_do: true,
            ..quiet_snapshot()
        };
        let (out, _) = run_until(&mut engine, tripped, t0, t0 + 2_000);
        assert!(out.gas.hazard);
        assert!(out.alert.active && out.alert.gas);
    }

    #[test]
    fn dual_hazard_flags_both_channels() {
        let (mut engine, t0) = engine_in_run();
        let bad = SampleSnapshot {
            smoke_raw: 2_500,
            gas_raw: 3_000,
            ..quiet_snapshot()
        };
        let (out, _) = run_until(&mut engine, bad, t0, t0 + 10_000);
        assert!(out.smoke.hazard && out.gas.hazard);
        assert!(out.alert.smoke && out.alert.gas);
    }

    #[test]
    fn hazard_clears_after_min_on_and_holds() {
        let (mut engine, t0) = engine_in_run();
        let smoky = SampleSnapshot {
            smoke_raw: 2_000,
            ..quiet_snapshot()
        };
        let (out, t1) = run_until(&mut engine, smoky, t0, t0 + 10_000);
        assert!(out.smoke.hazard);

        // Air clears; EMA decays back toward baseline, then the clear-hold
        // and min-on must both elapse before the latch releases.
        let (out, _) = run_until(&mut engine, quiet_snapshot(), t1, t1 + 30_000);
        assert!(!out.smoke.hazard);
        assert!(!out.alert.active);
    }

    #[test]
    fn ppm_tracks_gas_concentration() {
        let (mut engine, t0) = engine_in_run();
        let out = engine.tick(&quiet_snapshot(), t0 + 20);
        let clean_ppm = out.lpg_ppm.unwrap();

        // Higher ADC counts = higher voltage = lower Rs = lower Rs/R0 =
        // more gas.
        let gassy = SampleSnapshot {
            gas_raw: 2_400,
            ..quiet_snapshot()
        };
        let (out, _) = run_until(&mut engine, gassy, t0, t0 + 20_000);
        let gassy_ppm = out.lpg_ppm.unwrap();
        assert!(
            gassy_ppm > clean_ppm,
            "expected rising ppm: {clean_ppm} -> {gassy_ppm}"
        );
        assert!(gassy_ppm <= engine.config().ppm_ceiling);
    }

    #[test]
    fn recalibration_restarts_calibrate_and_drops_latch() {
        let (mut engine, t0) = engine_in_run();
        let smoky = SampleSnapshot {
            smoke_raw: 2_000,
            ..quiet_snapshot()
        };
        let (out, t1) = run_until(&mut engine, smoky, t0, t0 + 10_000);
        assert!(out.smoke.hazard);

        assert!(engine.request_recalibration(t1));
        assert_eq!(engine.stage(), Stage::Calibrate);
        let out = engine.tick(&quiet_snapshot(), t1 + 20);
        assert!(!out.smoke.hazard, "latch must not survive recalibration");

        // A full calibration window later the engine is back in RUN.
        let calib = engine.config().calib_duration_ms;
        let (out, _) = run_until(&mut engine, quiet_snapshot(), t1, t1 + calib + 100);
        assert_eq!(out.stage, Stage::Run);
    }

    #[test]
    fn recalibration_refused_before_run() {
        let mut engine = AlarmEngine::new(SystemConfig::default(), 0);
        assert!(!engine.request_recalibration(100));
        assert_eq!(engine.stage(), Stage::Warmup);
    }

    #[test]
    fn stored_reference_rescues_degenerate_calibration() {
        // Full-scale gas reading during calibration → Vsignal ≈ Vref →
        // Rs collapses below the floor → stored R0 must take over.
        let config = SystemConfig {
            sensor_supply_v: 3.3, // makes (vc - v) ≈ 0 at full scale
            ..SystemConfig::default()
        };
        let boot = config.warmup_duration_ms + config.calib_duration_ms + 100;
        let mut engine = AlarmEngine::new(config, 0);
        engine.set_stored_reference(4_200.0);

        let saturated = SampleSnapshot {
            gas_raw: 4_095,
            ..quiet_snapshot()
        };
        let step = engine.config().tick_interval_ms;
        let mut t = 0;
        let mut outcome = None;
        while t <= boot {
            let out = engine.tick(&saturated, t);
            if let Some(c) = out.calibration {
                outcome = Some(c);
            }
            t += step;
        }
        let outcome = outcome.expect("calibration must complete");
        assert_eq!(outcome.r0_source, R0Source::StoredFallback);
        assert!((outcome.r0_ohm - 4_200.0).abs() < f32::EPSILON);
    }

    #[test]
    fn degenerate_calibration_without_store_floors() {
        let config = SystemConfig {
            sensor_supply_v: 3.3,
            ..SystemConfig::default()
        };
        let boot = config.warmup_duration_ms + config.calib_duration_ms + 100;
        let mut engine = AlarmEngine::new(config, 0);

        let saturated = SampleSnapshot {
            gas_raw: 4_095,
            ..quiet_snapshot()
        };
        let step = engine.config().tick_interval_ms;
        let mut t = 0;
        let mut outcome = None;
        while t <= boot {
            if let Some(c) = engine.tick(&saturated, t).calibration {
                outcome = Some(c);
            }
            t += step;
        }
        let outcome = outcome.expect("calibration must complete");
        assert_eq!(outcome.r0_source, R0Source::Floored);
        assert_eq!(outcome.r0_ohm, engine.config().r0_floor_ohm);
    }

    #[test]
    fn drift_recenters_baseline_over_time() {
        let (mut engine, t0) = engine_in_run();
        let before = engine.smoke.baseline.unwrap();

        // Mildly elevated but below any hazard threshold, held for longer
        // than the drift interval.
        let warm = SampleSnapshot {
            smoke_raw: 540,
            ..quiet_snapshot()
        };
        let interval = engine.config().drift_interval_ms;
        let (_, _) = run_until(&mut engine, warm, t0, t0 + interval + 1_000);
        let after = engine.smoke.baseline.unwrap();
        assert!(
            after > before,
            "baseline should creep toward the elevated estimate ({before} -> {after})"
        );
    }
}
