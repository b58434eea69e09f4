//! System configuration parameters
//!
//! All tunable parameters for the GasSentry alarm engine.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

/// Per-channel detection tuning (one instance for each MQ sensor line).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// EMA smoothing coefficient in (0, 1); smaller = slower, quieter.
    pub ema_alpha: f32,
    /// Smoothed/baseline ratio at or above which the analog path asserts.
    pub rise_ratio: f32,
    /// Smoothed/baseline ratio at or below which the analog path clears.
    pub fall_ratio: f32,
    /// Absolute excursion (ADC counts above baseline) the analog path must
    /// also exceed to assert.  Guards against ratio spikes near a tiny
    /// baseline.  `None` disables the gate.
    pub absolute_floor: Option<f32>,
    /// Continuous time the assert condition must hold before latching.
    pub assert_hold_ms: u32,
    /// Continuous time the clear condition must hold before releasing.
    /// Longer than `assert_hold_ms`: react fast, recover conservatively.
    pub clear_hold_ms: u32,
    /// Minimum time the hazard stays latched once asserted.
    pub min_on_ms: u32,
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Lifecycle ---
    /// Heater warm-up time before calibration starts (milliseconds).
    pub warmup_duration_ms: u32,
    /// Clean-air baseline accumulation window (milliseconds).
    pub calib_duration_ms: u32,

    // --- Channels ---
    /// MQ-2 smoke channel tuning.
    pub smoke: ChannelConfig,
    /// MQ-6 combustible-gas channel tuning.
    pub gas: ChannelConfig,

    // --- Baseline ---
    /// Lowest baseline accepted from calibration (ADC counts).
    pub baseline_floor: f32,
    /// Baseline used when calibration accumulated no samples.
    pub default_baseline: f32,
    /// Interval between baseline drift corrections (milliseconds).
    pub drift_interval_ms: u32,
    /// Blend factor applied at each drift correction (0–1).
    pub drift_blend: f32,

    // --- Digital threshold lines ---
    /// Quiet interval required between accepted DO edges (milliseconds).
    pub do_debounce_ms: u32,

    // --- PPM conversion (MQ-6 / LPG) ---
    /// ADC full-scale reading.
    pub adc_full_scale: u16,
    /// ADC reference voltage (volts).
    pub adc_vref: f32,
    /// Sensor heater/divider supply voltage (volts).
    pub sensor_supply_v: f32,
    /// Module load resistor RL (ohms).
    pub load_resistor_ohm: f32,
    /// Lowest clean-air resistance accepted from calibration (ohms).
    pub r0_floor_ohm: f32,
    /// Display ceiling for the concentration estimate (ppm).
    pub ppm_ceiling: f32,
    /// First datasheet reference point: concentration (ppm).
    pub curve_p1_ppm: f32,
    /// First datasheet reference point: Rs/R0 ratio.
    pub curve_r1_ratio: f32,
    /// Second datasheet reference point: concentration (ppm).
    pub curve_p2_ppm: f32,
    /// Second datasheet reference point: Rs/R0 ratio.
    pub curve_r2_ratio: f32,

    // --- Alert mapping ---
    /// Buzzer frequency at zero excursion (Hz).
    pub alert_base_hz: f32,
    /// Frequency added per ADC count of excursion (Hz/count).
    pub alert_slope_hz: f32,
    /// Frequency ceiling (Hz).
    pub alert_max_hz: f32,

    // --- Timing ---
    /// Evaluation cycle interval (milliseconds).
    pub tick_interval_ms: u32,
    /// DHT11 temperature read interval (milliseconds).
    pub dht_read_interval_ms: u32,
    /// Telemetry report interval (seconds).
    pub telemetry_interval_secs: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Lifecycle
            warmup_duration_ms: 30_000,
            calib_duration_ms: 10_000,

            // MQ-2: faster filter, stricter ratio — smoke moves the ADC hard
            smoke: ChannelConfig {
                ema_alpha: 0.15,
                rise_ratio: 1.25,
                fall_ratio: 1.12,
                absolute_floor: Some(150.0),
                assert_hold_ms: 500,
                clear_hold_ms: 2_500,
                min_on_ms: 5_000,
            },
            // MQ-6: slower filter, slightly looser ratio
            gas: ChannelConfig {
                ema_alpha: 0.12,
                rise_ratio: 1.20,
                fall_ratio: 1.10,
                absolute_floor: Some(120.0),
                assert_hold_ms: 600,
                clear_hold_ms: 3_000,
                min_on_ms: 5_000,
            },

            // Baseline
            baseline_floor: 50.0,
            default_baseline: 50.0,
            drift_interval_ms: 120_000, // 2 min
            drift_blend: 0.10,

            // Digital lines
            do_debounce_ms: 20,

            // PPM conversion — MQ-6 module with 5 kΩ load, LPG curve
            adc_full_scale: 4095,
            adc_vref: 3.30,
            sensor_supply_v: 5.00,
            load_resistor_ohm: 5_000.0,
            r0_floor_ohm: 1.0,
            ppm_ceiling: 20_000.0,
            curve_p1_ppm: 200.0,
            curve_r1_ratio: 3.2,
            curve_p2_ppm: 1_000.0,
            curve_r2_ratio: 0.8,

            // Alert mapping
            alert_base_hz: 800.0,
            alert_slope_hz: 2.5,
            alert_max_hz: 2_600.0,

            // Timing
            tick_interval_ms: 20,      // 50 Hz
            dht_read_interval_ms: 1_000,
            telemetry_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        for ch in [&c.smoke, &c.gas] {
            assert!(ch.ema_alpha > 0.0 && ch.ema_alpha < 1.0);
            assert!(ch.rise_ratio > ch.fall_ratio);
            assert!(ch.fall_ratio >= 1.0);
            assert!(
                ch.assert_hold_ms < ch.clear_hold_ms,
                "assert quickly, clear conservatively"
            );
        }
        assert!(c.warmup_duration_ms > 0);
        assert!(c.calib_duration_ms > 0);
        assert!(c.baseline_floor > 0.0);
        assert!(c.tick_interval_ms > 0);
        assert!(c.drift_blend > 0.0 && c.drift_blend < 1.0);
    }

    #[test]
    fn curve_reference_points_are_valid() {
        let c = SystemConfig::default();
        assert!(c.curve_r1_ratio > 0.0 && c.curve_r2_ratio > 0.0);
        assert!(
            (c.curve_p1_ppm - c.curve_p2_ppm).abs() > f32::EPSILON,
            "two-point fit needs distinct concentrations"
        );
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert!((c.smoke.rise_ratio - c2.smoke.rise_ratio).abs() < 0.001);
        assert_eq!(c.warmup_duration_ms, c2.warmup_duration_ms);
        assert_eq!(c.smoke.absolute_floor.is_some(), c2.smoke.absolute_floor.is_some());
    }

    #[test]
    fn postcard_roundtrip() {
        let c = SystemConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: SystemConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c.tick_interval_ms, c2.tick_interval_ms);
        assert!((c.gas.ema_alpha - c2.gas.ema_alpha).abs() < 0.001);
    }

    #[test]
    fn timing_ratios_make_sense() {
        let c = SystemConfig::default();
        assert!(
            c.tick_interval_ms < c.dht_read_interval_ms,
            "evaluation cycle should be faster than the DHT read interval"
        );
        assert!(
            c.do_debounce_ms <= c.tick_interval_ms,
            "DO debounce quieter than one tick would hide accepted edges"
        );
        assert!(c.drift_interval_ms > c.calib_duration_ms);
    }
}
