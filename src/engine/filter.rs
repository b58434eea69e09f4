//! Exponential moving average smoothing for noisy ADC sample streams.
//!
//! Single-pole low-pass: `s += alpha * (raw - s)`.  The first sample seeds
//! the estimate directly so the filter never ramps up from zero.  The stage
//! controller resets every filter when calibration (re-)starts so that
//! pre-calibration history cannot contaminate the new baseline.

/// EMA smoothing filter.  Alpha is fixed at construction; the engine never
/// changes it at runtime.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f32,
    value: Option<f32>,
}

impl Ema {
    /// `alpha` must be in (0, 1) — construction-time invariant, not
    /// runtime-checked (mirrors the config validation in the NVS adapter).
    pub fn new(alpha: f32) -> Self {
        debug_assert!(alpha > 0.0 && alpha < 1.0);
        Self { alpha, value: None }
    }

    /// Feed one raw sample, returning the updated estimate.
    pub fn update(&mut self, raw: f32) -> f32 {
        let next = match self.value {
            None => raw,
            Some(s) => s + self.alpha * (raw - s),
        };
        self.value = Some(next);
        next
    }

    /// Current estimate, `None` until the first sample arrives.
    pub fn value(&self) -> Option<f32> {
        self.value
    }

    /// Return to the unseeded state.
    pub fn reset(&mut self) {
        self.value = None;
    }
}
