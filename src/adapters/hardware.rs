//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the buzzer driver, exposing them through
//! [`SensorPort`] and [`AlertPort`].  This is the only module in the
//! system that touches actual hardware.  On non-espidf targets, the
//! underlying drivers use cfg-gated simulation stubs.

use crate::app::ports::{AlertPort, SensorPort};
use crate::drivers::buzzer::Buzzer;
use crate::engine::SampleSnapshot;
use crate::engine::alert::AlertSignal;
use crate::sensing::SensorHub;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    sensor_hub: SensorHub,
    buzzer: Buzzer,
}

impl HardwareAdapter {
    pub fn new(sensor_hub: SensorHub, buzzer: Buzzer) -> Self {
        Self { sensor_hub, buzzer }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl SensorPort for HardwareAdapter {
    fn read_all(&mut self, now_ms: u32) -> SampleSnapshot {
        self.sensor_hub.read_all(now_ms)
    }
}

// ── AlertPort implementation ──────────────────────────────────

impl AlertPort for HardwareAdapter {
    fn set_alert(&mut self, signal: &AlertSignal) {
        self.buzzer.set_signal(signal);
    }

    fn update(&mut self, now_ms: u32) {
        self.buzzer.tick(now_ms);
    }

    fn is_sounding(&self) -> bool {
        self.buzzer.is_sounding()
    }
}
