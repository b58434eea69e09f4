//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them — log to serial, draw on the OLED,
//! etc.

use crate::engine::stage::Stage;
use crate::sensing::Channel;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The application service has started (carries initial stage).
    Started(Stage),

    /// The lifecycle moved between stages.
    StageChanged { from: Stage, to: Stage },

    /// Calibration finished; baselines and the clean-air reference are set.
    CalibrationCompleted {
        smoke_baseline: f32,
        gas_baseline: f32,
        r0_ohm: f32,
        /// True when R0 had to be recovered (stored fallback or floor).
        recovered: bool,
    },

    /// A channel's hazard latch asserted.
    HazardAsserted(Channel),

    /// A channel's hazard latch cleared.
    HazardCleared(Channel),

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// A point-in-time telemetry snapshot suitable for logging or display.
#[derive(Debug, Clone)]
pub struct TelemetryData {
    pub stage: Stage,
    pub smoke_smoothed: f32,
    pub smoke_baseline: f32,
    pub smoke_hazard: bool,
    pub gas_smoothed: f32,
    pub gas_baseline: f32,
    pub gas_hazard: bool,
    /// LPG concentration estimate; negative = not yet available.
    pub lpg_ppm: f32,
    pub temperature_c: f32,
    pub alert_active: bool,
    pub alert_frequency_hz: f32,
}
