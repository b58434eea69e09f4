//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! The display collaborator would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | stage={:?} | MQ2={:.0}/{:.0}{} | MQ6={:.0}/{:.0}{} | \
                     LPG={:.0}ppm | T={:.1}\u{00b0}C | alert={}@{:.0}Hz",
                    t.stage,
                    t.smoke_smoothed,
                    t.smoke_baseline,
                    if t.smoke_hazard { "!" } else { "" },
                    t.gas_smoothed,
                    t.gas_baseline,
                    if t.gas_hazard { "!" } else { "" },
                    t.lpg_ppm,
                    t.temperature_c,
                    if t.alert_active { "ON" } else { "off" },
                    t.alert_frequency_hz,
                );
            }
            AppEvent::StageChanged { from, to } => {
                info!("STAGE | {:?} -> {:?}", from, to);
            }
            AppEvent::CalibrationCompleted {
                smoke_baseline,
                gas_baseline,
                r0_ohm,
                recovered,
            } => {
                info!(
                    "CALIB | baseline MQ2={:.1} MQ6={:.1} | R0={:.1}\u{03a9}{}",
                    smoke_baseline,
                    gas_baseline,
                    r0_ohm,
                    if *recovered { " (recovered)" } else { "" },
                );
            }
            AppEvent::HazardAsserted(channel) => {
                warn!("ALARM | {:?}", channel);
            }
            AppEvent::HazardCleared(channel) => {
                info!("CLEAR | {:?}", channel);
            }
            AppEvent::Started(stage) => {
                info!("START | initial_stage={:?}", stage);
            }
        }
    }
}
