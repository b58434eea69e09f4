//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the alarm engine and orchestrates one evaluation
//! cycle per control tick.  All I/O flows through port traits injected at
//! call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                 │       AppService        │
//!   AlertPort ◀── │  AlarmEngine · persist  │ ◀─▶ Config/StoragePort
//!                 └────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::SystemConfig;
use crate::engine::stage::Stage;
use crate::engine::{AlarmEngine, EngineOutputs, R0Source, SampleSnapshot};
use crate::engine::hazard::HazardTransition;
use crate::sensing::Channel;
use crate::timebase::elapsed_ms;

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetryData};
use super::ports::{AlertPort, ConfigPort, EventSink, SensorPort, StoragePort};

/// Debounce window between a config change and its NVS flush.
const AUTO_SAVE_DEBOUNCE_MS: u32 = 5_000;

/// Bounded hazard history depth (oldest entries evicted).
const HAZARD_HISTORY_CAP: usize = 8;

/// One hazard latch transition, kept for diagnostics/display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardRecord {
    pub channel: Channel,
    pub asserted: bool,
    pub at_ms: u32,
}

/// NVS namespace for calibration data.
const CAL_NAMESPACE: &str = "gassentry";
/// Key holding the gas channel's clean-air resistance (f32, LE bytes).
const CAL_KEY_R0: &str = "r0_gas";

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    engine: AlarmEngine,
    last_snapshot: SampleSnapshot,
    last_outputs: Option<EngineOutputs>,
    /// Freshly computed R0 awaiting persistence.
    pending_r0: Option<f32>,
    /// Recent hazard transitions, oldest first (bounded, heap-free).
    history: heapless::Deque<HazardRecord, HAZARD_HISTORY_CAP>,
    tick_count: u64,
    config_dirty: bool,
    dirty_since_ms: u32,
}

impl AppService {
    /// Construct the service; the engine starts its WARMUP at `now_ms`.
    pub fn new(config: SystemConfig, now_ms: u32) -> Self {
        Self {
            engine: AlarmEngine::new(config, now_ms),
            last_snapshot: SampleSnapshot::default(),
            last_outputs: None,
            pending_r0: None,
            history: heapless::Deque::new(),
            tick_count: 0,
            config_dirty: false,
            dirty_since_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load the persisted clean-air reference, if one exists.
    ///
    /// "Not found" is a normal first-run condition — the boot sequence
    /// always walks through CALIBRATE, so nothing special happens beyond
    /// losing the degenerate-calibration fallback.
    pub fn load_calibration(&mut self, storage: &impl StoragePort) -> bool {
        let mut buf = [0u8; 4];
        match storage.read(CAL_NAMESPACE, CAL_KEY_R0, &mut buf) {
            Ok(4) => {
                let r0 = f32::from_le_bytes(buf);
                info!("calibration: stored R0 {:.1}Ω loaded", r0);
                self.engine.set_stored_reference(r0);
                true
            }
            Ok(n) => {
                warn!("calibration: stored R0 blob has {} bytes, ignoring", n);
                false
            }
            Err(_) => {
                info!("calibration: no stored R0, will calibrate in-band");
                false
            }
        }
    }

    /// Announce the initial stage through the sink.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.engine.stage()));
        info!("AppService started in {:?}", self.engine.stage());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full evaluation cycle: read sensors → engine tick → alert.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`AlertPort`] — this avoids a double mutable borrow while keeping
    /// the port boundary explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorPort + AlertPort),
        sink: &mut impl EventSink,
        now_ms: u32,
    ) {
        self.tick_count += 1;
        let prev_stage = self.engine.stage();

        // 1. Sample via SensorPort.
        let snapshot = hw.read_all(now_ms);

        // 2. Advance the engine.
        let out = self.engine.tick(&snapshot, now_ms);

        // 3. Emit structured events for everything that moved.
        if let Some(entered) = out.stage_entered {
            sink.emit(&AppEvent::StageChanged {
                from: prev_stage,
                to: entered,
            });
        }
        if let Some(cal) = out.calibration {
            sink.emit(&AppEvent::CalibrationCompleted {
                smoke_baseline: cal.smoke_baseline,
                gas_baseline: cal.gas_baseline,
                r0_ohm: cal.r0_ohm,
                recovered: cal.r0_source != R0Source::Fresh,
            });
            if cal.r0_source == R0Source::Fresh {
                self.pending_r0 = Some(cal.r0_ohm);
            }
        }
        for (channel, transition) in [
            (Channel::Smoke, out.smoke_transition),
            (Channel::Gas, out.gas_transition),
        ] {
            let asserted = match transition {
                Some(HazardTransition::Asserted) => {
                    sink.emit(&AppEvent::HazardAsserted(channel));
                    true
                }
                Some(HazardTransition::Cleared) => {
                    sink.emit(&AppEvent::HazardCleared(channel));
                    false
                }
                None => continue,
            };
            if self.history.is_full() {
                self.history.pop_front();
            }
            let _ = self.history.push_back(HazardRecord {
                channel,
                asserted,
                at_ms: now_ms,
            });
        }

        // 4. Hand the alert signal to the actuator and advance its duty
        //    cycle.
        hw.set_alert(&out.alert);
        hw.update(now_ms);

        self.last_snapshot = snapshot;
        self.last_outputs = Some(out);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (serial console, maintenance flow).
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink, now_ms: u32) {
        match cmd {
            AppCommand::Recalibrate => {
                if self.engine.request_recalibration(now_ms) {
                    sink.emit(&AppEvent::StageChanged {
                        from: Stage::Run,
                        to: Stage::Calibrate,
                    });
                } else {
                    warn!("recalibration refused outside RUN");
                }
            }
            AppCommand::UpdateConfig(new_config) => {
                self.engine.update_config(new_config);
                self.mark_config_dirty(now_ms);
                info!("Configuration updated at runtime");
            }
            AppCommand::SaveConfig => {
                // Backdate the dirty mark so the next auto-save check
                // flushes immediately.
                self.config_dirty = true;
                self.dirty_since_ms = now_ms.wrapping_sub(AUTO_SAVE_DEBOUNCE_MS);
                info!("Explicit config save requested");
            }
        }
    }

    // ── Persistence ───────────────────────────────────────────

    /// Flush a freshly calibrated R0 to storage, if one is pending.
    /// Returns `true` when a write happened.
    pub fn persist_calibration_if_needed(&mut self, storage: &mut impl StoragePort) -> bool {
        let Some(r0) = self.pending_r0 else {
            return false;
        };
        match storage.write(CAL_NAMESPACE, CAL_KEY_R0, &r0.to_le_bytes()) {
            Ok(()) => {
                info!("calibration: R0 {:.1}Ω persisted", r0);
                self.pending_r0 = None;
                true
            }
            Err(e) => {
                warn!("calibration: R0 persist failed: {} (will retry)", e);
                false
            }
        }
    }

    /// Check if auto-save should trigger (5 seconds after last change).
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort, now_ms: u32) -> bool {
        if !self.config_dirty {
            return false;
        }
        if elapsed_ms(now_ms, self.dirty_since_ms) < AUTO_SAVE_DEBOUNCE_MS {
            return false;
        }
        match storage.save(self.engine.config()) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config auto-saved to NVS");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Force-save if dirty (call before shutdown paths).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(self.engine.config()) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config force-saved");
            }
            Err(e) => {
                warn!("Config force-save failed: {}", e);
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the last evaluation cycle.
    pub fn build_telemetry(&self) -> TelemetryData {
        let out = self.last_outputs.as_ref();
        TelemetryData {
            stage: out.map_or(Stage::Warmup, |o| o.stage),
            smoke_smoothed: out.and_then(|o| o.smoke.smoothed).unwrap_or(0.0),
            smoke_baseline: out.and_then(|o| o.smoke.baseline).unwrap_or(0.0),
            smoke_hazard: out.is_some_and(|o| o.smoke.hazard),
            gas_smoothed: out.and_then(|o| o.gas.smoothed).unwrap_or(0.0),
            gas_baseline: out.and_then(|o| o.gas.baseline).unwrap_or(0.0),
            gas_hazard: out.is_some_and(|o| o.gas.hazard),
            lpg_ppm: out.and_then(|o| o.lpg_ppm).unwrap_or(-1.0),
            temperature_c: self.last_snapshot.temperature_c,
            alert_active: out.is_some_and(|o| o.alert.active),
            alert_frequency_hz: out.map_or(0.0, |o| o.alert.frequency_hz),
        }
    }

    /// Current lifecycle stage.
    pub fn stage(&self) -> Stage {
        self.engine.stage()
    }

    /// Total evaluation cycles executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Clone of the live configuration.
    pub fn current_config(&self) -> SystemConfig {
        self.engine.config().clone()
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }

    /// Recent hazard transitions, oldest first (bounded ring, at most
    /// `HAZARD_HISTORY_CAP` entries).
    pub fn hazard_history(&self) -> impl Iterator<Item = &HazardRecord> {
        self.history.iter()
    }

    // ── Internal ──────────────────────────────────────────────

    fn mark_config_dirty(&mut self, now_ms: u32) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = now_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_before_first_tick_is_inert() {
        let app = AppService::new(SystemConfig::default(), 0);
        let t = app.build_telemetry();
        assert_eq!(t.stage, Stage::Warmup);
        assert!(!t.alert_active);
        assert!(t.lpg_ppm < 0.0);
    }
}
