//! Alarm buzzer driver (passive piezo on an LEDC tone channel).
//!
//! Consumes the engine's [`AlertSignal`] and renders it as a non-blocking
//! on/off duty cycle: the main loop calls `tick()` every evaluation cycle
//! and the driver toggles the tone at the cadence for the active hazard
//! class.  No delays, no timers of its own — just wraparound-safe
//! timestamp comparisons.
//!
//! | Hazard class    | Cadence (on/off) |
//! |-----------------|------------------|
//! | Smoke or both   | 120 ms / 40 ms   |
//! | Gas only        | 200 ms / 80 ms   |
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the LEDC tone channel via hw_init.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;
use crate::engine::alert::AlertSignal;
use crate::timebase::expired;

/// Smoke (or combined) cadence: short urgent bursts.
const SMOKE_ON_MS: u32 = 120;
const SMOKE_OFF_MS: u32 = 40;
/// Gas-only cadence: longer, slower bursts.
const GAS_ON_MS: u32 = 200;
const GAS_OFF_MS: u32 = 80;

pub struct Buzzer {
    active: bool,
    freq_hz: u32,
    on_ms: u32,
    off_ms: u32,
    tone_on: bool,
    /// Start of the current on/off phase; invalid until `phase_started`.
    phase_start_ms: u32,
    phase_started: bool,
}

impl Buzzer {
    pub fn new() -> Self {
        Self {
            active: false,
            freq_hz: 0,
            on_ms: SMOKE_ON_MS,
            off_ms: SMOKE_OFF_MS,
            tone_on: false,
            phase_start_ms: 0,
            phase_started: false,
        }
    }

    /// Install the current alert signal.  Frequency and cadence updates
    /// apply without resetting the duty phase, so a drifting excursion
    /// re-pitches the tone instead of stuttering it.
    pub fn set_signal(&mut self, signal: &AlertSignal) {
        if !signal.active {
            self.stop();
            return;
        }

        let (on_ms, off_ms) = if signal.smoke {
            (SMOKE_ON_MS, SMOKE_OFF_MS)
        } else {
            (GAS_ON_MS, GAS_OFF_MS)
        };
        let freq = signal.frequency_hz.max(0.0) as u32;

        if !self.active {
            self.active = true;
            self.phase_started = false;
        } else if self.tone_on && freq != self.freq_hz {
            hw_init::ledc_tone(freq);
        }
        self.freq_hz = freq;
        self.on_ms = on_ms;
        self.off_ms = off_ms;
    }

    /// Silence immediately and reset the duty phase.
    pub fn stop(&mut self) {
        if self.tone_on || self.active {
            hw_init::ledc_tone(0);
        }
        self.active = false;
        self.tone_on = false;
        self.phase_started = false;
    }

    /// Advance the duty cycle.  Call once per evaluation cycle.
    pub fn tick(&mut self, now_ms: u32) {
        if !self.active {
            return;
        }

        if !self.phase_started {
            // First tick after activation: start the on-phase immediately.
            self.tone_on = true;
            self.phase_start_ms = now_ms;
            self.phase_started = true;
            hw_init::ledc_tone(self.freq_hz);
            return;
        }

        let phase_len = if self.tone_on { self.on_ms } else { self.off_ms };
        if expired(now_ms, self.phase_start_ms, phase_len) {
            self.tone_on = !self.tone_on;
            self.phase_start_ms = now_ms;
            hw_init::ledc_tone(if self.tone_on { self.freq_hz } else { 0 });
        }
    }

    /// Whether the tone output is currently energised.
    pub fn is_sounding(&self) -> bool {
        self.active && self.tone_on
    }

    pub fn frequency_hz(&self) -> u32 {
        self.freq_hz
    }
}
