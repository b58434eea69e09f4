//! Debounced MQ digital-threshold (DO) lines.
//!
//! Each MQ module carries a comparator whose DO output flips when the
//! analog level crosses the trim-pot threshold.  Near the threshold the
//! comparator chatters, so raw edges arrive in storms.
//!
//! The ISR does the absolute minimum: it offers the edge timestamp to a
//! per-line atomic slot, and the slot accepts it only if at least the
//! configured quiet interval has elapsed since the previously *accepted*
//! edge — "last accepted edge wins, within the debounce window".  No
//! business logic runs in interrupt context.
//!
//! The main loop does **not** take the hazard level from this path: each
//! evaluation cycle re-reads the debounced level straight from the GPIO.
//! The ISR path exists solely to enforce the quiet interval and to nudge
//! the event queue for logging.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: `level()` reads the GPIO; ISRs registered by hw_init call
//! [`record_edge`].  On host/test: level comes from a per-line `AtomicBool`,
//! and tests call [`record_edge`] directly.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::Channel;

/// Timestamp (ms) of the last accepted edge per line; 0 = none yet.
static SMOKE_EDGE_MS: AtomicU32 = AtomicU32::new(0);
static GAS_EDGE_MS: AtomicU32 = AtomicU32::new(0);

/// Quiet interval required between accepted edges.  Written once at init
/// from config, read from ISR context.
static DEBOUNCE_MS: AtomicU32 = AtomicU32::new(20);

static SIM_SMOKE_LEVEL: AtomicBool = AtomicBool::new(false);
static SIM_GAS_LEVEL: AtomicBool = AtomicBool::new(false);

fn edge_slot(channel: Channel) -> &'static AtomicU32 {
    match channel {
        Channel::Smoke => &SMOKE_EDGE_MS,
        Channel::Gas => &GAS_EDGE_MS,
    }
}

/// Set the quiet interval (from `SystemConfig::do_debounce_ms`) before the
/// ISR service is installed.
pub fn set_debounce_ms(ms: u32) {
    DEBOUNCE_MS.store(ms, Ordering::Relaxed);
}

/// Offer an edge timestamp to a line's slot.  Returns `true` when the edge
/// was accepted (quiet interval elapsed since the previous accepted edge).
///
/// Lock-free — safe to call from interrupt context.  Each line has exactly
/// one producer (its own GPIO ISR), so plain load/store suffices.
pub fn record_edge(channel: Channel, now_ms: u32) -> bool {
    let slot = edge_slot(channel);
    let last = slot.load(Ordering::Relaxed);
    let quiet = DEBOUNCE_MS.load(Ordering::Relaxed);
    if last != 0 && now_ms.wrapping_sub(last) < quiet {
        return false;
    }
    slot.store(now_ms, Ordering::Release);
    true
}

/// Inject a DO level for host-side tests and simulation.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_level(channel: Channel, active: bool) {
    let slot = match channel {
        Channel::Smoke => &SIM_SMOKE_LEVEL,
        Channel::Gas => &SIM_GAS_LEVEL,
    };
    slot.store(active, Ordering::Relaxed);
}

/// One MQ module's digital-threshold line.
pub struct DigitalLine {
    channel: Channel,
    gpio: i32,
    active_high: bool,
}

impl DigitalLine {
    pub fn new(channel: Channel, gpio: i32, active_high: bool) -> Self {
        Self {
            channel,
            gpio,
            active_high,
        }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Debounced logical level: true = comparator asserting "gas present".
    pub fn level(&self) -> bool {
        let raw = self.read_hw();
        if self.active_high { raw } else { !raw }
    }

    /// Timestamp of the last accepted edge, if any edge was ever accepted.
    pub fn last_accepted_edge_ms(&self) -> Option<u32> {
        match edge_slot(self.channel).load(Ordering::Acquire) {
            0 => None,
            ms => Some(ms),
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_hw(&self) -> bool {
        crate::drivers::hw_init::gpio_read(self.gpio)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_hw(&self) -> bool {
        let slot = match self.channel {
            Channel::Smoke => &SIM_SMOKE_LEVEL,
            Channel::Gas => &SIM_GAS_LEVEL,
        };
        slot.load(Ordering::Relaxed)
    }
}
