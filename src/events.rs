//! Interrupt-driven event system.
//!
//! Events are produced by:
//! - GPIO ISRs (MQ-2/MQ-6 digital-threshold edges)
//! - Timer callbacks (periodic control ticks, telemetry)
//! - Software (explicit recalibration requests)
//!
//! Events are consumed by the main control loop, which processes them
//! one at a time in FIFO order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ GPIO ISR    │────▶│              │     │              │
//! │ Timer ISR   │────▶│  Event Queue │────▶│  Main Loop   │
//! │ Software    │────▶│  (lock-free) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Edge events carry no payload: the debounced timestamp lives in the
//! per-line atomic slot owned by `sensing::mq_digital`, and the actual
//! level is re-read from hardware each evaluation cycle.  The queue only
//! tells the main loop that *something* moved.

use core::sync::atomic::{AtomicU8, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 32;

/// System event types, ordered by rough priority.
/// Lower discriminant = higher priority when multiple events
/// are pending simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    // ── Sensor edges ──────────────────────────────────────
    /// MQ-2 digital-threshold line saw an accepted edge.
    SmokeEdge = 1,
    /// MQ-6 digital-threshold line saw an accepted edge.
    GasEdge = 2,

    // ── Control ───────────────────────────────────────────
    /// Evaluation cycle timer fired (50 Hz).
    ControlTick = 20,
    /// Operator requested an in-band recalibration.
    RecalibrateRequested = 21,

    // ── Communication ─────────────────────────────────────
    /// Telemetry report timer fired.
    TelemetryTick = 30,

    // ── Housekeeping ──────────────────────────────────────
    /// Watchdog heartbeat.
    WatchdogTick = 50,
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// ISRs write (produce), main loop reads (consume).
// Uses atomic head/tail indices.  The buffer is intentionally
// kept in a static so ISR callbacks can access it.

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
// SAFETY: EVENT_BUFFER is accessed exclusively through the SPSC discipline
// below.  Producer (push_event): ISR / timer-task context — one writer.
// Consumer (drain_events): main-loop task — one reader.  The Acquire/Release
// pairs on head/tail order the buffer accesses.
static mut EVENT_BUFFER: [u8; EVENT_QUEUE_CAP] = [0; EVENT_QUEUE_CAP];

/// Push an event into the queue.
/// Safe to call from ISR context (lock-free).
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

    if next_head == tail {
        return false; // Queue full — drop event.
    }

    // SAFETY: Only one producer (ISR context is single-threaded on each
    // core); the Release store below publishes the slot write.
    unsafe {
        EVENT_BUFFER[head as usize] = event as u8;
    }

    EVENT_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the next event from the queue.
/// Called from the main loop (single consumer).
/// Returns `None` if the queue is empty.
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None; // Empty.
    }

    let raw = unsafe { EVENT_BUFFER[tail as usize] };
    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

    event_from_u8(raw)
}

/// Drain all pending events into a callback.
/// Processes events in FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

/// Check if the event queue is empty.
pub fn queue_is_empty() -> bool {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);
    tail == head
}

/// Number of pending events.
pub fn queue_len() -> usize {
    let head = EVENT_HEAD.load(Ordering::Relaxed) as usize;
    let tail = EVENT_TAIL.load(Ordering::Relaxed) as usize;
    (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
}

// ── Internal ──────────────────────────────────────────────────

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        1 => Some(Event::SmokeEdge),
        2 => Some(Event::GasEdge),
        20 => Some(Event::ControlTick),
        21 => Some(Event::RecalibrateRequested),
        30 => Some(Event::TelemetryTick),
        50 => Some(Event::WatchdogTick),
        _ => None,
    }
}
