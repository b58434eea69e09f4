//! Hardware timer module using ESP-IDF's esp_timer API.
//!
//! Creates the periodic evaluation-cycle timer that pushes `ControlTick`
//! into the lock-free SPSC queue.  On simulation targets the sleep loop in
//! `main` produces the ticks instead.
//!
//! Timer callbacks execute in the ESP timer task context (not ISR), so
//! they can safely call push_event().

#[cfg(target_os = "espidf")]
use crate::events::{Event, push_event};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
static mut CONTROL_TIMER: esp_timer_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
unsafe extern "C" fn control_tick_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::ControlTick);
}

/// Start the evaluation-cycle timer at `control_period_ms`.
#[cfg(target_os = "espidf")]
pub fn start_timers(control_period_ms: u32) {
    // SAFETY: CONTROL_TIMER is written here once at boot from the single
    // main-task context before any timer callbacks fire.  The callback
    // itself only calls push_event(), which is lock-free.
    unsafe {
        let control_args = esp_timer_create_args_t {
            callback: Some(control_tick_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"control\0".as_ptr() as *const _,
            skip_unhandled_events: false,
        };
        let ret = esp_timer_create(&control_args, &raw mut CONTROL_TIMER);
        if ret != ESP_OK {
            log::error!(
                "hw_timer: control timer create failed (rc={}) — no evaluation ticks",
                ret
            );
            return;
        }
        let ret = esp_timer_start_periodic(CONTROL_TIMER, u64::from(control_period_ms) * 1_000);
        if ret != ESP_OK {
            log::error!("hw_timer: control timer start failed (rc={})", ret);
            return;
        }

        log::info!("hw_timer: control tick every {}ms", control_period_ms);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn start_timers(_control_period_ms: u32) {
    log::info!("hw_timer(sim): timers not started (events driven by sleep loop)");
}

/// Stop the evaluation-cycle timer.
#[cfg(target_os = "espidf")]
pub fn stop_timers() {
    // SAFETY: CONTROL_TIMER is a valid handle if start_timers() succeeded;
    // null-check prevents double-free.  Main task only.
    unsafe {
        if !CONTROL_TIMER.is_null() {
            esp_timer_stop(CONTROL_TIMER);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn stop_timers() {}
