//! Task Watchdog Timer (TWDT) driver.
//!
//! A stalled alarm loop is worse than a rebooting one: the TWDT resets the
//! device if `feed()` stops being called.  The main loop feeds it on every
//! event-loop iteration.

/// TWDT timeout.  The evaluation cycle runs at 50 Hz, so several seconds
/// of missed feeds means the loop is well and truly wedged.
#[cfg(target_os = "espidf")]
const WATCHDOG_TIMEOUT_MS: u32 = 8_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            use esp_idf_svc::sys::*;
            // SAFETY: TWDT configuration from the single main task at boot.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: WATCHDOG_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let subscribed = esp_task_wdt_add(core::ptr::null_mut()) == ESP_OK;
                if subscribed {
                    log::info!("Watchdog: subscribed ({}s, panic on trigger)", WATCHDOG_TIMEOUT_MS / 1000);
                } else {
                    log::warn!("Watchdog: failed to subscribe");
                }

                Self { subscribed }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): no-op");
            Self {}
        }
    }

    /// Feed the watchdog.  Must be called more often than the timeout.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: reset of the calling task's TWDT entry.
                unsafe {
                    esp_idf_svc::sys::esp_task_wdt_reset();
                }
            }
        }
    }
}
