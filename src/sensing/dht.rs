//! DHT11 ambient temperature sensor.
//!
//! The DHT11 is slow (one conversion per second) and its single-wire
//! protocol stalls the CPU for a few milliseconds per read, so the driver
//! caches the last good reading and only touches the wire when the
//! configured interval has elapsed.  Failed reads (checksum, timeout, NaN)
//! keep the previous value — a flaky temperature sensor must not disturb
//! the alarm loop.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: bit-bangs the single-wire protocol on the data GPIO.
//! On host/test: reads from a static injected value (millidegrees).

use core::sync::atomic::AtomicI32;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

use crate::timebase::expired;

/// Injected temperature in millidegrees C; `i32::MIN` = read failure.
static SIM_TEMP_MILLI_C: AtomicI32 = AtomicI32::new(25_000);

/// Inject a temperature for host-side tests; `None` simulates a failed read.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_temp_c(temp: Option<f32>) {
    let raw = match temp {
        Some(c) => (c * 1_000.0) as i32,
        None => i32::MIN,
    };
    SIM_TEMP_MILLI_C.store(raw, Ordering::Relaxed);
}

pub struct DhtSensor {
    gpio: i32,
    cached_c: f32,
    last_read_ms: u32,
    primed: bool,
}

impl DhtSensor {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            cached_c: f32::NAN,
            last_read_ms: 0,
            primed: false,
        }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Cached temperature, refreshed at most once per `interval_ms`.
    /// NaN until the first successful read.
    pub fn read(&mut self, now_ms: u32, interval_ms: u32) -> f32 {
        if !self.primed || expired(now_ms, self.last_read_ms, interval_ms) {
            self.primed = true;
            self.last_read_ms = now_ms;
            if let Some(c) = self.read_raw() {
                if c.is_finite() {
                    self.cached_c = c;
                }
            }
        }
        self.cached_c
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_raw(&self) -> Option<f32> {
        match SIM_TEMP_MILLI_C.load(Ordering::Relaxed) {
            i32::MIN => None,
            milli => Some(milli as f32 / 1_000.0),
        }
    }

    /// Single-wire DHT11 transaction: host start pulse, then 40 data bits
    /// timed by the length of each high phase.  Busy-waits ~4 ms worst
    /// case, which is acceptable at the 1 s read cadence.
    #[cfg(target_os = "espidf")]
    fn read_raw(&self) -> Option<f32> {
        use esp_idf_svc::sys::{
            esp_rom_delay_us, gpio_get_level, gpio_mode_t_GPIO_MODE_INPUT,
            gpio_mode_t_GPIO_MODE_OUTPUT_OD, gpio_set_direction, gpio_set_level,
        };

        // Wait (with timeout) for the line to sit at `level` for up to
        // `timeout_us`; returns the time spent, or None on timeout.
        unsafe fn wait_level(gpio: i32, level: i32, timeout_us: u32) -> Option<u32> {
            let mut waited = 0;
            // SAFETY: gpio_get_level is a register read on a configured pin.
            while unsafe { gpio_get_level(gpio) } != level {
                if waited >= timeout_us {
                    return None;
                }
                unsafe { esp_rom_delay_us(1) };
                waited += 1;
            }
            Some(waited)
        }

        // SAFETY: the data GPIO is exclusively owned by this driver; the
        // transaction runs on the main task with interrupts enabled (the
        // bit timing tolerates ISR jitter at DHT11 margins).
        unsafe {
            // Host start: pull low ≥18 ms, then release and listen.
            gpio_set_direction(self.gpio, gpio_mode_t_GPIO_MODE_OUTPUT_OD);
            gpio_set_level(self.gpio, 0);
            esp_rom_delay_us(18_000);
            gpio_set_level(self.gpio, 1);
            gpio_set_direction(self.gpio, gpio_mode_t_GPIO_MODE_INPUT);

            // Sensor response: ~80 µs low, ~80 µs high.
            wait_level(self.gpio, 0, 100)?;
            wait_level(self.gpio, 1, 100)?;
            wait_level(self.gpio, 0, 100)?;

            // 40 bits: 50 µs low separator, then 26–28 µs high = 0,
            // ~70 µs high = 1.  Threshold at 40 µs.
            let mut data = [0u8; 5];
            for bit in 0..40 {
                wait_level(self.gpio, 1, 80)?;
                let high_us = wait_level(self.gpio, 0, 100)?;
                if high_us > 40 {
                    data[bit / 8] |= 1 << (7 - bit % 8);
                }
            }

            let checksum = data[0]
                .wrapping_add(data[1])
                .wrapping_add(data[2])
                .wrapping_add(data[3]);
            if checksum != data[4] {
                return None;
            }

            // DHT11: integral °C in byte 2, tenths in byte 3 (often 0).
            Some(f32::from(data[2]) + f32::from(data[3]) / 10.0)
        }
    }
}
