//! MQ-series analog (AO) channel read through the ESP32 ADC.
//!
//! The raw count stream is deliberately unfiltered here — smoothing is the
//! engine's job, and calibration consumes raw counts.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a per-channel static `AtomicU16` for injection.

use core::sync::atomic::AtomicU16;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

use super::Channel;

static SIM_SMOKE_ADC: AtomicU16 = AtomicU16::new(0);
static SIM_GAS_ADC: AtomicU16 = AtomicU16::new(0);

/// Inject a raw ADC reading for host-side tests and simulation.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(channel: Channel, raw: u16) {
    sim_slot(channel).store(raw, Ordering::Relaxed);
}

#[allow(dead_code)] // unreferenced on espidf targets
fn sim_slot(channel: Channel) -> &'static AtomicU16 {
    match channel {
        Channel::Smoke => &SIM_SMOKE_ADC,
        Channel::Gas => &SIM_GAS_ADC,
    }
}

/// One MQ sensor's analog line.
pub struct MqAnalogChannel {
    channel: Channel,
    _adc_gpio: i32,
}

impl MqAnalogChannel {
    pub fn new(channel: Channel, adc_gpio: i32) -> Self {
        Self {
            channel,
            _adc_gpio: adc_gpio,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Latest raw ADC count.
    pub fn read(&self) -> u16 {
        self.read_adc()
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> u16 {
        use crate::drivers::hw_init;
        let adc_channel = match self.channel {
            Channel::Smoke => hw_init::ADC1_CH_SMOKE,
            Channel::Gas => hw_init::ADC1_CH_GAS,
        };
        hw_init::adc1_read(adc_channel)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> u16 {
        sim_slot(self.channel).load(Ordering::Relaxed)
    }
}
