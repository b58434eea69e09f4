//! Sensor subsystem — individual drivers and the aggregating [`SensorHub`].
//!
//! The hub owns every sensor driver and produces a [`SampleSnapshot`] each
//! evaluation cycle that feeds the alarm engine's `tick`.

pub mod dht;
pub mod mq_analog;
pub mod mq_digital;

use crate::engine::SampleSnapshot;
use dht::DhtSensor;
use mq_analog::MqAnalogChannel;
use mq_digital::DigitalLine;

/// Sensor line identity — one per MQ module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// MQ-2, smoke.
    Smoke,
    /// MQ-6, combustible gas (LPG).
    Gas,
}

/// Aggregates all sensor drivers and produces a unified snapshot.
pub struct SensorHub {
    smoke_analog: MqAnalogChannel,
    gas_analog: MqAnalogChannel,
    smoke_digital: DigitalLine,
    gas_digital: DigitalLine,
    dht: DhtSensor,
    dht_interval_ms: u32,
}

impl SensorHub {
    /// Construct a new hub.  Pass in pre-built drivers (built in main
    /// where peripheral ownership is established).
    pub fn new(
        smoke_analog: MqAnalogChannel,
        gas_analog: MqAnalogChannel,
        smoke_digital: DigitalLine,
        gas_digital: DigitalLine,
        dht: DhtSensor,
        dht_interval_ms: u32,
    ) -> Self {
        Self {
            smoke_analog,
            gas_analog,
            smoke_digital,
            gas_digital,
            dht,
            dht_interval_ms,
        }
    }

    /// Read every sensor and return a unified snapshot.
    ///
    /// The digital levels come straight from hardware state — the ISR edge
    /// path only enforces the debounce quiet interval, it never supplies
    /// the value (see `mq_digital`).
    pub fn read_all(&mut self, now_ms: u32) -> SampleSnapshot {
        SampleSnapshot {
            smoke_raw: self.smoke_analog.read(),
            gas_raw: self.gas_analog.read(),
            smoke_do: self.smoke_digital.level(),
            gas_do: self.gas_digital.level(),
            temperature_c: self.dht.read(now_ms, self.dht_interval_ms),
        }
    }
}
