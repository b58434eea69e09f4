//! Hardware drivers: peripheral bring-up and dumb actuators.

pub mod buzzer;
pub mod hw_init;
pub mod hw_timer;
pub mod watchdog;
