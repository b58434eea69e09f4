//! GasSentry Firmware — Main Entry Point
//!
//! Hexagonal architecture with event-driven execution.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter     LogEventSink    NvsAdapter   Esp32Time    │
//! │  (Sensor+Alert)      (EventSink)     (Config+NVS) (monotonic)  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  AlarmEngine: stages · EMA · hazard · drift · curve    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  events (lock-free ISR queue) · hw_timer (tick source)         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Module declarations ───────────────────────────────────────
pub mod config;
pub mod engine;
pub mod error;
mod events;
mod pins;
mod timebase;

pub mod app;
mod adapters;
mod drivers;
mod sensing;

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{info, warn};

use adapters::hardware::HardwareAdapter;
use adapters::log_sink::LogEventSink;
use adapters::nvs::NvsAdapter;
use adapters::time::Esp32TimeAdapter;
use app::commands::AppCommand;
use app::events::AppEvent;
use app::ports::{ConfigPort, EventSink};
use app::service::AppService;
use config::SystemConfig;
use drivers::buzzer::Buzzer;
use events::{Event, push_event};
use sensing::dht::DhtSensor;
use sensing::mq_analog::MqAnalogChannel;
use sensing::mq_digital::DigitalLine;
use sensing::{Channel, SensorHub};

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }

    info!("GasSentry v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Initialise hardware peripherals ────────────────────
    if let Err(e) = drivers::hw_init::init_peripherals() {
        // Peripheral init failure is critical — log and halt.
        // In production this triggers the watchdog reset after timeout.
        log::error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    // ── 3. Load config from NVS (or defaults) ─────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!(
                "NVS init failed ({}), running with defaults and no persistence",
                e
            );
            // Continue without NVS — nothing persists this session.
            // On next reboot, NVS should self-heal.
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 4. ISR plumbing: debounce window, edge handlers, tick timer ──
    sensing::mq_digital::set_debounce_ms(config.do_debounce_ms);
    if let Err(e) = drivers::hw_init::init_isr_service() {
        log::error!("ISR service init failed: {} — continuing without ISRs", e);
    }
    drivers::hw_timer::start_timers(config.tick_interval_ms);
    let watchdog = drivers::watchdog::Watchdog::new();
    let time_adapter = Esp32TimeAdapter::new();

    // ── 5. Construct adapters ─────────────────────────────────
    let sensor_hub = SensorHub::new(
        MqAnalogChannel::new(Channel::Smoke, pins::SMOKE_ADC_GPIO),
        MqAnalogChannel::new(Channel::Gas, pins::GAS_ADC_GPIO),
        DigitalLine::new(Channel::Smoke, pins::SMOKE_DO_GPIO, pins::DO_ACTIVE_HIGH),
        DigitalLine::new(Channel::Gas, pins::GAS_DO_GPIO, pins::DO_ACTIVE_HIGH),
        DhtSensor::new(pins::DHT_GPIO),
        config.dht_read_interval_ms,
    );
    let mut hw = HardwareAdapter::new(sensor_hub, Buzzer::new());
    let mut log_sink = LogEventSink::new();

    // ── 6. Construct app service ──────────────────────────────
    let mut app = AppService::new(config.clone(), time_adapter.now_ms());
    let have_stored_r0 = app.load_calibration(&nvs);
    if !have_stored_r0 {
        info!("No stored calibration — first-run calibration will run in-band");
    }
    app.start(&mut log_sink);

    info!("System ready. Entering event loop.");

    // ── 7. Event loop ─────────────────────────────────────────
    let ticks_per_telemetry =
        u64::from(config.telemetry_interval_secs) * 1_000 / u64::from(config.tick_interval_ms);
    let mut telemetry_counter: u64 = 0;

    loop {
        // Simulate the tick timer via sleep on non-espidf targets.
        // On real hardware, the CPU executes WFI (Wait For Interrupt)
        // and wakes when the esp_timer callback or a GPIO interrupt fires.
        #[cfg(not(target_os = "espidf"))]
        {
            std::thread::sleep(std::time::Duration::from_millis(u64::from(
                config.tick_interval_ms,
            )));
            push_event(Event::ControlTick);
        }

        telemetry_counter += 1;
        if telemetry_counter >= ticks_per_telemetry {
            push_event(Event::TelemetryTick);
            telemetry_counter = 0;
        }

        // Process all pending events.
        let now_ms = time_adapter.now_ms();
        events::drain_events(|event| match event {
            Event::ControlTick => {
                app.tick(&mut hw, &mut log_sink, now_ms);
            }

            Event::TelemetryTick => {
                let t = app.build_telemetry();
                log_sink.emit(&AppEvent::Telemetry(t));
            }

            Event::SmokeEdge | Event::GasEdge => {
                // Level is re-read from hardware on the next ControlTick;
                // the edge only matters for the debounce bookkeeping.
                info!("DO edge: {:?}", event);
            }

            Event::RecalibrateRequested => {
                app.handle_command(AppCommand::Recalibrate, &mut log_sink, now_ms);
            }

            Event::WatchdogTick => {}
        });

        // Persist any freshly computed calibration reference.
        app.persist_calibration_if_needed(&mut nvs);

        // Config auto-save (5s debounce after last change).
        app.auto_save_if_needed(&nvs, now_ms);

        // Feed watchdog on every iteration.
        watchdog.feed();

        // On espidf the loop blocks in the FreeRTOS idle hook between
        // timer events; yield explicitly so the IDLE task can run.
        #[cfg(target_os = "espidf")]
        unsafe {
            esp_idf_svc::sys::vTaskDelay(1);
        }
    }
}
