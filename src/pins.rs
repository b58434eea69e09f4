//! GPIO / peripheral pin assignments for the GasSentry main board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Sensors — Analog (ADC1)
// ---------------------------------------------------------------------------

/// MQ-2 smoke sensor — analog output (AO) via resistive divider.
/// ADC1 channel 6 (GPIO 34 on ESP32).
pub const SMOKE_ADC_GPIO: i32 = 34;

/// MQ-6 combustible-gas (LPG) sensor — analog output (AO).
/// ADC1 channel 7 (GPIO 35 on ESP32).
pub const GAS_ADC_GPIO: i32 = 35;

/// ADC attenuation for both MQ sensors (11 dB → 0 – 3.1 V range).
pub const MQ_ADC_ATTEN: u32 = 3; // esp_idf_hal::adc::attenuation::DB_11

// ---------------------------------------------------------------------------
// Sensors — Digital threshold outputs (comparator DO lines)
// ---------------------------------------------------------------------------

/// MQ-2 digital-threshold output.  Level set by the module's on-board
/// comparator trim pot; edge-interrupt driven with software debounce.
pub const SMOKE_DO_GPIO: i32 = 27;

/// MQ-6 digital-threshold output.
pub const GAS_DO_GPIO: i32 = 14;

/// DO comparator polarity: true = active HIGH (module drives HIGH on gas).
pub const DO_ACTIVE_HIGH: bool = true;

// ---------------------------------------------------------------------------
// Sensors — DHT11 ambient temperature
// ---------------------------------------------------------------------------

/// DHT11 single-wire data pin.
pub const DHT_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Buzzer (passive piezo on LEDC tone output)
// ---------------------------------------------------------------------------

/// LEDC tone channel output for the alarm buzzer.
pub const BUZZER_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits) for the buzzer tone channel.
pub const BUZZER_PWM_RESOLUTION_BITS: u32 = 10;
/// Initial LEDC frequency for the buzzer channel; retuned at runtime per
/// alert intensity.
pub const BUZZER_BASE_FREQ_HZ: u32 = 1_000;

// ---------------------------------------------------------------------------
// I²C bus (OLED display collaborator — not driven by this core)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
