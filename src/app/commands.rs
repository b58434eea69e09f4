//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (serial console,
//! maintenance button, first-boot logic) that the
//! [`AppService`](super::service::AppService) interprets and acts upon.

use crate::config::SystemConfig;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Restart the clean-air calibration phase (sensor replaced, or no
    /// persisted reference on first boot).
    Recalibrate,

    /// Hot-reload configuration (e.g. from NVS or a maintenance tool).
    UpdateConfig(SystemConfig),

    /// Explicitly persist the current config to NVS immediately.
    SaveConfig,
}
