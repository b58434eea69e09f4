//! Alert intensity mapping.
//!
//! Pure function of hazard state and signal excursion: the further the
//! smoothed reading sits above its baseline, the higher the alert
//! frequency, linearly up to a cap.  When both channels are hazardous the
//! combined signal is the average of the per-channel frequencies.  Duty
//! cycle (on/off timing) is the buzzer driver's business — this module
//! only supplies intensity.

/// Derived alert output, recomputed every evaluation cycle; never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertSignal {
    /// Any channel hazardous.
    pub active: bool,
    /// Mapped tone frequency (Hz); 0 when inactive.
    pub frequency_hz: f32,
    /// Smoke channel contributes to the alert.
    pub smoke: bool,
    /// Gas channel contributes to the alert.
    pub gas: bool,
}

impl AlertSignal {
    pub const fn silent() -> Self {
        Self {
            active: false,
            frequency_hz: 0.0,
            smoke: false,
            gas: false,
        }
    }
}

/// Frequency for one channel's excursion: `base + slope * excursion`,
/// excursion clamped at zero, frequency capped at `max_hz`.
pub fn channel_frequency(excursion: f32, base_hz: f32, slope_hz: f32, max_hz: f32) -> f32 {
    let span = excursion.max(0.0);
    (base_hz + slope_hz * span).min(max_hz)
}

/// Combine per-channel hazard excursions into one alert signal.
/// `smoke`/`gas` carry the channel's excursion while it is hazardous.
pub fn map_alert(
    smoke: Option<f32>,
    gas: Option<f32>,
    base_hz: f32,
    slope_hz: f32,
    max_hz: f32,
) -> AlertSignal {
    match (smoke, gas) {
        (None, None) => AlertSignal::silent(),
        (Some(e), None) => AlertSignal {
            active: true,
            frequency_hz: channel_frequency(e, base_hz, slope_hz, max_hz),
            smoke: true,
            gas: false,
        },
        (None, Some(e)) => AlertSignal {
            active: true,
            frequency_hz: channel_frequency(e, base_hz, slope_hz, max_hz),
            smoke: false,
            gas: true,
        },
        (Some(es), Some(eg)) => {
            let fs = channel_frequency(es, base_hz, slope_hz, max_hz);
            let fg = channel_frequency(eg, base_hz, slope_hz, max_hz);
            AlertSignal {
                active: true,
                frequency_hz: (fs + fg) / 2.0,
                smoke: true,
                gas: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: f32 = 800.0;
    const SLOPE: f32 = 2.5;
    const MAX: f32 = 2_600.0;

    #[test]
    fn no_hazard_is_silent() {
        let sig = map_alert(None, None, BASE, SLOPE, MAX);
        assert_eq!(sig, AlertSignal::silent());
    }

    #[test]
    fn frequency_scales_linearly_with_excursion() {
        let sig = map_alert(Some(100.0), None, BASE, SLOPE, MAX);
        assert!(sig.active && sig.smoke && !sig.gas);
        assert!((sig.frequency_hz - 1_050.0).abs() < 1e-3); // 800 + 2.5*100
    }

    #[test]
    fn frequency_caps_at_max() {
        let sig = map_alert(None, Some(10_000.0), BASE, SLOPE, MAX);
        assert_eq!(sig.frequency_hz, MAX);
    }

    #[test]
    fn negative_excursion_clamps_to_base() {
        // Digital-only assert can leave the analog reading below baseline.
        let sig = map_alert(Some(-40.0), None, BASE, SLOPE, MAX);
        assert_eq!(sig.frequency_hz, BASE);
    }

    #[test]
    fn dual_hazard_averages_frequencies() {
        let sig = map_alert(Some(100.0), Some(200.0), BASE, SLOPE, MAX);
        assert!(sig.smoke && sig.gas);
        // (1050 + 1300) / 2
        assert!((sig.frequency_hz - 1_175.0).abs() < 1e-3);
    }
}
