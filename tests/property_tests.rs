//! Property tests for the alarm engine's numeric and temporal invariants.
//!
//! Runs on host (x86_64) only — proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use gassentry::config::{ChannelConfig, SystemConfig};
use gassentry::engine::curve::GasCurve;
use gassentry::engine::filter::Ema;
use gassentry::engine::hazard::{HazardDetector, HazardInputs};
use gassentry::engine::stage::{Stage, StageController};
use gassentry::timebase::elapsed_ms;
use proptest::prelude::*;

// ── Smoothing filter: monotone convergence, no overshoot ──────

proptest! {
    /// For all alpha in (0,1) and any step, the smoothed output lies
    /// between the previous smoothed value and the new raw value.
    #[test]
    fn ema_output_bounded_by_prev_and_raw(
        alpha in 0.01f32..0.99,
        samples in proptest::collection::vec(0u16..=4095, 2..100),
    ) {
        let mut ema = Ema::new(alpha);
        let mut prev = ema.update(f32::from(samples[0]));
        for &raw in &samples[1..] {
            let raw = f32::from(raw);
            let next = ema.update(raw);
            let (lo, hi) = if prev <= raw { (prev, raw) } else { (raw, prev) };
            prop_assert!(next >= lo && next <= hi,
                "smoothed {next} outside [{lo}, {hi}]");
            prev = next;
        }
    }

    /// The first sample always seeds the estimate exactly.
    #[test]
    fn ema_seeds_with_first_sample(alpha in 0.01f32..0.99, raw in 0u16..=4095) {
        let mut ema = Ema::new(alpha);
        prop_assert_eq!(ema.update(f32::from(raw)), f32::from(raw));
    }
}

// ── Stage controller: forward-only lifecycle ──────────────────

fn stage_rank(stage: Stage) -> u8 {
    match stage {
        Stage::Warmup => 0,
        Stage::Calibrate => 1,
        Stage::Run => 2,
    }
}

proptest! {
    /// Stage transitions are monotonic WARMUP → CALIBRATE → RUN for any
    /// sequence of elapsed-time inputs.
    #[test]
    fn stages_never_move_backward(
        deltas in proptest::collection::vec(0u32..120_000, 1..200),
    ) {
        let cfg = SystemConfig::default();
        let mut ctrl = StageController::new(0);
        let mut now = 0u32;
        let mut rank = stage_rank(ctrl.stage());

        for delta in deltas {
            now = now.wrapping_add(delta);
            ctrl.accumulate(500, 800);
            let _ = ctrl.advance(&cfg, now);
            let new_rank = stage_rank(ctrl.stage());
            prop_assert!(new_rank >= rank,
                "stage moved backward: {rank} -> {new_rank}");
            rank = new_rank;
        }
    }
}

// ── Curve model: two-point fit round-trip ─────────────────────

proptest! {
    /// evaluate(fit(p1,r1,p2,r2)) at r1 ≈ p1 and at r2 ≈ p2, within
    /// floating-point tolerance, for well-separated reference points.
    #[test]
    fn curve_fit_round_trip(
        p1 in 20.0f32..500.0,
        ratio_scale in 2.0f32..8.0,
        p2_mult in 3.0f32..20.0,
        r2 in 0.1f32..1.0,
    ) {
        let p2 = p1 * p2_mult;
        let r1 = r2 * ratio_scale;
        let curve = GasCurve::fit(p1, r1, p2, r2);
        let ceiling = p2 * 100.0;

        let got1 = curve.evaluate(r1, ceiling);
        let got2 = curve.evaluate(r2, ceiling);
        prop_assert!(((got1 - p1) / p1).abs() < 0.05,
            "evaluate(r1)={got1}, want ≈{p1}");
        prop_assert!(((got2 - p2) / p2).abs() < 0.05,
            "evaluate(r2)={got2}, want ≈{p2}");
    }

    /// The concentration estimate is always finite and inside
    /// [0, ceiling], whatever the ratio.
    #[test]
    fn curve_output_always_bounded(ratio in -10.0f32..100.0) {
        let curve = GasCurve::fit(200.0, 3.2, 1000.0, 0.8);
        let ppm = curve.evaluate(ratio, 20_000.0);
        prop_assert!(ppm.is_finite());
        prop_assert!((0.0..=20_000.0).contains(&ppm));
    }
}

// ── Hazard detector: hold-timer discipline ────────────────────

fn detector_cfg(assert_hold_ms: u32) -> ChannelConfig {
    ChannelConfig {
        ema_alpha: 0.15,
        rise_ratio: 1.25,
        fall_ratio: 1.12,
        absolute_floor: Some(150.0),
        assert_hold_ms,
        clear_hold_ms: assert_hold_ms + 2_000,
        min_on_ms: 5_000,
    }
}

proptest! {
    /// A condition held for less than the assert-hold duration, then
    /// interrupted, must never assert.
    #[test]
    fn interrupted_assert_hold_never_latches(
        assert_hold in 100u32..5_000,
        held_fraction in 0.1f32..0.99,
    ) {
        let mut det = HazardDetector::new("test", detector_cfg(assert_hold));
        let elevated = HazardInputs { smoothed: 260.0, baseline: 100.0, digital: false };
        let quiet = HazardInputs { smoothed: 100.0, baseline: 100.0, digital: false };

        let held_ms = ((assert_hold as f32) * held_fraction) as u32;
        // Condition true from t=0 for held_ms (< assert_hold), then a gap.
        prop_assert!(det.evaluate(&elevated, 0).is_none());
        prop_assert!(det.evaluate(&elevated, held_ms).is_none());
        prop_assert!(det.evaluate(&quiet, held_ms + 1).is_none());
        prop_assert!(!det.is_hazard());

        // Even resuming right away needs the full hold again.
        prop_assert!(det.evaluate(&elevated, held_ms + 2).is_none());
        let almost = held_ms + 2 + assert_hold - 1;
        prop_assert!(det.evaluate(&elevated, almost).is_none());
        prop_assert!(!det.is_hazard());
    }

    /// Clearing is blocked until min-on has elapsed, for any clear timing.
    #[test]
    fn clear_always_blocked_by_min_on(
        assert_hold in 0u32..1_000,
        probe_step in 50u32..500,
    ) {
        let cfg = detector_cfg(assert_hold);
        let mut det = HazardDetector::new("test", cfg);
        let elevated = HazardInputs { smoothed: 260.0, baseline: 100.0, digital: false };
        let quiet = HazardInputs { smoothed: 100.0, baseline: 100.0, digital: false };

        det.evaluate(&elevated, 0);
        let t_on = assert_hold;
        det.evaluate(&elevated, t_on);
        prop_assert!(det.is_hazard());

        // Quiet immediately; while min-on runs the latch must hold.
        let mut t = t_on;
        while elapsed_ms(t, t_on) < cfg.min_on_ms {
            det.evaluate(&quiet, t);
            prop_assert!(det.is_hazard(), "cleared before min-on at t={t}");
            t += probe_step;
        }
    }
}

// ── Time base: wraparound-safe arithmetic ─────────────────────

proptest! {
    #[test]
    fn elapsed_correct_across_wraparound(
        since in proptest::num::u32::ANY,
        delta in 0u32..=i32::MAX as u32,
    ) {
        let now = since.wrapping_add(delta);
        prop_assert_eq!(elapsed_ms(now, since), delta);
    }
}
