//! Adaptive quality: frame-rate measurement and step-count scaling.
//!
//! When adaptive optimization is on, the raymarch step count is scaled by
//! the square of `clamp01(measured_fps / target_fps)`: half the target rate
//! quarters the steps, while a frame rate at or above target leaves them
//! untouched.

use std::collections::VecDeque;

use murk_config::{FpsTier, QualityConfig};

/// Minimum ray-march step count; the controller never scales below this.
pub const MIN_RAYMARCH_STEPS: u32 = 16;

/// Frame-rate estimate smoothed over a sliding window of unscaled frame
/// deltas.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window: usize,
    deltas: VecDeque<f32>,
}

impl FpsCounter {
    /// Create a counter smoothing over `window` frames (minimum 1).
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1) as usize,
            deltas: VecDeque::new(),
        }
    }

    /// Record one frame's unscaled delta time in seconds. Non-positive and
    /// non-finite deltas are ignored.
    pub fn update(&mut self, unscaled_delta: f32) {
        if !unscaled_delta.is_finite() || unscaled_delta <= 0.0 {
            return;
        }
        if self.deltas.len() == self.window {
            self.deltas.pop_front();
        }
        self.deltas.push_back(unscaled_delta);
    }

    /// Smoothed frames per second; 0 until the first sample arrives.
    pub fn fps(&self) -> f32 {
        let sum: f32 = self.deltas.iter().sum();
        if sum <= 0.0 {
            return 0.0;
        }
        self.deltas.len() as f32 / sum
    }
}

/// Scales the raymarch step count against a target frame-rate tier.
#[derive(Debug, Clone)]
pub struct QualityController {
    adaptive: bool,
    tier: FpsTier,
    last_applied: Option<FpsTier>,
}

impl QualityController {
    /// Build from the quality config section.
    pub fn from_config(config: &QualityConfig) -> Self {
        Self {
            adaptive: config.adaptive,
            tier: config.tier,
            last_applied: None,
        }
    }

    /// The currently selected tier.
    pub fn tier(&self) -> FpsTier {
        self.tier
    }

    /// Apply a (possibly unchanged) configuration. Logs only when the tier
    /// actually changes, so reconfiguration is not spammy.
    pub fn apply(&mut self, config: &QualityConfig) {
        self.adaptive = config.adaptive;
        self.tier = config.tier;
        if self.last_applied != Some(self.tier) {
            log::info!("Fog quality tier changed to {:?}", self.tier);
            self.last_applied = Some(self.tier);
        }
    }

    /// The step ratio in \[0, 1\]: `clamp01(fps / target)`.
    ///
    /// Returns 1 when adaptive optimization is off or the tier is
    /// `Unlimited`.
    pub fn step_ratio(&self, measured_fps: f32) -> f32 {
        if !self.adaptive {
            return 1.0;
        }
        let target = match self.tier {
            FpsTier::Fps30 => 30.0,
            FpsTier::Fps60 => 60.0,
            FpsTier::Unlimited => return 1.0,
        };
        (measured_fps.max(0.0) / target).clamp(0.0, 1.0)
    }

    /// The step-count multiplier: the square of the step ratio.
    pub fn step_scale(&self, measured_fps: f32) -> f32 {
        let ratio = self.step_ratio(measured_fps);
        ratio * ratio
    }

    /// Effective step count for this frame, clamped to the configured
    /// minimum.
    pub fn effective_steps(&self, base_steps: u32, measured_fps: f32) -> u32 {
        let scaled = (base_steps as f32 * self.step_scale(measured_fps)).round() as u32;
        scaled.max(MIN_RAYMARCH_STEPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adaptive(tier: FpsTier) -> QualityController {
        QualityController::from_config(&QualityConfig {
            adaptive: true,
            tier,
            fps_sample_window: 4,
        })
    }

    #[test]
    fn test_disabled_controller_always_full_quality() {
        let controller = QualityController::from_config(&QualityConfig {
            adaptive: false,
            tier: FpsTier::Fps30,
            fps_sample_window: 4,
        });
        assert_eq!(controller.step_scale(1.0), 1.0);
        assert_eq!(controller.step_scale(0.0), 1.0);
    }

    #[test]
    fn test_unlimited_tier_is_noop() {
        let controller = adaptive(FpsTier::Unlimited);
        assert_eq!(controller.step_scale(5.0), 1.0);
        assert_eq!(controller.step_scale(500.0), 1.0);
    }

    #[test]
    fn test_ratio_clamps_above_target() {
        // 45 FPS against a 30 FPS target: clamped to 1, steps unchanged.
        let controller = adaptive(FpsTier::Fps30);
        assert_eq!(controller.step_scale(45.0), 1.0);
        assert_eq!(controller.effective_steps(128, 45.0), 128);
    }

    #[test]
    fn test_half_target_quarters_steps() {
        // 15 FPS against a 30 FPS target: scale = (15/30)² = 0.25.
        let controller = adaptive(FpsTier::Fps30);
        assert!((controller.step_scale(15.0) - 0.25).abs() < 1e-6);
        assert_eq!(controller.effective_steps(128, 15.0), 32);
    }

    #[test]
    fn test_at_target_is_exactly_one() {
        let controller = adaptive(FpsTier::Fps60);
        assert_eq!(controller.step_scale(60.0), 1.0);
    }

    #[test]
    fn test_zero_fps_scales_to_minimum_steps() {
        let controller = adaptive(FpsTier::Fps60);
        assert_eq!(controller.step_scale(0.0), 0.0);
        assert_eq!(controller.effective_steps(256, 0.0), MIN_RAYMARCH_STEPS);
    }

    #[test]
    fn test_ratio_in_unit_interval() {
        let controller = adaptive(FpsTier::Fps60);
        for fps in [0.0, 1.0, 17.3, 59.9, 60.0, 240.0] {
            let ratio = controller.step_ratio(fps);
            assert!((0.0..=1.0).contains(&ratio), "ratio {ratio} at fps {fps}");
        }
    }

    #[test]
    fn test_fps_counter_smooths_over_window() {
        let mut counter = FpsCounter::new(4);
        assert_eq!(counter.fps(), 0.0);

        for _ in 0..4 {
            counter.update(1.0 / 30.0);
        }
        assert!((counter.fps() - 30.0).abs() < 1e-3);

        // Window slides: four fast frames displace the slow ones.
        for _ in 0..4 {
            counter.update(1.0 / 120.0);
        }
        assert!((counter.fps() - 120.0).abs() < 1e-2);
    }

    #[test]
    fn test_fps_counter_ignores_bad_deltas() {
        let mut counter = FpsCounter::new(4);
        counter.update(0.0);
        counter.update(-1.0);
        counter.update(f32::NAN);
        assert_eq!(counter.fps(), 0.0);

        counter.update(1.0 / 60.0);
        assert!((counter.fps() - 60.0).abs() < 1e-3);
    }
}
