//! Directional light input for the fog in-scatter term.

use glam::Vec3;

/// The primary light the fog scatters, provided by the host engine each
/// frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    /// Normalized direction vector pointing FROM the light (toward the
    /// scene).
    pub direction: Vec3,
    /// Linear RGB color of the light (not premultiplied by intensity).
    pub color: Vec3,
    /// Scalar intensity multiplier. The fog config's `light_intensity`
    /// overrides this while the effect is active.
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: Vec3::new(1.0, 0.96, 0.90),
            intensity: 1.0,
        }
    }
}

impl DirectionalLight {
    /// Set the light direction, normalizing the input.
    ///
    /// # Panics
    ///
    /// Panics if the input vector has near-zero length.
    pub fn set_direction(&mut self, dir: Vec3) {
        let len = dir.length();
        assert!(len > 1e-6, "directional light direction must not be zero");
        self.direction = dir / len;
    }

    /// Whether the light can drive the in-scatter term: finite values and a
    /// usable direction.
    pub fn is_valid(&self) -> bool {
        self.direction.is_finite()
            && self.color.is_finite()
            && self.intensity.is_finite()
            && self.direction.length_squared() > 1e-12
    }
}
