//! The fog density field sampled along view rays.
//!
//! Density at a world position combines a base coefficient, an optional
//! exponential height falloff, an optional bounding volume that forces
//! density to zero outside the fog region, and a noise modulation term
//! animated by wind. Exactly one noise source is bound per frame.

use glam::Vec3;
use noise::{NoiseFn, Simplex};
use serde::{Deserialize, Serialize};

use crate::texture::{NoiseLut3d, NoiseTexture2d};

/// Which noise source the density field samples.
///
/// A closed selector: exactly one source is active at a time (the pipeline
/// never blends sources).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum NoiseSource {
    /// Tiling 2D texture sampled in the world XZ plane.
    #[default]
    Texture2d,
    /// 3D lookup table built from a 2D slice atlas.
    Texture3d,
    /// Analytic simplex noise, always available.
    Simplex,
}

/// The bound noise data for the active source.
pub enum NoiseField {
    /// 2D texture lookup.
    Texture2d(NoiseTexture2d),
    /// 3D LUT lookup.
    Texture3d(NoiseLut3d),
    /// Analytic simplex noise.
    Simplex(Simplex),
}

impl NoiseField {
    /// An analytic simplex field with the given seed.
    pub fn simplex(seed: u32) -> Self {
        Self::Simplex(Simplex::new(seed))
    }

    /// The selector this field satisfies.
    pub fn source(&self) -> NoiseSource {
        match self {
            Self::Texture2d(_) => NoiseSource::Texture2d,
            Self::Texture3d(_) => NoiseSource::Texture3d,
            Self::Simplex(_) => NoiseSource::Simplex,
        }
    }

    /// Sample the density modulation factor in \[0, 1\] at a noise-space
    /// coordinate. Exactly one lookup is evaluated per invocation.
    pub fn sample(&self, p: Vec3) -> f32 {
        match self {
            Self::Texture2d(tex) => tex.sample(p.x, p.z)[0],
            Self::Texture3d(lut) => lut.sample(p)[0],
            Self::Simplex(simplex) => {
                let n = simplex.get([p.x as f64, p.y as f64, p.z as f64]) as f32;
                0.5 * (n + 1.0)
            }
        }
    }
}

/// Exponential height falloff: densest at the anchor height, thinning above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightFalloff {
    /// Height fog density at the anchor height.
    pub base_density: f32,
    /// Exponential falloff rate per world unit above the anchor.
    pub density_coeff: f32,
    /// World-space height of the fog anchor.
    pub anchor_height: f32,
}

impl HeightFalloff {
    /// Height fog density contribution at a world-space height.
    pub fn density(&self, height: f32) -> f32 {
        (self.base_density * (-self.density_coeff * (height - self.anchor_height)).exp()).max(0.0)
    }
}

/// Spherical bound outside which fog density is forced to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogBounds {
    /// World-space center of the fog volume.
    pub center: Vec3,
    /// Radius in world units.
    pub radius: f32,
}

impl FogBounds {
    /// Whether a world position lies inside the fog volume.
    pub fn contains(&self, p: Vec3) -> bool {
        (p - self.center).length_squared() <= self.radius * self.radius
    }
}

/// The complete density model evaluated per raymarch sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityProfile {
    /// Base fog density coefficient.
    pub density_coeff: f32,
    /// Optional height falloff term.
    pub height: Option<HeightFalloff>,
    /// Optional bounding volume.
    pub bounds: Option<FogBounds>,
    /// World-to-noise coordinate scale.
    pub noise_scale: f32,
    /// Normalized wind direction for noise animation.
    pub wind_direction: Vec3,
    /// Wind speed in noise units per second.
    pub wind_speed: f32,
}

impl DensityProfile {
    /// Fog density at a world position and time. Never negative; exactly
    /// zero outside the bounding volume when one is set.
    pub fn sample(&self, field: &NoiseField, pos: Vec3, time: f32) -> f32 {
        if let Some(bounds) = &self.bounds
            && !bounds.contains(pos)
        {
            return 0.0;
        }

        let mut density = self.density_coeff;
        if let Some(height) = &self.height {
            density += height.density(pos.y);
        }

        let coord = pos * self.noise_scale + self.wind_direction * self.wind_speed * time;
        (density * field.sample(coord)).max(0.0)
    }
}

/// Beer-Lambert transmittance over one raymarch step.
///
/// Zero extinction or zero density yields 1 (no attenuation) rather than any
/// singular value.
pub fn transmittance(extinction_coeff: f32, density: f32, step_len: f32) -> f32 {
    (-extinction_coeff * density * step_len).exp()
}
