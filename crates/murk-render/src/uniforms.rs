//! Per-frame constant buffers for the fog stages.
//!
//! Every value a stage reads is packed into a plain-old-data uniform before
//! the stage runs, mirroring a GPU constant-buffer upload: 16-byte aligned
//! vec4 fields, matrices in column-major order, booleans as 0/1 floats. The
//! raymarch and blur stages consume only their uniform plus their bound
//! textures, never the live config.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Shadow sampling variant selected for this frame.
///
/// The raymarch stage branches on this the way a shader would on a compile
/// time keyword: either every visibility query hits the shadow feed or none
/// do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowKeyword {
    /// Sample the attached shadow feed for per-step light visibility.
    ShadowsOn,
    /// Treat the light as fully visible everywhere.
    #[default]
    ShadowsOff,
}

impl ShadowKeyword {
    /// Select the variant from the per-frame shadow decision.
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::ShadowsOn
        } else {
            Self::ShadowsOff
        }
    }

    /// The keyword spelling, for diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShadowsOn => "SHADOWS_ON",
            Self::ShadowsOff => "SHADOWS_OFF",
        }
    }
}

/// Constant buffer for the raymarch stage.
///
/// vec4 packing, per field: the labelled xyz plus one scalar rider in w.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FogUniform {
    /// Camera-to-world matrix, column major.
    pub inverse_view: [f32; 16],
    /// Clip-to-view matrix, column major.
    pub inverse_projection: [f32; 16],
    /// xyz: fog volume center in world space. w: volume radius, negative
    /// when the size limit is disabled. A zero radius is a valid enabled
    /// limit containing no fog.
    pub fog_world_position: [f32; 4],
    /// xyz: normalized light direction. w: light intensity.
    pub light_direction: [f32; 4],
    /// xyz: light color. w: 1 to tint in-scatter by the light color, 0 to
    /// use the fog's own colors.
    pub light_color: [f32; 4],
    /// xyz: fog albedo where the light reaches. w: unused.
    pub fog_in_light_color: [f32; 4],
    /// xyz: fog albedo in shadow. w: unused.
    pub fog_in_shadow_color: [f32; 4],
    /// xyz: normalized wind direction. w: wind speed.
    pub wind: [f32; 4],
    /// x: density coefficient. y: extinction coefficient. z: Rayleigh
    /// scattering coefficient. w: Mie scattering coefficient.
    pub scattering: [f32; 4],
    /// x: Mie anisotropy g. y: Schlick k for that g. z: ambient scattering
    /// floor. w: noise sampling scale.
    pub phase: [f32; 4],
    /// x: effective step count for this frame. y: elapsed time in seconds.
    /// z: 1 when shadows are sampled. w: 1 when the Rayleigh term is
    /// enabled.
    pub march: [f32; 4],
    /// x: height fog anchor. y: height density falloff. z: density at the
    /// anchor. w: 1 when height fog is enabled.
    pub height: [f32; 4],
}

impl FogUniform {
    /// Rehydrate the camera-to-world matrix.
    pub fn inverse_view_matrix(&self) -> Mat4 {
        Mat4::from_cols_array(&self.inverse_view)
    }

    /// Rehydrate the clip-to-view matrix.
    pub fn inverse_projection_matrix(&self) -> Mat4 {
        Mat4::from_cols_array(&self.inverse_projection)
    }

    /// Fog volume center.
    pub fn fog_center(&self) -> Vec3 {
        Vec3::new(
            self.fog_world_position[0],
            self.fog_world_position[1],
            self.fog_world_position[2],
        )
    }
}

/// Constant buffer for one directional pass of the depth-aware blur.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BlurUniform {
    /// Tap offsets in texels: center, then the three outer taps.
    pub offsets: [f32; 4],
    /// Tap weights matching `offsets`. The center weight equals the sum of
    /// the outer three so a flat region blurs to itself.
    pub weights: [f32; 4],
    /// x: depth falloff for the bilateral weight. y, z: blur direction in
    /// texels. w: iteration count.
    pub params: [f32; 4],
}

impl BlurUniform {
    /// Pack the blur config for a given direction.
    pub fn new(offsets: [f32; 3], weights: [f32; 4], depth_falloff: f32, iterations: u32) -> Self {
        Self {
            offsets: [0.0, offsets[0], offsets[1], offsets[2]],
            weights,
            params: [depth_falloff, 0.0, 0.0, iterations as f32],
        }
    }

    /// Copy of this uniform pointed along a direction.
    pub fn with_direction(mut self, dx: f32, dy: f32) -> Self {
        self.params[1] = dx;
        self.params[2] = dy;
        self
    }
}

/// All named bindings published for one frame of the fog effect.
///
/// Built once per frame by the pipeline and handed read-only to the stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameBindings {
    pub fog: FogUniform,
    pub blur: BlurUniform,
    pub shadow_keyword: ShadowKeyword,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn test_fog_uniform_layout() {
        // Two matrices plus ten vec4s, no implicit padding.
        assert_eq!(size_of::<FogUniform>(), 128 + 10 * 16);
        assert_eq!(align_of::<FogUniform>(), 4);
    }

    #[test]
    fn test_blur_uniform_layout() {
        assert_eq!(size_of::<BlurUniform>(), 48);
    }

    #[test]
    fn test_uniforms_are_pod() {
        let fog = FogUniform::zeroed();
        let bytes: &[u8] = bytemuck::bytes_of(&fog);
        assert_eq!(bytes.len(), size_of::<FogUniform>());

        let blur = BlurUniform::zeroed();
        assert_eq!(bytemuck::bytes_of(&blur).len(), 48);
    }

    #[test]
    fn test_matrix_round_trip() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let mut fog = FogUniform::zeroed();
        fog.inverse_view = m.to_cols_array();
        assert_eq!(fog.inverse_view_matrix(), m);
    }

    #[test]
    fn test_blur_uniform_center_tap_is_zero_offset() {
        let u = BlurUniform::new([1.0, 2.0, 3.0], [0.419, 0.213, 0.17, 0.036], 0.25, 4);
        assert_eq!(u.offsets[0], 0.0);
        assert_eq!(u.offsets[1], 1.0);
        assert_eq!(u.params[3], 4.0);

        let h = u.with_direction(1.0, 0.0);
        assert_eq!((h.params[1], h.params[2]), (1.0, 0.0));
        let v = u.with_direction(0.0, 1.0);
        assert_eq!((v.params[1], v.params[2]), (0.0, 1.0));
    }

    #[test]
    fn test_shadow_keyword_selection() {
        assert_eq!(ShadowKeyword::from_enabled(true), ShadowKeyword::ShadowsOn);
        assert_eq!(ShadowKeyword::from_enabled(false), ShadowKeyword::ShadowsOff);
        assert_eq!(ShadowKeyword::ShadowsOn.as_str(), "SHADOWS_ON");
    }
}
