//! Per-frame camera view data and world-ray reconstruction.
//!
//! The host engine hands the fog pass its camera as a pair of inverse
//! matrices; the raymarch stage reconstructs a world-space position for every
//! pixel by unprojecting through them with the scene depth.

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Inverse camera matrices for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameView {
    /// Inverse view matrix (camera-to-world).
    pub inverse_view: Mat4,
    /// Inverse projection matrix (clip-to-view).
    pub inverse_projection: Mat4,
}

impl FrameView {
    /// Build from forward view and projection matrices.
    pub fn from_camera(view: Mat4, projection: Mat4) -> Self {
        Self {
            inverse_view: view.inverse(),
            inverse_projection: projection.inverse(),
        }
    }

    /// World-space camera position (translation column of the inverse view).
    pub fn camera_position(&self) -> Vec3 {
        self.inverse_view.col(3).truncate()
    }

    /// Unproject a screen point to world space.
    ///
    /// `uv` is the normalized screen coordinate with (0, 0) at the top-left;
    /// `ndc_depth` is the depth buffer value for that pixel, in whatever NDC
    /// convention the projection matrix was built with; the round trip
    /// through the inverse matrices is convention-agnostic.
    pub fn unproject(&self, uv: Vec2, ndc_depth: f32) -> Vec3 {
        let ndc = Vec4::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, ndc_depth, 1.0);
        let view = self.inverse_projection * ndc;
        if view.w.abs() < 1e-9 {
            return self.camera_position();
        }
        let view = view / view.w;
        (self.inverse_view * Vec4::new(view.x, view.y, view.z, 1.0)).truncate()
    }

    /// Whether both matrices contain only finite values.
    pub fn is_finite(&self) -> bool {
        self.inverse_view.to_cols_array().iter().all(|v| v.is_finite())
            && self
                .inverse_projection
                .to_cols_array()
                .iter()
                .all(|v| v.is_finite())
    }
}
