//! Noise lookup textures for density modulation.
//!
//! The raymarch stage samples fog density noise either from a tiling 2D
//! texture or from a 3D lookup table built out of a z-major 2D slice atlas
//! (the common way volume noise ships in asset packs). Sampling wraps in
//! every axis and filters bilinearly/trilinearly, matching what a GPU sampler
//! configured for repeat + linear would return.

use std::path::Path;

use glam::Vec3;

/// Errors that can occur when loading or assembling noise textures.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    /// Failed to open or decode the image file.
    #[error("failed to load noise texture: {0}")]
    Decode(#[from] image::ImageError),

    /// The pixel buffer does not match the stated dimensions.
    #[error("pixel buffer has {actual} texels, expected {expected}")]
    SizeMismatch {
        /// Texels required by the dimensions.
        expected: usize,
        /// Texels actually provided.
        actual: usize,
    },

    /// The slice atlas is too small for the requested LUT dimensions.
    #[error("slice atlas is {actual_w}x{actual_h}, need at least {required_w}x{required_h}")]
    AtlasTooSmall {
        /// Minimum atlas width for the requested dimensions.
        required_w: u32,
        /// Minimum atlas height for the requested dimensions.
        required_h: u32,
        /// Actual atlas width.
        actual_w: u32,
        /// Actual atlas height.
        actual_h: u32,
    },
}

/// A CPU-resident RGBA f32 texture with repeat wrapping and bilinear
/// filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseTexture2d {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl NoiseTexture2d {
    /// Build a texture from raw RGBA texels in row-major order.
    pub fn from_pixels(
        width: u32,
        height: u32,
        pixels: Vec<[f32; 4]>,
    ) -> Result<Self, TextureError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(TextureError::SizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Convert a decoded image to a linear f32 texture.
    pub fn from_image(image: &image::DynamicImage) -> Self {
        let rgba = image.to_rgba32f();
        let (width, height) = (rgba.width(), rgba.height());
        let pixels = rgba.pixels().map(|p| p.0).collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Load a noise texture from an image file (PNG or JPEG).
    pub fn load(path: &Path) -> Result<Self, TextureError> {
        let image = image::open(path)?;
        log::debug!(
            "Loaded noise texture {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self::from_image(&image))
    }

    /// Texture width in texels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Texture height in texels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fetch a texel with repeat wrapping.
    pub fn texel(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        self.pixels[y * self.width as usize + x]
    }

    /// Sample at normalized coordinates with repeat wrapping and bilinear
    /// filtering. Coordinates outside \[0, 1\) tile.
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        let x = u * self.width as f32 - 0.5;
        let y = v * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = self.texel(x0, y0);
        let p10 = self.texel(x0 + 1, y0);
        let p01 = self.texel(x0, y0 + 1);
        let p11 = self.texel(x0 + 1, y0 + 1);

        let mut out = [0.0; 4];
        for c in 0..4 {
            let top = p00[c] * (1.0 - fx) + p10[c] * fx;
            let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
            out[c] = top * (1.0 - fy) + bottom * fy;
        }
        out
    }
}

/// A 3D noise lookup table with repeat wrapping and trilinear filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseLut3d {
    dims: [u32; 3],
    voxels: Vec<[f32; 4]>,
}

impl NoiseLut3d {
    /// Build a 3D LUT from a 2D atlas of z-major slices.
    ///
    /// The voxel at `(x, y, z)` is read from the atlas pixel at
    /// `(x + z·dims.z, y)`, the slice-tiling convention the source atlases
    /// are authored with.
    pub fn from_slice_atlas(
        atlas: &NoiseTexture2d,
        dims: [u32; 3],
    ) -> Result<Self, TextureError> {
        let [dx, dy, dz] = dims.map(|d| d.max(1));
        let required_w = (dx - 1) + (dz - 1) * dz + 1;
        let required_h = dy;
        if atlas.width() < required_w || atlas.height() < required_h {
            return Err(TextureError::AtlasTooSmall {
                required_w,
                required_h,
                actual_w: atlas.width(),
                actual_h: atlas.height(),
            });
        }

        let mut voxels = Vec::with_capacity((dx * dy * dz) as usize);
        for z in 0..dz {
            for y in 0..dy {
                for x in 0..dx {
                    voxels.push(atlas.texel((x + z * dz) as i64, y as i64));
                }
            }
        }

        Ok(Self {
            dims: [dx, dy, dz],
            voxels,
        })
    }

    /// LUT dimensions.
    pub fn dims(&self) -> [u32; 3] {
        self.dims
    }

    /// Fetch a voxel with repeat wrapping.
    pub fn voxel(&self, x: i64, y: i64, z: i64) -> [f32; 4] {
        let [dx, dy, dz] = self.dims;
        let x = x.rem_euclid(dx as i64) as usize;
        let y = y.rem_euclid(dy as i64) as usize;
        let z = z.rem_euclid(dz as i64) as usize;
        self.voxels[(z * dy as usize + y) * dx as usize + x]
    }

    /// Sample at normalized coordinates with repeat wrapping and trilinear
    /// filtering.
    pub fn sample(&self, p: Vec3) -> [f32; 4] {
        let [dx, dy, dz] = self.dims;
        let x = p.x * dx as f32 - 0.5;
        let y = p.y * dy as f32 - 0.5;
        let z = p.z * dz as f32 - 0.5;
        let (x0, y0, z0) = (x.floor(), y.floor(), z.floor());
        let (fx, fy, fz) = (x - x0, y - y0, z - z0);
        let (x0, y0, z0) = (x0 as i64, y0 as i64, z0 as i64);

        let mut out = [0.0; 4];
        for c in 0..4 {
            let lerp = |a: f32, b: f32, t: f32| a * (1.0 - t) + b * t;
            let front = lerp(
                lerp(self.voxel(x0, y0, z0)[c], self.voxel(x0 + 1, y0, z0)[c], fx),
                lerp(
                    self.voxel(x0, y0 + 1, z0)[c],
                    self.voxel(x0 + 1, y0 + 1, z0)[c],
                    fx,
                ),
                fy,
            );
            let back = lerp(
                lerp(
                    self.voxel(x0, y0, z0 + 1)[c],
                    self.voxel(x0 + 1, y0, z0 + 1)[c],
                    fx,
                ),
                lerp(
                    self.voxel(x0, y0 + 1, z0 + 1)[c],
                    self.voxel(x0 + 1, y0 + 1, z0 + 1)[c],
                    fx,
                ),
                fy,
            );
            out[c] = lerp(front, back, fz);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Atlas where each pixel encodes its own (x, y) coordinate in R and G.
    fn coordinate_atlas(width: u32, height: u32) -> NoiseTexture2d {
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| [x as f32, y as f32, 0.0, 1.0]))
            .collect();
        NoiseTexture2d::from_pixels(width, height, pixels).unwrap()
    }

    #[test]
    fn test_from_pixels_rejects_wrong_length() {
        let result = NoiseTexture2d::from_pixels(4, 4, vec![[0.0; 4]; 15]);
        assert!(matches!(
            result,
            Err(TextureError::SizeMismatch {
                expected: 16,
                actual: 15
            })
        ));
    }

    #[test]
    fn test_texel_wraps() {
        let tex = coordinate_atlas(4, 4);
        assert_eq!(tex.texel(5, 0)[0], 1.0);
        assert_eq!(tex.texel(-1, 0)[0], 3.0);
        assert_eq!(tex.texel(0, -1)[1], 3.0);
    }

    #[test]
    fn test_sample_at_texel_center_is_exact() {
        let tex = coordinate_atlas(4, 4);
        // Texel (1, 2) center is at uv ((1 + 0.5)/4, (2 + 0.5)/4).
        let s = tex.sample(1.5 / 4.0, 2.5 / 4.0);
        assert!((s[0] - 1.0).abs() < 1e-5);
        assert!((s[1] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_sample_interpolates_between_texels() {
        let pixels = vec![[0.0, 0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 1.0]];
        let tex = NoiseTexture2d::from_pixels(2, 1, pixels).unwrap();
        // Halfway between the two texel centers.
        let s = tex.sample(0.5, 0.5);
        assert!((s[0] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_lut_slice_tiling_convention() {
        // 8x8x8 LUT from a 64x8 atlas of z-major slices: voxel (x, y, z)
        // equals atlas pixel (x + z*8, y).
        let atlas = coordinate_atlas(64, 8);
        let lut = NoiseLut3d::from_slice_atlas(&atlas, [8, 8, 8]).unwrap();

        for z in 0..8i64 {
            for y in 0..8i64 {
                for x in 0..8i64 {
                    let voxel = lut.voxel(x, y, z);
                    let expected = atlas.texel(x + z * 8, y);
                    assert_eq!(voxel, expected, "mismatch at ({x}, {y}, {z})");
                }
            }
        }
    }

    #[test]
    fn test_lut_rejects_undersized_atlas() {
        let atlas = coordinate_atlas(32, 8);
        let result = NoiseLut3d::from_slice_atlas(&atlas, [8, 8, 8]);
        assert!(matches!(result, Err(TextureError::AtlasTooSmall { .. })));
    }

    #[test]
    fn test_lut_voxel_wraps() {
        let atlas = coordinate_atlas(64, 8);
        let lut = NoiseLut3d::from_slice_atlas(&atlas, [8, 8, 8]).unwrap();
        assert_eq!(lut.voxel(8, 0, 0), lut.voxel(0, 0, 0));
        assert_eq!(lut.voxel(0, -1, 0), lut.voxel(0, 7, 0));
        assert_eq!(lut.voxel(0, 0, 9), lut.voxel(0, 0, 1));
    }

    #[test]
    fn test_lut_sample_at_voxel_center() {
        let atlas = coordinate_atlas(64, 8);
        let lut = NoiseLut3d::from_slice_atlas(&atlas, [8, 8, 8]).unwrap();
        // Voxel (2, 3, 1) center in normalized coordinates.
        let s = lut.sample(Vec3::new(2.5 / 8.0, 3.5 / 8.0, 1.5 / 8.0));
        let expected = lut.voxel(2, 3, 1);
        assert!((s[0] - expected[0]).abs() < 1e-4);
        assert!((s[1] - expected[1]).abs() < 1e-4);
    }
}
