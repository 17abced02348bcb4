//! CPU render targets and the transient target pool.
//!
//! Fog targets are RGBA f32 (the CPU equivalent of an RGBA16F attachment),
//! bilinear-filtered with edge clamping. The pool reuses released targets of
//! matching dimensions so the per-frame acquire/release cycle does not
//! reallocate, while keeping the one-frame lifetime contract: a target is
//! acquired at stage entry and must be back in the pool by frame end.

/// An RGBA f32 render target with clamped bilinear sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl RenderTarget {
    /// Create a target cleared to (0, 0, 0, 1): no scattering, full
    /// transmittance.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![[0.0, 0.0, 0.0, 1.0]; (width * height) as usize],
        }
    }

    /// Build a target from raw RGBA pixels in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if the pixel count does not match the dimensions. Host buffers
    /// are sized by the engine, so a mismatch is a caller bug.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<[f32; 4]>) -> Self {
        assert_eq!(
            pixels.len(),
            (width * height) as usize,
            "pixel buffer does not match {width}x{height}"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Target width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Target height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte size of the backing store (4 channels × f32).
    pub fn byte_size(&self) -> u64 {
        self.pixels.len() as u64 * 16
    }

    /// Reset every pixel to (0, 0, 0, 1).
    pub fn clear(&mut self) {
        self.pixels.fill([0.0, 0.0, 0.0, 1.0]);
    }

    /// Fetch a pixel with edge clamping.
    pub fn pixel(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.pixels[y * self.width as usize + x]
    }

    /// Write a pixel. Out-of-bounds writes are a caller bug.
    pub fn put_pixel(&mut self, x: u32, y: u32, value: [f32; 4]) {
        debug_assert!(x < self.width && y < self.height);
        self.pixels[(y * self.width + x) as usize] = value;
    }

    /// Sample at normalized coordinates with clamped bilinear filtering.
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        let x = u * self.width as f32 - 0.5;
        let y = v * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = self.pixel(x0, y0);
        let p10 = self.pixel(x0 + 1, y0);
        let p01 = self.pixel(x0, y0 + 1);
        let p11 = self.pixel(x0 + 1, y0 + 1);

        let mut out = [0.0; 4];
        for c in 0..4 {
            let top = p00[c] * (1.0 - fx) + p10[c] * fx;
            let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
            out[c] = top * (1.0 - fy) + bottom * fy;
        }
        out
    }
}

/// A scene depth buffer storing NDC depth values, sampled with edge clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DepthMap {
    /// Create a depth map filled with a constant depth (typically the far
    /// plane value for "no geometry").
    pub fn filled(width: u32, height: u32, depth: f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            values: vec![depth; (width * height) as usize],
        }
    }

    /// Build a depth map from raw values in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if the value count does not match the dimensions.
    pub fn from_values(width: u32, height: u32, values: Vec<f32>) -> Self {
        assert_eq!(
            values.len(),
            (width * height) as usize,
            "depth buffer does not match {width}x{height}"
        );
        Self {
            width,
            height,
            values,
        }
    }

    /// Depth map width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Depth map height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fetch a depth value with edge clamping.
    pub fn value(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.values[y * self.width as usize + x]
    }

    /// Write a depth value. Out-of-bounds writes are a caller bug.
    pub fn put_value(&mut self, x: u32, y: u32, depth: f32) {
        debug_assert!(x < self.width && y < self.height);
        self.values[(y * self.width + x) as usize] = depth;
    }

    /// Point-sample at normalized coordinates with edge clamping.
    ///
    /// Depth is not interpolated across texels: bilinear filtering over a
    /// depth discontinuity would invent surfaces that exist in neither
    /// neighbor.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let x = (u * self.width as f32).floor() as i64;
        let y = (v * self.height as f32).floor() as i64;
        self.value(x, y)
    }
}

/// A pool of transient render targets bucketed by exact dimensions.
///
/// Tracks total allocated and in-use bytes so the host can watch fog target
/// memory.
#[derive(Debug, Default)]
pub struct TargetPool {
    free: Vec<RenderTarget>,
    total_allocated: u64,
    in_use: u64,
}

impl TargetPool {
    /// Create a new empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a cleared target of exactly the given dimensions.
    ///
    /// Returns a pooled target if one matches, or allocates a new one.
    pub fn acquire(&mut self, width: u32, height: u32) -> RenderTarget {
        let width = width.max(1);
        let height = height.max(1);

        if let Some(index) = self
            .free
            .iter()
            .position(|t| t.width() == width && t.height() == height)
        {
            let mut target = self.free.swap_remove(index);
            target.clear();
            self.in_use += target.byte_size();
            return target;
        }

        let target = RenderTarget::new(width, height);
        self.total_allocated += target.byte_size();
        self.in_use += target.byte_size();
        target
    }

    /// Return a target to the pool for reuse.
    pub fn release(&mut self, target: RenderTarget) {
        self.in_use = self.in_use.saturating_sub(target.byte_size());
        self.free.push(target);
    }

    /// Bytes currently held by in-flight targets.
    pub fn bytes_in_use(&self) -> u64 {
        self.in_use
    }

    /// Total bytes allocated (in-use + pooled).
    pub fn bytes_allocated(&self) -> u64 {
        self.total_allocated
    }

    /// Number of free targets in the pool.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}
