//! Separable depth-aware blur over the low-resolution fog target.
//!
//! Each iteration runs a horizontal pass into the scratch target and a
//! vertical pass back into the primary, so the result always ends up in the
//! primary target. Tap weights are modulated by a bilateral term driven by
//! the scene depth difference, which keeps fog from bleeding across
//! silhouette edges.

use crate::target::{DepthMap, RenderTarget};
use crate::uniforms::BlurUniform;

/// Run the configured number of blur iterations in place.
///
/// `primary` holds the raymarch output on entry and the blurred result on
/// return. `scratch` must have the same dimensions; its contents are
/// clobbered.
pub fn blur(
    primary: &mut RenderTarget,
    scratch: &mut RenderTarget,
    depth: &DepthMap,
    uniform: &BlurUniform,
) {
    debug_assert_eq!(primary.width(), scratch.width());
    debug_assert_eq!(primary.height(), scratch.height());

    let iterations = uniform.params[3].max(1.0) as u32;
    let horizontal = uniform.with_direction(1.0, 0.0);
    let vertical = uniform.with_direction(0.0, 1.0);

    for _ in 0..iterations {
        directional_pass(primary, scratch, depth, &horizontal);
        directional_pass(scratch, primary, depth, &vertical);
    }
}

/// One directional pass of the 7-tap bilateral kernel.
fn directional_pass(
    src: &RenderTarget,
    dst: &mut RenderTarget,
    depth: &DepthMap,
    uniform: &BlurUniform,
) {
    let width = src.width();
    let height = src.height();
    let (dx, dy) = (uniform.params[1], uniform.params[2]);
    let depth_falloff = uniform.params[0];

    for y in 0..height {
        for x in 0..width {
            let center_depth = depth_at(depth, x as i64, y as i64, width, height);

            let mut accum = [0.0f32; 4];
            let mut total_weight = 0.0f32;

            // Center tap, then symmetric outer taps.
            tap(
                src, depth, x as i64, y as i64, 0.0, 0.0, uniform.weights[0], center_depth,
                depth_falloff, width, height, &mut accum, &mut total_weight,
            );
            for i in 1..4 {
                let ox = dx * uniform.offsets[i];
                let oy = dy * uniform.offsets[i];
                let w = uniform.weights[i];
                tap(
                    src, depth, x as i64, y as i64, ox, oy, w, center_depth, depth_falloff,
                    width, height, &mut accum, &mut total_weight,
                );
                tap(
                    src, depth, x as i64, y as i64, -ox, -oy, w, center_depth, depth_falloff,
                    width, height, &mut accum, &mut total_weight,
                );
            }

            let inv = 1.0 / total_weight.max(1e-9);
            dst.put_pixel(
                x,
                y,
                [
                    accum[0] * inv,
                    accum[1] * inv,
                    accum[2] * inv,
                    accum[3] * inv,
                ],
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn tap(
    src: &RenderTarget,
    depth: &DepthMap,
    x: i64,
    y: i64,
    ox: f32,
    oy: f32,
    weight: f32,
    center_depth: f32,
    depth_falloff: f32,
    width: u32,
    height: u32,
    accum: &mut [f32; 4],
    total_weight: &mut f32,
) {
    let sx = x + ox.round() as i64;
    let sy = y + oy.round() as i64;
    let sample = src.pixel(sx, sy);
    let sample_depth = depth_at(depth, sx, sy, width, height);

    let delta = (sample_depth - center_depth).abs() * depth_falloff;
    let w = weight * (-delta * delta).exp();

    for c in 0..4 {
        accum[c] += sample[c] * w;
    }
    *total_weight += w;
}

/// Scene depth at a low-resolution target texel.
///
/// The depth map keeps its own (usually full) resolution; the lookup goes
/// through normalized coordinates at the texel center.
fn depth_at(depth: &DepthMap, x: i64, y: i64, width: u32, height: u32) -> f32 {
    let u = (x as f32 + 0.5) / width as f32;
    let v = (y as f32 + 0.5) / height as f32;
    depth.sample(u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))
}
