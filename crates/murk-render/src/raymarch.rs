//! The raymarch stage: per-pixel fog accumulation along the view ray.
//!
//! For every low-resolution target pixel the scene depth is unprojected to a
//! world position, and the ray from the camera to that position is marched
//! in equal steps. Each step samples the density field, attenuates by
//! Beer-Lambert extinction, and accumulates in-scattered light weighted by
//! the phase function and the shadow-feed visibility. The output stores
//! accumulated in-scatter in RGB and the remaining transmittance in alpha.

use glam::{Vec2, Vec3};

use murk_volume::{transmittance, DensityProfile, FogBounds, HeightFalloff, NoiseField, PhaseFunction};

use crate::shadow_feed::{FeedHandle, ShadowFeed};
use crate::target::{DepthMap, RenderTarget};
use crate::uniforms::FogUniform;
use crate::view::FrameView;

/// Accumulated transmittance below this is treated as opaque and the march
/// stops early.
const TRANSMITTANCE_CUTOFF: f32 = 1e-4;

/// March the fog for every pixel of `output`.
///
/// `depth` is the scene depth at its own resolution; `shadows` is consulted
/// only when the uniform's shadow flag is set.
pub fn raymarch(
    output: &mut RenderTarget,
    depth: &DepthMap,
    uniform: &FogUniform,
    phase: &PhaseFunction,
    field: &NoiseField,
    shadows: Option<(&ShadowFeed, FeedHandle)>,
) {
    let view = FrameView {
        inverse_view: uniform.inverse_view_matrix(),
        inverse_projection: uniform.inverse_projection_matrix(),
    };
    let camera = view.camera_position();

    let radius = uniform.fog_world_position[3];
    let profile = DensityProfile {
        density_coeff: uniform.scattering[0],
        height: (uniform.height[3] > 0.5).then(|| HeightFalloff {
            base_density: uniform.height[2],
            density_coeff: uniform.height[1],
            anchor_height: uniform.height[0],
        }),
        bounds: (radius >= 0.0).then(|| FogBounds {
            center: uniform.fog_center(),
            radius,
        }),
        noise_scale: uniform.phase[3],
        wind_direction: Vec3::new(uniform.wind[0], uniform.wind[1], uniform.wind[2]),
        wind_speed: uniform.wind[3],
    };

    let light_dir = Vec3::new(
        uniform.light_direction[0],
        uniform.light_direction[1],
        uniform.light_direction[2],
    );
    let light_intensity = uniform.light_direction[3];
    let use_light_color = uniform.light_color[3] > 0.5;
    let light_rgb = Vec3::new(
        uniform.light_color[0],
        uniform.light_color[1],
        uniform.light_color[2],
    );
    let in_light = Vec3::new(
        uniform.fog_in_light_color[0],
        uniform.fog_in_light_color[1],
        uniform.fog_in_light_color[2],
    );
    let in_shadow = Vec3::new(
        uniform.fog_in_shadow_color[0],
        uniform.fog_in_shadow_color[1],
        uniform.fog_in_shadow_color[2],
    );

    let extinction = uniform.scattering[1];
    let rayleigh_coeff = uniform.scattering[2];
    let mie_coeff = uniform.scattering[3];
    let ambient = uniform.phase[2];
    let rayleigh_enabled = uniform.march[3] > 0.5;
    let time = uniform.march[1];
    let steps = (uniform.march[0].max(1.0)) as u32;

    let shadows = if uniform.march[2] > 0.5 { shadows } else { None };

    let width = output.width();
    let height = output.height();

    for y in 0..height {
        for x in 0..width {
            let uv = Vec2::new(
                (x as f32 + 0.5) / width as f32,
                (y as f32 + 0.5) / height as f32,
            );
            let ndc_depth = depth.sample(uv.x, uv.y);
            let world = view.unproject(uv, ndc_depth);

            let ray = world - camera;
            let dist = ray.length();
            if !dist.is_finite() || dist < 1e-4 {
                output.put_pixel(x, y, [0.0, 0.0, 0.0, 1.0]);
                continue;
            }
            let dir = ray / dist;

            // Angle between the incoming light and the direction back
            // toward the camera.
            let cos_theta = -dir.dot(light_dir);
            let mut scatter = mie_coeff * phase.eval(cos_theta);
            if rayleigh_enabled {
                scatter += rayleigh_coeff * murk_volume::rayleigh_phase(cos_theta);
            }

            let step_len = dist / steps as f32;
            let mut trans = 1.0f32;
            let mut accum = Vec3::ZERO;

            for i in 0..steps {
                let pos = camera + dir * ((i as f32 + 0.5) * step_len);
                let density = profile.sample(field, pos, time);
                if density > 0.0 {
                    let visibility = match shadows {
                        Some((feed, handle)) => feed.visibility(handle, pos),
                        None => 1.0,
                    };
                    let lit = if use_light_color {
                        light_rgb
                    } else {
                        in_shadow.lerp(in_light, visibility)
                    } * light_intensity;

                    accum +=
                        lit * (visibility * scatter + ambient) * density * step_len * trans;
                    trans *= transmittance(extinction, density, step_len);
                    if trans < TRANSMITTANCE_CUTOFF {
                        break;
                    }
                }
            }

            output.put_pixel(x, y, [accum.x, accum.y, accum.z, trans]);
        }
    }
}
