//! The per-frame fog pipeline: resource binding, uniform packing, and the
//! raymarch / blur / composite stage sequence.
//!
//! The pipeline owns everything that persists across frames: the sanitized
//! config, the bound noise resources, the cached phase function, the shadow
//! feed, the adaptive quality state, and the transient target pool. One call
//! to [`FogPipeline::render`] produces the full-resolution output image for
//! one frame.

use glam::Vec3;

use murk_config::FogConfig;
use murk_volume::{NoiseField, NoiseLut3d, NoiseSource, NoiseTexture2d, PhaseFunction};

use crate::light::DirectionalLight;
use crate::quality::{FpsCounter, QualityController};
use crate::shadow_feed::{FeedHandle, ShadowCapture, ShadowFeed, ShadowFeedError};
use crate::target::{DepthMap, RenderTarget, TargetPool};
use crate::uniforms::{BlurUniform, FogUniform, FrameBindings, ShadowKeyword};
use crate::view::FrameView;
use crate::{blur, composite, raymarch};

/// Seed for the built-in analytic noise source.
const SIMPLEX_SEED: u32 = 0;

/// Everything the host hands the pipeline for one frame.
pub struct FrameParams<'a> {
    /// Full-resolution scene color.
    pub scene: &'a RenderTarget,
    /// Scene depth buffer.
    pub depth: &'a DepthMap,
    /// Camera matrices for this frame.
    pub view: FrameView,
    /// Primary directional light.
    pub light: &'a DirectionalLight,
    /// Unscaled frame delta time in seconds.
    pub delta_time: f32,
}

/// The result of one frame.
pub struct FrameOutput {
    /// Full-resolution output image. A bit-equal copy of the scene when the
    /// effect passed through.
    pub image: RenderTarget,
    /// The bindings the stages consumed, or `None` on passthrough.
    pub bindings: Option<FrameBindings>,
}

/// Persistent state of the fog effect.
pub struct FogPipeline {
    config: FogConfig,
    phase: PhaseFunction,
    fps: FpsCounter,
    quality: QualityController,
    pool: TargetPool,
    shadow_feed: ShadowFeed,
    active_shadow: Option<FeedHandle>,
    noise_2d: Option<NoiseField>,
    noise_3d: Option<NoiseField>,
    simplex: NoiseField,
    time: f32,
}

impl FogPipeline {
    /// Build a pipeline from a config. The config is sanitized on the way in.
    pub fn new(config: FogConfig) -> Self {
        let config = config.sanitized();
        let phase = PhaseFunction::new(
            config.scattering.mie_approximation,
            config.fog.anisotropy,
        );
        let fps = FpsCounter::new(config.quality.fps_sample_window);
        let mut quality = QualityController::from_config(&config.quality);
        quality.apply(&config.quality);
        Self {
            config,
            phase,
            fps,
            quality,
            pool: TargetPool::new(),
            shadow_feed: ShadowFeed::new(),
            active_shadow: None,
            noise_2d: None,
            noise_3d: None,
            simplex: NoiseField::simplex(SIMPLEX_SEED),
            time: 0.0,
        }
    }

    /// The sanitized config currently driving the pipeline.
    pub fn config(&self) -> &FogConfig {
        &self.config
    }

    /// Replace the config, e.g. after a hot reload.
    pub fn apply_config(&mut self, config: FogConfig) {
        self.config = config.sanitized();
        self.quality.apply(&self.config.quality);
        self.fps = FpsCounter::new(self.config.quality.fps_sample_window);
    }

    /// Bind the 2D noise texture used by the `Texture2d` source.
    pub fn bind_noise_texture(&mut self, texture: NoiseTexture2d) {
        self.noise_2d = Some(NoiseField::Texture2d(texture));
    }

    /// Bind the 3D lookup table used by the `Texture3d` source.
    pub fn bind_noise_lut(&mut self, lut: NoiseLut3d) {
        self.noise_3d = Some(NoiseField::Texture3d(lut));
    }

    /// Attach a shadow feed for a light. The first attached feed drives the
    /// raymarch visibility queries.
    pub fn attach_shadow_feed(&mut self, light_id: u64) -> Result<FeedHandle, ShadowFeedError> {
        let handle = self.shadow_feed.attach(light_id)?;
        if self.active_shadow.is_none() {
            self.active_shadow = Some(handle);
        }
        Ok(handle)
    }

    /// Detach a shadow feed.
    pub fn detach_shadow_feed(&mut self, handle: FeedHandle) -> Result<(), ShadowFeedError> {
        self.shadow_feed.detach(handle)?;
        if self.active_shadow == Some(handle) {
            self.active_shadow = None;
        }
        Ok(())
    }

    /// Push this frame's shadow-pass result.
    pub fn push_shadow_capture(
        &mut self,
        handle: FeedHandle,
        capture: ShadowCapture,
    ) -> Result<(), ShadowFeedError> {
        self.shadow_feed.capture(handle, capture)
    }

    /// Bytes held by fog render targets (in use, total allocated).
    pub fn target_memory(&self) -> (u64, u64) {
        (self.pool.bytes_in_use(), self.pool.bytes_allocated())
    }

    /// Render one frame.
    pub fn render(&mut self, params: &FrameParams) -> FrameOutput {
        self.fps.update(params.delta_time);
        self.time += params.delta_time.max(0.0);

        if !self.config.fog.enabled {
            return passthrough(params.scene);
        }
        if !params.view.is_finite() {
            log::warn!("Fog skipped: non-finite camera matrices");
            return passthrough(params.scene);
        }
        if !params.light.is_valid() {
            log::warn!("Fog skipped: invalid directional light");
            return passthrough(params.scene);
        }
        // Field selection stays a direct field borrow so the target pool can
        // be mutated while the field reference is alive.
        let field = match self.config.noise.source {
            NoiseSource::Texture2d => self.noise_2d.as_ref(),
            NoiseSource::Texture3d => self.noise_3d.as_ref(),
            NoiseSource::Simplex => Some(&self.simplex),
        };
        let Some(field) = field else {
            log::debug!(
                "Fog skipped: no resource bound for noise source {:?}",
                self.config.noise.source
            );
            return passthrough(params.scene);
        };

        let fog = &self.config.fog;

        // Rebuild the cached phase evaluator only when its inputs moved.
        let mode = self.config.scattering.mie_approximation;
        if self.phase.mode() != mode || self.phase.anisotropy() != fog.anisotropy {
            log::debug!("Phase function rebuilt for {mode:?} g={}", fog.anisotropy);
            self.phase = PhaseFunction::new(mode, fog.anisotropy);
        }

        // Below-target frame rates thin out the march; no samples yet means
        // full quality.
        let measured = self.fps.fps();
        let steps = if measured > 0.0 {
            self.quality.effective_steps(fog.raymarch_steps, measured)
        } else {
            fog.raymarch_steps
        };

        let shadows_on = fog.shadows_enabled && self.shadow_feed.has_capture();
        let keyword = ShadowKeyword::from_enabled(shadows_on);

        let bindings = FrameBindings {
            fog: self.pack_fog_uniform(params, steps, shadows_on),
            blur: BlurUniform::new(
                self.config.blur.offsets,
                blur_weights(&self.config.blur.weights),
                self.config.blur.depth_falloff,
                self.config.blur.iterations,
            ),
            shadow_keyword: keyword,
        };

        let low_w = (params.scene.width() >> fog.res_division).max(1);
        let low_h = (params.scene.height() >> fog.res_division).max(1);

        let mut primary = self.pool.acquire(low_w, low_h);
        let shadows = self
            .active_shadow
            .map(|handle| (&self.shadow_feed, handle));
        raymarch::raymarch(
            &mut primary,
            params.depth,
            &bindings.fog,
            &self.phase,
            field,
            shadows,
        );

        if self.config.blur.enabled {
            let mut scratch = self.pool.acquire(low_w, low_h);
            blur::blur(&mut primary, &mut scratch, params.depth, &bindings.blur);
            self.pool.release(scratch);
        }

        let image = composite::composite(params.scene, &primary, fog.add_scene_color);
        self.pool.release(primary);

        FrameOutput {
            image,
            bindings: Some(bindings),
        }
    }

    fn pack_fog_uniform(&self, params: &FrameParams, steps: u32, shadows_on: bool) -> FogUniform {
        let fog = &self.config.fog;
        let scattering = &self.config.scattering;
        let anchor = Vec3::from_array(fog.anchor_position);
        // Negative radius means no size limit; zero is an enabled limit
        // containing no fog.
        let radius = if fog.limit_fog_size { fog.fog_size } else { -1.0 };
        let light_dir = params.light.direction.normalize_or_zero();

        FogUniform {
            inverse_view: params.view.inverse_view.to_cols_array(),
            inverse_projection: params.view.inverse_projection.to_cols_array(),
            fog_world_position: [anchor.x, anchor.y, anchor.z, radius],
            light_direction: [light_dir.x, light_dir.y, light_dir.z, fog.light_intensity],
            light_color: [
                params.light.color.x,
                params.light.color.y,
                params.light.color.z,
                fog.use_light_color as u32 as f32,
            ],
            fog_in_light_color: fog.fog_in_light_color,
            fog_in_shadow_color: fog.fog_in_shadow_color,
            wind: [
                fog.wind_direction[0],
                fog.wind_direction[1],
                fog.wind_direction[2],
                fog.wind_speed,
            ],
            scattering: [
                fog.density_coeff,
                fog.extinction_coeff,
                scattering.rayleigh_coeff,
                scattering.mie_coeff,
            ],
            phase: [
                fog.anisotropy,
                self.phase.k_factor(),
                fog.ambient_fog,
                self.config.noise.scale,
            ],
            march: [
                steps as f32,
                self.time,
                shadows_on as u32 as f32,
                scattering.rayleigh_enabled as u32 as f32,
            ],
            height: [
                anchor.y,
                fog.height_density_coeff,
                fog.base_height_density,
                fog.height_fog_enabled as u32 as f32,
            ],
        }
    }
}

fn passthrough(scene: &RenderTarget) -> FrameOutput {
    FrameOutput {
        image: scene.clone(),
        bindings: None,
    }
}

/// Derive the full tap weight vector: the center weight is the sum of the
/// three outer weights.
fn blur_weights(outer: &[f32; 3]) -> [f32; 4] {
    [outer[0] + outer[1] + outer[2], outer[0], outer[1], outer[2]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;
    use murk_volume::schlick_k;
    use std::f32::consts::FRAC_PI_4;

    fn test_view() -> FrameView {
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(FRAC_PI_4, 1.0, 0.1, 500.0);
        FrameView::from_camera(view, proj)
    }

    fn gradient_scene(width: u32, height: u32) -> RenderTarget {
        let mut scene = RenderTarget::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let t = x as f32 / width as f32;
                scene.put_pixel(x, y, [t, 0.5, 1.0 - t, 1.0]);
            }
        }
        scene
    }

    /// Depth map stopping rays at z = -100: the whole fog volume is covered.
    fn far_depth(width: u32, height: u32) -> DepthMap {
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(FRAC_PI_4, 1.0, 0.1, 500.0);
        let clip = proj * view * Vec3::new(0.0, 0.0, -100.0).extend(1.0);
        DepthMap::filled(width, height, clip.z / clip.w)
    }

    fn simplex_config() -> FogConfig {
        let mut config = FogConfig::default();
        config.noise.source = NoiseSource::Simplex;
        config.fog.anchor_position = [0.0, 0.0, -10.0];
        config.fog.raymarch_steps = 32;
        config.fog.add_scene_color = true;
        config
    }

    fn render_once(pipeline: &mut FogPipeline, scene: &RenderTarget) -> FrameOutput {
        let depth = far_depth(scene.width(), scene.height());
        pipeline.render(&FrameParams {
            scene,
            depth: &depth,
            view: test_view(),
            light: &DirectionalLight::default(),
            delta_time: 1.0 / 60.0,
        })
    }

    #[test]
    fn test_disabled_effect_is_bit_equal_passthrough() {
        let mut config = simplex_config();
        config.fog.enabled = false;
        let mut pipeline = FogPipeline::new(config);

        let scene = gradient_scene(8, 8);
        let out = render_once(&mut pipeline, &scene);
        assert_eq!(out.image, scene);
        assert!(out.bindings.is_none());
    }

    #[test]
    fn test_missing_noise_texture_passes_through() {
        // Default source is Texture2d and nothing is bound.
        let mut config = FogConfig::default();
        config.fog.anchor_position = [0.0, 0.0, -10.0];
        let mut pipeline = FogPipeline::new(config);

        let scene = gradient_scene(8, 8);
        let out = render_once(&mut pipeline, &scene);
        assert_eq!(out.image, scene);
        assert!(out.bindings.is_none());
    }

    #[test]
    fn test_simplex_source_needs_no_binding() {
        let mut pipeline = FogPipeline::new(simplex_config());
        let scene = gradient_scene(8, 8);
        let out = render_once(&mut pipeline, &scene);
        assert!(out.bindings.is_some());
        assert_ne!(out.image, scene, "fog should alter the scene");
    }

    #[test]
    fn test_bound_texture_enables_texture_source() {
        let mut pipeline = FogPipeline::new({
            let mut c = simplex_config();
            c.noise.source = NoiseSource::Texture2d;
            c
        });
        let scene = gradient_scene(8, 8);
        assert!(render_once(&mut pipeline, &scene).bindings.is_none());

        pipeline.bind_noise_texture(
            NoiseTexture2d::from_pixels(1, 1, vec![[1.0, 1.0, 1.0, 1.0]]).unwrap(),
        );
        assert!(render_once(&mut pipeline, &scene).bindings.is_some());
    }

    #[test]
    fn test_invalid_light_passes_through() {
        let mut pipeline = FogPipeline::new(simplex_config());
        let scene = gradient_scene(4, 4);
        let depth = far_depth(4, 4);
        let mut light = DirectionalLight::default();
        light.intensity = f32::NAN;

        let out = pipeline.render(&FrameParams {
            scene: &scene,
            depth: &depth,
            view: test_view(),
            light: &light,
            delta_time: 1.0 / 60.0,
        });
        assert_eq!(out.image, scene);
    }

    #[test]
    fn test_add_scene_color_off_returns_scene() {
        let mut config = simplex_config();
        config.fog.add_scene_color = false;
        let mut pipeline = FogPipeline::new(config);

        let scene = gradient_scene(8, 8);
        let out = render_once(&mut pipeline, &scene);
        // The fog still ran (bindings published) but the composite passed
        // the scene through.
        assert!(out.bindings.is_some());
        assert_eq!(out.image, scene);
    }

    #[test]
    fn test_bindings_carry_cached_schlick_k() {
        let mut config = simplex_config();
        config.fog.anisotropy = 0.5;
        let mut pipeline = FogPipeline::new(config);

        let scene = gradient_scene(4, 4);
        let bindings = render_once(&mut pipeline, &scene).bindings.unwrap();
        assert!((bindings.fog.phase[1] - schlick_k(0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_zero_size_limit_collapses_fog_to_nothing() {
        let mut config = simplex_config();
        config.fog.limit_fog_size = true;
        config.fog.fog_size = 0.0;
        let mut pipeline = FogPipeline::new(config);

        let scene = gradient_scene(8, 8);
        let out = render_once(&mut pipeline, &scene);
        // The stages still ran; the empty volume just contributes nothing.
        assert!(out.bindings.is_some());
        assert_eq!(out.image, scene);
    }

    #[test]
    fn test_disabled_size_limit_encodes_negative_radius() {
        let mut config = simplex_config();
        config.fog.limit_fog_size = false;
        let mut pipeline = FogPipeline::new(config);

        let scene = gradient_scene(4, 4);
        let bindings = render_once(&mut pipeline, &scene).bindings.unwrap();
        assert!(bindings.fog.fog_world_position[3] < 0.0);
    }

    #[test]
    fn test_center_blur_weight_is_sum_of_outer_taps() {
        let mut config = simplex_config();
        config.blur.weights = [0.213, 0.17, 0.036];
        let mut pipeline = FogPipeline::new(config);

        let scene = gradient_scene(4, 4);
        let blur = render_once(&mut pipeline, &scene).bindings.unwrap().blur;
        assert!((blur.weights[0] - (0.213 + 0.17 + 0.036)).abs() < 1e-6);
        assert_eq!(blur.offsets[0], 0.0);
    }

    #[test]
    fn test_low_fps_reduces_effective_steps() {
        let mut config = simplex_config();
        config.fog.raymarch_steps = 128;
        config.quality.adaptive = true;
        config.quality.tier = murk_config::FpsTier::Fps30;
        let mut pipeline = FogPipeline::new(config);

        let scene = gradient_scene(4, 4);
        let depth = far_depth(4, 4);
        let light = DirectionalLight::default();

        // Feed 15 FPS frames until the window is saturated.
        let mut last = None;
        for _ in 0..8 {
            let out = pipeline.render(&FrameParams {
                scene: &scene,
                depth: &depth,
                view: test_view(),
                light: &light,
                delta_time: 1.0 / 15.0,
            });
            last = out.bindings;
        }
        assert_eq!(last.unwrap().fog.march[0], 32.0);
    }

    #[test]
    fn test_first_frame_uses_full_steps() {
        let mut config = simplex_config();
        config.quality.adaptive = true;
        let mut pipeline = FogPipeline::new(config);

        let scene = gradient_scene(4, 4);
        let depth = far_depth(4, 4);
        let out = pipeline.render(&FrameParams {
            scene: &scene,
            depth: &depth,
            view: test_view(),
            light: &DirectionalLight::default(),
            delta_time: 0.0,
        });
        assert_eq!(out.bindings.unwrap().fog.march[0], 32.0);
    }

    #[test]
    fn test_shadow_keyword_needs_capture() {
        let mut config = simplex_config();
        config.fog.shadows_enabled = true;
        let mut pipeline = FogPipeline::new(config);
        let scene = gradient_scene(4, 4);

        let bindings = render_once(&mut pipeline, &scene).bindings.unwrap();
        assert_eq!(bindings.shadow_keyword, ShadowKeyword::ShadowsOff);

        let handle = pipeline.attach_shadow_feed(1).unwrap();
        pipeline
            .push_shadow_capture(
                handle,
                ShadowCapture {
                    depth: DepthMap::filled(4, 4, 1.0),
                    light_view_proj: Mat4::IDENTITY,
                },
            )
            .unwrap();
        let bindings = render_once(&mut pipeline, &scene).bindings.unwrap();
        assert_eq!(bindings.shadow_keyword, ShadowKeyword::ShadowsOn);
    }

    #[test]
    fn test_target_pool_stops_growing_after_first_frame() {
        let mut config = simplex_config();
        config.blur.enabled = true;
        let mut pipeline = FogPipeline::new(config);
        let scene = gradient_scene(16, 16);

        render_once(&mut pipeline, &scene);
        let (_, allocated) = pipeline.target_memory();
        for _ in 0..3 {
            render_once(&mut pipeline, &scene);
        }
        let (in_use, allocated_after) = pipeline.target_memory();
        assert_eq!(allocated, allocated_after);
        assert_eq!(in_use, 0);
    }

    #[test]
    fn test_res_division_shrinks_fog_target() {
        let mut config = simplex_config();
        config.fog.res_division = 2;
        let mut pipeline = FogPipeline::new(config);
        let scene = gradient_scene(16, 16);

        let out = render_once(&mut pipeline, &scene);
        // Output stays full resolution regardless of the internal divisor.
        assert_eq!(out.image.width(), 16);
        let (_, allocated) = pipeline.target_memory();
        // One 4x4 fog target, 16 bytes per pixel.
        assert_eq!(allocated, 4 * 4 * 16);
    }

    #[test]
    fn test_detach_clears_active_feed() {
        let mut pipeline = FogPipeline::new(simplex_config());
        let handle = pipeline.attach_shadow_feed(9).unwrap();
        pipeline.detach_shadow_feed(handle).unwrap();
        assert!(pipeline.detach_shadow_feed(handle).is_err());
    }
}
