//! Fog configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use murk_volume::{MieApproximation, NoiseSource};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Config file name, written next to the host scene assets.
const CONFIG_FILE: &str = "fog.ron";

/// Top-level fog effect configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FogConfig {
    /// Fog volume and lighting settings.
    pub fog: FogSettings,
    /// Scattering model settings.
    pub scattering: ScatteringConfig,
    /// Noise source settings.
    pub noise: NoiseConfig,
    /// Separable blur settings.
    pub blur: BlurConfig,
    /// Adaptive quality settings.
    pub quality: QualityConfig,
    /// Diagnostics settings.
    pub diagnostics: DiagnosticsConfig,
}

/// Core fog volume parameters, read by the raymarch and composite stages
/// every frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FogSettings {
    /// Master enable for the whole effect.
    pub enabled: bool,
    /// Base fog density coefficient.
    pub density_coeff: f32,
    /// Extinction coefficient for Beer-Lambert attenuation.
    pub extinction_coeff: f32,
    /// Scattering anisotropy g, clamped to \[-1, 1\].
    pub anisotropy: f32,
    /// Enable exponential height falloff.
    pub height_fog_enabled: bool,
    /// Height fog density at the anchor height.
    pub base_height_density: f32,
    /// Exponential falloff rate with height above the anchor.
    pub height_density_coeff: f32,
    /// World-space anchor position of the fog volume.
    pub anchor_position: [f32; 3],
    /// Force density to zero outside `fog_size` around the anchor.
    pub limit_fog_size: bool,
    /// Radius of the fog volume in world units when limited.
    pub fog_size: f32,
    /// Ray-march step count, clamped to \[16, 256\].
    pub raymarch_steps: u32,
    /// Fog target resolution divisor: targets are `source >> res_division`.
    /// Clamped to \[0, 8\].
    pub res_division: u32,
    /// Wind direction for noise animation (normalized on sanitize).
    pub wind_direction: [f32; 3],
    /// Wind speed in world units per second.
    pub wind_speed: f32,
    /// Ambient in-scatter term, clamped to \[0, 1\].
    pub ambient_fog: f32,
    /// Light intensity multiplier, clamped to \[0, 10\].
    pub light_intensity: f32,
    /// Tint in-scatter by the light color instead of the fixed fog colors.
    pub use_light_color: bool,
    /// Fog color in lit regions (linear RGBA), used when `use_light_color`
    /// is off.
    pub fog_in_light_color: [f32; 4],
    /// Fog color in shadowed regions (linear RGBA).
    pub fog_in_shadow_color: [f32; 4],
    /// Blend the fog over the scene color; when off the composite stage is a
    /// pure passthrough.
    pub add_scene_color: bool,
    /// Sample the shadow feed for in-scatter visibility.
    pub shadows_enabled: bool,
}

/// Scattering model selection and coefficients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScatteringConfig {
    /// Enable the Rayleigh scattering term.
    pub rayleigh_enabled: bool,
    /// Rayleigh scattering coefficient.
    pub rayleigh_coeff: f32,
    /// Mie scattering coefficient.
    pub mie_coeff: f32,
    /// Mie phase function approximation. Exactly one mode is active.
    pub mie_approximation: MieApproximation,
}

/// Noise source selection for density modulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NoiseConfig {
    /// Which noise source the density field samples. Exactly one is active.
    pub source: NoiseSource,
    /// World-to-noise coordinate scale, clamped to \[-100, 100\].
    pub scale: f32,
    /// Dimensions of the 3D lookup texture built from the 2D slice atlas.
    pub lut_dimensions: [u32; 3],
}

/// Separable depth-aware blur settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlurConfig {
    /// Enable the blur stage; when off the raymarch output passes through
    /// unchanged.
    pub enabled: bool,
    /// Number of horizontal+vertical iterations, clamped to \[1, 8\].
    pub iterations: u32,
    /// Depth difference attenuation rate for the bilateral weights.
    pub depth_falloff: f32,
    /// Texel offsets of the three symmetric taps.
    pub offsets: [f32; 3],
    /// Weights of the three symmetric taps. The center weight is always
    /// derived as their sum.
    pub weights: [f32; 3],
}

/// Target frame-rate tier for adaptive quality.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum FpsTier {
    /// Scale step count against a 30 FPS target.
    Fps30,
    /// Scale step count against a 60 FPS target.
    #[default]
    Fps60,
    /// No target: the controller never reduces quality.
    Unlimited,
}

/// Adaptive quality settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityConfig {
    /// Enable adaptive step-count scaling.
    pub adaptive: bool,
    /// Target frame-rate tier.
    pub tier: FpsTier,
    /// Number of frames the FPS estimate is smoothed over, minimum 1.
    pub fps_sample_window: u32,
}

/// Diagnostics settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Log level override (e.g. "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            density_coeff: 0.3,
            extinction_coeff: 0.01,
            anisotropy: 0.5,
            height_fog_enabled: false,
            base_height_density: 0.5,
            height_density_coeff: 0.5,
            anchor_position: [0.0, 0.0, 0.0],
            limit_fog_size: true,
            fog_size: 10.0,
            raymarch_steps: 128,
            res_division: 0,
            wind_direction: [1.0, 0.0, 0.0],
            wind_speed: 1.0,
            ambient_fog: 0.0,
            light_intensity: 1.0,
            use_light_color: false,
            fog_in_light_color: [1.0, 1.0, 1.0, 1.0],
            fog_in_shadow_color: [0.0, 0.0, 0.0, 1.0],
            add_scene_color: false,
            shadows_enabled: false,
        }
    }
}

impl Default for ScatteringConfig {
    fn default() -> Self {
        Self {
            rayleigh_enabled: true,
            rayleigh_coeff: 0.25,
            mie_coeff: 0.25,
            mie_approximation: MieApproximation::HenyeyGreenstein,
        }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            source: NoiseSource::Texture2d,
            scale: 0.0,
            lut_dimensions: [1, 1, 1],
        }
    }
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            iterations: 4,
            depth_falloff: 0.5,
            offsets: [1.0, 2.0, 3.0],
            weights: [0.213, 0.17, 0.036],
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            adaptive: false,
            tier: FpsTier::Fps60,
            fps_sample_window: 4,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Validation ---

impl FogConfig {
    /// Clamp every parameter into its documented range.
    ///
    /// The pipeline only ever reads sanitized configs, so out-of-range values
    /// from a hand-edited file cannot produce NaNs, divisions by zero, or
    /// unbounded march loops.
    pub fn sanitize(&mut self) {
        let fog = &mut self.fog;
        fog.density_coeff = fog.density_coeff.max(0.0);
        fog.extinction_coeff = fog.extinction_coeff.max(0.0);
        fog.anisotropy = fog.anisotropy.clamp(-1.0, 1.0);
        fog.base_height_density = fog.base_height_density.max(0.0);
        fog.height_density_coeff = fog.height_density_coeff.max(0.0);
        fog.fog_size = fog.fog_size.max(0.0);
        fog.raymarch_steps = fog.raymarch_steps.clamp(16, 256);
        fog.res_division = fog.res_division.min(8);
        fog.ambient_fog = fog.ambient_fog.clamp(0.0, 1.0);
        fog.light_intensity = fog.light_intensity.clamp(0.0, 10.0);

        // A zero wind direction would collapse the animation offset; fall
        // back to +X rather than normalizing a zero vector.
        let w = fog.wind_direction;
        let len = (w[0] * w[0] + w[1] * w[1] + w[2] * w[2]).sqrt();
        if len > 1e-6 {
            fog.wind_direction = [w[0] / len, w[1] / len, w[2] / len];
        } else {
            fog.wind_direction = [1.0, 0.0, 0.0];
        }

        let scattering = &mut self.scattering;
        scattering.rayleigh_coeff = scattering.rayleigh_coeff.max(0.0);
        scattering.mie_coeff = scattering.mie_coeff.max(0.0);

        let noise = &mut self.noise;
        noise.scale = noise.scale.clamp(-100.0, 100.0);
        for dim in &mut noise.lut_dimensions {
            *dim = (*dim).max(1);
        }

        let blur = &mut self.blur;
        blur.iterations = blur.iterations.clamp(1, 8);
        blur.depth_falloff = blur.depth_falloff.max(0.0);
        for w in &mut blur.weights {
            *w = w.max(0.0);
        }

        self.quality.fps_sample_window = self.quality.fps_sample_window.max(1);
    }

    /// Return a sanitized copy.
    pub fn sanitized(&self) -> Self {
        let mut config = self.clone();
        config.sanitize();
        config
    }
}

// --- Load / Save / Reload ---

impl FogConfig {
    /// Load config from the given directory, or create a default config file.
    ///
    /// The loaded config is sanitized before it is returned.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let mut config: FogConfig =
                ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.sanitize();
            log::info!("Loaded fog config from {}", config_path.display());
            Ok(config)
        } else {
            let config = FogConfig::default();
            config.save(config_dir)?;
            log::info!("Created default fog config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `fog.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None`
    /// otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let mut new_config: FogConfig =
            ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.sanitize();

        if &new_config != self {
            log::info!("Fog config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
